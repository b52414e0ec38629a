//! Registry client error types

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("transaction reverted: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Reverted { reason: Option<String> },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("client is read-only: no signer bound")]
    ReadOnly,

    #[error("transaction {0} dropped before inclusion")]
    Dropped(String),
}

impl ChainError {
    pub fn reverted(reason: impl Into<String>) -> Self {
        ChainError::Reverted {
            reason: Some(reason.into()),
        }
    }

    /// Revert reason supplied by the contract, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ChainError::Reverted { reason } => reason.as_deref(),
            _ => None,
        }
    }
}

pub type ChainResult<T> = Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_display() {
        assert_eq!(
            ChainError::reverted("ClaimTopic already exists").to_string(),
            "transaction reverted: ClaimTopic already exists"
        );
        assert_eq!(
            ChainError::Reverted { reason: None }.to_string(),
            "transaction reverted: no reason given"
        );
        assert_eq!(ChainError::ReadOnly.reason(), None);
    }
}
