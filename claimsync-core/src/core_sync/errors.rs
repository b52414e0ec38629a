//! Error types for the synchronization workflow

use crate::core_chain::{ChainError, TxReceipt};
use crate::core_custody::CustodialError;
use crate::core_model::{Address, ValidationError};
use crate::core_session::SessionError;
use crate::core_store::StoreError;
use thiserror::Error;

/// Result type for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors an admin action can end with
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Input rejected before any network call
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Registry call failed or reverted
    #[error("Chain call failed: {0}")]
    Chain(#[from] ChainError),

    /// Custody service refused or failed a phase
    #[error("Custody service: {0}")]
    Custodial(#[from] CustodialError),

    /// Chain succeeded but the mirror never caught up
    #[error("{class} mirror not updated after {attempts} attempts: {last_error}")]
    MirrorConsistency {
        class: String,
        key: String,
        attempts: u32,
        last_error: String,
        receipts: Vec<TxReceipt>,
    },

    /// Mirror row or session-bound entity missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Factory never reported an identity contract for the owner
    #[error("Identity for {owner} not found after {attempts} attempts")]
    IdentityNotFound { owner: Address, attempts: u32 },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Session expired")]
    SessionExpired,

    /// Mirror store failed outside a retried step
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<SessionError> for WorkflowError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Expired => WorkflowError::SessionExpired,
            SessionError::Unauthorized(reason) => WorkflowError::Unauthorized(reason),
            SessionError::MissingCustody(parameter) => {
                WorkflowError::Custodial(CustodialError::MissingParameter {
                    operation: "session",
                    parameter,
                })
            }
            other => WorkflowError::Unauthorized(other.to_string()),
        }
    }
}

impl WorkflowError {
    /// Contract revert reason, when the chain supplied one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            WorkflowError::Chain(e) => e.reason(),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, WorkflowError::Validation(_))
    }

    /// Receipts of transactions that did land despite the failure.
    pub fn receipts(&self) -> &[TxReceipt] {
        match self {
            WorkflowError::MirrorConsistency { receipts, .. } => receipts,
            _ => &[],
        }
    }
}
