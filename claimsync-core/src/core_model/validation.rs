//! Input checks applied before anything touches the chain or the mirror.

use super::{Address, AddressError, TopicId};
use thiserror::Error;

/// Longest display name accepted for topics and issuers.
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} must contain only alphanumeric characters")]
    NotAlphanumeric { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Invalid Ethereum wallet address in {field}: {source}")]
    InvalidAddress {
        field: &'static str,
        #[source]
        source: AddressError,
    },

    #[error("Assign at least 1 claim topic")]
    NoClaimTopics,

    #[error("Claim topic 0 is not a valid topic")]
    ZeroTopic,
}

/// Non-empty, alphanumeric (spaces allowed), at most
/// [`MAX_DISPLAY_NAME_LEN`] characters. Returns the trimmed name.
pub fn display_name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = required(field, value)?;

    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ') {
        return Err(ValidationError::NotAlphanumeric { field });
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_DISPLAY_NAME_LEN,
        });
    }
    Ok(trimmed)
}

/// Any non-blank text. Returns it trimmed.
pub fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required { field });
    }
    Ok(trimmed.to_string())
}

pub fn address(field: &'static str, value: &str) -> Result<Address, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required { field });
    }
    Address::parse(value).map_err(|source| ValidationError::InvalidAddress { field, source })
}

/// At least one topic, none of them zero. Duplicates are dropped, first
/// occurrence wins.
pub fn topic_selection(topics: &[TopicId]) -> Result<Vec<TopicId>, ValidationError> {
    if topics.is_empty() {
        return Err(ValidationError::NoClaimTopics);
    }
    if topics.iter().any(|t| t.0 == 0) {
        return Err(ValidationError::ZeroTopic);
    }

    let mut out = Vec::with_capacity(topics.len());
    for topic in topics {
        if !out.contains(topic) {
            out.push(*topic);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_rules() {
        assert_eq!(display_name("Display Name", "  KYC Level 2 ").unwrap(), "KYC Level 2");
        assert_eq!(
            display_name("Display Name", "   "),
            Err(ValidationError::Required { field: "Display Name" })
        );
        assert_eq!(
            display_name("Display Name", "KYC-2"),
            Err(ValidationError::NotAlphanumeric { field: "Display Name" })
        );
        assert_eq!(
            display_name("Display Name", &"a".repeat(33)),
            Err(ValidationError::TooLong {
                field: "Display Name",
                max: 32
            })
        );
        assert!(display_name("Display Name", &"a".repeat(32)).is_ok());
    }

    #[test]
    fn test_address_field() {
        assert!(matches!(
            address("Trusted Issuer Wallet", "0x123"),
            Err(ValidationError::InvalidAddress { .. })
        ));
        assert_eq!(
            address("Trusted Issuer Wallet", ""),
            Err(ValidationError::Required {
                field: "Trusted Issuer Wallet"
            })
        );
        assert!(address("w", "0x0000000000000000000000000000000000000001").is_ok());
    }

    #[test]
    fn test_topic_selection() {
        assert_eq!(topic_selection(&[]), Err(ValidationError::NoClaimTopics));
        assert_eq!(topic_selection(&[TopicId(0)]), Err(ValidationError::ZeroTopic));
        assert_eq!(
            topic_selection(&[TopicId(2), TopicId(1), TopicId(2)]).unwrap(),
            vec![TopicId(2), TopicId(1)]
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ValidationError::NoClaimTopics.to_string(),
            "Assign at least 1 claim topic"
        );
        assert_eq!(
            ValidationError::Required { field: "Display Name" }.to_string(),
            "Display Name is required"
        );
    }
}
