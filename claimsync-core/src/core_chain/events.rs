//! Registry events
//!
//! Contract events as the registry emits them, plus the block metadata the
//! mirror needs to attribute them.

use crate::core_model::{Address, ClaimData, TopicId};
use serde::{Deserialize, Serialize};

/// Event emitted by one of the registry contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RegistryEvent {
    ClaimTopicAdded {
        topic: TopicId,
    },
    ClaimTopicRemoved {
        topic: TopicId,
    },
    TrustedIssuerAdded {
        issuer: Address,
        topics: Vec<TopicId>,
    },
    TrustedIssuerRemoved {
        issuer: Address,
    },
    ClaimTopicsUpdated {
        issuer: Address,
        topics: Vec<TopicId>,
    },
    IdentityAdded {
        owner: Address,
        identity: Address,
    },
    IdentityRemoved {
        owner: Address,
        identity: Address,
    },
    ClaimAdded {
        owner: Address,
        identity: Address,
        claim_id: String,
        topic: TopicId,
        claim: ClaimData,
    },
    ClaimRemoved {
        owner: Address,
        identity: Address,
        claim_id: String,
        topic: TopicId,
    },
    IdentityCountryUpdated {
        owner: Address,
        country: u16,
    },
}

/// Discriminant of [`RegistryEvent`], used for subscription filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ClaimTopicAdded,
    ClaimTopicRemoved,
    TrustedIssuerAdded,
    TrustedIssuerRemoved,
    ClaimTopicsUpdated,
    IdentityAdded,
    IdentityRemoved,
    ClaimAdded,
    ClaimRemoved,
    IdentityCountryUpdated,
}

impl RegistryEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RegistryEvent::ClaimTopicAdded { .. } => EventKind::ClaimTopicAdded,
            RegistryEvent::ClaimTopicRemoved { .. } => EventKind::ClaimTopicRemoved,
            RegistryEvent::TrustedIssuerAdded { .. } => EventKind::TrustedIssuerAdded,
            RegistryEvent::TrustedIssuerRemoved { .. } => EventKind::TrustedIssuerRemoved,
            RegistryEvent::ClaimTopicsUpdated { .. } => EventKind::ClaimTopicsUpdated,
            RegistryEvent::IdentityAdded { .. } => EventKind::IdentityAdded,
            RegistryEvent::IdentityRemoved { .. } => EventKind::IdentityRemoved,
            RegistryEvent::ClaimAdded { .. } => EventKind::ClaimAdded,
            RegistryEvent::ClaimRemoved { .. } => EventKind::ClaimRemoved,
            RegistryEvent::IdentityCountryUpdated { .. } => EventKind::IdentityCountryUpdated,
        }
    }

    /// Identity owner the event concerns, for identity and claim events.
    pub fn owner(&self) -> Option<Address> {
        match self {
            RegistryEvent::IdentityAdded { owner, .. }
            | RegistryEvent::IdentityRemoved { owner, .. }
            | RegistryEvent::ClaimAdded { owner, .. }
            | RegistryEvent::ClaimRemoved { owner, .. }
            | RegistryEvent::IdentityCountryUpdated { owner, .. } => Some(*owner),
            _ => None,
        }
    }
}

/// Claim id as derived by the identity contract: issuer followed by topic.
pub fn claim_id(issuer: &Address, topic: TopicId) -> String {
    format!("0x{}{:016x}", hex::encode(issuer.as_bytes()), topic.0)
}

/// A [`RegistryEvent`] with the block it was included in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEvent {
    pub block_number: u64,
    pub block_hash: String,
    pub transaction_hash: String,
    pub event: RegistryEvent,
}

impl ContractEvent {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_and_owner() {
        let owner = Address::from_low_u64(1);
        let event = RegistryEvent::IdentityAdded {
            owner,
            identity: Address::from_low_u64(2),
        };
        assert_eq!(event.kind(), EventKind::IdentityAdded);
        assert_eq!(event.owner(), Some(owner));

        let event = RegistryEvent::ClaimTopicAdded { topic: TopicId(1) };
        assert_eq!(event.owner(), None);
    }

    #[test]
    fn test_claim_id_is_stable() {
        let issuer = Address::from_low_u64(0xa);
        assert_eq!(claim_id(&issuer, TopicId(1)), claim_id(&issuer, TopicId(1)));
        assert_ne!(claim_id(&issuer, TopicId(1)), claim_id(&issuer, TopicId(2)));
        assert_eq!(claim_id(&issuer, TopicId(1)).len(), 2 + 40 + 16);
    }
}
