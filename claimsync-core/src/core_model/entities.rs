use super::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Integer identifier of a claim topic.
///
/// Topics are allocated by the admin surface (highest known id + 1) and
/// stored as decimal strings in the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(pub u64);

impl TopicId {
    /// Id to allocate after `existing`: one past the highest, or 1 when empty.
    pub fn next_after<I>(existing: I) -> TopicId
    where
        I: IntoIterator<Item = TopicId>,
    {
        existing
            .into_iter()
            .max()
            .map(|TopicId(n)| TopicId(n.saturating_add(1)))
            .unwrap_or(TopicId(1))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TopicId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(TopicId)
    }
}

impl From<u64> for TopicId {
    fn from(value: u64) -> Self {
        TopicId(value)
    }
}

/// A value read back from the mirror together with its bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Mirrored<T> {
    pub object_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimTopic {
    pub topic: TopicId,
    pub display_name: String,
    pub active: bool,
}

/// One topic an issuer may attest, stamped with when it was granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicGrant {
    pub topic: TopicId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedIssuer {
    pub issuer: Address,
    pub verifier_name: String,
    pub claim_topics: Vec<TopicGrant>,
    pub active: bool,
}

impl TrustedIssuer {
    pub fn topics(&self) -> Vec<TopicId> {
        self.claim_topics.iter().map(|g| g.topic).collect()
    }

    pub fn attests(&self, topic: TopicId) -> bool {
        self.claim_topics.iter().any(|g| g.topic == topic)
    }
}

/// Mirrored view of a registered identity, keyed by the owner wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    /// Owner wallet.
    pub address: Address,
    /// On-chain identity contract, once known.
    pub identity: Option<Address>,
    pub display_name: String,
    pub account_number: String,
    pub claims: Vec<TopicId>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimEventRecord {
    pub identity: Address,
    pub claim_topic: TopicId,
    pub block_hash: String,
    pub transaction_hash: Option<String>,
}

/// A user account awaiting central-authority approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingIdentity {
    pub wallet_address: Option<Address>,
    pub display_name: String,
    pub account_number: String,
    pub pending_approval: bool,
    pub denied: bool,
    pub pep_matched: bool,
    pub watchlist_matched: bool,
    pub verification_data: Option<Value>,
}

/// Claim payload carried by `addClaim`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimData {
    pub scheme: u64,
    pub issuer: Address,
    pub signature: String,
    pub data: String,
    pub uri: String,
}

impl ClaimData {
    /// Claim payload used when topics are set in bulk, attested by `issuer`.
    pub fn attested_by(issuer: Address) -> Self {
        Self {
            scheme: 1,
            issuer,
            signature: "0x".to_string(),
            data: "0x".to_string(),
            uri: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintAttribute {
    pub key: String,
    pub value: String,
}

/// One claim slot on the digital identity screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaimView {
    pub topic: TopicId,
    pub display_name: String,
    pub block_hash: Option<String>,
}

/// Everything needed to render a single identity.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitalIdentity {
    pub profile: Mirrored<IdentityProfile>,
    pub claims: Vec<IdentityClaimView>,
    pub kyc_attributes: Option<Value>,
    pub pep_matched: bool,
    pub watchlist_matched: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveIdentity {
    pub profile: Mirrored<IdentityProfile>,
    pub pep_matched: bool,
    pub watchlist_matched: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_topic_id() {
        assert_eq!(TopicId::next_after(Vec::new()), TopicId(1));
        assert_eq!(
            TopicId::next_after(vec![TopicId(3), TopicId(10), TopicId(9)]),
            TopicId(11)
        );
    }

    #[test]
    fn test_topic_id_from_str() {
        assert_eq!(" 42 ".parse::<TopicId>().unwrap(), TopicId(42));
        assert!("abc".parse::<TopicId>().is_err());
    }

    #[test]
    fn test_issuer_attests() {
        let issuer = TrustedIssuer {
            issuer: Address::from_low_u64(7),
            verifier_name: "Acme KYC".into(),
            claim_topics: vec![TopicGrant {
                topic: TopicId(2),
                timestamp: Utc::now(),
            }],
            active: true,
        };
        assert!(issuer.attests(TopicId(2)));
        assert!(!issuer.attests(TopicId(3)));
        assert_eq!(issuer.topics(), vec![TopicId(2)]);
    }
}
