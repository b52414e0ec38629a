use crate::core_model::{Address, ClaimData, MintAttribute, TopicId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inclusion proof returned once a transaction is mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub transaction_hash: String,
    pub block_hash: String,
    pub block_number: u64,
}

impl TxReceipt {
    /// Pull a receipt out of a custody service completion payload. The
    /// service reports hashes under either camelCase or short keys.
    pub fn from_custody_response(response: &Value) -> Option<Self> {
        let field = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| response.get(*n).and_then(Value::as_str))
                .map(String::from)
        };

        Some(Self {
            transaction_hash: field(&["transactionHash", "txHash"])?,
            block_hash: field(&["blockHash"]).unwrap_or_default(),
            block_number: response
                .get("blockNumber")
                .and_then(Value::as_u64)
                .unwrap_or_default(),
        })
    }
}

/// A submitted transaction awaiting inclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    pub transaction_hash: String,
    pub from: Address,
}

/// Contract a call is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryContract {
    ClaimTopics,
    TrustedIssuers,
    IdentityRegistry,
    IdentityFactory,
    Collection,
}

/// Every state-changing call the admin surface makes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum RegistryCall {
    AddClaimTopic {
        topic: TopicId,
    },
    RemoveClaimTopic {
        topic: TopicId,
    },
    AddTrustedIssuer {
        issuer: Address,
        topics: Vec<TopicId>,
    },
    RemoveTrustedIssuer {
        issuer: Address,
    },
    UpdateIssuerClaimTopics {
        issuer: Address,
        topics: Vec<TopicId>,
    },
    CreateIdentity {
        owner: Address,
    },
    AddIdentity {
        owner: Address,
        identity: Address,
    },
    BatchAddIdentity {
        owners: Vec<Address>,
        identities: Vec<Address>,
    },
    /// Drop the factory's identity contract for `owner`.
    RemoveIdentity {
        owner: Address,
    },
    /// Drop `owner` from the identity registry.
    UnregisterIdentity {
        owner: Address,
    },
    SetClaims {
        owner: Address,
        topics: Vec<TopicId>,
    },
    AddClaim {
        owner: Address,
        topic: TopicId,
        claim: ClaimData,
    },
    RemoveClaim {
        owner: Address,
        topic: TopicId,
    },
    Mint {
        metadata: Vec<MintAttribute>,
    },
}

impl RegistryCall {
    /// Contract method name.
    pub fn method(&self) -> &'static str {
        match self {
            RegistryCall::AddClaimTopic { .. } => "addClaimTopic",
            RegistryCall::RemoveClaimTopic { .. } => "removeClaimTopic",
            RegistryCall::AddTrustedIssuer { .. } => "addTrustedIssuer",
            RegistryCall::RemoveTrustedIssuer { .. } => "removeTrustedIssuer",
            RegistryCall::UpdateIssuerClaimTopics { .. } => "updateIssuerClaimTopics",
            RegistryCall::CreateIdentity { .. } => "createIdentity",
            RegistryCall::AddIdentity { .. } => "addIdentity",
            RegistryCall::BatchAddIdentity { .. } => "batchAddIdentity",
            RegistryCall::RemoveIdentity { .. } => "removeIdentity",
            RegistryCall::UnregisterIdentity { .. } => "unregisterIdentity",
            RegistryCall::SetClaims { .. } => "setClaims",
            RegistryCall::AddClaim { .. } => "addClaim",
            RegistryCall::RemoveClaim { .. } => "removeClaim",
            RegistryCall::Mint { .. } => "mint",
        }
    }

    pub fn contract(&self) -> RegistryContract {
        match self {
            RegistryCall::AddClaimTopic { .. } | RegistryCall::RemoveClaimTopic { .. } => {
                RegistryContract::ClaimTopics
            }
            RegistryCall::AddTrustedIssuer { .. }
            | RegistryCall::RemoveTrustedIssuer { .. }
            | RegistryCall::UpdateIssuerClaimTopics { .. } => RegistryContract::TrustedIssuers,
            RegistryCall::CreateIdentity { .. } | RegistryCall::RemoveIdentity { .. } => {
                RegistryContract::IdentityFactory
            }
            RegistryCall::Mint { .. } => RegistryContract::Collection,
            _ => RegistryContract::IdentityRegistry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_receipt_from_custody_response() {
        let receipt = TxReceipt::from_custody_response(&json!({
            "txHash": "0xabc",
            "blockHash": "0xdef",
            "blockNumber": 12,
        }))
        .unwrap();
        assert_eq!(receipt.transaction_hash, "0xabc");
        assert_eq!(receipt.block_number, 12);

        assert!(TxReceipt::from_custody_response(&json!({"status": "Broadcasted"})).is_none());
    }

    #[test]
    fn test_call_routing() {
        let owner = Address::from_low_u64(1);
        assert_eq!(
            RegistryCall::CreateIdentity { owner }.contract(),
            RegistryContract::IdentityFactory
        );
        assert_eq!(
            RegistryCall::UnregisterIdentity { owner }.contract(),
            RegistryContract::IdentityRegistry
        );
        assert_eq!(RegistryCall::RemoveIdentity { owner }.method(), "removeIdentity");
    }

    #[test]
    fn test_call_serializes_with_method_tag() {
        let call = RegistryCall::AddClaimTopic { topic: TopicId(4) };
        assert_eq!(
            serde_json::to_value(&call).unwrap(),
            json!({"method": "addClaimTopic", "topic": 4})
        );
    }
}
