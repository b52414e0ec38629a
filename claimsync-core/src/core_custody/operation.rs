use super::errors::CustodialError;
use crate::core_chain::RegistryCall;
use crate::core_model::{Address, TopicId};
use serde_json::{json, Map, Value};

/// Registry operations the custody service can sign for.
///
/// Each maps onto a pair of server functions, `<prefix><Name>Init` and
/// `<prefix><Name>Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustodialOperation {
    AddClaimTopic,
    RemoveClaimTopic,
    AddTrustedIssuer,
    UpdateTrustedIssuer,
    RemoveTrustedIssuer,
    CreateIdentity,
    AddIdentity,
    RemoveIdentity,
    UnregisterIdentity,
    SetClaims,
    AddClaim,
    RemoveClaim,
    Mint,
}

impl CustodialOperation {
    pub const ALL: [CustodialOperation; 13] = [
        CustodialOperation::AddClaimTopic,
        CustodialOperation::RemoveClaimTopic,
        CustodialOperation::AddTrustedIssuer,
        CustodialOperation::UpdateTrustedIssuer,
        CustodialOperation::RemoveTrustedIssuer,
        CustodialOperation::CreateIdentity,
        CustodialOperation::AddIdentity,
        CustodialOperation::RemoveIdentity,
        CustodialOperation::UnregisterIdentity,
        CustodialOperation::SetClaims,
        CustodialOperation::AddClaim,
        CustodialOperation::RemoveClaim,
        CustodialOperation::Mint,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CustodialOperation::AddClaimTopic => "AddClaimTopic",
            CustodialOperation::RemoveClaimTopic => "RemoveClaimTopic",
            CustodialOperation::AddTrustedIssuer => "AddTrustedIssuer",
            CustodialOperation::UpdateTrustedIssuer => "UpdateTrustedIssuer",
            CustodialOperation::RemoveTrustedIssuer => "RemoveTrustedIssuer",
            CustodialOperation::CreateIdentity => "CreateIdentity",
            CustodialOperation::AddIdentity => "AddIdentity",
            CustodialOperation::RemoveIdentity => "RemoveIdentity",
            CustodialOperation::UnregisterIdentity => "UnregisterIdentity",
            CustodialOperation::SetClaims => "SetClaims",
            CustodialOperation::AddClaim => "AddClaim",
            CustodialOperation::RemoveClaim => "RemoveClaim",
            CustodialOperation::Mint => "Mint",
        }
    }

    pub fn init_function(&self, prefix: &str) -> String {
        format!("{prefix}{}Init", self.name())
    }

    pub fn complete_function(&self, prefix: &str) -> String {
        format!("{prefix}{}Complete", self.name())
    }

    pub fn for_call(call: &RegistryCall) -> Result<Self, CustodialError> {
        Ok(match call {
            RegistryCall::AddClaimTopic { .. } => CustodialOperation::AddClaimTopic,
            RegistryCall::RemoveClaimTopic { .. } => CustodialOperation::RemoveClaimTopic,
            RegistryCall::AddTrustedIssuer { .. } => CustodialOperation::AddTrustedIssuer,
            RegistryCall::UpdateIssuerClaimTopics { .. } => CustodialOperation::UpdateTrustedIssuer,
            RegistryCall::RemoveTrustedIssuer { .. } => CustodialOperation::RemoveTrustedIssuer,
            RegistryCall::CreateIdentity { .. } => CustodialOperation::CreateIdentity,
            RegistryCall::AddIdentity { .. } => CustodialOperation::AddIdentity,
            RegistryCall::RemoveIdentity { .. } => CustodialOperation::RemoveIdentity,
            RegistryCall::UnregisterIdentity { .. } => CustodialOperation::UnregisterIdentity,
            RegistryCall::SetClaims { .. } => CustodialOperation::SetClaims,
            RegistryCall::AddClaim { .. } => CustodialOperation::AddClaim,
            RegistryCall::RemoveClaim { .. } => CustodialOperation::RemoveClaim,
            RegistryCall::Mint { .. } => CustodialOperation::Mint,
            RegistryCall::BatchAddIdentity { .. } => {
                return Err(CustodialError::Unsupported("batchAddIdentity"))
            }
        })
    }
}

fn missing(op: CustodialOperation, parameter: &'static str) -> CustodialError {
    CustodialError::MissingParameter {
        operation: op.name(),
        parameter,
    }
}

fn require_address(
    op: CustodialOperation,
    parameter: &'static str,
    address: &Address,
) -> Result<Value, CustodialError> {
    if address.is_zero() {
        return Err(missing(op, parameter));
    }
    Ok(Value::String(address.to_string()))
}

fn require_topic(op: CustodialOperation, topic: &TopicId) -> Result<Value, CustodialError> {
    if topic.0 == 0 {
        return Err(missing(op, "claimTopic"));
    }
    Ok(Value::String(topic.to_string()))
}

fn require_topics(op: CustodialOperation, topics: &[TopicId]) -> Result<Value, CustodialError> {
    if topics.is_empty() {
        return Err(missing(op, "claimTopics"));
    }
    Ok(json!(topics.iter().map(|t| t.0).collect::<Vec<_>>()))
}

/// Initiation parameters for `call`, checked for presence.
pub fn payload_for(
    call: &RegistryCall,
) -> Result<(CustodialOperation, Map<String, Value>), CustodialError> {
    let op = CustodialOperation::for_call(call)?;
    let mut p = Map::new();

    match call {
        RegistryCall::AddClaimTopic { topic } | RegistryCall::RemoveClaimTopic { topic } => {
            p.insert("claimTopic".into(), require_topic(op, topic)?);
        }
        RegistryCall::AddTrustedIssuer { issuer, topics }
        | RegistryCall::UpdateIssuerClaimTopics { issuer, topics } => {
            p.insert("trustedIssuer".into(), require_address(op, "trustedIssuer", issuer)?);
            p.insert("claimTopics".into(), require_topics(op, topics)?);
        }
        RegistryCall::RemoveTrustedIssuer { issuer } => {
            p.insert("trustedIssuer".into(), require_address(op, "trustedIssuer", issuer)?);
        }
        RegistryCall::CreateIdentity { owner } => {
            p.insert("ownerAddress".into(), require_address(op, "ownerAddress", owner)?);
        }
        RegistryCall::AddIdentity { owner, identity } => {
            p.insert("ownerAddress".into(), require_address(op, "ownerAddress", owner)?);
            p.insert("identityAddress".into(), require_address(op, "identityAddress", identity)?);
        }
        RegistryCall::RemoveIdentity { owner } | RegistryCall::UnregisterIdentity { owner } => {
            p.insert("identity".into(), require_address(op, "identity", owner)?);
        }
        RegistryCall::SetClaims { owner, topics } => {
            p.insert("identity".into(), require_address(op, "identity", owner)?);
            p.insert("claimTopics".into(), require_topics(op, topics)?);
        }
        RegistryCall::AddClaim { owner, topic, claim } => {
            p.insert("identity".into(), require_address(op, "identity", owner)?);
            p.insert("claimTopic".into(), require_topic(op, topic)?);
            p.insert(
                "claim".into(),
                serde_json::to_value(claim).map_err(|_| missing(op, "claim"))?,
            );
        }
        RegistryCall::RemoveClaim { owner, topic } => {
            p.insert("identity".into(), require_address(op, "identity", owner)?);
            p.insert("claimTopic".into(), require_topic(op, topic)?);
        }
        RegistryCall::Mint { metadata } => {
            if metadata.is_empty() {
                return Err(missing(op, "metadata"));
            }
            p.insert(
                "metadata".into(),
                serde_json::to_value(metadata).map_err(|_| missing(op, "metadata"))?,
            );
        }
        RegistryCall::BatchAddIdentity { .. } => {
            return Err(CustodialError::Unsupported("batchAddIdentity"))
        }
    }

    Ok((op, p))
}
