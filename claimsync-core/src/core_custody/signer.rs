use super::errors::CustodialError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Produces the first-factor assertion for a custody challenge.
///
/// In a browser this is the WebAuthn ceremony; here it is whatever the
/// deployment wires in.
#[async_trait]
pub trait ChallengeSigner: Send + Sync {
    async fn sign(&self, challenge: &Value) -> Result<Value, CustodialError>;
}

/// Answers every challenge with a pre-registered credential id.
///
/// Suitable for service accounts whose credential the custody service
/// accepts without an interactive ceremony.
pub struct CredentialSigner {
    credential_id: String,
}

impl CredentialSigner {
    pub fn new(credential_id: impl Into<String>) -> Self {
        Self {
            credential_id: credential_id.into(),
        }
    }
}

#[async_trait]
impl ChallengeSigner for CredentialSigner {
    async fn sign(&self, challenge: &Value) -> Result<Value, CustodialError> {
        let identifier = challenge
            .get("challengeIdentifier")
            .and_then(Value::as_str)
            .ok_or_else(|| CustodialError::Signing("challenge has no identifier".to_string()))?;

        Ok(json!({
            "kind": "Fido2",
            "credentialAssertion": {
                "credId": self.credential_id,
                "challengeIdentifier": identifier,
            },
        }))
    }
}
