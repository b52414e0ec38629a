//! Two-phase signing through the custody service
//!
//! Every registry operation is split in two server function calls:
//!
//! ```text
//! initiate_*  --> <prefix><Op>Init      --> { challenge, requestBody }
//!                 (signer answers the challenge)
//! complete_*  --> <prefix><Op>Complete  --> service response
//! ```
//!
//! Both phases report remote failures in-band through [`CustodialResponse`]
//! so the caller decides whether to continue. Missing parameters are
//! rejected before any network call.

use super::errors::CustodialError;
use super::operation::{payload_for, CustodialOperation};
use super::signer::ChallengeSigner;
use crate::core_chain::RegistryCall;
use crate::core_model::{Address, ClaimData, MintAttribute, TopicId};
use crate::core_store::CloudFunctions;
use crate::metrics::record_counter;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default server function prefix.
pub const DEFAULT_FUNCTION_PREFIX: &str = "dfns";

/// Custodial wallet and the token authorizing operations on it.
#[derive(Debug, Clone)]
pub struct CustodyCredentials {
    pub wallet_id: String,
    pub token: SecretString,
}

impl CustodyCredentials {
    pub fn new(wallet_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            token: SecretString::new(token.into()),
        }
    }
}

/// Challenge issued by the init phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Initiation {
    pub challenge: Value,
    pub request_body: Value,
}

/// Outcome of one phase: exactly one of `result` / `error` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct CustodialResponse<T> {
    pub result: Option<T>,
    pub error: Option<String>,
}

impl<T> CustodialResponse<T> {
    pub fn ok(result: T) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_some()
    }

    /// Promote an in-band failure to an error.
    pub fn into_result(self, operation: CustodialOperation) -> Result<T, CustodialError> {
        match (self.result, self.error) {
            (Some(result), _) => Ok(result),
            (None, error) => Err(CustodialError::Remote {
                operation: operation.name(),
                message: error.unwrap_or_else(|| "no response".to_string()),
            }),
        }
    }
}

pub struct CustodialSigningClient {
    functions: Arc<dyn CloudFunctions>,
    signer: Arc<dyn ChallengeSigner>,
    function_prefix: String,
}

fn check_credentials(
    op: CustodialOperation,
    credentials: &CustodyCredentials,
) -> Result<(), CustodialError> {
    let missing = |parameter| CustodialError::MissingParameter {
        operation: op.name(),
        parameter,
    };
    if credentials.wallet_id.trim().is_empty() {
        return Err(missing("walletId"));
    }
    if credentials.token.expose_secret().is_empty() {
        return Err(missing("dfns_token"));
    }
    Ok(())
}

fn with_credentials(mut params: Map<String, Value>, credentials: &CustodyCredentials) -> Value {
    params.insert("walletId".into(), Value::String(credentials.wallet_id.clone()));
    params.insert(
        "dfns_token".into(),
        Value::String(credentials.token.expose_secret().clone()),
    );
    Value::Object(params)
}

impl CustodialSigningClient {
    pub fn new(
        functions: Arc<dyn CloudFunctions>,
        signer: Arc<dyn ChallengeSigner>,
        function_prefix: impl Into<String>,
    ) -> Self {
        Self {
            functions,
            signer,
            function_prefix: function_prefix.into(),
        }
    }

    pub fn function_prefix(&self) -> &str {
        &self.function_prefix
    }

    /// Init phase for any supported call.
    pub async fn initiate(
        &self,
        call: &RegistryCall,
        credentials: &CustodyCredentials,
    ) -> Result<CustodialResponse<Initiation>, CustodialError> {
        let (op, payload) = payload_for(call)?;
        check_credentials(op, credentials)?;

        let name = op.init_function(&self.function_prefix);
        debug!(function = %name, wallet = %credentials.wallet_id, "initiating custodial operation");
        record_counter("custody.phase.total", 1);

        match self.functions.run(&name, with_credentials(payload, credentials)).await {
            Ok(response) => {
                let challenge = response.get("challenge").cloned().unwrap_or(Value::Null);
                let request_body = response.get("requestBody").cloned().unwrap_or(Value::Null);
                if challenge.is_null() {
                    record_counter("custody.phase.failed", 1);
                    return Ok(CustodialResponse::failed(format!(
                        "{name} returned no challenge"
                    )));
                }
                Ok(CustodialResponse::ok(Initiation {
                    challenge,
                    request_body,
                }))
            }
            Err(e) => {
                record_counter("custody.phase.failed", 1);
                warn!(function = %name, error = %e, "custodial init failed");
                Ok(CustodialResponse::failed(e.to_string()))
            }
        }
    }

    /// Complete phase: sign the challenge and submit it with the request body.
    pub async fn complete(
        &self,
        op: CustodialOperation,
        credentials: &CustodyCredentials,
        challenge: &Value,
        request_body: &Value,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        check_credentials(op, credentials)?;
        if challenge.is_null() {
            return Err(CustodialError::MissingParameter {
                operation: op.name(),
                parameter: "challenge",
            });
        }
        if request_body.is_null() {
            return Err(CustodialError::MissingParameter {
                operation: op.name(),
                parameter: "requestBody",
            });
        }

        let name = op.complete_function(&self.function_prefix);
        record_counter("custody.phase.total", 1);

        let assertion = match self.signer.sign(challenge).await {
            Ok(assertion) => assertion,
            Err(e) => {
                record_counter("custody.phase.failed", 1);
                warn!(function = %name, error = %e, "challenge signing failed");
                return Ok(CustodialResponse::failed(e.to_string()));
            }
        };

        let mut params = Map::new();
        params.insert(
            "signedChallenge".into(),
            json!({
                "challengeIdentifier": challenge
                    .get("challengeIdentifier")
                    .cloned()
                    .unwrap_or(Value::Null),
                "firstFactor": assertion,
            }),
        );
        params.insert("requestBody".into(), request_body.clone());

        debug!(function = %name, wallet = %credentials.wallet_id, "completing custodial operation");
        match self.functions.run(&name, with_credentials(params, credentials)).await {
            Ok(response) => Ok(CustodialResponse::ok(response)),
            Err(e) => {
                record_counter("custody.phase.failed", 1);
                warn!(function = %name, error = %e, "custodial complete failed");
                Ok(CustodialResponse::failed(e.to_string()))
            }
        }
    }

    /// Start custodial wallet registration for `username`.
    pub async fn initiate_registration(
        &self,
        username: &str,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        if username.trim().is_empty() {
            return Err(CustodialError::MissingParameter {
                operation: "Register",
                parameter: "username",
            });
        }
        let name = format!("{}RegisterInit", self.function_prefix);
        match self.functions.run(&name, json!({ "username": username })).await {
            Ok(response) => Ok(CustodialResponse::ok(response)),
            Err(e) => Ok(CustodialResponse::failed(e.to_string())),
        }
    }

    pub async fn initiate_add_claim_topic(
        &self,
        topic: TopicId,
        credentials: &CustodyCredentials,
    ) -> Result<CustodialResponse<Initiation>, CustodialError> {
        self.initiate(&RegistryCall::AddClaimTopic { topic }, credentials)
            .await
    }

    pub async fn complete_add_claim_topic(
        &self,
        credentials: &CustodyCredentials,
        challenge: &Value,
        request_body: &Value,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        self.complete(CustodialOperation::AddClaimTopic, credentials, challenge, request_body)
            .await
    }

    pub async fn initiate_remove_claim_topic(
        &self,
        topic: TopicId,
        credentials: &CustodyCredentials,
    ) -> Result<CustodialResponse<Initiation>, CustodialError> {
        self.initiate(&RegistryCall::RemoveClaimTopic { topic }, credentials)
            .await
    }

    pub async fn complete_remove_claim_topic(
        &self,
        credentials: &CustodyCredentials,
        challenge: &Value,
        request_body: &Value,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        self.complete(CustodialOperation::RemoveClaimTopic, credentials, challenge, request_body)
            .await
    }

    pub async fn initiate_add_trusted_issuer(
        &self,
        issuer: Address,
        topics: Vec<TopicId>,
        credentials: &CustodyCredentials,
    ) -> Result<CustodialResponse<Initiation>, CustodialError> {
        self.initiate(&RegistryCall::AddTrustedIssuer { issuer, topics }, credentials)
            .await
    }

    pub async fn complete_add_trusted_issuer(
        &self,
        credentials: &CustodyCredentials,
        challenge: &Value,
        request_body: &Value,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        self.complete(CustodialOperation::AddTrustedIssuer, credentials, challenge, request_body)
            .await
    }

    pub async fn initiate_update_trusted_issuer(
        &self,
        issuer: Address,
        topics: Vec<TopicId>,
        credentials: &CustodyCredentials,
    ) -> Result<CustodialResponse<Initiation>, CustodialError> {
        self.initiate(
            &RegistryCall::UpdateIssuerClaimTopics { issuer, topics },
            credentials,
        )
        .await
    }

    pub async fn complete_update_trusted_issuer(
        &self,
        credentials: &CustodyCredentials,
        challenge: &Value,
        request_body: &Value,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        self.complete(CustodialOperation::UpdateTrustedIssuer, credentials, challenge, request_body)
            .await
    }

    pub async fn initiate_remove_trusted_issuer(
        &self,
        issuer: Address,
        credentials: &CustodyCredentials,
    ) -> Result<CustodialResponse<Initiation>, CustodialError> {
        self.initiate(&RegistryCall::RemoveTrustedIssuer { issuer }, credentials)
            .await
    }

    pub async fn complete_remove_trusted_issuer(
        &self,
        credentials: &CustodyCredentials,
        challenge: &Value,
        request_body: &Value,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        self.complete(CustodialOperation::RemoveTrustedIssuer, credentials, challenge, request_body)
            .await
    }

    pub async fn initiate_create_identity(
        &self,
        owner: Address,
        credentials: &CustodyCredentials,
    ) -> Result<CustodialResponse<Initiation>, CustodialError> {
        self.initiate(&RegistryCall::CreateIdentity { owner }, credentials)
            .await
    }

    pub async fn complete_create_identity(
        &self,
        credentials: &CustodyCredentials,
        challenge: &Value,
        request_body: &Value,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        self.complete(CustodialOperation::CreateIdentity, credentials, challenge, request_body)
            .await
    }

    pub async fn initiate_add_identity(
        &self,
        owner: Address,
        identity: Address,
        credentials: &CustodyCredentials,
    ) -> Result<CustodialResponse<Initiation>, CustodialError> {
        self.initiate(&RegistryCall::AddIdentity { owner, identity }, credentials)
            .await
    }

    pub async fn complete_add_identity(
        &self,
        credentials: &CustodyCredentials,
        challenge: &Value,
        request_body: &Value,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        self.complete(CustodialOperation::AddIdentity, credentials, challenge, request_body)
            .await
    }

    pub async fn initiate_remove_identity(
        &self,
        owner: Address,
        credentials: &CustodyCredentials,
    ) -> Result<CustodialResponse<Initiation>, CustodialError> {
        self.initiate(&RegistryCall::RemoveIdentity { owner }, credentials)
            .await
    }

    pub async fn complete_remove_identity(
        &self,
        credentials: &CustodyCredentials,
        challenge: &Value,
        request_body: &Value,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        self.complete(CustodialOperation::RemoveIdentity, credentials, challenge, request_body)
            .await
    }

    pub async fn initiate_unregister_identity(
        &self,
        owner: Address,
        credentials: &CustodyCredentials,
    ) -> Result<CustodialResponse<Initiation>, CustodialError> {
        self.initiate(&RegistryCall::UnregisterIdentity { owner }, credentials)
            .await
    }

    pub async fn complete_unregister_identity(
        &self,
        credentials: &CustodyCredentials,
        challenge: &Value,
        request_body: &Value,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        self.complete(CustodialOperation::UnregisterIdentity, credentials, challenge, request_body)
            .await
    }

    pub async fn initiate_set_claims(
        &self,
        owner: Address,
        topics: Vec<TopicId>,
        credentials: &CustodyCredentials,
    ) -> Result<CustodialResponse<Initiation>, CustodialError> {
        self.initiate(&RegistryCall::SetClaims { owner, topics }, credentials)
            .await
    }

    pub async fn complete_set_claims(
        &self,
        credentials: &CustodyCredentials,
        challenge: &Value,
        request_body: &Value,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        self.complete(CustodialOperation::SetClaims, credentials, challenge, request_body)
            .await
    }

    pub async fn initiate_add_claim(
        &self,
        owner: Address,
        topic: TopicId,
        claim: ClaimData,
        credentials: &CustodyCredentials,
    ) -> Result<CustodialResponse<Initiation>, CustodialError> {
        self.initiate(
            &RegistryCall::AddClaim {
                owner,
                topic,
                claim,
            },
            credentials,
        )
        .await
    }

    pub async fn complete_add_claim(
        &self,
        credentials: &CustodyCredentials,
        challenge: &Value,
        request_body: &Value,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        self.complete(CustodialOperation::AddClaim, credentials, challenge, request_body)
            .await
    }

    pub async fn initiate_remove_claim(
        &self,
        owner: Address,
        topic: TopicId,
        credentials: &CustodyCredentials,
    ) -> Result<CustodialResponse<Initiation>, CustodialError> {
        self.initiate(&RegistryCall::RemoveClaim { owner, topic }, credentials)
            .await
    }

    pub async fn complete_remove_claim(
        &self,
        credentials: &CustodyCredentials,
        challenge: &Value,
        request_body: &Value,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        self.complete(CustodialOperation::RemoveClaim, credentials, challenge, request_body)
            .await
    }

    pub async fn initiate_mint(
        &self,
        metadata: Vec<MintAttribute>,
        credentials: &CustodyCredentials,
    ) -> Result<CustodialResponse<Initiation>, CustodialError> {
        self.initiate(&RegistryCall::Mint { metadata }, credentials)
            .await
    }

    pub async fn complete_mint(
        &self,
        credentials: &CustodyCredentials,
        challenge: &Value,
        request_body: &Value,
    ) -> Result<CustodialResponse<Value>, CustodialError> {
        self.complete(CustodialOperation::Mint, credentials, challenge, request_body)
            .await
    }
}
