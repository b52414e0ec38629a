//! Transaction dispatch per wallet preference.

use super::errors::WorkflowResult;
use crate::core_chain::{ChainRegistryClient, RegistryCall, TxReceipt};
use crate::core_custody::{
    CustodialError, CustodialOperation, CustodialSigningClient, CustodyCredentials,
};
use crate::core_session::{Session, WalletPreference};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// One dispatched registry call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedTx {
    pub method: &'static str,
    /// Inclusion receipt. The custody service does not always report one.
    pub receipt: Option<TxReceipt>,
    /// Raw completion payload from the custody service.
    pub custody_response: Option<Value>,
}

/// Submits a registry call and waits until it is confirmed.
///
/// Both implementations leave the chain in the same state; callers never
/// branch on the wallet preference themselves.
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    async fn execute(&self, call: RegistryCall) -> WorkflowResult<ExecutedTx>;

    fn mode(&self) -> WalletPreference;
}

/// Signs with the session's own wallet.
pub struct DirectExecutor {
    chain: ChainRegistryClient,
}

impl DirectExecutor {
    pub fn new(chain: ChainRegistryClient) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl TransactionExecutor for DirectExecutor {
    #[instrument(skip_all, fields(method = call.method()))]
    async fn execute(&self, call: RegistryCall) -> WorkflowResult<ExecutedTx> {
        let method = call.method();
        let receipt = self.chain.execute(call).await?;
        Ok(ExecutedTx {
            method,
            receipt: Some(receipt),
            custody_response: None,
        })
    }

    fn mode(&self) -> WalletPreference {
        WalletPreference::Private
    }
}

/// Runs the two-phase custody protocol.
pub struct CustodialExecutor {
    custody: Arc<CustodialSigningClient>,
    credentials: CustodyCredentials,
}

impl CustodialExecutor {
    pub fn new(custody: Arc<CustodialSigningClient>, credentials: CustodyCredentials) -> Self {
        Self {
            custody,
            credentials,
        }
    }
}

#[async_trait]
impl TransactionExecutor for CustodialExecutor {
    #[instrument(skip_all, fields(method = call.method(), wallet = %self.credentials.wallet_id))]
    async fn execute(&self, call: RegistryCall) -> WorkflowResult<ExecutedTx> {
        let op = CustodialOperation::for_call(&call)?;
        let initiation = self
            .custody
            .initiate(&call, &self.credentials)
            .await?
            .into_result(op)?;
        debug!(operation = op.name(), "challenge received");

        let response = self
            .custody
            .complete(op, &self.credentials, &initiation.challenge, &initiation.request_body)
            .await?
            .into_result(op)?;

        Ok(ExecutedTx {
            method: call.method(),
            receipt: TxReceipt::from_custody_response(&response),
            custody_response: Some(response),
        })
    }

    fn mode(&self) -> WalletPreference {
        WalletPreference::Managed
    }
}

/// Pick the executor matching the session's wallet preference.
pub fn executor_for(
    session: &Session,
    chain: &ChainRegistryClient,
    custody: Option<Arc<CustodialSigningClient>>,
) -> WorkflowResult<Arc<dyn TransactionExecutor>> {
    match session.wallet_preference {
        WalletPreference::Managed => {
            let custody = custody.ok_or(CustodialError::Unsupported(
                "managed wallet without a custody service",
            ))?;
            let credentials = session.custody_credentials()?;
            Ok(Arc::new(CustodialExecutor::new(custody, credentials)))
        }
        WalletPreference::Private => Ok(Arc::new(DirectExecutor::new(
            chain.with_signer(session.user.wallet_address),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_chain::{RegistryEventBus, SimulatedRegistry};
    use crate::core_model::TopicId;
    use crate::core_sync::WorkflowError;
    use crate::test_utils::{admin_session, admin_wallet, managed_admin_session};

    fn read_only_chain() -> (Arc<SimulatedRegistry>, ChainRegistryClient) {
        let registry = Arc::new(SimulatedRegistry::new());
        let chain = ChainRegistryClient::read_only(registry.clone(), RegistryEventBus::default());
        (registry, chain)
    }

    #[tokio::test]
    async fn test_private_session_signs_directly() {
        let (registry, chain) = read_only_chain();
        let executor = executor_for(&admin_session(), &chain, None).unwrap();
        assert_eq!(executor.mode(), WalletPreference::Private);

        let tx = executor
            .execute(RegistryCall::AddClaimTopic { topic: TopicId(1) })
            .await
            .unwrap();
        assert!(tx.receipt.is_some());
        assert!(tx.custody_response.is_none());
        assert_eq!(registry.calls()[0].signer, admin_wallet());
    }

    #[test]
    fn test_managed_session_needs_custody() {
        let (_registry, chain) = read_only_chain();
        let err = executor_for(&managed_admin_session(), &chain, None)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            WorkflowError::Custodial(CustodialError::Unsupported(_))
        ));
    }
}
