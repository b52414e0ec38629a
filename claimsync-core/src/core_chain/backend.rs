use super::errors::ChainResult;
use super::events::ContractEvent;
use super::types::{PendingTx, RegistryCall, TxReceipt};
use crate::core_model::{Address, TopicId};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Transport to the registry contracts.
///
/// Implementations sign and broadcast calls, wait for inclusion, answer
/// read calls and expose the raw contract event feed.
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Sign `call` as `signer` and broadcast it.
    async fn submit(&self, signer: Address, call: &RegistryCall) -> ChainResult<PendingTx>;

    async fn wait_for_inclusion(&self, tx: &PendingTx) -> ChainResult<TxReceipt>;

    /// Factory lookup. The zero address means "not deployed (yet)".
    async fn get_identity(&self, owner: Address) -> ChainResult<Address>;

    /// Registry lookup of the identity registered for `owner`.
    async fn identity(&self, owner: Address) -> ChainResult<Address>;

    async fn contains(&self, owner: Address) -> ChainResult<bool>;

    async fn is_verified(&self, owner: Address) -> ChainResult<bool>;

    async fn has_claim(&self, owner: Address, topic: TopicId) -> ChainResult<bool>;

    async fn get_claims(&self, owner: Address) -> ChainResult<Vec<TopicId>>;

    async fn get_claim_topics(&self) -> ChainResult<Vec<TopicId>>;

    async fn get_registry_users(&self) -> ChainResult<Vec<Address>>;

    async fn is_trusted_issuer(&self, issuer: Address) -> ChainResult<bool>;

    async fn get_trusted_issuer_claim_topics(&self, issuer: Address) -> ChainResult<Vec<TopicId>>;

    async fn has_claim_topic(&self, issuer: Address, topic: TopicId) -> ChainResult<bool>;

    /// Raw event feed, one receiver per caller.
    fn subscribe(&self) -> broadcast::Receiver<ContractEvent>;
}
