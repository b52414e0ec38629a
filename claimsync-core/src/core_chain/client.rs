//! Typed registry client
//!
//! Wraps a [`RegistryBackend`] with an optional signer. Without a signer the
//! client only serves reads; every write fails with [`ChainError::ReadOnly`].

use super::backend::RegistryBackend;
use super::bus::RegistryEventBus;
use super::errors::{ChainError, ChainResult};
use super::types::{RegistryCall, TxReceipt};
use crate::core_model::{Address, ClaimData, MintAttribute, TopicId};
use crate::metrics::{record_counter, Timer};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct ChainRegistryClient {
    backend: Arc<dyn RegistryBackend>,
    signer: Option<Address>,
    bus: RegistryEventBus,
}

impl ChainRegistryClient {
    pub fn new(
        backend: Arc<dyn RegistryBackend>,
        signer: Option<Address>,
        bus: RegistryEventBus,
    ) -> Self {
        Self {
            backend,
            signer,
            bus,
        }
    }

    pub fn read_only(backend: Arc<dyn RegistryBackend>, bus: RegistryEventBus) -> Self {
        Self::new(backend, None, bus)
    }

    /// Same backend and bus, different signer.
    pub fn with_signer(&self, signer: Option<Address>) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            signer,
            bus: self.bus.clone(),
        }
    }

    pub fn signer(&self) -> Option<Address> {
        self.signer
    }

    pub fn bus(&self) -> &RegistryEventBus {
        &self.bus
    }

    /// Forward the backend's event feed onto the in-process bus.
    ///
    /// The task ends when the backend feed closes.
    pub fn start_event_relay(&self) -> JoinHandle<()> {
        let mut feed = self.backend.subscribe();
        let bus = self.bus.clone();

        tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(event) => {
                        debug!(
                            kind = ?event.kind(),
                            block = event.block_number,
                            "relaying registry event"
                        );
                        bus.publish(event);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        record_counter("chain.events.dropped", missed);
                        warn!(missed, "registry event feed lagged");
                    }
                    Err(RecvError::Closed) => {
                        info!("registry event feed closed; relay stopping");
                        break;
                    }
                }
            }
        })
    }

    /// Submit a call and wait for it to be mined.
    pub async fn execute(&self, call: RegistryCall) -> ChainResult<TxReceipt> {
        let signer = self.signer.ok_or(ChainError::ReadOnly)?;
        let method = call.method();
        let timer = Timer::new("chain.tx.duration_ms");

        info!(method, %signer, "submitting registry transaction");
        record_counter("chain.tx.submitted", 1);

        let result = match self.backend.submit(signer, &call).await {
            Ok(pending) => self.backend.wait_for_inclusion(&pending).await,
            Err(e) => Err(e),
        };
        timer.stop();

        match &result {
            Ok(receipt) => info!(
                method,
                tx = %receipt.transaction_hash,
                block = receipt.block_number,
                "registry transaction mined"
            ),
            Err(e) => {
                record_counter("chain.tx.failed", 1);
                warn!(method, error = %e, "registry transaction failed");
            }
        }
        result
    }

    pub async fn add_claim_topic(&self, topic: TopicId) -> ChainResult<TxReceipt> {
        self.execute(RegistryCall::AddClaimTopic { topic }).await
    }

    pub async fn remove_claim_topic(&self, topic: TopicId) -> ChainResult<TxReceipt> {
        self.execute(RegistryCall::RemoveClaimTopic { topic }).await
    }

    pub async fn add_trusted_issuer(
        &self,
        issuer: Address,
        topics: Vec<TopicId>,
    ) -> ChainResult<TxReceipt> {
        self.execute(RegistryCall::AddTrustedIssuer { issuer, topics })
            .await
    }

    pub async fn remove_trusted_issuer(&self, issuer: Address) -> ChainResult<TxReceipt> {
        self.execute(RegistryCall::RemoveTrustedIssuer { issuer }).await
    }

    pub async fn update_issuer_claim_topics(
        &self,
        issuer: Address,
        topics: Vec<TopicId>,
    ) -> ChainResult<TxReceipt> {
        self.execute(RegistryCall::UpdateIssuerClaimTopics { issuer, topics })
            .await
    }

    pub async fn create_identity(&self, owner: Address) -> ChainResult<TxReceipt> {
        self.execute(RegistryCall::CreateIdentity { owner }).await
    }

    pub async fn add_identity(&self, owner: Address, identity: Address) -> ChainResult<TxReceipt> {
        self.execute(RegistryCall::AddIdentity { owner, identity })
            .await
    }

    pub async fn batch_add_identity(
        &self,
        owners: Vec<Address>,
        identities: Vec<Address>,
    ) -> ChainResult<TxReceipt> {
        self.execute(RegistryCall::BatchAddIdentity { owners, identities })
            .await
    }

    pub async fn remove_identity(&self, owner: Address) -> ChainResult<TxReceipt> {
        self.execute(RegistryCall::RemoveIdentity { owner }).await
    }

    pub async fn unregister_identity(&self, owner: Address) -> ChainResult<TxReceipt> {
        self.execute(RegistryCall::UnregisterIdentity { owner }).await
    }

    pub async fn set_claims(&self, owner: Address, topics: Vec<TopicId>) -> ChainResult<TxReceipt> {
        self.execute(RegistryCall::SetClaims { owner, topics }).await
    }

    pub async fn add_claim(
        &self,
        owner: Address,
        topic: TopicId,
        claim: ClaimData,
    ) -> ChainResult<TxReceipt> {
        self.execute(RegistryCall::AddClaim {
            owner,
            topic,
            claim,
        })
        .await
    }

    pub async fn remove_claim(&self, owner: Address, topic: TopicId) -> ChainResult<TxReceipt> {
        self.execute(RegistryCall::RemoveClaim { owner, topic }).await
    }

    pub async fn mint(&self, metadata: Vec<MintAttribute>) -> ChainResult<TxReceipt> {
        self.execute(RegistryCall::Mint { metadata }).await
    }

    // Reads

    pub async fn get_identity(&self, owner: Address) -> ChainResult<Address> {
        self.backend.get_identity(owner).await
    }

    pub async fn identity(&self, owner: Address) -> ChainResult<Address> {
        self.backend.identity(owner).await
    }

    pub async fn contains(&self, owner: Address) -> ChainResult<bool> {
        self.backend.contains(owner).await
    }

    pub async fn is_verified(&self, owner: Address) -> ChainResult<bool> {
        self.backend.is_verified(owner).await
    }

    pub async fn has_claim(&self, owner: Address, topic: TopicId) -> ChainResult<bool> {
        self.backend.has_claim(owner, topic).await
    }

    pub async fn get_claims(&self, owner: Address) -> ChainResult<Vec<TopicId>> {
        self.backend.get_claims(owner).await
    }

    pub async fn get_claim_topics(&self) -> ChainResult<Vec<TopicId>> {
        self.backend.get_claim_topics().await
    }

    pub async fn get_registry_users(&self) -> ChainResult<Vec<Address>> {
        self.backend.get_registry_users().await
    }

    pub async fn is_trusted_issuer(&self, issuer: Address) -> ChainResult<bool> {
        self.backend.is_trusted_issuer(issuer).await
    }

    pub async fn get_trusted_issuer_claim_topics(
        &self,
        issuer: Address,
    ) -> ChainResult<Vec<TopicId>> {
        self.backend.get_trusted_issuer_claim_topics(issuer).await
    }

    pub async fn has_claim_topic(&self, issuer: Address, topic: TopicId) -> ChainResult<bool> {
        self.backend.has_claim_topic(issuer, topic).await
    }
}
