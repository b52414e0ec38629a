//! In-process registry used by tests and the `simulate` command.
//!
//! Applies calls with the same revert rules the registry contracts enforce
//! and emits their events once a transaction is "mined". Transaction and
//! block hashes are derived from counters, so runs are reproducible.

use super::backend::RegistryBackend;
use super::errors::{ChainError, ChainResult};
use super::events::{claim_id, ContractEvent, RegistryEvent};
use super::types::{PendingTx, RegistryCall, TxReceipt};
use crate::core_model::{Address, ClaimData, TopicId};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

/// Base of the simulated identity contract addresses.
const IDENTITY_ADDRESS_BASE: u64 = 0x1d00_0000;

/// A call as the simulated chain received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub signer: Address,
    pub call: RegistryCall,
}

struct FactoryEntry {
    identity: Address,
    zero_reads_left: u32,
}

struct Mined {
    receipt: TxReceipt,
    events: Vec<RegistryEvent>,
}

#[derive(Default)]
struct ChainState {
    block_number: u64,
    tx_counter: u64,
    identities_deployed: u64,
    minted: u64,
    topics: BTreeSet<TopicId>,
    issuers: BTreeMap<Address, Vec<TopicId>>,
    factory: HashMap<Address, FactoryEntry>,
    registry: BTreeMap<Address, Address>,
    claims: HashMap<Address, BTreeMap<TopicId, ClaimData>>,
    pending: HashMap<String, Mined>,
    calls: Vec<RecordedCall>,
    injected: VecDeque<ChainError>,
    identity_read_delay: u32,
}

pub struct SimulatedRegistry {
    state: Mutex<ChainState>,
    events: broadcast::Sender<ContractEvent>,
    inclusion_delay: Duration,
}

impl SimulatedRegistry {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(1024);
        Self {
            state: Mutex::new(ChainState::default()),
            events,
            inclusion_delay: Duration::ZERO,
        }
    }

    /// Time `wait_for_inclusion` takes, to mimic block time.
    pub fn with_inclusion_delay(mut self, delay: Duration) -> Self {
        self.inclusion_delay = delay;
        self
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next submission revert with `reason`.
    pub fn revert_next(&self, reason: impl Into<String>) {
        self.state()
            .injected
            .push_back(ChainError::reverted(reason));
    }

    /// Make the next submission fail at the transport level.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state()
            .injected
            .push_back(ChainError::Rpc(message.into()));
    }

    /// Number of factory reads that report the zero address after an
    /// identity is deployed, to mimic indexing lag on the RPC node.
    pub fn set_identity_read_delay(&self, reads: u32) {
        self.state().identity_read_delay = reads;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn minted(&self) -> u64 {
        self.state().minted
    }

    fn apply(state: &mut ChainState, call: &RegistryCall) -> ChainResult<Vec<RegistryEvent>> {
        let revert = |reason: &str| Err(ChainError::reverted(reason));

        match call {
            RegistryCall::AddClaimTopic { topic } => {
                if topic.0 == 0 {
                    return revert("invalid claim topic");
                }
                if !state.topics.insert(*topic) {
                    return revert("ClaimTopic already exists");
                }
                Ok(vec![RegistryEvent::ClaimTopicAdded { topic: *topic }])
            }
            RegistryCall::RemoveClaimTopic { topic } => {
                if !state.topics.remove(topic) {
                    return revert("ClaimTopic does not exist");
                }
                Ok(vec![RegistryEvent::ClaimTopicRemoved { topic: *topic }])
            }
            RegistryCall::AddTrustedIssuer { issuer, topics } => {
                if issuer.is_zero() {
                    return revert("invalid trusted issuer");
                }
                if topics.is_empty() {
                    return revert("trusted claim topics cannot be empty");
                }
                if state.issuers.contains_key(issuer) {
                    return revert("trusted issuer already exists");
                }
                state.issuers.insert(*issuer, topics.clone());
                Ok(vec![RegistryEvent::TrustedIssuerAdded {
                    issuer: *issuer,
                    topics: topics.clone(),
                }])
            }
            RegistryCall::RemoveTrustedIssuer { issuer } => {
                if state.issuers.remove(issuer).is_none() {
                    return revert("trusted issuer doesn't exist");
                }
                Ok(vec![RegistryEvent::TrustedIssuerRemoved { issuer: *issuer }])
            }
            RegistryCall::UpdateIssuerClaimTopics { issuer, topics } => {
                if topics.is_empty() {
                    return revert("claim topics cannot be empty");
                }
                let Some(existing) = state.issuers.get_mut(issuer) else {
                    return revert("trusted issuer doesn't exist");
                };
                *existing = topics.clone();
                Ok(vec![RegistryEvent::ClaimTopicsUpdated {
                    issuer: *issuer,
                    topics: topics.clone(),
                }])
            }
            RegistryCall::CreateIdentity { owner } => {
                if owner.is_zero() {
                    return revert("invalid owner");
                }
                if state.factory.contains_key(owner) {
                    return revert("identity already exists");
                }
                state.identities_deployed += 1;
                let identity =
                    Address::from_low_u64(IDENTITY_ADDRESS_BASE + state.identities_deployed);
                let zero_reads_left = state.identity_read_delay;
                state.factory.insert(
                    *owner,
                    FactoryEntry {
                        identity,
                        zero_reads_left,
                    },
                );
                Ok(Vec::new())
            }
            RegistryCall::AddIdentity { owner, identity } => {
                Self::register(state, *owner, *identity).map(|event| vec![event])
            }
            RegistryCall::BatchAddIdentity { owners, identities } => {
                if owners.len() != identities.len() {
                    return revert("owners and identities length mismatch");
                }
                // All or nothing: check first, then apply.
                for (owner, identity) in owners.iter().zip(identities) {
                    if identity.is_zero() {
                        return revert("invalid identity");
                    }
                    if state.registry.contains_key(owner) {
                        return revert("identity already registered");
                    }
                }
                owners
                    .iter()
                    .zip(identities)
                    .map(|(owner, identity)| Self::register(state, *owner, *identity))
                    .collect()
            }
            RegistryCall::RemoveIdentity { owner } => {
                if state.factory.remove(owner).is_none() {
                    return revert("identity not found");
                }
                Ok(Vec::new())
            }
            RegistryCall::UnregisterIdentity { owner } => {
                let Some(identity) = state.registry.remove(owner) else {
                    return revert("identity not registered");
                };
                state.claims.remove(owner);
                Ok(vec![RegistryEvent::IdentityRemoved {
                    owner: *owner,
                    identity,
                }])
            }
            RegistryCall::SetClaims { owner, topics } => {
                let Some(identity) = state.registry.get(owner).copied() else {
                    return revert("identity not registered");
                };
                if let Some(missing) = topics.iter().find(|t| !state.topics.contains(t)) {
                    return Err(ChainError::reverted(format!(
                        "claim topic {missing} not registered"
                    )));
                }
                let claims = state.claims.entry(*owner).or_default();
                let mut events = Vec::new();
                for topic in topics {
                    if claims.contains_key(topic) {
                        continue;
                    }
                    let claim = ClaimData::attested_by(*owner);
                    events.push(RegistryEvent::ClaimAdded {
                        owner: *owner,
                        identity,
                        claim_id: claim_id(&claim.issuer, *topic),
                        topic: *topic,
                        claim: claim.clone(),
                    });
                    claims.insert(*topic, claim);
                }
                Ok(events)
            }
            RegistryCall::AddClaim {
                owner,
                topic,
                claim,
            } => {
                let Some(identity) = state.registry.get(owner).copied() else {
                    return revert("identity not registered");
                };
                if !state.topics.contains(topic) {
                    return Err(ChainError::reverted(format!("claim topic {topic} not registered")));
                }
                state
                    .claims
                    .entry(*owner)
                    .or_default()
                    .insert(*topic, claim.clone());
                Ok(vec![RegistryEvent::ClaimAdded {
                    owner: *owner,
                    identity,
                    claim_id: claim_id(&claim.issuer, *topic),
                    topic: *topic,
                    claim: claim.clone(),
                }])
            }
            RegistryCall::RemoveClaim { owner, topic } => {
                let Some(identity) = state.registry.get(owner).copied() else {
                    return revert("identity not registered");
                };
                let removed = state
                    .claims
                    .get_mut(owner)
                    .and_then(|claims| claims.remove(topic));
                let Some(claim) = removed else {
                    return revert("claim not found");
                };
                Ok(vec![RegistryEvent::ClaimRemoved {
                    owner: *owner,
                    identity,
                    claim_id: claim_id(&claim.issuer, *topic),
                    topic: *topic,
                }])
            }
            RegistryCall::Mint { metadata } => {
                if metadata.is_empty() {
                    return revert("metadata required");
                }
                state.minted += 1;
                Ok(Vec::new())
            }
        }
    }

    fn register(
        state: &mut ChainState,
        owner: Address,
        identity: Address,
    ) -> ChainResult<RegistryEvent> {
        if identity.is_zero() {
            return Err(ChainError::reverted("invalid identity"));
        }
        if state.registry.contains_key(&owner) {
            return Err(ChainError::reverted("identity already registered"));
        }
        state.registry.insert(owner, identity);
        Ok(RegistryEvent::IdentityAdded { owner, identity })
    }
}

impl Default for SimulatedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryBackend for SimulatedRegistry {
    async fn submit(&self, signer: Address, call: &RegistryCall) -> ChainResult<PendingTx> {
        let mut state = self.state();
        state.calls.push(RecordedCall {
            signer,
            call: call.clone(),
        });

        if let Some(err) = state.injected.pop_front() {
            return Err(err);
        }

        let events = Self::apply(&mut state, call)?;
        state.tx_counter += 1;
        state.block_number += 1;

        let transaction_hash = format!("0x{:064x}", state.tx_counter);
        let receipt = TxReceipt {
            transaction_hash: transaction_hash.clone(),
            block_hash: format!("0x{:064x}", 0xb10c_0000_u64 + state.block_number),
            block_number: state.block_number,
        };
        state
            .pending
            .insert(transaction_hash.clone(), Mined { receipt, events });

        Ok(PendingTx {
            transaction_hash,
            from: signer,
        })
    }

    async fn wait_for_inclusion(&self, tx: &PendingTx) -> ChainResult<TxReceipt> {
        if !self.inclusion_delay.is_zero() {
            tokio::time::sleep(self.inclusion_delay).await;
        }

        let mined = self
            .state()
            .pending
            .remove(&tx.transaction_hash)
            .ok_or_else(|| ChainError::Dropped(tx.transaction_hash.clone()))?;

        for event in mined.events {
            let _ = self.events.send(ContractEvent {
                block_number: mined.receipt.block_number,
                block_hash: mined.receipt.block_hash.clone(),
                transaction_hash: mined.receipt.transaction_hash.clone(),
                event,
            });
        }
        Ok(mined.receipt)
    }

    async fn get_identity(&self, owner: Address) -> ChainResult<Address> {
        let mut state = self.state();
        let Some(entry) = state.factory.get_mut(&owner) else {
            return Ok(Address::ZERO);
        };
        if entry.zero_reads_left > 0 {
            entry.zero_reads_left -= 1;
            return Ok(Address::ZERO);
        }
        Ok(entry.identity)
    }

    async fn identity(&self, owner: Address) -> ChainResult<Address> {
        Ok(self
            .state()
            .registry
            .get(&owner)
            .copied()
            .unwrap_or(Address::ZERO))
    }

    async fn contains(&self, owner: Address) -> ChainResult<bool> {
        Ok(self.state().registry.contains_key(&owner))
    }

    async fn is_verified(&self, owner: Address) -> ChainResult<bool> {
        let state = self.state();
        if !state.registry.contains_key(&owner) {
            return Ok(false);
        }
        let claims = state.claims.get(&owner);
        Ok(state
            .topics
            .iter()
            .all(|t| claims.is_some_and(|c| c.contains_key(t))))
    }

    async fn has_claim(&self, owner: Address, topic: TopicId) -> ChainResult<bool> {
        Ok(self
            .state()
            .claims
            .get(&owner)
            .is_some_and(|c| c.contains_key(&topic)))
    }

    async fn get_claims(&self, owner: Address) -> ChainResult<Vec<TopicId>> {
        Ok(self
            .state()
            .claims
            .get(&owner)
            .map(|c| c.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn get_claim_topics(&self) -> ChainResult<Vec<TopicId>> {
        Ok(self.state().topics.iter().copied().collect())
    }

    async fn get_registry_users(&self) -> ChainResult<Vec<Address>> {
        Ok(self.state().registry.keys().copied().collect())
    }

    async fn is_trusted_issuer(&self, issuer: Address) -> ChainResult<bool> {
        Ok(self.state().issuers.contains_key(&issuer))
    }

    async fn get_trusted_issuer_claim_topics(&self, issuer: Address) -> ChainResult<Vec<TopicId>> {
        self.state()
            .issuers
            .get(&issuer)
            .cloned()
            .ok_or_else(|| ChainError::reverted("trusted issuer doesn't exist"))
    }

    async fn has_claim_topic(&self, issuer: Address, topic: TopicId) -> ChainResult<bool> {
        Ok(self
            .state()
            .issuers
            .get(&issuer)
            .is_some_and(|topics| topics.contains(&topic)))
    }

    fn subscribe(&self) -> broadcast::Receiver<ContractEvent> {
        self.events.subscribe()
    }
}
