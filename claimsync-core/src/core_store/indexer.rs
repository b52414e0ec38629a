//! Event indexer
//!
//! Stands in for the hosted indexer that turns contract events into base
//! mirror rows. It runs after a configurable lag, which is exactly the gap
//! the workflow's mirror retries have to bridge.

use super::classes::{self, fields};
use super::mapping::{fields_of, topic_of, topics_to_value};
use super::{Filter, RecordStore, StoreResult};
use crate::core_chain::{ContractEvent, EventSubscription, RegistryEvent};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct EventIndexer {
    store: Arc<dyn RecordStore>,
    lag: Duration,
}

impl EventIndexer {
    pub fn new(store: Arc<dyn RecordStore>, lag: Duration) -> Self {
        Self { store, lag }
    }

    /// Consume `subscription` until the bus closes.
    pub fn spawn(self, mut subscription: EventSubscription) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                if !self.lag.is_zero() {
                    tokio::time::sleep(self.lag).await;
                }
                if let Err(e) = self.apply(&event).await {
                    warn!(kind = ?event.kind(), error = %e, "failed to index registry event");
                }
            }
            debug!("event indexer stopped");
        })
    }

    /// Write the base rows for one event.
    pub async fn apply(&self, event: &ContractEvent) -> StoreResult<()> {
        let store = &self.store;
        match &event.event {
            RegistryEvent::ClaimTopicAdded { topic } => {
                store
                    .create_or_update_record(
                        classes::CLAIM_TOPIC,
                        &Filter::new().eq(fields::TOPIC, topic.to_string()),
                        fields_of(json!({ (fields::ACTIVE): true })),
                    )
                    .await?;
            }
            RegistryEvent::ClaimTopicRemoved { topic } => {
                let key = Filter::new().eq(fields::TOPIC, topic.to_string());
                self.deactivate(classes::CLAIM_TOPIC, key).await?;
            }
            RegistryEvent::TrustedIssuerAdded { issuer, .. } => {
                store
                    .create_or_update_record(
                        classes::TRUSTED_ISSUER,
                        &Filter::new().eq(fields::ISSUER, issuer.to_string()),
                        fields_of(json!({ (fields::ACTIVE): true })),
                    )
                    .await?;
            }
            RegistryEvent::TrustedIssuerRemoved { issuer } => {
                self.deactivate(
                    classes::TRUSTED_ISSUER,
                    Filter::new().eq(fields::ISSUER, issuer.to_string()),
                )
                .await?;
            }
            // Issuer topic grants carry timestamps only the admin client knows.
            RegistryEvent::ClaimTopicsUpdated { .. } => {}
            RegistryEvent::IdentityAdded { owner, identity } => {
                store
                    .create_or_update_record(
                        classes::IDENTITY,
                        &Filter::new().eq(fields::ADDRESS, owner.to_string()),
                        fields_of(json!({
                            (fields::IDENTITY): identity.to_string(),
                            (fields::ACTIVE): true,
                            (fields::CLAIMS): Value::Array(Vec::new()),
                        })),
                    )
                    .await?;
            }
            RegistryEvent::IdentityRemoved { owner, .. } => {
                let key = Filter::new().eq(fields::ADDRESS, owner.to_string());
                self.deactivate(classes::IDENTITY, key).await?;
            }
            RegistryEvent::ClaimAdded {
                owner,
                identity,
                topic,
                ..
            } => {
                store
                    .create_record(
                        classes::CLAIM_ADDED_EVENT,
                        &Filter::new(),
                        self.claim_event_fields(event, identity.to_string(), topic.to_string()),
                    )
                    .await?;
                self.edit_claims(owner.to_string(), |claims| {
                    if !claims.contains(topic) {
                        claims.push(*topic);
                    }
                })
                .await?;
            }
            RegistryEvent::ClaimRemoved {
                owner,
                identity,
                topic,
                ..
            } => {
                store
                    .create_record(
                        classes::CLAIM_REMOVED_EVENT,
                        &Filter::new(),
                        self.claim_event_fields(event, identity.to_string(), topic.to_string()),
                    )
                    .await?;
                self.edit_claims(owner.to_string(), |claims| claims.retain(|t| t != topic))
                    .await?;
            }
            RegistryEvent::IdentityCountryUpdated { owner, country } => {
                let key = Filter::new().eq(fields::ADDRESS, owner.to_string());
                match store
                    .update_existing_record(
                        classes::IDENTITY,
                        &key,
                        fields_of(json!({ "country": country })),
                    )
                    .await
                {
                    Err(e) if e.is_not_found() => {
                        debug!(%key, "country update for unknown identity")
                    }
                    other => {
                        other?;
                    }
                }
            }
        }
        Ok(())
    }

    fn claim_event_fields(
        &self,
        event: &ContractEvent,
        identity: String,
        topic: String,
    ) -> super::Fields {
        fields_of(json!({
            (fields::IDENTITY): identity,
            (fields::CLAIM_TOPIC): topic,
            (fields::BLOCK_HASH): event.block_hash,
            (fields::TRANSACTION_HASH): event.transaction_hash,
        }))
    }

    async fn deactivate(&self, class_name: &str, key: Filter) -> StoreResult<()> {
        match self
            .store
            .update_existing_record(class_name, &key, fields_of(json!({ (fields::ACTIVE): false })))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(class_name, %key, "nothing to deactivate");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn edit_claims<F>(&self, owner: String, edit: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Vec<crate::core_model::TopicId>) + Send,
    {
        let key = Filter::new().eq(fields::ADDRESS, owner);
        let Some(record) = self.store.get_record(classes::IDENTITY, &key).await? else {
            debug!(%key, "claim event for unknown identity");
            return Ok(());
        };

        let mut claims: Vec<_> = record
            .get(fields::CLAIMS)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(topic_of).collect())
            .unwrap_or_default();
        edit(&mut claims);

        self.store
            .update_existing_record(
                classes::IDENTITY,
                &key,
                fields_of(json!({ (fields::CLAIMS): topics_to_value(&claims) })),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_model::{Address, ClaimData, TopicId};
    use crate::core_store::MemoryRecordStore;

    fn event(event: RegistryEvent) -> ContractEvent {
        ContractEvent {
            block_number: 1,
            block_hash: "0xblock".into(),
            transaction_hash: "0xtx".into(),
            event,
        }
    }

    #[tokio::test]
    async fn test_topic_added_creates_base_row() {
        let store = Arc::new(MemoryRecordStore::new());
        let indexer = EventIndexer::new(store.clone(), Duration::ZERO);

        indexer
            .apply(&event(RegistryEvent::ClaimTopicAdded { topic: TopicId(3) }))
            .await
            .unwrap();

        let rows = store.all("ClaimTopic").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("topic"), Some("3"));
        assert_eq!(rows[0].get_bool("active"), Some(true));
    }

    #[tokio::test]
    async fn test_claim_events_track_identity_claims() {
        let store = Arc::new(MemoryRecordStore::new());
        let indexer = EventIndexer::new(store.clone(), Duration::ZERO);
        let owner = Address::from_low_u64(0x10);
        let identity = Address::from_low_u64(0x1d);

        indexer
            .apply(&event(RegistryEvent::IdentityAdded { owner, identity }))
            .await
            .unwrap();
        indexer
            .apply(&event(RegistryEvent::ClaimAdded {
                owner,
                identity,
                claim_id: "0x01".into(),
                topic: TopicId(2),
                claim: ClaimData::attested_by(owner),
            }))
            .await
            .unwrap();

        let row = store.all("Identity").await.remove(0);
        assert_eq!(row.get("claims"), Some(&json!(["2"])));
        let added = store.all("ClaimAdded__e").await;
        assert_eq!(added[0].get_str("blockHash"), Some("0xblock"));

        indexer
            .apply(&event(RegistryEvent::ClaimRemoved {
                owner,
                identity,
                claim_id: "0x01".into(),
                topic: TopicId(2),
            }))
            .await
            .unwrap();
        let row = store.all("Identity").await.remove(0);
        assert_eq!(row.get("claims"), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_removal_of_unknown_row_is_ignored() {
        let store = Arc::new(MemoryRecordStore::new());
        let indexer = EventIndexer::new(store.clone(), Duration::ZERO);
        indexer
            .apply(&event(RegistryEvent::TrustedIssuerRemoved {
                issuer: Address::from_low_u64(5),
            }))
            .await
            .unwrap();
        assert!(store.all("TrustedIssuer").await.is_empty());
    }
}
