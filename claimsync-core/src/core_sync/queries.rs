//! Read models over the mirror.

use crate::core_store::classes::{self, fields};
use crate::core_store::{
    Filter, FromRecord, Record, RecordQuery, RecordStore, SortOrder, StoreResult, DEFAULT_LIMIT,
};
use crate::core_model::{
    ActiveIdentity, ClaimTopic, DigitalIdentity, IdentityClaimView, IdentityProfile, Mirrored,
    PendingIdentity, TopicId, TrustedIssuer,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct MirrorQueries {
    store: Arc<dyn RecordStore>,
}

impl MirrorQueries {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// One past the highest topic ever mirrored, active or not.
    ///
    /// Topics are stored as strings and sort as text in the store, so every
    /// page is read instead of asking for the top row.
    pub async fn next_claim_topic_id(&self) -> StoreResult<TopicId> {
        let mut highest: Option<TopicId> = None;
        let mut skip = 0;
        loop {
            let page = self
                .store
                .get_records(
                    &RecordQuery::new(classes::CLAIM_TOPIC)
                        .skip(skip)
                        .limit(DEFAULT_LIMIT),
                )
                .await?;
            let page_max = page
                .iter()
                .filter_map(ClaimTopic::from_record)
                .map(|t| t.topic)
                .max();
            highest = highest.max(page_max);
            if page.len() < DEFAULT_LIMIT {
                break;
            }
            skip += page.len();
        }
        Ok(TopicId::next_after(highest))
    }

    /// Active claim topics in creation order.
    pub async fn claim_topics(&self) -> StoreResult<Vec<Mirrored<ClaimTopic>>> {
        let rows = self
            .store
            .get_records(&RecordQuery::new(classes::CLAIM_TOPIC).filter(active()))
            .await?;
        Ok(rows.iter().filter_map(ClaimTopic::mirrored).collect())
    }

    pub async fn trusted_issuers(&self) -> StoreResult<Vec<Mirrored<TrustedIssuer>>> {
        let rows = self
            .store
            .get_records(
                &RecordQuery::new(classes::TRUSTED_ISSUER)
                    .filter(active())
                    .non_null(fields::VERIFIER_NAME),
            )
            .await?;
        Ok(rows.iter().filter_map(TrustedIssuer::mirrored).collect())
    }

    pub async fn trusted_issuer_by_id(
        &self,
        object_id: &str,
    ) -> StoreResult<Option<Mirrored<TrustedIssuer>>> {
        let row = self
            .store
            .get_record(
                classes::TRUSTED_ISSUER,
                &Filter::new().eq(fields::OBJECT_ID, object_id),
            )
            .await?;
        Ok(row.as_ref().and_then(TrustedIssuer::mirrored))
    }

    /// Active issuers allowed to attest `topic`.
    pub async fn trusted_issuers_for_topic(
        &self,
        topic: TopicId,
    ) -> StoreResult<Vec<Mirrored<TrustedIssuer>>> {
        let path = format!("{}.{}", fields::CLAIM_TOPICS, fields::TOPIC);
        let rows = self
            .store
            .get_records(
                &RecordQuery::new(classes::TRUSTED_ISSUER)
                    .filter(active().eq(path, topic.to_string())),
            )
            .await?;
        Ok(rows.iter().filter_map(TrustedIssuer::mirrored).collect())
    }

    /// Registered identities with screening flags from their `_User` row.
    pub async fn active_identities(&self) -> StoreResult<Vec<ActiveIdentity>> {
        let rows = self
            .store
            .get_records(
                &RecordQuery::new(classes::IDENTITY)
                    .filter(active())
                    .non_null(fields::IDENTITY),
            )
            .await?;
        let users = self.users_by_wallet().await?;

        Ok(rows
            .iter()
            .filter_map(IdentityProfile::mirrored)
            .map(|profile| {
                let user = users.get(&profile.value.address.to_string());
                ActiveIdentity {
                    pep_matched: flag(user, fields::PEP_MATCHED),
                    watchlist_matched: flag(user, fields::WATCHLIST_MATCHED),
                    profile,
                }
            })
            .collect())
    }

    /// Users awaiting approval, newest first.
    pub async fn pending_identities(&self) -> StoreResult<Vec<Mirrored<PendingIdentity>>> {
        let rows = self
            .store
            .get_records(
                &RecordQuery::new(classes::USER)
                    .filter(
                        Filter::new()
                            .eq(fields::PENDING_APPROVAL, true)
                            .eq(fields::DENIED, false),
                    )
                    .order_by(fields::CREATED_AT, SortOrder::Descending),
            )
            .await?;
        Ok(rows.iter().filter_map(PendingIdentity::mirrored).collect())
    }

    /// Full view of one identity row.
    pub async fn digital_identity(&self, object_id: &str) -> StoreResult<Option<DigitalIdentity>> {
        let Some(row) = self
            .store
            .get_record(classes::IDENTITY, &Filter::new().eq(fields::OBJECT_ID, object_id))
            .await?
        else {
            return Ok(None);
        };
        let Some(profile) = IdentityProfile::mirrored(&row) else {
            debug!(object_id, "identity row without an owner address");
            return Ok(None);
        };

        let topic_names: HashMap<TopicId, String> = self
            .store
            .get_records(&RecordQuery::new(classes::CLAIM_TOPIC))
            .await?
            .iter()
            .filter_map(ClaimTopic::from_record)
            .map(|t| (t.topic, t.display_name))
            .collect();

        let mut claims = Vec::with_capacity(profile.value.claims.len());
        for topic in &profile.value.claims {
            let block_hash = match profile.value.identity {
                Some(identity) => self
                    .store
                    .get_latest_record(
                        classes::CLAIM_ADDED_EVENT,
                        &Filter::new()
                            .eq(fields::IDENTITY, identity.to_string())
                            .eq(fields::CLAIM_TOPIC, topic.to_string()),
                    )
                    .await?
                    .and_then(|r| r.get_str(fields::BLOCK_HASH).map(String::from)),
                None => None,
            };
            claims.push(IdentityClaimView {
                topic: *topic,
                display_name: topic_names.get(topic).cloned().unwrap_or_default(),
                block_hash,
            });
        }

        let user = self
            .store
            .get_record(
                classes::USER,
                &Filter::new().eq(fields::WALLET_ADDRESS, profile.value.address.to_string()),
            )
            .await?;

        Ok(Some(DigitalIdentity {
            kyc_attributes: user.as_ref().and_then(crate::core_store::verification_data),
            pep_matched: flag(user.as_ref(), fields::PEP_MATCHED),
            watchlist_matched: flag(user.as_ref(), fields::WATCHLIST_MATCHED),
            profile,
            claims,
        }))
    }

    /// Registered identities holding no claim at all.
    pub async fn identities_without_claims(&self) -> StoreResult<Vec<Mirrored<IdentityProfile>>> {
        let rows = self
            .store
            .get_records(
                &RecordQuery::new(classes::IDENTITY)
                    .filter(active())
                    .non_null(fields::IDENTITY),
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(IdentityProfile::mirrored)
            .filter(|p| p.value.claims.is_empty())
            .collect())
    }

    async fn users_by_wallet(&self) -> StoreResult<HashMap<String, Record>> {
        let users = self
            .store
            .get_records(&RecordQuery::new(classes::USER).non_null(fields::WALLET_ADDRESS))
            .await?;
        Ok(users
            .into_iter()
            .filter_map(|u| {
                let wallet = u.get_str(fields::WALLET_ADDRESS)?.to_lowercase();
                Some((wallet, u))
            })
            .collect())
    }
}

fn active() -> Filter {
    Filter::new().eq(fields::ACTIVE, true)
}

fn flag(user: Option<&Record>, field: &str) -> bool {
    user.and_then(|u| u.get_bool(field)).unwrap_or(false)
}
