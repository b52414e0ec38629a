//! Off-chain mirror store
//!
//! The mirror is a document store of named classes (`ClaimTopic`,
//! `TrustedIssuer`, `Identity`, `_User`, event classes). An external indexer
//! creates base rows from contract events; the admin workflows enrich them
//! with display data the chain does not carry.
//!
//! # Architecture
//!
//! ```text
//! SyncWorkflow / EventIndexer
//!       |
//!       v
//! RecordStore (trait)
//!       |
//!       +---> RestRecordStore (hosted backend over HTTPS)
//!       |
//!       +---> MemoryRecordStore (tests, simulation)
//! ```

pub mod classes;
mod errors;
mod indexer;
mod mapping;
mod memory;
mod query;
mod record;
mod rest;

pub use errors::{StoreError, StoreResult};
pub use indexer::EventIndexer;
pub use mapping::{grants_to_value, FromRecord};
pub(crate) use mapping::{
    claim_topic_fields, fields_of, topics_to_value, trusted_issuer_fields, verification_data,
};
pub use memory::MemoryRecordStore;
pub use query::{Filter, RecordQuery, SortOrder, DEFAULT_LIMIT};
pub use record::{Fields, Record};
pub use rest::RestRecordStore;

use async_trait::async_trait;
use serde_json::Value;

/// Generic query / write surface over the mirror.
///
/// `create_record` and `update_existing_record` take a *key* filter that
/// identifies the logical row. Creating a row whose key already matches
/// fails with [`StoreError::AlreadyExists`]; updating a row that does not
/// exist fails with [`StoreError::NotFound`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Run a query. Results honour filter, order, skip and limit.
    async fn get_records(&self, query: &RecordQuery) -> StoreResult<Vec<Record>>;

    /// Create a row. Key fields missing from `data` are copied in.
    async fn create_record(&self, class_name: &str, key: &Filter, data: Fields)
        -> StoreResult<Record>;

    /// Merge `patch` into the first row matching `key`.
    async fn update_existing_record(
        &self,
        class_name: &str,
        key: &Filter,
        patch: Fields,
    ) -> StoreResult<Record>;

    /// Delete by object id. Returns whether a row was removed.
    async fn delete_record(&self, class_name: &str, object_id: &str) -> StoreResult<bool>;

    async fn get_record(&self, class_name: &str, filter: &Filter) -> StoreResult<Option<Record>> {
        let query = RecordQuery::new(class_name).filter(filter.clone()).limit(1);
        Ok(self.get_records(&query).await?.into_iter().next())
    }

    /// Most recently created row matching `filter`.
    async fn get_latest_record(
        &self,
        class_name: &str,
        filter: &Filter,
    ) -> StoreResult<Option<Record>> {
        let query = RecordQuery::new(class_name)
            .filter(filter.clone())
            .order_by(classes::fields::CREATED_AT, SortOrder::Descending)
            .limit(1);
        Ok(self.get_records(&query).await?.into_iter().next())
    }

    async fn count_records(&self, class_name: &str, filter: &Filter) -> StoreResult<usize> {
        let query = RecordQuery::new(class_name).filter(filter.clone());
        Ok(self.get_records(&query).await?.len())
    }

    /// Update when the key matches, otherwise create with the key merged in.
    async fn create_or_update_record(
        &self,
        class_name: &str,
        key: &Filter,
        data: Fields,
    ) -> StoreResult<Record> {
        match self
            .update_existing_record(class_name, key, data.clone())
            .await
        {
            Err(StoreError::NotFound { .. }) => self.create_record(class_name, key, data).await,
            other => other,
        }
    }
}

/// Server-side function invocation on the store's backend.
///
/// The custody service is reached through named functions hosted next to
/// the mirror, so both backends implement this as well.
#[async_trait]
pub trait CloudFunctions: Send + Sync {
    async fn run(&self, name: &str, params: Value) -> StoreResult<Value>;
}

/// Copy key fields absent from `data` into it.
pub(crate) fn with_key_fields(mut data: Fields, key: &Filter) -> Fields {
    for (field, value) in key.clauses() {
        if !field.contains('.') && !data.contains_key(field) {
            data.insert(field.clone(), value.clone());
        }
    }
    data
}
