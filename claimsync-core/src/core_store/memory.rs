//! In-process mirror used by tests and the `simulate` command.

use super::classes::fields;
use super::errors::{StoreError, StoreResult};
use super::query::{RecordQuery, SortOrder};
use super::record::{Fields, Record};
use super::{with_key_fields, CloudFunctions, Filter, RecordStore};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use uuid::Uuid;

type FunctionHandler = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// A cloud function call as it was received.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub params: Value,
}

/// Mirror held in memory.
///
/// Rows keep insertion order, which decides ties on the sort field.
#[derive(Default)]
pub struct MemoryRecordStore {
    rows: RwLock<Vec<Record>>,
    functions: Mutex<HashMap<String, FunctionHandler>>,
    calls: Mutex<Vec<FunctionCall>>,
    writes: Mutex<u64>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row without any key check.
    pub async fn insert(&self, class_name: &str, data: Fields) -> Record {
        let record = new_record(class_name, data);
        self.rows.write().await.push(record.clone());
        record
    }

    /// All rows of a class in insertion order.
    pub async fn all(&self, class_name: &str) -> Vec<Record> {
        self.rows
            .read()
            .await
            .iter()
            .filter(|r| r.class_name == class_name)
            .cloned()
            .collect()
    }

    /// Number of successful create / update / delete operations so far.
    pub fn write_count(&self) -> u64 {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_function<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(handler));
    }

    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn count_write(&self) {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }
}

fn new_record(class_name: &str, data: Fields) -> Record {
    let now = Utc::now();
    let mut object_id = Uuid::new_v4().simple().to_string();
    object_id.truncate(10);
    Record {
        class_name: class_name.to_string(),
        object_id,
        created_at: now,
        updated_at: now,
        fields: data,
    }
}

fn compare_by(field: &str, a: &Record, b: &Record) -> Ordering {
    match field {
        fields::CREATED_AT => a.created_at.cmp(&b.created_at),
        fields::UPDATED_AT => a.updated_at.cmp(&b.updated_at),
        _ => compare_values(a.get(field), b.get(field)),
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}

// Topic ids are stored as decimal strings; order them numerically.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_records(&self, query: &RecordQuery) -> StoreResult<Vec<Record>> {
        let rows = self.rows.read().await;
        let mut matched: Vec<(usize, Record)> = rows
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .enumerate()
            .collect();
        drop(rows);

        // Insertion order breaks ties, following the sort direction.
        matched.sort_by(|(ia, a), (ib, b)| {
            let ord = compare_by(&query.order_field, a, b).then(ia.cmp(ib));
            match query.order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });

        Ok(matched
            .into_iter()
            .map(|(_, record)| record)
            .skip(query.skip)
            .take(query.limit)
            .collect())
    }

    async fn create_record(
        &self,
        class_name: &str,
        key: &Filter,
        data: Fields,
    ) -> StoreResult<Record> {
        let mut rows = self.rows.write().await;
        if !key.is_empty()
            && rows
                .iter()
                .any(|r| r.class_name == class_name && key.matches(r))
        {
            return Err(StoreError::AlreadyExists {
                class: class_name.to_string(),
                key: key.to_string(),
            });
        }

        let record = new_record(class_name, with_key_fields(data, key));
        rows.push(record.clone());
        drop(rows);
        self.count_write();
        Ok(record)
    }

    async fn update_existing_record(
        &self,
        class_name: &str,
        key: &Filter,
        patch: Fields,
    ) -> StoreResult<Record> {
        let mut rows = self.rows.write().await;
        let Some(record) = rows
            .iter_mut()
            .find(|r| r.class_name == class_name && key.matches(r))
        else {
            return Err(StoreError::NotFound {
                class: class_name.to_string(),
                key: key.to_string(),
            });
        };

        record.merge(patch, Utc::now());
        let updated = record.clone();
        drop(rows);
        self.count_write();
        Ok(updated)
    }

    async fn delete_record(&self, class_name: &str, object_id: &str) -> StoreResult<bool> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|r| !(r.class_name == class_name && r.object_id == object_id));
        let removed = rows.len() != before;
        drop(rows);
        if removed {
            self.count_write();
        }
        Ok(removed)
    }
}

#[async_trait]
impl CloudFunctions for MemoryRecordStore {
    async fn run(&self, name: &str, params: Value) -> StoreResult<Value> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FunctionCall {
                name: name.to_string(),
                params: params.clone(),
            });

        let handler = self
            .functions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned();

        match handler {
            Some(handler) => handler(&params).map_err(|message| StoreError::Function {
                name: name.to_string(),
                message,
            }),
            None => Err(StoreError::Function {
                name: name.to_string(),
                message: "function not found".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> Fields {
        v.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_create_conflict_on_existing_key() {
        let store = MemoryRecordStore::new();
        let key = Filter::new().eq("topic", "1");
        store
            .create_record("ClaimTopic", &key, fields(json!({"active": true})))
            .await
            .unwrap();

        let err = store
            .create_record("ClaimTopic", &key, fields(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        let rows = store.all("ClaimTopic").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("topic"), Some("1"));
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let store = MemoryRecordStore::new();
        let err = store
            .update_existing_record(
                "ClaimTopic",
                &Filter::new().eq("topic", "9"),
                fields(json!({"displayName": "x"})),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_create_or_update() {
        let store = MemoryRecordStore::new();
        let key = Filter::new().eq("address", "0xaa");
        store
            .create_or_update_record("Identity", &key, fields(json!({"active": true})))
            .await
            .unwrap();
        store
            .create_or_update_record("Identity", &key, fields(json!({"active": false})))
            .await
            .unwrap();

        let rows = store.all("Identity").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_bool("active"), Some(false));
    }

    #[tokio::test]
    async fn test_numeric_ordering_skip_and_limit() {
        let store = MemoryRecordStore::new();
        for topic in ["9", "10", "2"] {
            store
                .insert("ClaimTopic", fields(json!({ "topic": topic })))
                .await;
        }

        let query = RecordQuery::new("ClaimTopic").order_by("topic", SortOrder::Descending);
        let topics: Vec<_> = store
            .get_records(&query)
            .await
            .unwrap()
            .iter()
            .filter_map(|r| r.get_str("topic").map(String::from))
            .collect();
        assert_eq!(topics, vec!["10", "9", "2"]);

        let page = store
            .get_records(&query.clone().skip(1).limit(1))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].get_str("topic"), Some("9"));
    }

    #[tokio::test]
    async fn test_latest_record_and_count() {
        let store = MemoryRecordStore::new();
        store.insert("ClaimAdded__e", fields(json!({"n": 1}))).await;
        store.insert("ClaimAdded__e", fields(json!({"n": 2}))).await;

        let all = Filter::new();
        assert_eq!(store.count_records("ClaimAdded__e", &all).await.unwrap(), 2);
        let latest = store
            .get_latest_record("ClaimAdded__e", &all)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.get("n"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_delete_record() {
        let store = MemoryRecordStore::new();
        let row = store.insert("Identity", fields(json!({}))).await;
        assert!(store.delete_record("Identity", &row.object_id).await.unwrap());
        assert!(!store.delete_record("Identity", &row.object_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_cloud_functions() {
        let store = MemoryRecordStore::new();
        store.register_function("echo", |params| Ok(params.clone()));

        let out = store.run("echo", json!({"a": 1})).await.unwrap();
        assert_eq!(out, json!({"a": 1}));

        let err = store.run("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::Function { .. }));
        assert_eq!(store.function_calls().len(), 2);
    }
}
