//! Conversions between mirror rows and domain entities.

use super::classes::fields;
use super::record::{Fields, Record};
use crate::core_model::{
    Address, ClaimEventRecord, ClaimTopic, IdentityProfile, Mirrored, PendingIdentity, TopicGrant,
    TopicId, TrustedIssuer,
};
use chrono::DateTime;
use serde_json::{json, Value};

/// Typed view of a mirror row. Rows missing their key fields yield `None`.
pub trait FromRecord: Sized {
    fn from_record(record: &Record) -> Option<Self>;

    fn mirrored(record: &Record) -> Option<Mirrored<Self>> {
        Self::from_record(record).map(|value| Mirrored {
            object_id: record.object_id.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            value,
        })
    }
}

pub(crate) fn topic_of(value: &Value) -> Option<TopicId> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().map(TopicId),
        _ => None,
    }
}

fn topics_of(value: Option<&Value>) -> Vec<TopicId> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(topic_of).collect())
        .unwrap_or_default()
}

fn address_of(record: &Record, field: &str) -> Option<Address> {
    record.get_str(field).and_then(|s| Address::parse(s).ok())
}

fn string_of(record: &Record, field: &str) -> String {
    record.get_str(field).unwrap_or_default().to_string()
}

pub fn grants_to_value(grants: &[TopicGrant]) -> Value {
    Value::Array(
        grants
            .iter()
            .map(|g| {
                json!({
                    (fields::TOPIC): g.topic.to_string(),
                    "timestamp": g.timestamp.timestamp_millis(),
                })
            })
            .collect(),
    )
}

pub(crate) fn topics_to_value(topics: &[TopicId]) -> Value {
    Value::Array(topics.iter().map(|t| Value::String(t.to_string())).collect())
}

pub(crate) fn fields_of(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

impl FromRecord for ClaimTopic {
    fn from_record(record: &Record) -> Option<Self> {
        Some(Self {
            topic: record.get(fields::TOPIC).and_then(topic_of)?,
            display_name: string_of(record, fields::DISPLAY_NAME),
            active: record.get_bool(fields::ACTIVE).unwrap_or(true),
        })
    }
}

impl FromRecord for TrustedIssuer {
    fn from_record(record: &Record) -> Option<Self> {
        let claim_topics = record
            .get(fields::CLAIM_TOPICS)
            .and_then(Value::as_array)
            .map(|grants| {
                grants
                    .iter()
                    .filter_map(|grant| {
                        let topic = grant.get(fields::TOPIC).and_then(topic_of)?;
                        let timestamp = grant
                            .get("timestamp")
                            .and_then(Value::as_i64)
                            .and_then(DateTime::from_timestamp_millis)
                            .unwrap_or(record.created_at);
                        Some(TopicGrant { topic, timestamp })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            issuer: address_of(record, fields::ISSUER)?,
            verifier_name: string_of(record, fields::VERIFIER_NAME),
            claim_topics,
            active: record.get_bool(fields::ACTIVE).unwrap_or(true),
        })
    }
}

impl FromRecord for IdentityProfile {
    fn from_record(record: &Record) -> Option<Self> {
        Some(Self {
            address: address_of(record, fields::ADDRESS)?,
            identity: address_of(record, fields::IDENTITY),
            display_name: string_of(record, fields::DISPLAY_NAME),
            account_number: string_of(record, fields::ACCOUNT_NUMBER),
            claims: topics_of(record.get(fields::CLAIMS)),
            active: record.get_bool(fields::ACTIVE).unwrap_or(true),
        })
    }
}

impl FromRecord for ClaimEventRecord {
    fn from_record(record: &Record) -> Option<Self> {
        Some(Self {
            identity: address_of(record, fields::IDENTITY)?,
            claim_topic: record.get(fields::CLAIM_TOPIC).and_then(topic_of)?,
            block_hash: record.get_str(fields::BLOCK_HASH)?.to_string(),
            transaction_hash: record.get_str(fields::TRANSACTION_HASH).map(String::from),
        })
    }
}

impl FromRecord for PendingIdentity {
    fn from_record(record: &Record) -> Option<Self> {
        let display_name = record
            .get_str(fields::DISPLAY_NAME)
            .or_else(|| record.get_str(fields::USERNAME))
            .unwrap_or_default()
            .to_string();

        Some(Self {
            wallet_address: address_of(record, fields::WALLET_ADDRESS),
            display_name,
            account_number: string_of(record, fields::PERSONA_REFERENCE_ID),
            pending_approval: record.get_bool(fields::PENDING_APPROVAL).unwrap_or(false),
            denied: record.get_bool(fields::DENIED).unwrap_or(false),
            pep_matched: record.get_bool(fields::PEP_MATCHED).unwrap_or(false),
            watchlist_matched: record.get_bool(fields::WATCHLIST_MATCHED).unwrap_or(false),
            verification_data: verification_data(record),
        })
    }
}

/// KYC payload, stored either as an object or as a JSON-encoded string.
pub(crate) fn verification_data(record: &Record) -> Option<Value> {
    match record.get(fields::PERSONA_VERIFICATION_DATA)? {
        Value::String(raw) => serde_json::from_str(raw).ok(),
        Value::Null => None,
        other => Some(other.clone()),
    }
}

pub(crate) fn claim_topic_fields(topic: &ClaimTopic) -> Fields {
    fields_of(json!({
        (fields::TOPIC): topic.topic.to_string(),
        (fields::DISPLAY_NAME): topic.display_name,
        (fields::ACTIVE): topic.active,
    }))
}

pub(crate) fn trusted_issuer_fields(issuer: &TrustedIssuer) -> Fields {
    fields_of(json!({
        (fields::ISSUER): issuer.issuer.to_string(),
        (fields::VERIFIER_NAME): issuer.verifier_name,
        (fields::CLAIM_TOPICS): grants_to_value(&issuer.claim_topics),
        (fields::ACTIVE): issuer.active,
    }))
}
