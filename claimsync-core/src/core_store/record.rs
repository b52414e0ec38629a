use super::classes::fields;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field map of a record, excluding the bookkeeping columns.
pub type Fields = serde_json::Map<String, Value>;

/// One row of a mirror class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub class_name: String,
    pub object_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fields: Fields,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        self.get(field)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Values reachable through a dotted path. Arrays along the way fan out,
    /// so `claimTopics.topic` yields the topic of every grant.
    pub fn path_values(&self, path: &str) -> Vec<Value> {
        match path {
            fields::OBJECT_ID => return vec![Value::String(self.object_id.clone())],
            fields::CREATED_AT => return vec![Value::String(self.created_at.to_rfc3339())],
            fields::UPDATED_AT => return vec![Value::String(self.updated_at.to_rfc3339())],
            _ => {}
        }

        let mut segments = path.split('.');
        let Some(first) = segments.next() else {
            return Vec::new();
        };
        let mut current: Vec<&Value> = self.fields.get(first).into_iter().collect();

        for segment in segments {
            let mut next = Vec::new();
            for value in current {
                match value {
                    Value::Object(map) => next.extend(map.get(segment)),
                    Value::Array(items) => next.extend(
                        items
                            .iter()
                            .filter_map(|item| item.as_object().and_then(|m| m.get(segment))),
                    ),
                    _ => {}
                }
            }
            current = next;
        }

        current.into_iter().cloned().collect()
    }

    pub(crate) fn merge(&mut self, patch: Fields, now: DateTime<Utc>) {
        for (key, value) in patch {
            self.fields.insert(key, value);
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Value) -> Record {
        let now = Utc::now();
        Record {
            class_name: "TrustedIssuer".into(),
            object_id: "abc123".into(),
            created_at: now,
            updated_at: now,
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_path_values_fan_out_over_arrays() {
        let r = record(json!({
            "claimTopics": [{"topic": "1"}, {"topic": "3"}],
        }));
        assert_eq!(r.path_values("claimTopics.topic"), vec![json!("1"), json!("3")]);
        assert!(r.path_values("claimTopics.missing").is_empty());
    }

    #[test]
    fn test_object_id_path() {
        let r = record(json!({}));
        assert_eq!(r.path_values("objectId"), vec![json!("abc123")]);
    }

    #[test]
    fn test_typed_getters() {
        let r = record(json!({"active": true, "issuer": "0xabc", "claims": ["1", "2"]}));
        assert_eq!(r.get_bool("active"), Some(true));
        assert_eq!(r.get_str("issuer"), Some("0xabc"));
        assert_eq!(
            r.get_as::<Vec<String>>("claims"),
            Some(vec!["1".to_string(), "2".to_string()])
        );
    }
}
