use super::errors::{StoreError, StoreResult};
use super::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Page size used when a query does not set one.
pub const DEFAULT_LIMIT: usize = 1000;

/// Conjunction of equality clauses.
///
/// A clause matches when the field (or any value reached through a dotted
/// path) equals the wanted value, or is an array containing it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// Build from parallel field / value lists. The lists must line up.
    pub fn from_pairs(fields: &[&str], values: Vec<Value>) -> StoreResult<Self> {
        if fields.len() != values.len() {
            return Err(StoreError::FilterMismatch {
                fields: fields.len(),
                values: values.len(),
            });
        }
        Ok(Self {
            clauses: fields
                .iter()
                .map(|f| f.to_string())
                .zip(values)
                .collect(),
        })
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.clauses.iter().all(|(field, wanted)| {
            record
                .path_values(field)
                .iter()
                .any(|candidate| value_matches(candidate, wanted))
        })
    }

    /// Render as a `where` constraint object.
    pub fn to_where(&self, non_null: &[String]) -> Value {
        let mut map = Map::new();
        for field in non_null {
            map.insert(field.clone(), json!({ "$exists": true }));
        }
        for (field, value) in &self.clauses {
            map.insert(field.clone(), value.clone());
        }
        Value::Object(map)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return f.write_str("<all>");
        }
        for (i, (field, value)) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}={value}")?;
        }
        Ok(())
    }
}

fn value_matches(candidate: &Value, wanted: &Value) -> bool {
    candidate == wanted || matches!(candidate, Value::Array(items) if items.contains(wanted))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// A read against one class.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub class_name: String,
    pub filter: Filter,
    pub include: Vec<String>,
    pub limit: usize,
    pub skip: usize,
    pub order_field: String,
    pub order: SortOrder,
    pub non_null: Vec<String>,
}

impl RecordQuery {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            filter: Filter::new(),
            include: Vec::new(),
            limit: DEFAULT_LIMIT,
            skip: 0,
            order_field: "createdAt".to_string(),
            order: SortOrder::Ascending,
            non_null: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.include.push(field.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order_field = field.into();
        self.order = order;
        self
    }

    pub fn non_null(mut self, field: impl Into<String>) -> Self {
        self.non_null.push(field.into());
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.class_name == self.class_name
            && self.filter.matches(record)
            && self
                .non_null
                .iter()
                .all(|f| record.get(f).is_some_and(|v| !v.is_null()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn identity(claims: Value, active: bool) -> Record {
        let now = Utc::now();
        Record {
            class_name: "Identity".into(),
            object_id: "id1".into(),
            created_at: now,
            updated_at: now,
            fields: json!({"claims": claims, "active": active, "address": "0x01"})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        }
    }

    #[test]
    fn test_from_pairs_length_mismatch() {
        let err = Filter::from_pairs(&["a", "b"], vec![json!(1)]).unwrap_err();
        assert!(matches!(err, StoreError::FilterMismatch { fields: 2, values: 1 }));
    }

    #[test]
    fn test_filter_array_containment() {
        let r = identity(json!(["1", "4"]), true);
        assert!(Filter::new().eq("claims", "4").matches(&r));
        assert!(!Filter::new().eq("claims", "2").matches(&r));
        assert!(Filter::new().eq("active", true).eq("claims", "1").matches(&r));
        assert!(!Filter::new().eq("active", false).matches(&r));
    }

    #[test]
    fn test_query_non_null() {
        let r = identity(json!([]), true);
        let query = RecordQuery::new("Identity").non_null("address");
        assert!(query.matches(&r));
        let query = RecordQuery::new("Identity").non_null("walletAddress");
        assert!(!query.matches(&r));
        assert!(!RecordQuery::new("ClaimTopic").matches(&r));
    }

    #[test]
    fn test_where_rendering() {
        let filter = Filter::new().eq("topic", "3");
        let rendered = filter.to_where(&["displayName".to_string()]);
        assert_eq!(
            rendered,
            json!({"topic": "3", "displayName": {"$exists": true}})
        );
        assert_eq!(filter.to_string(), "topic=\"3\"");
    }
}
