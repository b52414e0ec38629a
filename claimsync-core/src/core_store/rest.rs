//! Mirror backed by a hosted document backend reached over HTTPS.
//!
//! Wire conventions: rows live under `/classes/<Class>`, the user class under
//! `/users`, server functions under `/functions/<name>`. Queries pass their
//! constraints as a JSON `where` parameter.

use super::classes::fields;
use super::errors::{StoreError, StoreResult};
use super::query::{RecordQuery, SortOrder};
use super::record::{Fields, Record};
use super::{classes, with_key_fields, CloudFunctions, Filter, RecordStore};
use crate::config::RecordStoreConfig;
use crate::metrics::record_counter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

const APPLICATION_ID_HEADER: &str = "X-Parse-Application-Id";
const JAVASCRIPT_KEY_HEADER: &str = "X-Parse-JavaScript-Key";
const SESSION_TOKEN_HEADER: &str = "X-Parse-Session-Token";

pub struct RestRecordStore {
    client: Client,
    base_url: String,
    application_id: String,
    javascript_key: Option<SecretString>,
    session_token: RwLock<Option<SecretString>>,
}

#[derive(Deserialize)]
struct QueryResponse {
    results: Vec<Value>,
}

#[derive(Deserialize)]
struct FunctionResponse {
    #[serde(default)]
    result: Value,
}

impl RestRecordStore {
    pub fn new(config: &RecordStoreConfig) -> StoreResult<Self> {
        if config.server_url.trim().is_empty() {
            return Err(StoreError::Config("server_url is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            application_id: config.application_id.clone(),
            javascript_key: config.javascript_key.clone().map(SecretString::new),
            session_token: RwLock::new(None),
        })
    }

    /// Attach (or clear) the signed-in user's session token.
    pub fn set_session_token(&self, token: Option<SecretString>) {
        *self
            .session_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn class_url(&self, class_name: &str) -> String {
        if class_name == classes::USER {
            format!("{}/users", self.base_url)
        } else {
            format!("{}/classes/{}", self.base_url, class_name)
        }
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, url)
            .header(APPLICATION_ID_HEADER, &self.application_id);

        if let Some(key) = &self.javascript_key {
            request = request.header(JAVASCRIPT_KEY_HEADER, key.expose_secret().as_str());
        }
        let token = self
            .session_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.expose_secret().clone());
        if let Some(token) = token {
            request = request.header(SESSION_TOKEN_HEADER, token);
        }
        request
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> StoreResult<Value> {
        record_counter("store.operations.total", 1);
        let response = request.send().await.map_err(|e| {
            record_counter("store.operations.failed", 1);
            StoreError::from(e)
        })?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if status.is_success() {
            debug!(operation, %status, "store request succeeded");
            return Ok(body);
        }

        record_counter("store.operations.failed", 1);
        let code = body
            .get("code")
            .and_then(Value::as_i64)
            .unwrap_or(i64::from(status.as_u16()));
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("request failed")
            .to_string();
        warn!(operation, %status, code, %message, "store request rejected");
        Err(StoreError::Remote { code, message })
    }

    fn decode_record(class_name: &str, value: Value) -> StoreResult<Record> {
        let Value::Object(mut map) = value else {
            return Err(StoreError::Decode("row is not an object".to_string()));
        };

        let object_id = match map.remove(fields::OBJECT_ID) {
            Some(Value::String(id)) => id,
            _ => return Err(StoreError::Decode("row has no objectId".to_string())),
        };
        let created_at = take_timestamp(&mut map, fields::CREATED_AT)?;
        let updated_at = match map.contains_key(fields::UPDATED_AT) {
            true => take_timestamp(&mut map, fields::UPDATED_AT)?,
            false => created_at,
        };

        Ok(Record {
            class_name: class_name.to_string(),
            object_id,
            created_at,
            updated_at,
            fields: map,
        })
    }
}

fn take_timestamp(map: &mut Fields, field: &str) -> StoreResult<DateTime<Utc>> {
    let raw = map
        .remove(field)
        .and_then(|v| v.as_str().map(String::from))
        .ok_or_else(|| StoreError::Decode(format!("row has no {field}")))?;
    parse_timestamp(&raw)
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("bad timestamp {raw}: {e}")))
}

fn order_param(query: &RecordQuery) -> String {
    match query.order {
        SortOrder::Ascending => query.order_field.clone(),
        SortOrder::Descending => format!("-{}", query.order_field),
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn get_records(&self, query: &RecordQuery) -> StoreResult<Vec<Record>> {
        let where_clause = query.filter.to_where(&query.non_null).to_string();
        let mut params = vec![
            ("where", where_clause),
            ("limit", query.limit.to_string()),
            ("skip", query.skip.to_string()),
            ("order", order_param(query)),
        ];
        if !query.include.is_empty() {
            params.push(("include", query.include.join(",")));
        }

        let request = self
            .request(Method::GET, self.class_url(&query.class_name))
            .query(&params);
        let body = self.send("query", request).await?;
        let response: QueryResponse = serde_json::from_value(body)?;

        response
            .results
            .into_iter()
            .map(|row| Self::decode_record(&query.class_name, row))
            .collect()
    }

    async fn create_record(
        &self,
        class_name: &str,
        key: &Filter,
        data: Fields,
    ) -> StoreResult<Record> {
        if !key.is_empty() && self.get_record(class_name, key).await?.is_some() {
            return Err(StoreError::AlreadyExists {
                class: class_name.to_string(),
                key: key.to_string(),
            });
        }

        let data = with_key_fields(data, key);
        let request = self
            .request(Method::POST, self.class_url(class_name))
            .json(&data);
        let body = self.send("create", request).await?;

        let object_id = body
            .get(fields::OBJECT_ID)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Decode("create response has no objectId".to_string()))?
            .to_string();
        let created_at = match body.get(fields::CREATED_AT).and_then(Value::as_str) {
            Some(raw) => parse_timestamp(raw)?,
            None => Utc::now(),
        };

        Ok(Record {
            class_name: class_name.to_string(),
            object_id,
            created_at,
            updated_at: created_at,
            fields: data,
        })
    }

    async fn update_existing_record(
        &self,
        class_name: &str,
        key: &Filter,
        patch: Fields,
    ) -> StoreResult<Record> {
        let Some(mut record) = self.get_record(class_name, key).await? else {
            return Err(StoreError::NotFound {
                class: class_name.to_string(),
                key: key.to_string(),
            });
        };

        let url = format!("{}/{}", self.class_url(class_name), record.object_id);
        let request = self.request(Method::PUT, url).json(&patch);
        let body = self.send("update", request).await?;

        let updated_at = match body.get(fields::UPDATED_AT).and_then(Value::as_str) {
            Some(raw) => parse_timestamp(raw)?,
            None => Utc::now(),
        };
        record.merge(patch, updated_at);
        Ok(record)
    }

    async fn delete_record(&self, class_name: &str, object_id: &str) -> StoreResult<bool> {
        let url = format!("{}/{}", self.class_url(class_name), object_id);
        match self.send("delete", self.request(Method::DELETE, url)).await {
            Ok(_) => Ok(true),
            // 101: object not found
            Err(StoreError::Remote { code: 101, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CloudFunctions for RestRecordStore {
    async fn run(&self, name: &str, params: Value) -> StoreResult<Value> {
        let url = format!("{}/functions/{}", self.base_url, name);
        let request = self.request(Method::POST, url).json(&params);
        match self.send("function", request).await {
            Ok(body) => {
                let response: FunctionResponse = serde_json::from_value(body)?;
                Ok(response.result)
            }
            Err(StoreError::Remote { message, .. }) => Err(StoreError::Function {
                name: name.to_string(),
                message,
            }),
            Err(e) => Err(e),
        }
    }
}
