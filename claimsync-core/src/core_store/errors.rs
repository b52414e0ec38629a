//! Mirror store error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found in {class}: {key}")]
    NotFound { class: String, key: String },

    #[error("Record already exists in {class}: {key}")]
    AlreadyExists { class: String, key: String },

    #[error("Filter has {fields} fields but {values} values")]
    FilterMismatch { fields: usize, values: usize },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Store rejected request ({code}): {message}")]
    Remote { code: i64, message: String },

    #[error("Cloud function {name} failed: {message}")]
    Function { name: String, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
