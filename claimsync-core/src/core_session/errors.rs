//! Session error types

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Session expired")]
    Expired,

    #[error("No active session")]
    NotSignedIn,

    #[error("Custodial wallet details missing from session: {0}")]
    MissingCustody(&'static str),

    #[error("Login request failed: {0}")]
    Transport(String),

    #[error("Unexpected login response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        SessionError::Transport(err.to_string())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
