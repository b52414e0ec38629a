//! Custody client error types

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CustodialError {
    #[error("Missing required parameters for {operation}: {parameter}")]
    MissingParameter {
        operation: &'static str,
        parameter: &'static str,
    },

    #[error("{0} is not available through the custody service")]
    Unsupported(&'static str),

    #[error("{operation} failed: {message}")]
    Remote {
        operation: &'static str,
        message: String,
    },

    #[error("Challenge signing failed: {0}")]
    Signing(String),
}
