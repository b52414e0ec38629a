//! claimsync core: keeps an identity / claims registry and its off-chain
//! mirror in step.
//!
//! - [`core_chain`]: registry client, event bus, simulated backend
//! - [`core_custody`]: two-phase custodial signing
//! - [`core_store`]: mirror record store (REST and in-memory)
//! - [`core_session`]: login, session snapshot, auto-logout
//! - [`core_sync`]: admin workflows, retries, notices, read models

pub mod config;
pub mod core_chain;
pub mod core_custody;
pub mod core_model;
pub mod core_session;
pub mod core_store;
pub mod core_sync;
pub mod logging;
pub mod metrics;
pub mod simulation;
pub mod test_utils;

pub use config::{Config, ConfigError};
pub use core_sync::{SyncWorkflow, WorkflowError, WorkflowResult};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = LogLevel::Info;
        assert!(Config::default().validate().is_ok());
    }
}
