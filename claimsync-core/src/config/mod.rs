//! Configuration management for claimsync
//!
//! Configuration is read from a TOML file (durations in humantime form,
//! e.g. `"2s"`, `"1500ms"`), then overridden from environment variables
//! named `CLAIMSYNC_<SECTION>_<KEY>`.

use crate::core_model::Address;
use crate::core_sync::WorkflowSettings;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Off-chain mirror endpoint
    pub record_store: RecordStoreConfig,

    /// Registry contracts
    pub chain: ChainConfig,

    /// Custodial signing service
    pub custody: CustodyConfig,

    /// Retry policies and settle delays of the admin workflows
    pub sync: WorkflowSettings,

    /// Login and auto-logout
    pub session: SessionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Record store (mirror) endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordStoreConfig {
    /// Base URL of the hosted backend, e.g. `https://mirror.example/parse`
    pub server_url: String,

    /// Application id sent with every request
    pub application_id: String,

    /// Optional client key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub javascript_key: Option<String>,

    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// Registry contract addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: u64,

    /// Identity registry contract
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_address: Option<Address>,

    /// Identity factory contract
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_factory_address: Option<Address>,

    /// Buffered events per registry event subscriber
    pub event_bus_capacity: usize,
}

/// Custodial signing service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustodyConfig {
    /// Route managed-wallet sessions through the custody service
    pub enabled: bool,

    /// Prefix of the server functions, e.g. `dfns` for `dfnsAddClaimTopicInit`
    pub function_prefix: String,
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How often auto-logout checks the token expiry
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Session lifetime when the login response carries no expiry
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Register metric descriptions at startup
    pub enabled: bool,
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:1337/parse".to_string(),
            application_id: "claimsync".to_string(),
            javascript_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            registry_address: None,
            identity_factory_address: None,
            event_bus_capacity: 256,
        }
    }
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            function_prefix: crate::core_custody::DEFAULT_FUNCTION_PREFIX.to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            default_ttl: Duration::from_secs(3600),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

fn parse_duration(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime_serde::re::humantime::parse_duration(raw.trim())
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

fn parse_address(key: &str, raw: &str) -> Result<Option<Address>, ConfigError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    Address::parse(raw)
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

impl Config {
    /// Load configuration from environment variables on top of the defaults
    ///
    /// Environment variables follow the pattern: CLAIMSYNC_<SECTION>_<KEY>
    /// Example: CLAIMSYNC_RECORD_STORE_SERVER_URL=https://mirror.example/parse
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CLAIMSYNC_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        const PREFIX: &str = "CLAIMSYNC_";
        let get = |key: &str| lookup(&format!("{PREFIX}{key}"));

        // Record store
        if let Some(v) = get("RECORD_STORE_SERVER_URL") {
            self.record_store.server_url = v;
        }
        if let Some(v) = get("RECORD_STORE_APPLICATION_ID") {
            self.record_store.application_id = v;
        }
        if let Some(v) = get("RECORD_STORE_JAVASCRIPT_KEY") {
            self.record_store.javascript_key = Some(v).filter(|k| !k.is_empty());
        }
        if let Some(v) = get("RECORD_STORE_REQUEST_TIMEOUT") {
            self.record_store.request_timeout = parse_duration("RECORD_STORE_REQUEST_TIMEOUT", &v)?;
        }

        // Chain
        if let Some(v) = get("CHAIN_CHAIN_ID") {
            self.chain.chain_id = parse_value("CHAIN_CHAIN_ID", &v)?;
        }
        if let Some(v) = get("CHAIN_REGISTRY_ADDRESS") {
            self.chain.registry_address = parse_address("CHAIN_REGISTRY_ADDRESS", &v)?;
        }
        if let Some(v) = get("CHAIN_IDENTITY_FACTORY_ADDRESS") {
            self.chain.identity_factory_address =
                parse_address("CHAIN_IDENTITY_FACTORY_ADDRESS", &v)?;
        }
        if let Some(v) = get("CHAIN_EVENT_BUS_CAPACITY") {
            self.chain.event_bus_capacity = parse_value("CHAIN_EVENT_BUS_CAPACITY", &v)?;
        }

        // Custody
        if let Some(v) = get("CUSTODY_ENABLED") {
            self.custody.enabled = parse_value("CUSTODY_ENABLED", &v)?;
        }
        if let Some(v) = get("CUSTODY_FUNCTION_PREFIX") {
            self.custody.function_prefix = v;
        }

        // Sync delays; retry policies are file-only
        if let Some(v) = get("SYNC_CUSTODIAL_PHASE_DELAY") {
            self.sync.custodial_phase_delay = parse_duration("SYNC_CUSTODIAL_PHASE_DELAY", &v)?;
        }
        if let Some(v) = get("SYNC_CUSTODIAL_REFRESH_DELAY") {
            self.sync.custodial_refresh_delay =
                parse_duration("SYNC_CUSTODIAL_REFRESH_DELAY", &v)?;
        }

        // Session
        if let Some(v) = get("SESSION_POLL_INTERVAL") {
            self.session.poll_interval = parse_duration("SESSION_POLL_INTERVAL", &v)?;
        }
        if let Some(v) = get("SESSION_DEFAULT_TTL") {
            self.session.default_ttl = parse_duration("SESSION_DEFAULT_TTL", &v)?;
        }

        // Logging
        if let Some(v) = get("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = get("LOG_JSON") {
            self.logging.json_format = parse_value("LOG_JSON", &v)?;
        }

        // Metrics
        if let Some(v) = get("METRICS_ENABLED") {
            self.metrics.enabled = parse_value("METRICS_ENABLED", &v)?;
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.record_store.server_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationFailed(format!(
                "record_store.server_url must be an http(s) URL, got {url:?}"
            )));
        }
        if self.record_store.application_id.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "record_store.application_id must not be empty".to_string(),
            ));
        }
        if self.record_store.request_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "record_store.request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.chain.event_bus_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "chain.event_bus_capacity must be greater than 0".to_string(),
            ));
        }

        if self.custody.enabled && self.custody.function_prefix.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "custody.function_prefix must not be empty when custody is enabled".to_string(),
            ));
        }

        for (name, policy) in self.sync.policies() {
            if policy.max_attempts == 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "sync.{name}.max_attempts must be greater than 0"
                )));
            }
        }
        if self.sync.notice_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "sync.notice_capacity must be greater than 0".to_string(),
            ));
        }

        if self.session.poll_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "session.poll_interval must be greater than 0".to_string(),
            ));
        }

        if let Err(e) = self.logging.level.parse::<crate::logging::LogLevel>() {
            return Err(ConfigError::ValidationFailed(format!("logging.level: {e}")));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }
}
