//! Subscriber setup for claimsync binaries and tests.
//!
//! `RUST_LOG` takes precedence over the configured level. Without it, HTTP
//! client internals are capped at `warn`.

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

/// Crates whose debug output drowns ours.
const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// Output settings for [`init_logging_with_config`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub with_timestamp: bool,
    /// Print the emitting module path.
    pub with_target: bool,
    /// One JSON object per line instead of the human-readable format.
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(LogLevel::default())
    }
}

impl LogConfig {
    /// Human-readable output with timestamps and targets at `level`.
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            with_timestamp: true,
            with_target: true,
            json_format: false,
        }
    }

    pub fn with_timestamp(self, enabled: bool) -> Self {
        Self {
            with_timestamp: enabled,
            ..self
        }
    }

    pub fn with_target(self, enabled: bool) -> Self {
        Self {
            with_target: enabled,
            ..self
        }
    }

    pub fn json_format(self, enabled: bool) -> Self {
        Self {
            json_format: enabled,
            ..self
        }
    }

    /// Filter directive used when `RUST_LOG` is unset.
    pub fn directive(&self) -> String {
        let mut directive = self.level.as_str().to_string();
        if self.level < LogLevel::Warn {
            for target in NOISY_TARGETS {
                directive.push_str(&format!(",{target}=warn"));
            }
        }
        directive
    }
}

impl TryFrom<&LoggingConfig> for LogConfig {
    type Error = LoggingError;

    fn try_from(config: &LoggingConfig) -> Result<Self, Self::Error> {
        let level = config.level.parse()?;
        Ok(LogConfig::new(level)
            .with_timestamp(config.with_timestamp)
            .with_target(config.with_target)
            .json_format(config.json_format))
    }
}

/// Install the global subscriber at `info`.
///
/// ```
/// claimsync_core::logging::init_logging().unwrap();
/// tracing::info!("ready");
/// ```
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::default())
}

/// Install the global subscriber. Fails if one is already installed.
///
/// ```
/// use claimsync_core::logging::{init_logging_with_config, LogConfig, LogLevel};
///
/// let config = LogConfig::new(LogLevel::Debug).json_format(true);
/// init_logging_with_config(config).unwrap();
/// assert!(init_logging_with_config(LogConfig::default()).is_err());
/// ```
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.directive()));

    let fmt_layer = match (config.json_format, config.with_timestamp) {
        (true, true) => fmt::layer().with_target(config.with_target).json().boxed(),
        (true, false) => fmt::layer()
            .with_target(config.with_target)
            .json()
            .without_time()
            .boxed(),
        (false, true) => fmt::layer().with_target(config.with_target).boxed(),
        (false, false) => fmt::layer()
            .with_target(config.with_target)
            .without_time()
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_touch_one_field() {
        let config = LogConfig::new(LogLevel::Trace).json_format(true);
        assert_eq!(config.level, LogLevel::Trace);
        assert!(config.json_format);
        assert!(config.with_timestamp && config.with_target);

        let quiet = LogConfig::default().with_timestamp(false).with_target(false);
        assert_eq!(quiet.level, LogLevel::Info);
        assert!(!quiet.with_timestamp && !quiet.with_target && !quiet.json_format);
    }

    #[test]
    fn test_directive_quiets_http_stack() {
        let directive = LogConfig::new(LogLevel::Debug).directive();
        assert!(directive.starts_with("debug,"));
        assert!(directive.contains("reqwest=warn"));
        assert!(directive.contains("hyper=warn"));

        assert_eq!(LogConfig::new(LogLevel::Error).directive(), "error");
    }

    #[test]
    fn test_from_logging_config() {
        let file_config = LoggingConfig {
            level: "WARN".to_string(),
            json_format: true,
            with_timestamp: false,
            with_target: true,
        };
        let config = LogConfig::try_from(&file_config).unwrap();
        assert_eq!(config.level, LogLevel::Warn);
        assert!(config.json_format && !config.with_timestamp);

        let bad = LoggingConfig {
            level: "loud".to_string(),
            ..file_config
        };
        assert!(matches!(
            LogConfig::try_from(&bad),
            Err(LoggingError::UnknownLevel(_))
        ));
    }
}
