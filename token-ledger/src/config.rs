//! Configuration for the ledger host
//!
//! Token metadata is fixed at deployment and not configurable; this only
//! tunes the runtime around it.

use serde::{Deserialize, Serialize};

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Actor mailbox capacity (pending requests before callers wait)
    pub mailbox_capacity: usize,

    /// Broadcast buffer for live notification subscribers
    pub notification_capacity: usize,

    /// Logging configuration
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "token-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            mailbox_capacity: 1000,
            notification_capacity: 1024,
            log: LogConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(name) = std::env::var("TOKEN_LEDGER_SERVICE_NAME") {
            config.service_name = name;
        }

        if let Ok(capacity) = std::env::var("TOKEN_LEDGER_MAILBOX_CAPACITY") {
            config.mailbox_capacity = parse_capacity("TOKEN_LEDGER_MAILBOX_CAPACITY", &capacity)?;
        }

        if let Ok(capacity) = std::env::var("TOKEN_LEDGER_NOTIFICATION_CAPACITY") {
            config.notification_capacity =
                parse_capacity("TOKEN_LEDGER_NOTIFICATION_CAPACITY", &capacity)?;
        }

        if let Ok(level) = std::env::var("TOKEN_LEDGER_LOG_LEVEL") {
            config.log.level = level;
        }

        if let Ok(json) = std::env::var("TOKEN_LEDGER_LOG_JSON") {
            config.log.json = matches!(json.as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the runtime cannot use
    pub fn validate(&self) -> crate::Result<()> {
        if self.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "mailbox_capacity must be greater than zero".to_string(),
            ));
        }
        if self.notification_capacity == 0 {
            return Err(crate::Error::Config(
                "notification_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_capacity(var: &str, value: &str) -> crate::Result<usize> {
    value
        .parse()
        .map_err(|e| crate::Error::Config(format!("{} is not a valid capacity: {}", var, e)))
}
