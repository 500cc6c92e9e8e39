//! Relay configuration loaded from the environment.
//!
//! Variables are read with the `SEGMENT_IO_` prefix, after an optional
//! `.env` file has been loaded.
//!
//! # Example
//!
//! ```ignore
//! use forum_relay_core::config::{load_dotenv, RelayConfig};
//!
//! load_dotenv();
//! // SEGMENT_IO_ENABLED=true SEGMENT_IO_WRITE_KEY=...
//! let config = RelayConfig::from_env()?;
//! ```

use crate::error::{RelayError, Result};
use crate::relay::FailurePolicy;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Prefix for relay environment variables.
pub const ENV_PREFIX: &str = "SEGMENT_IO";

/// Default ingestion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.segment.io";

/// Relay settings.
///
/// | variable                     | default                  |
/// |------------------------------|--------------------------|
/// | `SEGMENT_IO_ENABLED`         | `false`                  |
/// | `SEGMENT_IO_WRITE_KEY`       | empty                    |
/// | `SEGMENT_IO_ENDPOINT`        | `https://api.segment.io` |
/// | `SEGMENT_IO_TIMEOUT_SECS`    | `10`                     |
/// | `SEGMENT_IO_FAILURE_POLICY`  | `log_and_swallow`        |
#[derive(Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub write_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl RelayConfig {
    /// Enabled configuration for a write key with defaults elsewhere.
    pub fn new(write_key: impl Into<String>) -> Self {
        Self {
            enabled: true,
            write_key: write_key.into(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Load from `SEGMENT_IO_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::from_env_prefixed(ENV_PREFIX)
    }

    /// Load from `{prefix}_*` variables.
    ///
    /// A zero timeout is rejected; the HTTP client would fail every call.
    pub fn from_env_prefixed(prefix: &str) -> Result<Self> {
        let config = envy::prefixed(format!("{}_", prefix))
            .from_env::<Self>()
            .map_err(|e| RelayError::Config(e.to_string()))?;

        if config.timeout_secs == 0 {
            return Err(RelayError::Config(format!(
                "{}_TIMEOUT_SECS must be greater than zero",
                prefix
            )));
        }
        Ok(config)
    }

    /// Override the endpoint base URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the failure policy.
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Override the request timeout.
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Write key with everything but the last four characters hidden.
    pub fn masked_write_key(&self) -> String {
        let chars: Vec<char> = self.write_key.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let visible: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), visible)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ..Self::new("")
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("enabled", &self.enabled)
            .field("write_key", &self.masked_write_key())
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("failure_policy", &self.failure_policy)
            .finish()
    }
}

/// Deployment profile, from `FORUM_RELAY_ENV`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Custom(String),
}

impl Environment {
    /// Detect the current environment.
    ///
    /// `production`/`prod` and `development`/`dev` are recognised; unset
    /// means development.
    pub fn current() -> Self {
        match std::env::var("FORUM_RELAY_ENV").as_deref() {
            Ok("production") | Ok("prod") => Self::Production,
            Ok("development") | Ok("dev") => Self::Development,
            Ok(other) => Self::Custom(other.to_string()),
            Err(_) => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Default log filter for the environment.
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Self::Development => "debug",
            Self::Production | Self::Custom(_) => "info",
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load variables from `.env` in the working directory, if present.
///
/// Existing variables are not overridden.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Load variables from a specific file, if present.
pub fn load_dotenv_from<P: AsRef<std::path::Path>>(path: P) {
    let _ = dotenvy::from_path(path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 5] = ["ENABLED", "WRITE_KEY", "ENDPOINT", "TIMEOUT_SECS", "FAILURE_POLICY"];

    fn clear(prefix: &str) {
        for var in VARS {
            std::env::remove_var(format!("{}_{}", prefix, var));
        }
    }

    #[test]
    #[serial]
    fn defaults_when_unset() {
        clear("RELAY_CFG_DEFAULTS");
        let config = RelayConfig::from_env_prefixed("RELAY_CFG_DEFAULTS").unwrap();
        assert!(!config.enabled);
        assert_eq!(config.write_key, "");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.failure_policy, FailurePolicy::LogAndSwallow);
    }

    #[test]
    #[serial]
    fn reads_prefixed_vars() {
        let prefix = "RELAY_CFG_FULL";
        std::env::set_var(format!("{prefix}_ENABLED"), "true");
        std::env::set_var(format!("{prefix}_WRITE_KEY"), "wk_abcdef");
        std::env::set_var(format!("{prefix}_ENDPOINT"), "http://127.0.0.1:9999");
        std::env::set_var(format!("{prefix}_TIMEOUT_SECS"), "3");
        std::env::set_var(format!("{prefix}_FAILURE_POLICY"), "propagate");

        let config = RelayConfig::from_env_prefixed(prefix).unwrap();
        clear(prefix);

        assert!(config.enabled);
        assert_eq!(config.write_key, "wk_abcdef");
        assert_eq!(config.endpoint, "http://127.0.0.1:9999");
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.failure_policy, FailurePolicy::Propagate);
    }

    #[test]
    #[serial]
    fn rejects_bad_values() {
        let prefix = "RELAY_CFG_BAD";
        std::env::set_var(format!("{prefix}_TIMEOUT_SECS"), "soon");
        let result = RelayConfig::from_env_prefixed(prefix);
        clear(prefix);
        assert!(matches!(result, Err(RelayError::Config(_))));
    }

    #[test]
    #[serial]
    fn rejects_zero_timeout() {
        let prefix = "RELAY_CFG_ZERO";
        std::env::set_var(format!("{prefix}_TIMEOUT_SECS"), "0");
        let result = RelayConfig::from_env_prefixed(prefix);
        clear(prefix);
        match result {
            Err(RelayError::Config(msg)) => assert!(msg.contains("RELAY_CFG_ZERO_TIMEOUT_SECS")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn write_key_is_masked_in_debug() {
        let config = RelayConfig::new("secret_key_1234");
        assert_eq!(config.masked_write_key(), "***********1234");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret_key"));
        assert_eq!(RelayConfig::new("abc").masked_write_key(), "***");
    }

    #[test]
    #[serial]
    fn environment_detection() {
        std::env::remove_var("FORUM_RELAY_ENV");
        assert_eq!(Environment::current(), Environment::Development);

        std::env::set_var("FORUM_RELAY_ENV", "prod");
        assert!(Environment::current().is_production());
        assert_eq!(Environment::current().default_log_level(), "info");

        std::env::set_var("FORUM_RELAY_ENV", "staging");
        assert_eq!(Environment::current().as_str(), "staging");

        std::env::remove_var("FORUM_RELAY_ENV");
    }
}
