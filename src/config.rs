//! Crate configuration.
//!
//! Small env-driven config structs with builder-style overrides. The
//! store URL is the only required setting; everything else has a default
//! suitable for a single-device deployment.

use std::time::Duration;

use serde::Deserialize;

/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "DOCNUM_LOG";
/// Environment variable for the sequence store base URL.
pub const STORE_URL_ENV_VAR: &str = "DOCNUM_STORE_URL";
/// Environment variable for the store request timeout in seconds.
pub const STORE_TIMEOUT_ENV_VAR: &str = "DOCNUM_STORE_TIMEOUT_SECS";
/// Environment variable for the device identifier sent as `reserved_by`.
pub const DEVICE_ID_ENV_VAR: &str = "DOCNUM_DEVICE_ID";
/// Environment variable for the render settle delay in milliseconds.
pub const SETTLE_MS_ENV_VAR: &str = "DOCNUM_SETTLE_MS";
/// Environment variable for the fallback cache file path.
pub const CACHE_PATH_ENV_VAR: &str = "DOCNUM_CACHE_PATH";

/// Default store request timeout.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);
/// Default delay letting the rendered document reflect a fresh number
/// before the consuming action runs.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(80);

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required setting has no value.
    #[error("missing required configuration: {0}")]
    Missing(&'static str),
}

/// Sequence store endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store base URL, e.g. `https://numbers.example.com`.
    pub base_url: String,
    /// Request timeout per RPC.
    pub timeout: Duration,
    /// Path of the reserve operation, relative to `base_url`.
    pub reserve_path: String,
    /// Path of the confirm operation.
    pub confirm_path: String,
    /// Path of the release operation.
    pub release_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: DEFAULT_STORE_TIMEOUT,
            reserve_path: "api/reserve".to_string(),
            confirm_path: "api/confirm".to_string(),
            release_path: "api/release".to_string(),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    ///
    /// - `DOCNUM_STORE_URL`: required store base URL
    /// - `DOCNUM_STORE_TIMEOUT_SECS`: optional timeout (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            std::env::var(STORE_URL_ENV_VAR).map_err(|_| ConfigError::Missing(STORE_URL_ENV_VAR))?;

        let timeout = std::env::var(STORE_TIMEOUT_ENV_VAR)
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_STORE_TIMEOUT);

        Ok(Self {
            base_url,
            timeout,
            ..Self::default()
        })
    }

    /// Set the store base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Orchestrator flow configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Identifier sent as `reserved_by` on every reservation.
    pub reserved_by: Option<String>,
    /// How long to wait after a reserve before delivering, so the
    /// rendered document reflects the assigned number.
    pub settle_delay: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            reserved_by: None,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl FlowConfig {
    /// Create config from environment variables.
    ///
    /// - `DOCNUM_DEVICE_ID`: optional device identifier
    /// - `DOCNUM_SETTLE_MS`: optional settle delay in milliseconds (default: 80)
    pub fn from_env() -> Self {
        let reserved_by = std::env::var(DEVICE_ID_ENV_VAR).ok();

        let settle_delay = std::env::var(SETTLE_MS_ENV_VAR)
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SETTLE_DELAY);

        Self {
            reserved_by,
            settle_delay,
        }
    }

    /// Set the device identifier.
    pub fn with_reserved_by(mut self, reserved_by: impl Into<String>) -> Self {
        self.reserved_by = Some(reserved_by.into());
        self
    }

    /// Set the settle delay.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_config_defaults() {
        let config = StoreConfig::default();
        assert!(config.base_url.is_empty());
        assert_eq!(config.timeout, DEFAULT_STORE_TIMEOUT);
        assert_eq!(config.reserve_path, "api/reserve");
        assert_eq!(config.confirm_path, "api/confirm");
        assert_eq!(config.release_path, "api/release");
    }

    #[test]
    fn store_config_builder() {
        let config = StoreConfig::default()
            .with_base_url("https://numbers.example.com")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.base_url, "https://numbers.example.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn flow_config_defaults_and_builder() {
        let config = FlowConfig::default();
        assert!(config.reserved_by.is_none());
        assert_eq!(config.settle_delay, DEFAULT_SETTLE_DELAY);

        let config = config
            .with_reserved_by("device-A")
            .with_settle_delay(Duration::from_millis(5));
        assert_eq!(config.reserved_by.as_deref(), Some("device-A"));
        assert_eq!(config.settle_delay, Duration::from_millis(5));
    }
}
