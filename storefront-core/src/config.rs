use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::error::StorefrontError;

/// Default path of the credential refresh endpoint.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Deployment the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    /// Pre-production backend.
    Staging,
    /// Live backend.
    Production,
}

/// Connection settings for the [`crate::RequestGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Base URL of the commerce backend, without a trailing slash.
    pub base_url: String,
    /// Per-attempt timeout of ordinary requests.
    #[serde(with = "millis", default = "default_request_timeout")]
    pub request_timeout: Duration,
    /// Upper bound for one shared credential refresh.
    #[serde(with = "millis", default = "default_refresh_timeout")]
    pub refresh_timeout: Duration,
    /// Transport-level retries for connect/timeout failures and 5xx responses.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Path of the refresh endpoint. Failures on this path never trigger a refresh.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
}

impl ClientConfig {
    /// Builds a config with defaults for the given base URL.
    ///
    /// # Errors
    /// Returns an error if the URL is not HTTPS (loopback hosts are allowed for local development).
    pub fn new(base_url: &str) -> Result<Self, StorefrontError> {
        let config = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: default_request_timeout(),
            refresh_timeout: default_refresh_timeout(),
            max_retries: default_max_retries(),
            refresh_path: default_refresh_path(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Default settings for a known deployment.
    #[must_use]
    pub fn from_environment(environment: &Environment) -> Self {
        let base_url = match environment {
            Environment::Staging => "https://api.stage.storefront.dev",
            Environment::Production => "https://api.storefront.dev",
        };
        Self {
            base_url: base_url.to_string(),
            request_timeout: default_request_timeout(),
            refresh_timeout: default_refresh_timeout(),
            max_retries: default_max_retries(),
            refresh_path: default_refresh_path(),
        }
    }

    /// Parses a JSON config. Durations are expressed in milliseconds.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or the base URL is not acceptable.
    pub fn from_json(json: &str) -> Result<Self, StorefrontError> {
        let mut config: Self =
            serde_json::from_str(json).map_err(|e| StorefrontError::InvalidInput {
                attribute: "config".to_string(),
                reason: format!("invalid config json: {e}"),
            })?;
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        config.validate()?;
        Ok(config)
    }

    /// Absolute URL for a backend path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    fn validate(&self) -> Result<(), StorefrontError> {
        if self.base_url.starts_with("https://") || is_loopback(&self.base_url) {
            return Ok(());
        }
        Err(StorefrontError::InvalidInput {
            attribute: "base_url".to_string(),
            reason: "must use https".to_string(),
        })
    }
}

fn is_loopback(url: &str) -> bool {
    ["http://127.0.0.1", "http://localhost", "http://[::1]"]
        .iter()
        .any(|prefix| url.starts_with(prefix))
}

/// Settings of the [`crate::PaymentStatusPoller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between two verification ticks.
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
        }
    }
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

const fn default_refresh_timeout() -> Duration {
    Duration::from_secs(10)
}

const fn default_max_retries() -> u32 {
    3 // total attempts = 4
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_environment_from_str() {
        assert_eq!(Environment::from_str("staging").unwrap(), Environment::Staging);
        assert_eq!(
            Environment::from_str("production").unwrap(),
            Environment::Production
        );
        assert!(Environment::from_str("dev").is_err());
    }

    #[test]
    fn test_from_json_applies_defaults() {
        let config = ClientConfig::from_json(r#"{"baseUrl":"https://shop.example/"}"#).unwrap();
        assert_eq!(config.base_url, "https://shop.example");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.refresh_timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.refresh_path, "/auth/refresh");
    }

    #[test]
    fn test_from_json_overrides() {
        let config = ClientConfig::from_json(
            r#"{"baseUrl":"https://shop.example","refreshTimeout":250,"maxRetries":0}"#,
        )
        .unwrap();
        assert_eq!(config.refresh_timeout, Duration::from_millis(250));
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_rejects_plain_http() {
        assert!(ClientConfig::new("http://shop.example").is_err());
        assert!(ClientConfig::new("http://127.0.0.1:1234").is_ok());
        assert!(ClientConfig::from_json(r#"{"baseUrl":"ftp://x"}"#).is_err());
    }

    #[test]
    fn test_url_joining() {
        let config = ClientConfig::new("https://shop.example").unwrap();
        assert_eq!(config.url("/orders"), "https://shop.example/orders");
        assert_eq!(config.url("orders"), "https://shop.example/orders");
    }

    #[test]
    fn test_poller_default_interval() {
        assert_eq!(PollerConfig::default().interval, Duration::from_secs(3));
    }
}
