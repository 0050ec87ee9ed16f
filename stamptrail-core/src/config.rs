//! Client configuration supplied by the embedding environment.

use std::time::Duration;

use crate::{Result, StampTrailError};

/// Environment variable carrying the backend gateway base URL.
pub const ENV_API_BASE_URL: &str = "STAMPTRAIL_API_BASE_URL";
/// Environment variable carrying the host-platform application id.
pub const ENV_APP_ID: &str = "STAMPTRAIL_APP_ID";

/// Runtime configuration for the stamp-rally client.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Backend gateway base URL, without trailing slash.
    pub api_base_url: String,
    /// Application id registered with the host messaging platform.
    pub app_id: String,
    /// Bound on a single geolocation fix.
    pub geo_fix_timeout: Duration,
    /// Interval between host-SDK readiness checks.
    pub sdk_wait_interval: Duration,
    /// Readiness checks before giving up on the host SDK.
    pub sdk_wait_attempts: u32,
    /// Interval between award polls after a photo upload.
    pub award_poll_interval: Duration,
    /// Award polls before reporting an inconclusive outcome.
    pub award_poll_attempts: u32,
}

impl AppConfig {
    /// Build a configuration from explicit values, applying the default
    /// timing parameters.
    pub fn new(api_base_url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            geo_fix_timeout: Duration::from_secs(10),
            sdk_wait_interval: Duration::from_millis(100),
            sdk_wait_attempts: 20,
            award_poll_interval: Duration::from_secs(2),
            award_poll_attempts: 10,
        }
    }

    /// Load configuration from the process environment.
    ///
    /// Both the base URL and the application id are required; a missing
    /// value is a fatal configuration error naming the variable, never a
    /// silent fallback.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base_url = require(&lookup, ENV_API_BASE_URL)?;
        let app_id = require(&lookup, ENV_APP_ID)?;
        Ok(Self::new(api_base_url, app_id))
    }
}

fn require(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(StampTrailError::Config(format!("{} is not set", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn loads_required_values() {
        let env = vars(&[
            (ENV_API_BASE_URL, "https://api.example.com/dev/"),
            (ENV_APP_ID, "2008407212-wpMNWMbB"),
        ]);
        let config = AppConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.api_base_url, "https://api.example.com/dev");
        assert_eq!(config.app_id, "2008407212-wpMNWMbB");
        assert_eq!(config.award_poll_attempts, 10);
    }

    #[test]
    fn missing_base_url_is_fatal() {
        let env = vars(&[(ENV_APP_ID, "app")]);
        let err = AppConfig::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        match err {
            StampTrailError::Config(msg) => assert!(msg.contains(ENV_API_BASE_URL)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_app_id_is_fatal() {
        let env = vars(&[(ENV_API_BASE_URL, "https://api.example.com"), (ENV_APP_ID, "  ")]);
        assert!(AppConfig::from_lookup(|k| env.get(k).cloned()).is_err());
    }
}
