//! Hub adapter configuration.

use std::time::Duration;

use serde::Deserialize;

/// Connection settings for the smart-home hub API.
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Base URL of the hub (e.g. `http://homeassistant.local:8123`).
    pub base_url: String,
    /// Long-lived access token sent as a bearer header.
    pub token: String,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout", with = "seconds")]
    pub request_timeout: Duration,
}

impl HubConfig {
    /// Minimal configuration with the default request timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
