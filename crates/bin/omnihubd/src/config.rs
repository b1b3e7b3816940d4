//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `omnihub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::HashMap;

use serde::Deserialize;

use omnihub_domain::source::SourceType;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Sync scheduler settings.
    pub sync: SyncSection,
    /// Smart-home hub source.
    pub hub: HubSection,
    /// UPS monitoring source.
    pub ups: UpsSection,
    /// Simulated demo source.
    #[serde(rename = "virtual")]
    pub virtual_devices: VirtualSection,
    /// Source priority overrides (`hub = 1`, `ups = 3`, …).
    pub priority: HashMap<String, u8>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Sync scheduler configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Periodic sync interval in seconds. Zero disables periodic sync.
    pub interval_secs: u64,
    /// Deadline for one full enumeration, in seconds.
    pub timeout_secs: u64,
    /// Consecutive absent syncs before an entity is removed.
    pub removal_threshold: u32,
}

/// Smart-home hub source configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HubSection {
    pub enabled: bool,
    pub base_url: String,
    pub token: String,
}

/// UPS source configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UpsSection {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub ups_names: Vec<String>,
}

/// Virtual source configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VirtualSection {
    pub enabled: bool,
}

impl Config {
    /// Load configuration from `omnihub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or a
    /// priority override names an unknown source.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("omnihub.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("OMNIHUB_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("OMNIHUB_HUB_URL") {
            self.hub.enabled = true;
            self.hub.base_url = val;
        }
        if let Ok(val) = std::env::var("OMNIHUB_HUB_TOKEN") {
            self.hub.token = val;
        }
        if let Ok(val) = std::env::var("OMNIHUB_UPS_HOST") {
            self.ups.enabled = true;
            self.ups.host = val;
        }
        if let Ok(val) = std::env::var("OMNIHUB_SYNC_INTERVAL") {
            if let Ok(secs) = val.parse() {
                self.sync.interval_secs = secs;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for source in self.priority.keys() {
            if source.parse::<SourceType>().is_err() {
                return Err(ConfigError::Validation(format!(
                    "unknown source in [priority]: {source}"
                )));
            }
        }
        if self.hub.enabled && self.hub.base_url.is_empty() {
            return Err(ConfigError::Validation(
                "hub enabled but base_url is empty".to_string(),
            ));
        }
        if self.ups.enabled && self.ups.host.is_empty() {
            return Err(ConfigError::Validation(
                "ups enabled but host is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Priority overrides keyed by parsed source type.
    #[must_use]
    pub fn priority_overrides(&self) -> Vec<(SourceType, u8)> {
        self.priority
            .iter()
            .filter_map(|(source, rank)| source.parse().ok().map(|source| (source, *rank)))
            .collect()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "omnihubd=info,omnihub=info".to_string(),
        }
    }
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            timeout_secs: 30,
            removal_threshold: 3,
        }
    }
}

impl Default for UpsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: 3493,
            ups_names: Vec::new(),
        }
    }
}

impl Default for VirtualSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.sync.interval_secs, 300);
        assert_eq!(config.sync.removal_threshold, 3);
        assert!(config.virtual_devices.enabled);
        assert!(!config.hub.enabled);
        assert!(!config.ups.enabled);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.sync.timeout_secs, 30);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = r#"
            [logging]
            filter = "debug"

            [sync]
            interval_secs = 60
            timeout_secs = 10
            removal_threshold = 2

            [hub]
            enabled = true
            base_url = "http://hub.local:8123"
            token = "secret"

            [ups]
            enabled = true
            host = "nut.local"
            port = 3493
            ups_names = ["main"]

            [virtual]
            enabled = false

            [priority]
            hub = 1
            ups = 2
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.sync.interval_secs, 60);
        assert!(config.hub.enabled);
        assert_eq!(config.hub.base_url, "http://hub.local:8123");
        assert_eq!(config.ups.ups_names, vec!["main".to_string()]);
        assert!(!config.virtual_devices.enabled);
        assert_eq!(config.priority["ups"], 2);
        config.validate().unwrap();
    }

    #[test]
    fn should_reject_unknown_priority_source() {
        let config: Config = toml::from_str("[priority]\ntoaster = 1").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_enabled_hub_without_url() {
        let config: Config = toml::from_str("[hub]\nenabled = true").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_parse_priority_overrides() {
        let config: Config = toml::from_str("[priority]\nups = 2").unwrap();
        let overrides = config.priority_overrides();
        assert_eq!(overrides, vec![(SourceType::Ups, 2)]);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.sync.interval_secs, 300);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
