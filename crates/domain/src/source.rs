//! Source — which adapter/protocol an entity or action originates from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The external source a canonical entity was reported by.
///
/// Every adapter owns exactly one source type; the pair
/// `(SourceType, source_entity_id)` identifies a device within that source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// The primary smart-home hub (most comprehensive source).
    Hub,
    /// The router/network API (presence, network devices).
    Router,
    /// UPS monitoring (NUT protocol).
    Ups,
    /// Bluetooth peripherals.
    Bluetooth,
    /// Simulated devices for demo and testing.
    Virtual,
}

impl SourceType {
    /// All known source types.
    pub const ALL: [Self; 5] = [
        Self::Hub,
        Self::Router,
        Self::Ups,
        Self::Bluetooth,
        Self::Virtual,
    ];

    /// Stable string form used in logs, config, and error payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hub => "hub",
            Self::Router => "router",
            Self::Ups => "ups",
            Self::Bluetooth => "bluetooth",
            Self::Virtual => "virtual",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown source name.
#[derive(Debug, thiserror::Error)]
#[error("unknown source type: {0}")]
pub struct UnknownSource(String);

impl FromStr for SourceType {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| UnknownSource(s.to_string()))
    }
}
