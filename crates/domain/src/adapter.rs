//! Adapter lifecycle records — connection state and health snapshots.
//!
//! These are value types mutated only by the adapter registry in response
//! to connect/disconnect calls and adapter-reported health.

use serde::{Deserialize, Serialize};

use crate::source::SourceType;
use crate::time::Timestamp;

/// Connection state of a registered adapter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// The last connect attempt failed; the message is kept for diagnosis.
    Error,
}

/// Opaque diagnostic snapshot reported by an adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthInfo {
    pub healthy: bool,
    pub last_check: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl HealthInfo {
    /// A healthy snapshot with no issues.
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            last_check: Some(crate::time::now()),
            issues: Vec::new(),
            details: serde_json::Map::new(),
        }
    }

    /// An unhealthy snapshot carrying the given issues.
    #[must_use]
    pub fn unhealthy(issues: Vec<String>) -> Self {
        Self {
            healthy: false,
            last_check: Some(crate::time::now()),
            issues,
            details: serde_json::Map::new(),
        }
    }
}

/// Registration record kept by the adapter registry for each adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterRecord {
    pub adapter_id: String,
    pub source: SourceType,
    /// Adapter build/protocol version string.
    pub version: String,
    pub connection_state: ConnectionState,
    pub health: Option<HealthInfo>,
    pub connected_at: Option<Timestamp>,
    pub disconnected_at: Option<Timestamp>,
    /// Message of the last failed connect, if any.
    pub last_error: Option<String>,
}

impl AdapterRecord {
    /// Fresh record for a newly registered adapter.
    #[must_use]
    pub fn new(adapter_id: impl Into<String>, source: SourceType, version: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            source,
            version: version.into(),
            connection_state: ConnectionState::Disconnected,
            health: None,
            connected_at: None,
            disconnected_at: None,
            last_error: None,
        }
    }
}
