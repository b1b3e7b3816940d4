//! Entity state — the current operational state of an entity.
//!
//! States are domain-dependent free-form strings on the wire; the common
//! values get their own variants and everything else is preserved verbatim
//! in [`EntityState::Custom`].

use serde::{Deserialize, Serialize};

/// Operational state of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityState {
    On,
    Off,
    Open,
    Closed,
    #[default]
    Unknown,
    /// Any other domain-dependent state (e.g. `"heat"`, `"23.5"`).
    Custom(String),
}

impl EntityState {
    /// Whether the state carries information (anything but [`Unknown`](Self::Unknown)).
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// String form of the state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
            Self::Custom(value) => value,
        }
    }
}

impl From<&str> for EntityState {
    fn from(value: &str) -> Self {
        match value {
            "on" => Self::On,
            "off" => Self::Off,
            "open" => Self::Open,
            "closed" => Self::Closed,
            "" | "unknown" => Self::Unknown,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for EntityState {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<EntityState> for String {
    fn from(state: EntityState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
