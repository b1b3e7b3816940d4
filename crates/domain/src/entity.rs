//! Entity — the canonical, source-independent representation of a device.
//!
//! Exactly one canonical [`Entity`] exists per `(source, source_entity_id)`
//! pair. Its [`CanonicalId`] never changes for the lifetime of the entity,
//! and its `version` strictly increases on every applied write.
//!
//! Adapters never construct [`Entity`] directly — they report a
//! [`RawEntity`], which the entity registry canonicalizes on upsert.

mod attribute_value;
mod state;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use attribute_value::AttributeValue;
pub use state::EntityState;

use crate::error::{HubError, ValidationError};
use crate::id::{CanonicalId, RoomId};
use crate::source::SourceType;
use crate::time::{Timestamp, now};

/// Ordered attribute map attached to entities.
pub type Attributes = IndexMap<String, AttributeValue>;

/// Semantic kind of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainType {
    Light,
    Switch,
    Sensor,
    BinarySensor,
    Cover,
    Climate,
    Camera,
    Lock,
    Device,
    Other,
}

impl DomainType {
    /// Stable string form, matching the `"light"` / `"switch"` prefixes
    /// used by hub-style entity ids.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Switch => "switch",
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
            Self::Cover => "cover",
            Self::Climate => "climate",
            Self::Camera => "camera",
            Self::Lock => "lock",
            Self::Device => "device",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainType {
    type Err = std::convert::Infallible;

    /// Unknown domains map to [`DomainType::Other`] rather than failing —
    /// sources routinely grow new domains.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "light" => Self::Light,
            "switch" => Self::Switch,
            "sensor" => Self::Sensor,
            "binary_sensor" => Self::BinarySensor,
            "cover" => Self::Cover,
            "climate" => Self::Climate,
            "camera" => Self::Camera,
            "lock" => Self::Lock,
            "device" => Self::Device,
            _ => Self::Other,
        })
    }
}

/// An action an entity supports. Used to validate control requests before
/// they are routed to the owning adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    TurnOn,
    TurnOff,
    Toggle,
    SetBrightness,
    SetColor,
    SetPosition,
    SetTemperature,
    Lock,
    Unlock,
}

impl Capability {
    /// The action name as adapters and consumers spell it.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
            Self::Toggle => "toggle",
            Self::SetBrightness => "set_brightness",
            Self::SetColor => "set_color",
            Self::SetPosition => "set_position",
            Self::SetTemperature => "set_temperature",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown action name.
#[derive(Debug, thiserror::Error)]
#[error("unknown action name: {0}")]
pub struct UnknownAction(String);

impl FromStr for Capability {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::TurnOn,
            Self::TurnOff,
            Self::Toggle,
            Self::SetBrightness,
            Self::SetColor,
            Self::SetPosition,
            Self::SetTemperature,
            Self::Lock,
            Self::Unlock,
        ]
        .into_iter()
        .find(|capability| capability.as_str() == s)
        .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// The canonical, merged representation of a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Stable opaque identifier, minted on first registration.
    pub id: CanonicalId,
    /// Which adapter produced the authoritative view.
    pub source: SourceType,
    /// The identifier the owning adapter uses for this entity.
    pub source_entity_id: String,
    pub domain: DomainType,
    pub friendly_name: String,
    pub state: EntityState,
    pub attributes: Attributes,
    pub capabilities: BTreeSet<Capability>,
    /// Adapter-reported reachability.
    pub available: bool,
    /// User-assigned room, owned by an external room service.
    pub room_id: Option<RoomId>,
    pub last_updated: Timestamp,
    /// Bumped on every accepted write; never decreases.
    pub version: u64,
}

impl Entity {
    /// Canonicalize a [`RawEntity`] reported by `source`, minting a fresh
    /// [`CanonicalId`] and starting the version counter at 1.
    #[must_use]
    pub fn from_raw(source: SourceType, raw: RawEntity) -> Self {
        Self {
            id: CanonicalId::new(),
            source,
            source_entity_id: raw.source_entity_id,
            domain: raw.domain,
            friendly_name: raw.friendly_name,
            state: raw.state,
            attributes: raw.attributes,
            capabilities: raw.capabilities,
            available: raw.available,
            room_id: raw.room_hint,
            last_updated: raw.reported_at,
            version: 1,
        }
    }

    /// Whether the entity advertises the given capability.
    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when `source_entity_id` or
    /// `friendly_name` is empty.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.source_entity_id.is_empty() {
            return Err(ValidationError::EmptySourceEntityId.into());
        }
        if self.friendly_name.is_empty() {
            return Err(ValidationError::EmptyFriendlyName.into());
        }
        Ok(())
    }

    /// Whether the entity passes the given filter.
    #[must_use]
    pub fn matches(&self, filter: &EntityFilter) -> bool {
        if let Some(domain) = filter.domain {
            if self.domain != domain {
                return false;
            }
        }
        if let Some(source) = filter.source {
            if self.source != source {
                return false;
            }
        }
        if let Some(room_id) = filter.room_id {
            if self.room_id != Some(room_id) {
                return false;
            }
        }
        if filter.available_only && !self.available {
            return false;
        }
        true
    }
}

/// Read filter for registry queries. An empty filter matches everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityFilter {
    pub domain: Option<DomainType>,
    pub source: Option<SourceType>,
    pub room_id: Option<RoomId>,
    pub available_only: bool,
}

impl EntityFilter {
    #[must_use]
    pub fn domain(mut self, domain: DomainType) -> Self {
        self.domain = Some(domain);
        self
    }

    #[must_use]
    pub fn source(mut self, source: SourceType) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    #[must_use]
    pub fn available_only(mut self) -> Self {
        self.available_only = true;
        self
    }
}

/// An entity as reported by an adapter, before canonicalization.
///
/// `reported_at` is the source's own notion of when the data was observed;
/// the conflict resolver compares it against the stored `last_updated` to
/// decide field-level freshness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntity {
    pub source_entity_id: String,
    pub domain: DomainType,
    pub friendly_name: String,
    pub state: EntityState,
    pub attributes: Attributes,
    pub capabilities: BTreeSet<Capability>,
    pub available: bool,
    pub room_hint: Option<RoomId>,
    pub reported_at: Timestamp,
}

impl RawEntity {
    /// Create a builder for constructing a [`RawEntity`].
    #[must_use]
    pub fn builder() -> RawEntityBuilder {
        RawEntityBuilder::default()
    }
}

/// Step-by-step builder for [`RawEntity`].
#[derive(Debug, Default)]
pub struct RawEntityBuilder {
    source_entity_id: Option<String>,
    domain: Option<DomainType>,
    friendly_name: Option<String>,
    state: Option<EntityState>,
    attributes: Attributes,
    capabilities: BTreeSet<Capability>,
    available: Option<bool>,
    room_hint: Option<RoomId>,
    reported_at: Option<Timestamp>,
}

impl RawEntityBuilder {
    #[must_use]
    pub fn source_entity_id(mut self, id: impl Into<String>) -> Self {
        self.source_entity_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: DomainType) -> Self {
        self.domain = Some(domain);
        self
    }

    #[must_use]
    pub fn friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn state(mut self, state: EntityState) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    #[must_use]
    pub fn capabilities(mut self, capabilities: BTreeSet<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn available(mut self, available: bool) -> Self {
        self.available = Some(available);
        self
    }

    #[must_use]
    pub fn room_hint(mut self, room_id: RoomId) -> Self {
        self.room_hint = Some(room_id);
        self
    }

    #[must_use]
    pub fn reported_at(mut self, ts: Timestamp) -> Self {
        self.reported_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return a [`RawEntity`].
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if `source_entity_id` or
    /// `friendly_name` is missing or empty.
    pub fn build(self) -> Result<RawEntity, HubError> {
        let raw = RawEntity {
            source_entity_id: self.source_entity_id.unwrap_or_default(),
            domain: self.domain.unwrap_or(DomainType::Other),
            friendly_name: self.friendly_name.unwrap_or_default(),
            state: self.state.unwrap_or_default(),
            attributes: self.attributes,
            capabilities: self.capabilities,
            available: self.available.unwrap_or(true),
            room_hint: self.room_hint,
            reported_at: self.reported_at.unwrap_or_else(now),
        };
        if raw.source_entity_id.is_empty() {
            return Err(ValidationError::EmptySourceEntityId.into());
        }
        if raw.friendly_name.is_empty() {
            return Err(ValidationError::EmptyFriendlyName.into());
        }
        Ok(raw)
    }
}
