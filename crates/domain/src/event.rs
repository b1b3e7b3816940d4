//! Events — immutable records of registry and adapter state changes.
//!
//! Published on the in-process event bus so consumers (automation engine,
//! dashboards, WebSocket bridges) can react without polling the registries.

use serde::{Deserialize, Serialize};

use crate::adapter::ConnectionState;
use crate::entity::EntityState;
use crate::id::{CanonicalId, EventId};
use crate::source::SourceType;
use crate::time::{Timestamp, now};

/// What happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubEventKind {
    EntityRegistered {
        entity_id: CanonicalId,
        source: SourceType,
    },
    EntityUpdated {
        entity_id: CanonicalId,
        old_state: EntityState,
        new_state: EntityState,
    },
    EntityRemoved {
        entity_id: CanonicalId,
        source: SourceType,
    },
    AdapterStateChanged {
        adapter_id: String,
        source: SourceType,
        state: ConnectionState,
    },
    SyncCompleted {
        source: SourceType,
        registered: usize,
        updated: usize,
        removed: usize,
    },
}

/// An event with identity and a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubEvent {
    pub id: EventId,
    pub occurred_at: Timestamp,
    #[serde(flatten)]
    pub kind: HubEventKind,
}

impl HubEvent {
    /// Wrap a [`HubEventKind`] with a fresh id and the current time.
    #[must_use]
    pub fn new(kind: HubEventKind) -> Self {
        Self {
            id: EventId::new(),
            occurred_at: now(),
            kind,
        }
    }
}
