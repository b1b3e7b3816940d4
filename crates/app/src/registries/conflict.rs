//! Conflict resolution — merging duplicate reports of one canonical entity.
//!
//! The merge is field-level and priority-aware rather than whole-record
//! last-write-wins:
//!
//! - a strictly higher-precedence source wins outright (every field except
//!   the user-assigned room),
//! - an equal-precedence source applies only fields that are present and
//!   strictly newer than the stored record,
//! - a lower-precedence source contributes attributes and availability,
//!   never authoritative state.
//!
//! `version` bumps only when an observable field actually changed, so
//! repeated identical reports leave the record untouched.

use std::sync::Arc;

use omnihub_domain::entity::{DomainType, Entity, RawEntity};
use omnihub_domain::source::SourceType;

use super::priority::SourcePriorityManager;

/// Outcome of a merge.
#[derive(Debug)]
pub enum Resolution {
    /// The merged record differs from the stored one; `version` advanced.
    Changed(Entity),
    /// The incoming report carried nothing new.
    Unchanged,
}

/// Merges an incoming source report into a stored canonical entity.
pub struct ConflictResolver {
    priority: Arc<SourcePriorityManager>,
}

impl ConflictResolver {
    #[must_use]
    pub fn new(priority: Arc<SourcePriorityManager>) -> Self {
        Self { priority }
    }

    /// Merge `incoming` (reported by `source`) into `existing`.
    ///
    /// The caller must already believe both describe the same canonical
    /// entity; this function only decides which fields survive.
    #[must_use]
    pub fn resolve(
        &self,
        existing: &Entity,
        source: SourceType,
        incoming: &RawEntity,
    ) -> Resolution {
        let merged = if self.priority.should_override(existing.source, source) {
            Self::merge_takeover(existing, source, incoming)
        } else {
            let newer = incoming.reported_at > existing.last_updated;
            let equal_rank = self.priority.rank(source) == self.priority.rank(existing.source);
            Self::merge_field_wise(existing, incoming, newer, equal_rank)
        };

        if observable_eq(existing, &merged) {
            return Resolution::Unchanged;
        }

        let mut merged = merged;
        // Raw reports carry no version counter, so max(existing, incoming)
        // collapses to the stored version.
        merged.version = existing.version + 1;
        merged.last_updated = existing.last_updated.max(incoming.reported_at);
        Resolution::Changed(merged)
    }

    /// Rule 1 — strictly higher precedence: incoming wins outright, except
    /// the room, which is user-assigned metadata (existing takes precedence
    /// when set).
    fn merge_takeover(existing: &Entity, source: SourceType, incoming: &RawEntity) -> Entity {
        Entity {
            id: existing.id,
            source,
            source_entity_id: incoming.source_entity_id.clone(),
            domain: incoming.domain,
            friendly_name: incoming.friendly_name.clone(),
            state: incoming.state.clone(),
            attributes: incoming.attributes.clone(),
            capabilities: incoming.capabilities.clone(),
            available: incoming.available,
            room_id: existing.room_id.or(incoming.room_hint),
            last_updated: existing.last_updated,
            version: existing.version,
        }
    }

    /// Rule 2 — equal or lower precedence: apply only present, strictly
    /// newer fields. A lower-precedence source is further restricted to
    /// attributes and availability so it never clobbers authoritative
    /// state owned by the primary source.
    fn merge_field_wise(
        existing: &Entity,
        incoming: &RawEntity,
        newer: bool,
        equal_rank: bool,
    ) -> Entity {
        let mut merged = existing.clone();
        if !newer {
            return merged;
        }

        if equal_rank {
            if incoming.state.is_known() {
                merged.state = incoming.state.clone();
            }
            if !incoming.friendly_name.is_empty() {
                merged.friendly_name = incoming.friendly_name.clone();
            }
            if incoming.domain != DomainType::Other {
                merged.domain = incoming.domain;
            }
            if !incoming.capabilities.is_empty() {
                merged.capabilities = incoming.capabilities.clone();
            }
        }

        for (key, value) in &incoming.attributes {
            merged.attributes.insert(key.clone(), value.clone());
        }
        merged.available = incoming.available;
        if merged.room_id.is_none() {
            merged.room_id = incoming.room_hint;
        }

        merged
    }
}

/// Compare everything a consumer can observe, ignoring the bookkeeping
/// fields (`version`, `last_updated`) so timestamp-only reports read as
/// no-ops.
fn observable_eq(a: &Entity, b: &Entity) -> bool {
    a.source == b.source
        && a.source_entity_id == b.source_entity_id
        && a.domain == b.domain
        && a.friendly_name == b.friendly_name
        && a.state == b.state
        && a.attributes == b.attributes
        && a.capabilities == b.capabilities
        && a.available == b.available
        && a.room_id == b.room_id
}
