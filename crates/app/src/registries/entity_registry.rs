//! Entity registry — the canonical, in-memory store of entities.
//!
//! Keyed by [`CanonicalId`] with a secondary index mapping
//! `(source, source_entity_id)` to the canonical id, so exactly one
//! canonical entity exists per source pair at any time.
//!
//! [`upsert`](EntityRegistry::upsert) is the single write path. The
//! lookup → resolve → write sequence runs under one write-lock critical
//! section: two concurrent upserts for the same source pair can never both
//! read the same stored value and independently overwrite it. All reads are
//! served from memory under the read lock; there is no blocking IO on the
//! read path.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use omnihub_domain::entity::{DomainType, Entity, EntityFilter, EntityState, RawEntity};
use omnihub_domain::error::{HubError, ValidationError};
use omnihub_domain::id::{CanonicalId, RoomId};
use omnihub_domain::source::SourceType;
use omnihub_domain::time::now;

use super::conflict::{ConflictResolver, Resolution};

/// Outcome of an upsert, each carrying the record now stored.
#[derive(Debug)]
pub enum UpsertOutcome {
    /// First report for this source pair; a canonical id was minted.
    Registered(Entity),
    /// An existing record was merged and its version advanced.
    Updated {
        old_state: EntityState,
        entity: Entity,
    },
    /// The report carried nothing new; the stored record is untouched.
    Unchanged(Entity),
}

impl UpsertOutcome {
    /// The stored entity after the upsert.
    #[must_use]
    pub fn entity(&self) -> &Entity {
        match self {
            Self::Registered(entity) | Self::Unchanged(entity) => entity,
            Self::Updated { entity, .. } => entity,
        }
    }

    /// Whether a write was actually applied.
    #[must_use]
    pub fn applied(&self) -> bool {
        !matches!(self, Self::Unchanged(_))
    }
}

#[derive(Default)]
struct State {
    entities: HashMap<CanonicalId, Entity>,
    by_source: HashMap<(SourceType, String), CanonicalId>,
    by_room: HashMap<RoomId, HashSet<CanonicalId>>,
}

impl State {
    fn index_room(&mut self, id: CanonicalId, room_id: Option<RoomId>) {
        if let Some(room_id) = room_id {
            self.by_room.entry(room_id).or_default().insert(id);
        }
    }

    fn unindex_room(&mut self, id: CanonicalId, room_id: Option<RoomId>) {
        if let Some(room_id) = room_id {
            if let Some(members) = self.by_room.get_mut(&room_id) {
                members.remove(&id);
                if members.is_empty() {
                    self.by_room.remove(&room_id);
                }
            }
        }
    }
}

/// Canonical entity store with source and room secondary indexes.
pub struct EntityRegistry {
    resolver: Arc<ConflictResolver>,
    state: RwLock<State>,
}

impl EntityRegistry {
    #[must_use]
    pub fn new(resolver: Arc<ConflictResolver>) -> Self {
        Self {
            resolver,
            state: RwLock::new(State::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or merge a source report. The single write path.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when the report has an empty
    /// source entity id or friendly name.
    pub fn upsert(&self, source: SourceType, raw: RawEntity) -> Result<UpsertOutcome, HubError> {
        if raw.source_entity_id.is_empty() {
            return Err(ValidationError::EmptySourceEntityId.into());
        }
        if raw.friendly_name.is_empty() {
            return Err(ValidationError::EmptyFriendlyName.into());
        }

        let mut state = self.write();
        let key = (source, raw.source_entity_id.clone());

        let existing = state
            .by_source
            .get(&key)
            .copied()
            .and_then(|id| state.entities.get(&id).cloned());

        match existing {
            None => {
                let entity = Entity::from_raw(source, raw);
                state.by_source.insert(key, entity.id);
                state.index_room(entity.id, entity.room_id);
                state.entities.insert(entity.id, entity.clone());
                tracing::debug!(
                    entity_id = %entity.id,
                    source = %source,
                    source_entity_id = entity.source_entity_id,
                    "entity registered"
                );
                Ok(UpsertOutcome::Registered(entity))
            }
            Some(existing) => match self.resolver.resolve(&existing, source, &raw) {
                Resolution::Unchanged => Ok(UpsertOutcome::Unchanged(existing)),
                Resolution::Changed(merged) => {
                    if merged.room_id != existing.room_id {
                        state.unindex_room(existing.id, existing.room_id);
                        state.index_room(existing.id, merged.room_id);
                    }
                    state.entities.insert(merged.id, merged.clone());
                    tracing::debug!(
                        entity_id = %merged.id,
                        version = merged.version,
                        "entity updated"
                    );
                    Ok(UpsertOutcome::Updated {
                        old_state: existing.state,
                        entity: merged,
                    })
                }
            },
        }
    }

    /// Look up an entity by canonical id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::EntityNotFound`] when no entity has this id.
    pub fn get_by_id(&self, id: CanonicalId) -> Result<Entity, HubError> {
        self.read()
            .entities
            .get(&id)
            .cloned()
            .ok_or_else(|| HubError::EntityNotFound {
                entity_id: id.to_string(),
            })
    }

    /// Look up an entity by its source pair.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::EntityNotFound`] when the pair is unknown.
    pub fn get_by_source(
        &self,
        source: SourceType,
        source_entity_id: &str,
    ) -> Result<Entity, HubError> {
        let state = self.read();
        state
            .by_source
            .get(&(source, source_entity_id.to_string()))
            .and_then(|id| state.entities.get(id))
            .cloned()
            .ok_or_else(|| HubError::EntityNotFound {
                entity_id: format!("{source}:{source_entity_id}"),
            })
    }

    /// All entities passing the filter.
    #[must_use]
    pub fn all(&self, filter: &EntityFilter) -> Vec<Entity> {
        self.read()
            .entities
            .values()
            .filter(|entity| entity.matches(filter))
            .cloned()
            .collect()
    }

    /// All entities assigned to a room.
    #[must_use]
    pub fn by_room(&self, room_id: RoomId) -> Vec<Entity> {
        let state = self.read();
        state
            .by_room
            .get(&room_id)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|id| state.entities.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove an entity and clean every index.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::EntityNotFound`] when no entity has this id.
    pub fn remove(&self, id: CanonicalId) -> Result<Entity, HubError> {
        let mut state = self.write();
        let entity = state
            .entities
            .remove(&id)
            .ok_or_else(|| HubError::EntityNotFound {
                entity_id: id.to_string(),
            })?;
        state
            .by_source
            .remove(&(entity.source, entity.source_entity_id.clone()));
        state.unindex_room(id, entity.room_id);
        tracing::debug!(entity_id = %id, source = %entity.source, "entity removed");
        Ok(entity)
    }

    /// Mark an entity unavailable, bumping its version if that is a change.
    /// Returns whether a write was applied.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::EntityNotFound`] when no entity has this id.
    pub fn mark_unavailable(&self, id: CanonicalId) -> Result<bool, HubError> {
        let mut state = self.write();
        let entity = state
            .entities
            .get_mut(&id)
            .ok_or_else(|| HubError::EntityNotFound {
                entity_id: id.to_string(),
            })?;
        if !entity.available {
            return Ok(false);
        }
        entity.available = false;
        entity.version += 1;
        entity.last_updated = now();
        Ok(true)
    }

    /// Optimistically apply the post-action state reported by an adapter.
    /// Returns the previous state and the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::EntityNotFound`] when no entity has this id.
    pub fn apply_action_state(
        &self,
        id: CanonicalId,
        new_state: EntityState,
    ) -> Result<(EntityState, Entity), HubError> {
        let mut state = self.write();
        let entity = state
            .entities
            .get_mut(&id)
            .ok_or_else(|| HubError::EntityNotFound {
                entity_id: id.to_string(),
            })?;
        let old_state = std::mem::replace(&mut entity.state, new_state);
        entity.version += 1;
        entity.last_updated = now();
        Ok((old_state, entity.clone()))
    }

    /// The `(source_entity_id, canonical_id)` pairs currently known for a
    /// source. Used by the sync orchestrator to detect absent entities.
    #[must_use]
    pub fn source_ids(&self, source: SourceType) -> Vec<(String, CanonicalId)> {
        self.read()
            .by_source
            .iter()
            .filter(|((entry_source, _), _)| *entry_source == source)
            .map(|((_, source_entity_id), id)| (source_entity_id.clone(), *id))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().entities.is_empty()
    }

    /// Entity counts grouped by source, for introspection endpoints.
    #[must_use]
    pub fn counts_by_source(&self) -> HashMap<SourceType, usize> {
        let mut counts = HashMap::new();
        for entity in self.read().entities.values() {
            *counts.entry(entity.source).or_insert(0) += 1;
        }
        counts
    }

    /// Entity counts grouped by domain, for introspection endpoints.
    #[must_use]
    pub fn counts_by_domain(&self) -> HashMap<DomainType, usize> {
        let mut counts = HashMap::new();
        for entity in self.read().entities.values() {
            *counts.entry(entity.domain).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use omnihub_domain::entity::{AttributeValue, Capability};

    use crate::registries::priority::SourcePriorityManager;

    fn registry() -> EntityRegistry {
        let priority = Arc::new(SourcePriorityManager::default());
        EntityRegistry::new(Arc::new(ConflictResolver::new(priority)))
    }

    fn raw_light(state: EntityState) -> RawEntity {
        RawEntity::builder()
            .source_entity_id("light.kitchen")
            .domain(DomainType::Light)
            .friendly_name("Kitchen Light")
            .state(state)
            .capability(Capability::TurnOn)
            .capability(Capability::TurnOff)
            .build()
            .unwrap()
    }

    #[test]
    fn should_register_first_report_with_version_one() {
        let registry = registry();
        let outcome = registry
            .upsert(SourceType::Hub, raw_light(EntityState::Off))
            .unwrap();

        assert!(matches!(outcome, UpsertOutcome::Registered(_)));
        assert_eq!(outcome.entity().version, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn should_keep_one_canonical_entity_per_source_pair() {
        let registry = registry();
        let first = registry
            .upsert(SourceType::Hub, raw_light(EntityState::Off))
            .unwrap();

        let mut newer = raw_light(EntityState::On);
        newer.reported_at = first.entity().last_updated + Duration::seconds(5);
        let second = registry.upsert(SourceType::Hub, newer).unwrap();

        assert!(matches!(second, UpsertOutcome::Updated { .. }));
        assert_eq!(registry.len(), 1);
        assert_eq!(first.entity().id, second.entity().id);
    }

    #[test]
    fn should_keep_separate_entities_for_same_id_on_different_sources() {
        let registry = registry();
        registry
            .upsert(SourceType::Hub, raw_light(EntityState::Off))
            .unwrap();
        registry
            .upsert(SourceType::Virtual, raw_light(EntityState::Off))
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn should_report_unchanged_for_identical_report() {
        let registry = registry();
        let first = registry
            .upsert(SourceType::Hub, raw_light(EntityState::Off))
            .unwrap();

        let mut same = raw_light(EntityState::Off);
        same.reported_at = first.entity().last_updated + Duration::seconds(5);
        let outcome = registry.upsert(SourceType::Hub, same).unwrap();

        assert!(matches!(outcome, UpsertOutcome::Unchanged(_)));
        assert_eq!(outcome.entity().version, 1);
    }

    #[test]
    fn should_never_decrease_version_across_updates() {
        let registry = registry();
        let mut last_version = 0;
        let mut reported_at = now();

        for state in [
            EntityState::Off,
            EntityState::On,
            EntityState::Off,
            EntityState::On,
        ] {
            reported_at += Duration::seconds(1);
            let mut raw = raw_light(state);
            raw.reported_at = reported_at;
            let outcome = registry.upsert(SourceType::Hub, raw).unwrap();
            assert!(outcome.entity().version >= last_version);
            last_version = outcome.entity().version;
        }
        assert_eq!(last_version, 4);
    }

    #[test]
    fn should_reject_report_with_empty_source_entity_id() {
        let registry = registry();
        let mut raw = raw_light(EntityState::Off);
        raw.source_entity_id = String::new();
        assert!(matches!(
            registry.upsert(SourceType::Hub, raw),
            Err(HubError::Validation(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn should_look_up_by_source_pair() {
        let registry = registry();
        registry
            .upsert(SourceType::Hub, raw_light(EntityState::Off))
            .unwrap();

        let entity = registry
            .get_by_source(SourceType::Hub, "light.kitchen")
            .unwrap();
        assert_eq!(entity.source_entity_id, "light.kitchen");

        assert!(matches!(
            registry.get_by_source(SourceType::Ups, "light.kitchen"),
            Err(HubError::EntityNotFound { .. })
        ));
    }

    #[test]
    fn should_filter_entities_on_read() {
        let registry = registry();
        registry
            .upsert(SourceType::Hub, raw_light(EntityState::Off))
            .unwrap();
        registry
            .upsert(
                SourceType::Ups,
                RawEntity::builder()
                    .source_entity_id("ups_main_battery")
                    .domain(DomainType::Sensor)
                    .friendly_name("UPS Battery")
                    .attribute("battery_level", AttributeValue::Int(94))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        assert_eq!(registry.all(&EntityFilter::default()).len(), 2);
        assert_eq!(
            registry
                .all(&EntityFilter::default().domain(DomainType::Sensor))
                .len(),
            1
        );
        assert_eq!(
            registry
                .all(&EntityFilter::default().source(SourceType::Hub))
                .len(),
            1
        );
    }

    #[test]
    fn should_track_room_index_across_room_changes() {
        let registry = registry();
        let room_a = RoomId::new();
        let room_b = RoomId::new();

        let mut raw = raw_light(EntityState::Off);
        raw.room_hint = Some(room_a);
        let outcome = registry.upsert(SourceType::Hub, raw).unwrap();
        let id = outcome.entity().id;
        assert_eq!(registry.by_room(room_a).len(), 1);

        // Takeover from a higher-ranked report cannot move the room, so
        // simulate a user reassignment through removal and re-report.
        registry.remove(id).unwrap();
        let mut raw = raw_light(EntityState::Off);
        raw.room_hint = Some(room_b);
        registry.upsert(SourceType::Hub, raw).unwrap();

        assert!(registry.by_room(room_a).is_empty());
        assert_eq!(registry.by_room(room_b).len(), 1);
    }

    #[test]
    fn should_remove_entity_and_clean_indexes() {
        let registry = registry();
        let room = RoomId::new();
        let mut raw = raw_light(EntityState::Off);
        raw.room_hint = Some(room);
        let id = registry
            .upsert(SourceType::Hub, raw)
            .unwrap()
            .entity()
            .id;

        registry.remove(id).unwrap();

        assert!(registry.is_empty());
        assert!(registry.by_room(room).is_empty());
        assert!(registry.get_by_source(SourceType::Hub, "light.kitchen").is_err());
        assert!(matches!(
            registry.remove(id),
            Err(HubError::EntityNotFound { .. })
        ));
    }

    #[test]
    fn should_mark_unavailable_exactly_once() {
        let registry = registry();
        let id = registry
            .upsert(SourceType::Hub, raw_light(EntityState::Off))
            .unwrap()
            .entity()
            .id;

        assert!(registry.mark_unavailable(id).unwrap());
        let entity = registry.get_by_id(id).unwrap();
        assert!(!entity.available);
        assert_eq!(entity.version, 2);

        // Already unavailable: no write, no version bump.
        assert!(!registry.mark_unavailable(id).unwrap());
        assert_eq!(registry.get_by_id(id).unwrap().version, 2);
    }

    #[test]
    fn should_apply_action_state_and_bump_version() {
        let registry = registry();
        let id = registry
            .upsert(SourceType::Hub, raw_light(EntityState::Off))
            .unwrap()
            .entity()
            .id;

        let (old_state, updated) = registry
            .apply_action_state(id, EntityState::On)
            .unwrap();
        assert_eq!(old_state, EntityState::Off);
        assert_eq!(updated.state, EntityState::On);
        assert_eq!(updated.version, 2);
    }

    #[test]
    fn should_count_entities_by_source_and_domain() {
        let registry = registry();
        registry
            .upsert(SourceType::Hub, raw_light(EntityState::Off))
            .unwrap();
        registry
            .upsert(
                SourceType::Hub,
                RawEntity::builder()
                    .source_entity_id("sensor.temp")
                    .domain(DomainType::Sensor)
                    .friendly_name("Temp")
                    .build()
                    .unwrap(),
            )
            .unwrap();

        assert_eq!(registry.counts_by_source()[&SourceType::Hub], 2);
        assert_eq!(registry.counts_by_domain()[&DomainType::Light], 1);
        assert_eq!(registry.counts_by_domain()[&DomainType::Sensor], 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn should_apply_concurrent_upserts_without_lost_updates() {
        let registry = Arc::new(registry());
        let base = now();

        let mut handles = Vec::new();
        for i in 0..16i64 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let mut raw = RawEntity::builder()
                    .source_entity_id("light.kitchen")
                    .domain(DomainType::Light)
                    .friendly_name("Kitchen Light")
                    .state(EntityState::Custom(format!("level_{i}")))
                    .build()
                    .unwrap();
                raw.reported_at = base + Duration::seconds(i + 1);
                registry.upsert(SourceType::Hub, raw).unwrap().applied()
            }));
        }

        let mut applied: u64 = 0;
        for handle in handles {
            if handle.await.unwrap() {
                applied += 1;
            }
        }

        // Exactly one record, its version equal to the writes that applied.
        assert_eq!(registry.len(), 1);
        let entity = registry
            .get_by_source(SourceType::Hub, "light.kitchen")
            .unwrap();
        assert_eq!(entity.version, applied);
    }
}
