//! Unified entity service — the façade every consumer goes through.
//!
//! Owns the [`RegistryManager`], the sync orchestrator, and the event bus,
//! and routes actions to the adapter owning the target entity. HTTP
//! handlers, the automation engine, and analytics all consume this one
//! interface; none of them touch adapters directly.
//!
//! Action routing holds no registry lock while waiting on adapter IO —
//! only the lookup and validation steps read the registries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use omnihub_domain::action::{ActionResult, EntityAction};
use omnihub_domain::entity::{Entity, EntityFilter};
use omnihub_domain::error::HubError;
use omnihub_domain::event::{HubEvent, HubEventKind};
use omnihub_domain::id::{CanonicalId, RoomId};
use omnihub_domain::room::Room;
use omnihub_domain::source::SourceType;
use omnihub_domain::sync::SyncResult;

use crate::event_bus::InProcessEventBus;
use crate::ports::{RoomProvider, SourceAdapter};
use crate::registries::{RegistryManager, SourcePriorityManager};
use crate::sync::{SyncConfig, SyncOrchestrator};

/// A canonical entity optionally decorated with its room.
#[derive(Debug, Clone)]
pub struct EntityWithRoom {
    pub entity: Entity,
    pub room: Option<Room>,
}

/// Façade over the registries, conflict resolution, sync, and routing.
pub struct UnifiedEntityService {
    registries: RegistryManager,
    orchestrator: SyncOrchestrator,
    events: Arc<InProcessEventBus>,
    rooms: Option<Arc<dyn RoomProvider>>,
}

impl UnifiedEntityService {
    /// Build a service with the default source priorities.
    #[must_use]
    pub fn new(sync_config: SyncConfig) -> Self {
        Self::with_priorities(SourcePriorityManager::default(), sync_config)
    }

    /// Build a service around an explicit priority ranking.
    #[must_use]
    pub fn with_priorities(priority: SourcePriorityManager, sync_config: SyncConfig) -> Self {
        let registries = RegistryManager::new(priority);
        let events = Arc::new(InProcessEventBus::default());
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(registries.adapter_registry()),
            Arc::clone(registries.entity_registry()),
            Arc::clone(&events),
            sync_config,
        );
        Self {
            registries,
            orchestrator,
            events,
            rooms: None,
        }
    }

    /// Attach the external room service used to decorate reads.
    #[must_use]
    pub fn with_room_provider(mut self, rooms: Arc<dyn RoomProvider>) -> Self {
        self.rooms = Some(rooms);
        self
    }

    /// The registries, priority manager, and conflict resolver, exposed
    /// for introspection by admin/health endpoints.
    #[must_use]
    pub fn registry_manager(&self) -> &RegistryManager {
        &self.registries
    }

    /// Subscribe to registry and adapter events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    // ── Adapter lifecycle ────────────────────────────────────────────

    /// Register an adapter without connecting it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AdapterAlreadyRegistered`] on id or source
    /// clashes.
    pub fn register_adapter(&self, adapter: Arc<dyn SourceAdapter>) -> Result<(), HubError> {
        self.registries.adapter_registry().register(adapter)
    }

    /// Connect a registered adapter, recording and broadcasting the
    /// resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AdapterNotFound`] for an unknown id, or the
    /// adapter's own connect failure (the record is left in the error
    /// state; reconnection policy belongs to the caller).
    pub async fn connect_adapter(&self, adapter_id: &str) -> Result<(), HubError> {
        let result = self.registries.adapter_registry().connect(adapter_id).await;
        self.broadcast_adapter_state(adapter_id);
        result
    }

    /// Disconnect a registered adapter.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AdapterNotFound`] for an unknown id, or the
    /// adapter's own teardown failure.
    pub async fn disconnect_adapter(&self, adapter_id: &str) -> Result<(), HubError> {
        let result = self
            .registries
            .adapter_registry()
            .disconnect(adapter_id)
            .await;
        self.broadcast_adapter_state(adapter_id);
        result
    }

    fn broadcast_adapter_state(&self, adapter_id: &str) {
        if let Some(record) = self.registries.adapter_registry().record(adapter_id) {
            self.events.publish(HubEventKind::AdapterStateChanged {
                adapter_id: record.adapter_id,
                source: record.source,
                state: record.connection_state,
            });
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Look up a canonical entity, decorated with its room when a room
    /// provider is attached.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::EntityNotFound`] when no entity has this id.
    pub async fn get_by_id(&self, id: CanonicalId) -> Result<EntityWithRoom, HubError> {
        let entity = self.registries.entity_registry().get_by_id(id)?;
        Ok(self.decorate(entity).await)
    }

    /// All entities passing the filter.
    pub async fn get_all(&self, filter: &EntityFilter) -> Vec<EntityWithRoom> {
        let entities = self.registries.entity_registry().all(filter);
        self.decorate_all(entities).await
    }

    /// All entities assigned to a room.
    pub async fn get_by_room(&self, room_id: RoomId) -> Vec<EntityWithRoom> {
        let entities = self.registries.entity_registry().by_room(room_id);
        self.decorate_all(entities).await
    }

    async fn decorate_all(&self, entities: Vec<Entity>) -> Vec<EntityWithRoom> {
        let mut decorated = Vec::with_capacity(entities.len());
        for entity in entities {
            decorated.push(self.decorate(entity).await);
        }
        decorated
    }

    /// Room decoration is best effort — a room service failure degrades
    /// the response to the bare entity rather than failing the read.
    async fn decorate(&self, entity: Entity) -> EntityWithRoom {
        let room = match (&self.rooms, entity.room_id) {
            (Some(provider), Some(room_id)) => match provider.room(room_id).await {
                Ok(room) => room,
                Err(err) => {
                    tracing::debug!(room_id = %room_id, error = %err, "room lookup failed");
                    None
                }
            },
            _ => None,
        };
        EntityWithRoom { entity, room }
    }

    // ── Action routing ───────────────────────────────────────────────

    /// Route an action to the adapter owning the target entity.
    ///
    /// Always returns an [`ActionResult`]: failures become a structured
    /// error payload with a stable code, never a raw adapter error.
    pub async fn execute_action(&self, action: EntityAction) -> ActionResult {
        match self.route_action(&action).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(
                    entity_id = %action.entity_id,
                    action = %action.name,
                    request_id = %action.request_id,
                    error = %err,
                    "action failed"
                );
                ActionResult::failed(&action, &err)
            }
        }
    }

    async fn route_action(&self, action: &EntityAction) -> Result<ActionResult, HubError> {
        let entity = self
            .registries
            .entity_registry()
            .get_by_id(action.entity_id)?;

        if !entity.supports(action.name) {
            return Err(HubError::ActionUnsupported {
                entity_id: entity.id.to_string(),
                action: action.name,
            });
        }

        let adapter = self
            .registries
            .adapter_registry()
            .get_by_source(entity.source)?;

        if !adapter.is_connected() {
            return Err(HubError::AdapterNotConnected {
                source_type: entity.source,
            });
        }

        tracing::debug!(
            entity_id = %entity.id,
            source = %entity.source,
            action = %action.name,
            request_id = %action.request_id,
            "dispatching action"
        );

        // Adapter IO runs with no registry lock held.
        let result = adapter
            .execute_action(&entity.source_entity_id, action)
            .await
            .map_err(|err| match err {
                wrapped @ HubError::Adapter { .. } => wrapped,
                other => HubError::adapter(entity.source, other),
            })?;

        if result.success {
            if let Some(new_state) = result.new_state.clone() {
                // Optimistic update; the next sync reconciles the source's
                // own view.
                if let Ok((old_state, updated)) = self
                    .registries
                    .entity_registry()
                    .apply_action_state(action.entity_id, new_state)
                {
                    if old_state != updated.state {
                        self.events.publish(HubEventKind::EntityUpdated {
                            entity_id: updated.id,
                            old_state,
                            new_state: updated.state,
                        });
                    }
                }
            }
        }

        Ok(result)
    }

    // ── Sync ─────────────────────────────────────────────────────────

    /// Run one full synchronization from `source`.
    ///
    /// # Errors
    ///
    /// See [`SyncOrchestrator::sync_from_source`].
    pub async fn sync_from_source(&self, source: SourceType) -> Result<SyncResult, HubError> {
        self.orchestrator.sync_from_source(source).await
    }

    /// Sync every connected source sequentially.
    pub async fn sync_all(&self) -> Vec<Result<SyncResult, HubError>> {
        self.orchestrator.sync_all().await
    }

    /// Start the periodic sync scheduler (one ticker per source).
    /// Returns `false` when it was already running.
    #[must_use]
    pub fn start_periodic_sync(&self, interval: Duration) -> bool {
        self.orchestrator.start_periodic(interval)
    }

    /// Stop the periodic sync scheduler, waiting for in-flight ticks.
    pub async fn stop_periodic_sync(&self) {
        self.orchestrator.stop_periodic().await;
    }
}
