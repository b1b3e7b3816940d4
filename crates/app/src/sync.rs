//! Sync orchestration — pulling full enumerations from sources into the
//! canonical registry.
//!
//! Exactly one sync per source runs at a time; a request for a source
//! already syncing fails fast with `SYNC_IN_PROGRESS` rather than queuing,
//! since the in-flight sync will supersede it shortly. Per-entity failures
//! are collected into the [`SyncResult`] and never abort the batch.
//!
//! Entities previously known for a source but absent from the new
//! enumeration are marked unavailable, and removed only after being absent
//! across a configurable number of consecutive syncs. This keeps transient
//! adapter errors from flapping entities in and out of the registry.
//!
//! Periodic sync runs one background ticker task per source. Cancellation
//! takes effect between syncs, never mid-batch, so stopping the scheduler
//! leaves no half-applied sync behind.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use omnihub_domain::error::HubError;
use omnihub_domain::event::HubEventKind;
use omnihub_domain::id::CanonicalId;
use omnihub_domain::source::SourceType;
use omnihub_domain::sync::{SyncError, SyncResult};
use omnihub_domain::time::now;

use crate::event_bus::InProcessEventBus;
use crate::registries::entity_registry::UpsertOutcome;
use crate::registries::{AdapterRegistry, EntityRegistry};

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Deadline for a single full enumeration.
    pub timeout: Duration,
    /// Consecutive absent syncs before an entity is removed.
    pub removal_threshold: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            removal_threshold: 3,
        }
    }
}

struct PeriodicSync {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

struct OrchestratorInner {
    adapters: Arc<AdapterRegistry>,
    entities: Arc<EntityRegistry>,
    events: Arc<InProcessEventBus>,
    config: SyncConfig,
    in_flight: Mutex<HashSet<SourceType>>,
    /// Consecutive-absence counters per source pair.
    absences: Mutex<HashMap<(SourceType, String), u32>>,
    periodic: Mutex<Option<PeriodicSync>>,
}

/// Drives full and periodic synchronization from sources.
///
/// Cheaply cloneable handle around shared state, so background ticker
/// tasks can hold their own copy.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<OrchestratorInner>,
}

/// Clears the in-flight marker when a sync finishes or is cancelled.
struct InFlightGuard {
    inner: Arc<OrchestratorInner>,
    source: SourceType,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.source);
    }
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(
        adapters: Arc<AdapterRegistry>,
        entities: Arc<EntityRegistry>,
        events: Arc<InProcessEventBus>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                adapters,
                entities,
                events,
                config,
                in_flight: Mutex::new(HashSet::new()),
                absences: Mutex::new(HashMap::new()),
                periodic: Mutex::new(None),
            }),
        }
    }

    fn try_begin(&self, source: SourceType) -> Result<InFlightGuard, HubError> {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(source) {
            return Err(HubError::SyncInProgress { source_type: source });
        }
        Ok(InFlightGuard {
            inner: Arc::clone(&self.inner),
            source,
        })
    }

    /// Run one full synchronization from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::SyncInProgress`] when a sync for this source is
    /// already running, [`HubError::AdapterNotFound`] when no adapter owns
    /// the source, [`HubError::Timeout`] when enumeration exceeds the
    /// configured deadline, or [`HubError::Adapter`] when the adapter
    /// cannot be queried at all. Per-entity failures do not error — they
    /// are reported in [`SyncResult::errors`].
    pub async fn sync_from_source(&self, source: SourceType) -> Result<SyncResult, HubError> {
        let _guard = self.try_begin(source)?;
        let adapter = self.inner.adapters.get_by_source(source)?;

        tracing::debug!(source = %source, "sync started");
        let started = Instant::now();

        let raws =
            match tokio::time::timeout(self.inner.config.timeout, adapter.fetch_entities()).await
            {
                Err(_) => {
                    return Err(HubError::Timeout {
                        operation: "sync",
                        seconds: self.inner.config.timeout.as_secs(),
                    });
                }
                Ok(Err(err)) => {
                    return Err(match err {
                        wrapped @ HubError::Adapter { .. } => wrapped,
                        other => HubError::adapter(source, other),
                    });
                }
                Ok(Ok(raws)) => raws,
            };

        // Snapshot of what we knew before this pass, for absence detection.
        let known = self.inner.entities.source_ids(source);

        let entities_found = raws.len();
        let mut registered = 0;
        let mut updated = 0;
        let mut errors = Vec::new();
        let mut seen = HashSet::with_capacity(entities_found);

        for raw in raws {
            let source_entity_id = raw.source_entity_id.clone();
            seen.insert(source_entity_id.clone());
            match self.inner.entities.upsert(source, raw) {
                Ok(UpsertOutcome::Registered(entity)) => {
                    registered += 1;
                    self.inner.events.publish(HubEventKind::EntityRegistered {
                        entity_id: entity.id,
                        source,
                    });
                }
                Ok(UpsertOutcome::Updated { old_state, entity }) => {
                    updated += 1;
                    if old_state != entity.state {
                        self.inner.events.publish(HubEventKind::EntityUpdated {
                            entity_id: entity.id,
                            old_state,
                            new_state: entity.state,
                        });
                    }
                }
                Ok(UpsertOutcome::Unchanged(_)) => {}
                Err(err) => {
                    tracing::warn!(
                        source = %source,
                        source_entity_id,
                        error = %err,
                        "entity skipped during sync"
                    );
                    errors.push(SyncError {
                        source_entity_id,
                        message: err.to_string(),
                    });
                }
            }
        }

        let (unavailable, removed) = self.reconcile_absent(source, &known, &seen);

        let result = SyncResult {
            source,
            entities_found,
            entities_registered: registered,
            entities_updated: updated,
            entities_removed: removed,
            entities_unavailable: unavailable,
            duration: started.elapsed(),
            errors,
            finished_at: now(),
        };

        self.inner.events.publish(HubEventKind::SyncCompleted {
            source,
            registered,
            updated,
            removed,
        });
        tracing::info!(
            source = %source,
            found = result.entities_found,
            registered = result.entities_registered,
            updated = result.entities_updated,
            removed = result.entities_removed,
            unavailable = result.entities_unavailable,
            errors = result.errors.len(),
            duration_ms = u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
            "sync completed"
        );

        Ok(result)
    }

    /// Mark entities absent from this pass unavailable; remove them once
    /// they have been absent for `removal_threshold` consecutive syncs.
    fn reconcile_absent(
        &self,
        source: SourceType,
        known: &[(String, CanonicalId)],
        seen: &HashSet<String>,
    ) -> (usize, usize) {
        let mut absences = self
            .inner
            .absences
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut unavailable = 0;
        let mut removed = 0;
        for (source_entity_id, id) in known {
            if seen.contains(source_entity_id) {
                absences.remove(&(source, source_entity_id.clone()));
                continue;
            }

            let count = absences
                .entry((source, source_entity_id.clone()))
                .and_modify(|count| *count += 1)
                .or_insert(1);

            if *count >= self.inner.config.removal_threshold {
                if self.inner.entities.remove(*id).is_ok() {
                    removed += 1;
                    self.inner.events.publish(HubEventKind::EntityRemoved {
                        entity_id: *id,
                        source,
                    });
                }
                absences.remove(&(source, source_entity_id.clone()));
            } else if matches!(self.inner.entities.mark_unavailable(*id), Ok(true)) {
                unavailable += 1;
            }
        }
        (unavailable, removed)
    }

    /// Sync every connected source sequentially, collecting per-source
    /// outcomes.
    pub async fn sync_all(&self) -> Vec<Result<SyncResult, HubError>> {
        let mut results = Vec::new();
        for adapter in self.inner.adapters.connected() {
            results.push(self.sync_from_source(adapter.source_type()).await);
        }
        results
    }

    /// Start one background ticker per currently registered source.
    ///
    /// Returns `false` (without touching the running tasks) when periodic
    /// sync is already active. Sources registered later are picked up by
    /// stopping and restarting the scheduler.
    pub fn start_periodic(&self, interval: Duration) -> bool {
        let mut periodic = self
            .inner
            .periodic
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if periodic.is_some() {
            tracing::warn!("periodic sync already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let mut handles = Vec::new();
        for adapter in self.inner.adapters.all() {
            let source = adapter.source_type();
            let orchestrator = self.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                // The first tick fires immediately; the initial sync is the
                // caller's responsibility, so consume it.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                    // Awaited outside the select: cancellation takes effect
                    // between syncs, never mid-batch.
                    match orchestrator.sync_from_source(source).await {
                        Ok(result) => tracing::debug!(
                            source = %source,
                            registered = result.entities_registered,
                            updated = result.entities_updated,
                            "periodic sync tick"
                        ),
                        Err(HubError::SyncInProgress { .. }) => {
                            tracing::debug!(source = %source, "periodic sync skipped, already running");
                        }
                        Err(err) => {
                            tracing::warn!(source = %source, error = %err, "periodic sync failed");
                        }
                    }
                }
            }));
        }

        tracing::info!(
            interval_secs = interval.as_secs(),
            sources = handles.len(),
            "periodic sync started"
        );
        *periodic = Some(PeriodicSync { cancel, handles });
        true
    }

    /// Stop periodic sync, waiting for any in-flight tick to finish.
    pub async fn stop_periodic(&self) {
        let Some(periodic) = self
            .inner
            .periodic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        periodic.cancel.cancel();
        for handle in periodic.handles {
            let _ = handle.await;
        }
        tracing::info!("periodic sync stopped");
    }

    /// Whether the periodic scheduler is currently active.
    #[must_use]
    pub fn is_periodic_running(&self) -> bool {
        self.inner
            .periodic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use omnihub_domain::action::{ActionResult, EntityAction};
    use omnihub_domain::adapter::HealthInfo;
    use omnihub_domain::entity::{DomainType, EntityState, RawEntity};

    use crate::ports::SourceAdapter;
    use crate::registries::{ConflictResolver, SourcePriorityManager};

    struct ScriptedAdapter {
        source: SourceType,
        entities: Mutex<Vec<RawEntity>>,
        delay: Option<Duration>,
        fail_fetch: AtomicBool,
        connected: AtomicBool,
    }

    impl ScriptedAdapter {
        fn new(source: SourceType, entities: Vec<RawEntity>) -> Arc<Self> {
            Arc::new(Self {
                source,
                entities: Mutex::new(entities),
                delay: None,
                fail_fetch: AtomicBool::new(false),
                connected: AtomicBool::new(true),
            })
        }

        fn with_delay(source: SourceType, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                source,
                entities: Mutex::new(Vec::new()),
                delay: Some(delay),
                fail_fetch: AtomicBool::new(false),
                connected: AtomicBool::new(true),
            })
        }

        fn set_entities(&self, entities: Vec<RawEntity>) {
            *self.entities.lock().unwrap() = entities;
        }
    }

    #[async_trait]
    impl SourceAdapter for ScriptedAdapter {
        fn id(&self) -> &str {
            "scripted"
        }

        fn source_type(&self) -> SourceType {
            self.source
        }

        fn version(&self) -> &str {
            "0.0.1"
        }

        async fn connect(&self) -> Result<(), HubError> {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), HubError> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn health(&self) -> HealthInfo {
            HealthInfo::healthy()
        }

        async fn fetch_entities(&self) -> Result<Vec<RawEntity>, HubError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(HubError::adapter(self.source, "enumeration failed"));
            }
            let mut raws = self.entities.lock().unwrap().clone();
            for raw in &mut raws {
                raw.reported_at = now();
            }
            Ok(raws)
        }

        async fn execute_action(
            &self,
            _source_entity_id: &str,
            action: &EntityAction,
        ) -> Result<ActionResult, HubError> {
            Ok(ActionResult::ok(action, None))
        }
    }

    struct Rig {
        orchestrator: SyncOrchestrator,
        entities: Arc<EntityRegistry>,
        events: Arc<InProcessEventBus>,
    }

    fn rig(adapter: Arc<dyn SourceAdapter>, config: SyncConfig) -> Rig {
        let priority = Arc::new(SourcePriorityManager::default());
        let resolver = Arc::new(ConflictResolver::new(priority));
        let adapters = Arc::new(AdapterRegistry::new());
        adapters.register(adapter).unwrap();
        let entities = Arc::new(EntityRegistry::new(resolver));
        let events = Arc::new(InProcessEventBus::default());
        let orchestrator = SyncOrchestrator::new(
            adapters,
            Arc::clone(&entities),
            Arc::clone(&events),
            config,
        );
        Rig {
            orchestrator,
            entities,
            events,
        }
    }

    fn raw(source_entity_id: &str, state: EntityState) -> RawEntity {
        RawEntity::builder()
            .source_entity_id(source_entity_id)
            .domain(DomainType::Light)
            .friendly_name(source_entity_id.replace('.', " "))
            .state(state)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_register_all_entities_on_first_sync() {
        let adapter = ScriptedAdapter::new(
            SourceType::Virtual,
            vec![
                raw("light.desk", EntityState::Off),
                raw("switch.fan", EntityState::On),
            ],
        );
        let rig = rig(adapter, SyncConfig::default());

        let result = rig
            .orchestrator
            .sync_from_source(SourceType::Virtual)
            .await
            .unwrap();

        assert_eq!(result.entities_found, 2);
        assert_eq!(result.entities_registered, 2);
        assert_eq!(result.entities_updated, 0);
        assert!(result.is_clean());
        assert_eq!(rig.entities.len(), 2);
    }

    #[tokio::test]
    async fn should_be_idempotent_when_source_is_unchanged() {
        let adapter = ScriptedAdapter::new(
            SourceType::Virtual,
            vec![raw("light.desk", EntityState::Off)],
        );
        let rig = rig(adapter, SyncConfig::default());

        rig.orchestrator
            .sync_from_source(SourceType::Virtual)
            .await
            .unwrap();
        let second = rig
            .orchestrator
            .sync_from_source(SourceType::Virtual)
            .await
            .unwrap();

        assert_eq!(second.entities_registered, 0);
        assert_eq!(second.entities_updated, 0);
        assert_eq!(rig.entities.len(), 1);
    }

    #[tokio::test]
    async fn should_collect_per_entity_errors_without_aborting_batch() {
        let mut raws: Vec<RawEntity> = (0..9)
            .map(|i| raw(&format!("light.l{i}"), EntityState::Off))
            .collect();
        let mut broken = raw("light.broken", EntityState::Off);
        broken.friendly_name = String::new();
        raws.push(broken);

        let adapter = ScriptedAdapter::new(SourceType::Hub, raws);
        let rig = rig(adapter, SyncConfig::default());

        let result = rig
            .orchestrator
            .sync_from_source(SourceType::Hub)
            .await
            .unwrap();

        assert_eq!(result.entities_found, 10);
        assert_eq!(result.entities_registered, 9);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].source_entity_id, "light.broken");
        assert_eq!(rig.entities.len(), 9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn should_fail_fast_when_sync_already_in_progress() {
        let adapter = ScriptedAdapter::with_delay(SourceType::Hub, Duration::from_millis(300));
        let rig = rig(adapter, SyncConfig::default());

        let background = {
            let orchestrator = rig.orchestrator.clone();
            tokio::spawn(async move { orchestrator.sync_from_source(SourceType::Hub).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = rig.orchestrator.sync_from_source(SourceType::Hub).await;
        assert!(matches!(second, Err(HubError::SyncInProgress { .. })));

        assert!(background.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn should_allow_new_sync_after_previous_completes() {
        let adapter = ScriptedAdapter::new(SourceType::Hub, Vec::new());
        let rig = rig(adapter, SyncConfig::default());

        rig.orchestrator
            .sync_from_source(SourceType::Hub)
            .await
            .unwrap();
        assert!(
            rig.orchestrator
                .sync_from_source(SourceType::Hub)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn should_mark_absent_entities_unavailable_then_remove_after_threshold() {
        let adapter = ScriptedAdapter::new(
            SourceType::Hub,
            vec![
                raw("light.desk", EntityState::Off),
                raw("light.shelf", EntityState::On),
            ],
        );
        let rig = rig(
            adapter.clone(),
            SyncConfig {
                removal_threshold: 2,
                ..SyncConfig::default()
            },
        );

        rig.orchestrator
            .sync_from_source(SourceType::Hub)
            .await
            .unwrap();
        assert_eq!(rig.entities.len(), 2);

        // The shelf light disappears from the source.
        adapter.set_entities(vec![raw("light.desk", EntityState::Off)]);

        let second = rig
            .orchestrator
            .sync_from_source(SourceType::Hub)
            .await
            .unwrap();
        assert_eq!(second.entities_unavailable, 1);
        assert_eq!(second.entities_removed, 0);
        let shelf = rig
            .entities
            .get_by_source(SourceType::Hub, "light.shelf")
            .unwrap();
        assert!(!shelf.available);

        let third = rig
            .orchestrator
            .sync_from_source(SourceType::Hub)
            .await
            .unwrap();
        assert_eq!(third.entities_removed, 1);
        assert!(
            rig.entities
                .get_by_source(SourceType::Hub, "light.shelf")
                .is_err()
        );
    }

    #[tokio::test]
    async fn should_reset_absence_counter_when_entity_reappears() {
        let adapter = ScriptedAdapter::new(
            SourceType::Hub,
            vec![
                raw("light.desk", EntityState::Off),
                raw("light.shelf", EntityState::On),
            ],
        );
        let rig = rig(
            adapter.clone(),
            SyncConfig {
                removal_threshold: 2,
                ..SyncConfig::default()
            },
        );

        rig.orchestrator
            .sync_from_source(SourceType::Hub)
            .await
            .unwrap();
        adapter.set_entities(vec![raw("light.desk", EntityState::Off)]);
        rig.orchestrator
            .sync_from_source(SourceType::Hub)
            .await
            .unwrap();

        // Reappears before the threshold: available again, not removed.
        adapter.set_entities(vec![
            raw("light.desk", EntityState::Off),
            raw("light.shelf", EntityState::On),
        ]);
        rig.orchestrator
            .sync_from_source(SourceType::Hub)
            .await
            .unwrap();
        let shelf = rig
            .entities
            .get_by_source(SourceType::Hub, "light.shelf")
            .unwrap();
        assert!(shelf.available);

        // A later absence starts counting from scratch.
        adapter.set_entities(vec![raw("light.desk", EntityState::Off)]);
        let result = rig
            .orchestrator
            .sync_from_source(SourceType::Hub)
            .await
            .unwrap();
        assert_eq!(result.entities_unavailable, 1);
        assert_eq!(result.entities_removed, 0);
    }

    #[tokio::test]
    async fn should_time_out_slow_enumeration() {
        let adapter = ScriptedAdapter::with_delay(SourceType::Hub, Duration::from_millis(200));
        let rig = rig(
            adapter,
            SyncConfig {
                timeout: Duration::from_millis(20),
                ..SyncConfig::default()
            },
        );

        let result = rig.orchestrator.sync_from_source(SourceType::Hub).await;
        assert!(matches!(result, Err(HubError::Timeout { .. })));
    }

    #[tokio::test]
    async fn should_wrap_enumeration_failure_as_adapter_error() {
        let adapter = ScriptedAdapter::new(SourceType::Hub, Vec::new());
        adapter.fail_fetch.store(true, Ordering::SeqCst);
        let rig = rig(adapter, SyncConfig::default());

        let result = rig.orchestrator.sync_from_source(SourceType::Hub).await;
        assert!(matches!(result, Err(HubError::Adapter { .. })));
    }

    #[tokio::test]
    async fn should_fail_sync_for_unknown_source() {
        let adapter = ScriptedAdapter::new(SourceType::Hub, Vec::new());
        let rig = rig(adapter, SyncConfig::default());

        let result = rig.orchestrator.sync_from_source(SourceType::Ups).await;
        assert!(matches!(result, Err(HubError::AdapterNotFound { .. })));
    }

    #[tokio::test]
    async fn should_publish_sync_completed_event() {
        let adapter = ScriptedAdapter::new(
            SourceType::Virtual,
            vec![raw("light.desk", EntityState::Off)],
        );
        let rig = rig(adapter, SyncConfig::default());
        let mut events = rig.events.subscribe();

        rig.orchestrator
            .sync_from_source(SourceType::Virtual)
            .await
            .unwrap();

        let first = events.recv().await.unwrap();
        assert!(matches!(first.kind, HubEventKind::EntityRegistered { .. }));
        let second = events.recv().await.unwrap();
        assert!(matches!(
            second.kind,
            HubEventKind::SyncCompleted { registered: 1, .. }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn should_stop_periodic_sync_cleanly() {
        let adapter = ScriptedAdapter::new(
            SourceType::Virtual,
            vec![raw("light.desk", EntityState::Off)],
        );
        let rig = rig(adapter, SyncConfig::default());

        assert!(rig.orchestrator.start_periodic(Duration::from_millis(20)));
        assert!(rig.orchestrator.is_periodic_running());
        // A second start is refused while the first is active.
        assert!(!rig.orchestrator.start_periodic(Duration::from_millis(20)));

        tokio::time::sleep(Duration::from_millis(60)).await;
        rig.orchestrator.stop_periodic().await;
        assert!(!rig.orchestrator.is_periodic_running());

        // The ticker synced at least once in the background.
        assert_eq!(rig.entities.len(), 1);
    }
}
