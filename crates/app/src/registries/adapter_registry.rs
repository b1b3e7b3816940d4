//! Adapter registry — owns the set of registered source adapters.
//!
//! The registry is the only component that invokes adapter methods
//! directly. It tracks a [`AdapterRecord`] per adapter (connection state,
//! health snapshot, connect/disconnect history) and serializes its own
//! state behind a lock. Adapter futures are never awaited while the lock
//! is held.
//!
//! Connecting is explicit: registration never connects, so startup
//! ordering and retry policy stay with the supervising layer. A failed
//! connect records [`ConnectionState::Error`] and surfaces the error —
//! the registry itself never retries.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use omnihub_domain::adapter::{AdapterRecord, ConnectionState, HealthInfo};
use omnihub_domain::error::{HubError, ValidationError};
use omnihub_domain::source::SourceType;
use omnihub_domain::time::now;

use crate::ports::SourceAdapter;

struct AdapterEntry {
    adapter: Arc<dyn SourceAdapter>,
    record: AdapterRecord,
}

/// Concurrent map of adapters keyed by adapter id, with a per-source
/// uniqueness guarantee.
pub struct AdapterRegistry {
    inner: RwLock<HashMap<String, AdapterEntry>>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, AdapterEntry>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, AdapterEntry>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an adapter without connecting it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AdapterAlreadyRegistered`] when an adapter with
    /// the same id, or another adapter for the same source, already exists.
    pub fn register(&self, adapter: Arc<dyn SourceAdapter>) -> Result<(), HubError> {
        let adapter_id = adapter.id().to_string();
        if adapter_id.is_empty() {
            return Err(ValidationError::EmptyAdapterId.into());
        }
        let source = adapter.source_type();

        let mut inner = self.write();
        if inner.contains_key(&adapter_id) {
            return Err(HubError::AdapterAlreadyRegistered { adapter_id });
        }
        if let Some(existing) = inner
            .values()
            .find(|entry| entry.record.source == source)
        {
            return Err(HubError::AdapterAlreadyRegistered {
                adapter_id: existing.record.adapter_id.clone(),
            });
        }

        let record = AdapterRecord::new(&adapter_id, source, adapter.version());
        tracing::info!(
            adapter_id,
            source = %source,
            version = record.version,
            "adapter registered"
        );
        inner.insert(adapter_id, AdapterEntry { adapter, record });
        Ok(())
    }

    /// Remove an adapter from the registry.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AdapterNotFound`] when no adapter has this id.
    pub fn unregister(&self, adapter_id: &str) -> Result<(), HubError> {
        let removed = self.write().remove(adapter_id);
        match removed {
            Some(entry) => {
                tracing::info!(adapter_id, source = %entry.record.source, "adapter unregistered");
                Ok(())
            }
            None => Err(HubError::AdapterNotFound {
                adapter: adapter_id.to_string(),
            }),
        }
    }

    /// Look up an adapter by id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AdapterNotFound`] when no adapter has this id.
    pub fn get(&self, adapter_id: &str) -> Result<Arc<dyn SourceAdapter>, HubError> {
        self.read()
            .get(adapter_id)
            .map(|entry| Arc::clone(&entry.adapter))
            .ok_or_else(|| HubError::AdapterNotFound {
                adapter: adapter_id.to_string(),
            })
    }

    /// Look up the adapter owning a source.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AdapterNotFound`] when no adapter is registered
    /// for the source.
    pub fn get_by_source(&self, source: SourceType) -> Result<Arc<dyn SourceAdapter>, HubError> {
        self.read()
            .values()
            .find(|entry| entry.record.source == source)
            .map(|entry| Arc::clone(&entry.adapter))
            .ok_or_else(|| HubError::adapter_not_found(source))
    }

    /// All registered adapters.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<dyn SourceAdapter>> {
        self.read()
            .values()
            .map(|entry| Arc::clone(&entry.adapter))
            .collect()
    }

    /// Only the adapters that currently report a usable connection.
    #[must_use]
    pub fn connected(&self) -> Vec<Arc<dyn SourceAdapter>> {
        self.read()
            .values()
            .filter(|entry| entry.adapter.is_connected())
            .map(|entry| Arc::clone(&entry.adapter))
            .collect()
    }

    /// The registration record for an adapter, if present.
    #[must_use]
    pub fn record(&self, adapter_id: &str) -> Option<AdapterRecord> {
        self.read().get(adapter_id).map(|entry| entry.record.clone())
    }

    /// Registration records for every adapter.
    #[must_use]
    pub fn records(&self) -> Vec<AdapterRecord> {
        self.read()
            .values()
            .map(|entry| entry.record.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Connect an adapter and record the outcome.
    ///
    /// The adapter future runs without holding the registry lock.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AdapterNotFound`] when no adapter has this id,
    /// or the adapter's own connect failure. On failure the record is left
    /// in [`ConnectionState::Error`] with the message retained.
    pub async fn connect(&self, adapter_id: &str) -> Result<(), HubError> {
        let adapter = {
            let mut inner = self.write();
            let entry = inner
                .get_mut(adapter_id)
                .ok_or_else(|| HubError::AdapterNotFound {
                    adapter: adapter_id.to_string(),
                })?;
            entry.record.connection_state = ConnectionState::Connecting;
            Arc::clone(&entry.adapter)
        };

        let result = adapter.connect().await;

        let mut inner = self.write();
        if let Some(entry) = inner.get_mut(adapter_id) {
            match &result {
                Ok(()) => {
                    entry.record.connection_state = ConnectionState::Connected;
                    entry.record.connected_at = Some(now());
                    entry.record.last_error = None;
                    entry.record.health = Some(adapter.health());
                    tracing::info!(adapter_id, source = %entry.record.source, "adapter connected");
                }
                Err(err) => {
                    entry.record.connection_state = ConnectionState::Error;
                    entry.record.last_error = Some(err.to_string());
                    tracing::warn!(adapter_id, error = %err, "adapter connect failed");
                }
            }
        }
        result
    }

    /// Disconnect an adapter and record the outcome. The adapter is
    /// considered disconnected even when teardown reports an error.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AdapterNotFound`] when no adapter has this id,
    /// or the adapter's own teardown failure.
    pub async fn disconnect(&self, adapter_id: &str) -> Result<(), HubError> {
        let adapter = self.get(adapter_id)?;
        let result = adapter.disconnect().await;

        let mut inner = self.write();
        if let Some(entry) = inner.get_mut(adapter_id) {
            entry.record.connection_state = ConnectionState::Disconnected;
            entry.record.disconnected_at = Some(now());
            tracing::info!(adapter_id, source = %entry.record.source, "adapter disconnected");
        }
        result
    }

    /// Take a fresh health snapshot from the adapter and store it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AdapterNotFound`] when no adapter has this id.
    pub fn refresh_health(&self, adapter_id: &str) -> Result<HealthInfo, HubError> {
        let adapter = self.get(adapter_id)?;
        let health = adapter.health();

        let mut inner = self.write();
        if let Some(entry) = inner.get_mut(adapter_id) {
            entry.record.health = Some(health.clone());
        }
        Ok(health)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use omnihub_domain::action::{ActionResult, EntityAction};
    use omnihub_domain::entity::RawEntity;

    struct FakeAdapter {
        id: String,
        source: SourceType,
        connected: AtomicBool,
        fail_connect: bool,
    }

    impl FakeAdapter {
        fn new(id: &str, source: SourceType) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                source,
                connected: AtomicBool::new(false),
                fail_connect: false,
            })
        }

        fn failing(id: &str, source: SourceType) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                source,
                connected: AtomicBool::new(false),
                fail_connect: true,
            })
        }
    }

    #[async_trait]
    impl SourceAdapter for FakeAdapter {
        fn id(&self) -> &str {
            &self.id
        }

        fn source_type(&self) -> SourceType {
            self.source
        }

        fn version(&self) -> &str {
            "0.0.1"
        }

        async fn connect(&self) -> Result<(), HubError> {
            if self.fail_connect {
                return Err(HubError::adapter(self.source, "connection refused"));
            }
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
            Ok(Vec::new())
        }

        async fn execute_action(
            &self,
            _source_entity_id: &str,
            action: &EntityAction,
        ) -> Result<ActionResult, HubError> {
            Ok(ActionResult::ok(action, None))
        }
    }

    #[test]
    fn should_register_and_look_up_adapter_by_id_and_source() {
        let registry = AdapterRegistry::new();
        registry
            .register(FakeAdapter::new("virtual-1", SourceType::Virtual))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("virtual-1").unwrap().id(), "virtual-1");
        assert_eq!(
            registry.get_by_source(SourceType::Virtual).unwrap().id(),
            "virtual-1"
        );
    }

    #[test]
    fn should_reject_duplicate_adapter_id() {
        let registry = AdapterRegistry::new();
        registry
            .register(FakeAdapter::new("hub-1", SourceType::Hub))
            .unwrap();

        let result = registry.register(FakeAdapter::new("hub-1", SourceType::Virtual));
        assert!(matches!(
            result,
            Err(HubError::AdapterAlreadyRegistered { .. })
        ));
    }

    #[test]
    fn should_reject_second_adapter_for_same_source() {
        let registry = AdapterRegistry::new();
        registry
            .register(FakeAdapter::new("hub-1", SourceType::Hub))
            .unwrap();

        let result = registry.register(FakeAdapter::new("hub-2", SourceType::Hub));
        assert!(matches!(
            result,
            Err(HubError::AdapterAlreadyRegistered { adapter_id }) if adapter_id == "hub-1"
        ));
    }

    #[test]
    fn should_return_not_found_for_unknown_adapter() {
        let registry = AdapterRegistry::new();
        assert!(matches!(
            registry.get("nope"),
            Err(HubError::AdapterNotFound { .. })
        ));
        assert!(matches!(
            registry.get_by_source(SourceType::Ups),
            Err(HubError::AdapterNotFound { .. })
        ));
    }

    #[test]
    fn should_unregister_adapter() {
        let registry = AdapterRegistry::new();
        registry
            .register(FakeAdapter::new("ups-1", SourceType::Ups))
            .unwrap();
        registry.unregister("ups-1").unwrap();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.unregister("ups-1"),
            Err(HubError::AdapterNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn should_record_connected_state_after_successful_connect() {
        let registry = AdapterRegistry::new();
        registry
            .register(FakeAdapter::new("hub-1", SourceType::Hub))
            .unwrap();

        registry.connect("hub-1").await.unwrap();

        let record = registry.record("hub-1").unwrap();
        assert_eq!(record.connection_state, ConnectionState::Connected);
        assert!(record.connected_at.is_some());
        assert!(record.last_error.is_none());
        assert!(record.health.is_some());
        assert_eq!(registry.connected().len(), 1);
    }

    #[tokio::test]
    async fn should_record_error_state_when_connect_fails() {
        let registry = AdapterRegistry::new();
        registry
            .register(FakeAdapter::failing("hub-1", SourceType::Hub))
            .unwrap();

        let result = registry.connect("hub-1").await;
        assert!(matches!(result, Err(HubError::Adapter { .. })));

        let record = registry.record("hub-1").unwrap();
        assert_eq!(record.connection_state, ConnectionState::Error);
        assert!(record.last_error.unwrap().contains("connection refused"));
        assert!(registry.connected().is_empty());
    }

    #[tokio::test]
    async fn should_record_disconnected_state_after_disconnect() {
        let registry = AdapterRegistry::new();
        registry
            .register(FakeAdapter::new("hub-1", SourceType::Hub))
            .unwrap();
        registry.connect("hub-1").await.unwrap();

        registry.disconnect("hub-1").await.unwrap();

        let record = registry.record("hub-1").unwrap();
        assert_eq!(record.connection_state, ConnectionState::Disconnected);
        assert!(record.disconnected_at.is_some());
    }

    #[test]
    fn should_store_health_snapshot_on_refresh() {
        let registry = AdapterRegistry::new();
        registry
            .register(FakeAdapter::new("hub-1", SourceType::Hub))
            .unwrap();

        let health = registry.refresh_health("hub-1").unwrap();
        assert!(health.healthy);
        assert!(registry.record("hub-1").unwrap().health.is_some());
    }
}
