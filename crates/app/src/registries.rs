//! Registries — the shared mutable state of the unified entity system.
//!
//! The adapter registry and entity registry are the only shared mutable
//! state in the core. Both serialize writes behind their own lock and are
//! owned by the [`RegistryManager`], which the
//! [`UnifiedEntityService`](crate::service::UnifiedEntityService) constructs
//! and exposes for introspection by admin/health endpoints.

pub mod adapter_registry;
pub mod conflict;
pub mod entity_registry;
pub mod priority;

use std::sync::Arc;

pub use adapter_registry::AdapterRegistry;
pub use conflict::{ConflictResolver, Resolution};
pub use entity_registry::{EntityRegistry, UpsertOutcome};
pub use priority::SourcePriorityManager;

/// Owner of the registries, the priority manager, and the conflict
/// resolver. Constructed once by the unified entity service; never a
/// process-wide global.
pub struct RegistryManager {
    adapters: Arc<AdapterRegistry>,
    entities: Arc<EntityRegistry>,
    priority: Arc<SourcePriorityManager>,
    resolver: Arc<ConflictResolver>,
}

impl RegistryManager {
    /// Build the registries around the given priority manager.
    #[must_use]
    pub fn new(priority: SourcePriorityManager) -> Self {
        let priority = Arc::new(priority);
        let resolver = Arc::new(ConflictResolver::new(Arc::clone(&priority)));
        Self {
            adapters: Arc::new(AdapterRegistry::new()),
            entities: Arc::new(EntityRegistry::new(Arc::clone(&resolver))),
            priority,
            resolver,
        }
    }

    #[must_use]
    pub fn adapter_registry(&self) -> &Arc<AdapterRegistry> {
        &self.adapters
    }

    #[must_use]
    pub fn entity_registry(&self) -> &Arc<EntityRegistry> {
        &self.entities
    }

    #[must_use]
    pub fn priority_manager(&self) -> &Arc<SourcePriorityManager> {
        &self.priority
    }

    #[must_use]
    pub fn conflict_resolver(&self) -> &Arc<ConflictResolver> {
        &self.resolver
    }
}

impl Default for RegistryManager {
    fn default() -> Self {
        Self::new(SourcePriorityManager::default())
    }
}
