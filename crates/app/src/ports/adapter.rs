//! Adapter port — the fixed capability contract every source implements.
//!
//! An adapter bridges one external protocol (smart-home hub, UPS monitor,
//! virtual, …) into the unified entity system. The adapter registry holds
//! adapters exclusively through this trait — never as concrete types — so
//! sources stay interchangeable.
//!
//! Connection handling is deliberately passive: a failed
//! [`connect`](SourceAdapter::connect) leaves the adapter in an error state
//! recorded by the registry, and reconnection policy belongs to the
//! supervising layer, not to the adapter or registry.

use async_trait::async_trait;

use omnihub_domain::action::{ActionResult, EntityAction};
use omnihub_domain::adapter::HealthInfo;
use omnihub_domain::entity::RawEntity;
use omnihub_domain::error::HubError;
use omnihub_domain::source::SourceType;

/// A pluggable source of entities and the executor of their actions.
///
/// Implementations live in adapter crates (e.g. `omnihub-adapter-virtual`).
/// All methods take `&self`; adapters use interior mutability for their
/// connection state so they can be shared as `Arc<dyn SourceAdapter>`.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Unique identifier for this adapter instance (e.g. `"hub-main"`).
    fn id(&self) -> &str;

    /// The source this adapter owns. One adapter per source.
    fn source_type(&self) -> SourceType;

    /// Adapter build/protocol version string.
    fn version(&self) -> &str;

    /// Establish the connection to the external source.
    ///
    /// # Errors
    ///
    /// Returns an error when the source is unreachable or rejects the
    /// configured credentials. The adapter must be left safe to retry.
    async fn connect(&self) -> Result<(), HubError>;

    /// Tear down the connection. Must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error only when teardown itself fails; the adapter is
    /// considered disconnected afterwards either way.
    async fn disconnect(&self) -> Result<(), HubError>;

    /// Whether the adapter currently holds a usable connection.
    fn is_connected(&self) -> bool;

    /// Diagnostic snapshot for health endpoints.
    fn health(&self) -> HealthInfo;

    /// Full enumeration of every entity the source currently knows.
    ///
    /// # Errors
    ///
    /// Returns an error when the source cannot be queried; per-entity
    /// translation problems are the registry's concern, not the adapter's.
    async fn fetch_entities(&self) -> Result<Vec<RawEntity>, HubError>;

    /// Execute an action against an entity owned by this source.
    ///
    /// The router has already resolved the canonical id to
    /// `source_entity_id`, the identifier this source uses; the adapter
    /// never sees canonical ids.
    ///
    /// # Errors
    ///
    /// Returns an error when the source rejects or cannot deliver the
    /// command. The router wraps it into a structured [`ActionResult`].
    async fn execute_action(
        &self,
        source_entity_id: &str,
        action: &EntityAction,
    ) -> Result<ActionResult, HubError>;
}
