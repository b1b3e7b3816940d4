//! # omnihub-app
//!
//! Application core for the omnihub unified entity system.
//!
//! ## Responsibilities
//! - Define the **ports** (the [`SourceAdapter`](ports::SourceAdapter)
//!   contract every source implements, the external
//!   [`RoomProvider`](ports::RoomProvider))
//! - Own the **registries**: adapters, canonical entities, source
//!   priorities, and the conflict resolver that merges duplicate reports
//! - Drive **synchronization** from sources into the canonical store
//! - Route **actions** to the adapter owning the target entity
//! - Expose the [`UnifiedEntityService`](service::UnifiedEntityService)
//!   façade consumed by every outer layer
//!
//! ## Dependency rule
//! Depends only on `omnihub-domain`. Never imports adapter crates —
//! adapters are injected through the [`ports`] traits by the binary.

pub mod event_bus;
pub mod ports;
pub mod registries;
pub mod service;
pub mod sync;
