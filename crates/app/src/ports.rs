//! Port definitions — traits that adapters and external services implement.
//!
//! Ports are the boundaries between the application core and the outside
//! world. They are defined here (in `app`) so that both the use-case layer
//! and the adapter layer can depend on them without creating circular
//! dependencies.

pub mod adapter;
pub mod room;

pub use adapter::SourceAdapter;
pub use room::RoomProvider;
