//! Room port — read-only lookups against the external room service.
//!
//! The core stores only `room_id` weak references and uses this port to
//! decorate read responses. It never writes room data.

use async_trait::async_trait;

use omnihub_domain::error::HubError;
use omnihub_domain::id::RoomId;
use omnihub_domain::room::Room;

/// Supplier of `room_id → room` lookups.
#[async_trait]
pub trait RoomProvider: Send + Sync {
    /// Look up a room by id. `Ok(None)` when the room does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error when the room service cannot be reached.
    async fn room(&self, room_id: RoomId) -> Result<Option<Room>, HubError>;
}
