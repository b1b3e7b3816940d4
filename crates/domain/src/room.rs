//! Room — a logical grouping owned by an external room service.
//!
//! The core stores only the `room_id` weak reference on entities and uses
//! rooms purely to decorate read responses. It never writes room data and
//! rooms never hold back-pointers to entities.

use serde::{Deserialize, Serialize};

use crate::id::RoomId;

/// A room as supplied by the external room service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
}
