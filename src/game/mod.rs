//! Game simulation modules

pub mod combat;
pub mod map;
pub mod physics;
pub mod registry;
pub mod room;
pub mod server;
pub mod snapshot;
pub mod tick;

pub use server::{GameServer, ServerEvent, ServerStats};

/// Numeric player id, assigned at JOIN. Zero is never issued.
pub type PlayerId = u32;
pub type BulletId = u32;
pub type RoomId = u32;

/// Failures while applying a client message or maintaining a room
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    /// The message refers to a player or room that is no longer tracked
    #[error("state not found: {0}")]
    StateNotFound(String),

    /// A room was observed in an impossible state; the room is torn down
    #[error("room {room_id} invariant violated: {reason}")]
    InvariantViolation { room_id: RoomId, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}
