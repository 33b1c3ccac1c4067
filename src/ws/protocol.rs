//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//! The byte layout lives in `codec`.

use std::fmt;

use crate::game::map::Wall;
use crate::game::{BulletId, PlayerId};

/// Longest name the one-byte length prefix can carry
pub const MAX_NAME_LEN: usize = u8::MAX as usize;

/// Leading type byte of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    // Client -> server
    Join = 0x01,
    PlayerInput = 0x02,
    FireBullet = 0x03,
    ReadyForRematch = 0x04,

    // Server -> client
    JoinSuccess = 0x10,
    GameState = 0x11,
    WaitingForPlayers = 0x16,
    GameStart = 0x17,
    BulletFired = 0x18,
    PlayerHit = 0x19,
    PlayerDied = 0x20,
    GameOver = 0x21,
    BulletDestroyed = 0x22,
    PlayerLeft = 0x23,
    WallsInfo = 0x30,
    BulletsState = 0x31,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => Self::Join,
            0x02 => Self::PlayerInput,
            0x03 => Self::FireBullet,
            0x04 => Self::ReadyForRematch,
            0x10 => Self::JoinSuccess,
            0x11 => Self::GameState,
            0x16 => Self::WaitingForPlayers,
            0x17 => Self::GameStart,
            0x18 => Self::BulletFired,
            0x19 => Self::PlayerHit,
            0x20 => Self::PlayerDied,
            0x21 => Self::GameOver,
            0x22 => Self::BulletDestroyed,
            0x23 => Self::PlayerLeft,
            0x30 => Self::WallsInfo,
            0x31 => Self::BulletsState,
            other => return Err(other),
        })
    }
}

/// Display name, at most 255 bytes of UTF-8
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerName(String);

impl PlayerName {
    /// Build a name, truncating on a char boundary to fit the wire limit
    pub fn new(name: impl Into<String>) -> Self {
        let mut name = name.into();
        if name.len() > MAX_NAME_LEN {
            let mut end = MAX_NAME_LEN;
            while !name.is_char_boundary(end) {
                end -= 1;
            }
            name.truncate(end);
        }
        Self(name)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for PlayerName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PlayerName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-reported tank pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputState {
    pub x: f32,
    pub y: f32,
    pub hull_rotation: f32,
    pub turret_rotation: f32,
}

impl InputState {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.hull_rotation.is_finite()
            && self.turret_rotation.is_finite()
    }
}

/// Fire request, velocity in client units (before the speed multiplier)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireRequest {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub vel_x: f32,
    pub vel_y: f32,
}

impl FireRequest {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.rotation.is_finite()
            && self.vel_x.is_finite()
            && self.vel_y.is_finite()
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMsg {
    /// Enter the lobby under a display name
    Join { name: PlayerName },

    /// Authoritative-looking pose from the client; the server only stores it
    PlayerInput(InputState),

    /// Request to spawn a bullet
    FireBullet(FireRequest),

    /// Ready for another round after game over
    ReadyForRematch,
}

impl ClientMsg {
    pub fn message_type(&self) -> MessageType {
        match self {
            ClientMsg::Join { .. } => MessageType::Join,
            ClientMsg::PlayerInput(_) => MessageType::PlayerInput,
            ClientMsg::FireBullet(_) => MessageType::FireBullet,
            ClientMsg::ReadyForRematch => MessageType::ReadyForRematch,
        }
    }
}

/// Player state in a snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub hull_rotation: f32,
    pub turret_rotation: f32,
    pub health: u8,
}

/// Player entry of a game start message
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStart {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub hull_rotation: f32,
    pub turret_rotation: f32,
    pub name: PlayerName,
}

/// Per-player line of the game over summary
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub kills: u8,
    pub deaths: u8,
    pub name: PlayerName,
}

/// Bullet state, used both for spawn notices and snapshots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletSnapshot {
    pub id: BulletId,
    pub owner_id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub vel_x: f32,
    pub vel_y: f32,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMsg {
    /// Join accepted, carries the assigned player id
    JoinSuccess { player_id: PlayerId },

    /// Full player snapshot (sent every tick)
    GameState { players: Vec<PlayerSnapshot> },

    /// Number of players currently waiting in the lobby
    WaitingForPlayers { count: u8 },

    /// Match (or rematch) is starting
    GameStart { players: [PlayerStart; 2] },

    /// A bullet was spawned
    BulletFired(BulletSnapshot),

    /// A player lost health
    PlayerHit { player_id: PlayerId, health: u8 },

    /// A player's health reached zero
    PlayerDied { player_id: PlayerId },

    /// Match has ended. No winner is encoded as id 0.
    GameOver {
        winner_id: Option<PlayerId>,
        players: [PlayerSummary; 2],
    },

    /// A bullet was removed
    BulletDestroyed { bullet_id: BulletId },

    /// The opponent disconnected
    PlayerLeft { player_id: PlayerId },

    /// Static map layout
    WallsInfo {
        map_width: f32,
        map_height: f32,
        walls: Vec<Wall>,
    },

    /// Full bullet snapshot (sent every tick)
    BulletsState { bullets: Vec<BulletSnapshot> },
}

impl ServerMsg {
    pub fn message_type(&self) -> MessageType {
        match self {
            ServerMsg::JoinSuccess { .. } => MessageType::JoinSuccess,
            ServerMsg::GameState { .. } => MessageType::GameState,
            ServerMsg::WaitingForPlayers { .. } => MessageType::WaitingForPlayers,
            ServerMsg::GameStart { .. } => MessageType::GameStart,
            ServerMsg::BulletFired(_) => MessageType::BulletFired,
            ServerMsg::PlayerHit { .. } => MessageType::PlayerHit,
            ServerMsg::PlayerDied { .. } => MessageType::PlayerDied,
            ServerMsg::GameOver { .. } => MessageType::GameOver,
            ServerMsg::BulletDestroyed { .. } => MessageType::BulletDestroyed,
            ServerMsg::PlayerLeft { .. } => MessageType::PlayerLeft,
            ServerMsg::WallsInfo { .. } => MessageType::WallsInfo,
            ServerMsg::BulletsState { .. } => MessageType::BulletsState,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_byte_round_trip() {
        for byte in 0u8..=255 {
            if let Ok(kind) = MessageType::try_from(byte) {
                assert_eq!(kind as u8, byte);
            }
        }
        assert_eq!(MessageType::try_from(0x05), Err(0x05));
    }

    #[test]
    fn long_names_truncate_on_char_boundary() {
        let ascii = PlayerName::new("a".repeat(300));
        assert_eq!(ascii.as_bytes().len(), MAX_NAME_LEN);

        // 'é' is two bytes; 128 of them is 256 bytes
        let accented = PlayerName::new("é".repeat(128));
        assert_eq!(accented.as_bytes().len(), 254);
        assert!(accented.to_string().chars().all(|c| c == 'é'));
    }
}
