//! Room registry and the player to room index

use std::collections::HashMap;

use super::room::Room;
use super::{GameError, PlayerId, RoomId};

/// All live rooms, keyed by id, plus which room each seated player is in
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
    pub(super) player_rooms: HashMap<PlayerId, RoomId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, room: Room) {
        for player_id in room.player_ids() {
            self.player_rooms.insert(player_id, room.id());
        }
        self.rooms.insert(room.id(), room);
    }

    /// Remove a room and unindex its players
    pub fn remove(&mut self, room_id: RoomId) -> Option<Room> {
        let room = self.rooms.remove(&room_id)?;
        for player_id in room.player_ids() {
            if self.player_rooms.get(&player_id) == Some(&room_id) {
                self.player_rooms.remove(&player_id);
            }
        }
        Some(room)
    }

    pub fn room_id_of(&self, player_id: PlayerId) -> Option<RoomId> {
        self.player_rooms.get(&player_id).copied()
    }

    /// The room a player is seated in.
    ///
    /// `StateNotFound` if the player is not seated anywhere;
    /// `InvariantViolation` if the index points at a room that does not
    /// hold the player. The stale entry is dropped and the error names the
    /// room the player actually sits in, if any.
    pub fn room_for_player_mut(&mut self, player_id: PlayerId) -> Result<&mut Room, GameError> {
        let room_id = self
            .room_id_of(player_id)
            .ok_or_else(|| GameError::StateNotFound(format!("player {player_id} has no room")))?;

        let seated = self.rooms.get(&room_id).map(|room| room.contains(player_id));
        if seated != Some(true) {
            self.player_rooms.remove(&player_id);
            let actual = self
                .rooms
                .values()
                .find(|room| room.contains(player_id))
                .map(|room| room.id());
            return Err(GameError::InvariantViolation {
                room_id: actual.unwrap_or(room_id),
                reason: format!("player {player_id} indexed to room {room_id}"),
            });
        }

        self.rooms.get_mut(&room_id).ok_or_else(|| {
            GameError::StateNotFound(format!("room {room_id}"))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Room> {
        self.rooms.values_mut()
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.player_rooms.len()
    }
}
