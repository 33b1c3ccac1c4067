//! Matchmaking service - lobby admission and room creation

use tracing::{info, warn};

use crate::config::GameConfig;
use crate::game::room::{Room, Seat};
use crate::game::snapshot::SnapshotBuilder;
use crate::game::{GameError, PlayerId, RoomId};
use crate::ws::connection::ClientConnection;
use crate::ws::protocol::{PlayerName, ServerMsg};

use super::queue::{MatchmakingQueue, QueuedPlayer};

/// Lobby plus the player and room id counters
#[derive(Debug)]
pub struct Matchmaker {
    queue: MatchmakingQueue,
    next_player_id: PlayerId,
    next_room_id: RoomId,
}

impl Default for Matchmaker {
    fn default() -> Self {
        Self::new()
    }
}

impl Matchmaker {
    pub fn new() -> Self {
        Self {
            queue: MatchmakingQueue::new(),
            next_player_id: 1,
            next_room_id: 1,
        }
    }

    /// Admit a connection to the lobby under a fresh player id.
    ///
    /// Sends JOIN_SUCCESS and the lobby size to the joining connection.
    pub fn join(&mut self, connection: ClientConnection, name: PlayerName) -> PlayerId {
        let player_id = self.next_player_id;
        self.next_player_id = self.next_player_id.wrapping_add(1).max(1);

        connection.send(&ServerMsg::JoinSuccess { player_id });

        info!(
            player_id,
            conn_id = %connection.conn_id(),
            name = %name,
            "Player joined lobby"
        );

        self.queue
            .enqueue(QueuedPlayer::new(player_id, name, connection.clone()));

        let count = u8::try_from(self.queue.len()).unwrap_or(u8::MAX);
        connection.send(&ServerMsg::WaitingForPlayers { count });

        player_id
    }

    /// Pair the two oldest waiting players into a new room, if possible.
    ///
    /// Both connections receive the wall layout and GAME_START.
    pub fn try_create_room(&mut self, config: &GameConfig) -> Option<Result<Room, GameError>> {
        let [first, second] = self.queue.try_form_pair()?;

        let room_id = self.next_room_id;
        self.next_room_id = self.next_room_id.wrapping_add(1).max(1);

        let waited_ms = first.wait_time().as_millis() as u64;
        let seats = [first, second].map(|p| Seat {
            player_id: p.player_id,
            name: p.name,
            connection: p.connection,
        });

        let room = match Room::new(room_id, seats, config) {
            Ok(room) => room,
            Err(e) => {
                warn!(room_id, error = %e, "Failed to create room");
                return Some(Err(e));
            }
        };

        let [p1, p2] = room.player_ids();
        info!(room_id, p1, p2, waited_ms, "Room created");

        room.broadcast(&SnapshotBuilder::walls(config), None);
        room.broadcast(&room.game_start_msg(), None);

        Some(Ok(room))
    }

    /// Remove a waiting player. Returns true if they were queued.
    pub fn leave(&mut self, player_id: PlayerId) -> bool {
        let removed = self.queue.dequeue(player_id).is_some();
        if removed {
            info!(player_id, lobby_size = self.queue.len(), "Player left lobby");
        }
        removed
    }

    pub fn is_waiting(&self, player_id: PlayerId) -> bool {
        self.queue.contains(player_id)
    }

    pub fn lobby_size(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::MessageType;
    use bytes::Bytes;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::Receiver<Bytes>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(ServerMsg::decode(&frame).unwrap());
        }
        out
    }

    #[test]
    fn join_confirms_and_reports_lobby_size() {
        let mut matchmaker = Matchmaker::new();
        let (conn, mut rx) = ClientConnection::channel(8);

        let id = matchmaker.join(conn, "P1".into());

        assert_eq!(id, 1);
        assert_eq!(
            drain(&mut rx),
            vec![
                ServerMsg::JoinSuccess { player_id: 1 },
                ServerMsg::WaitingForPlayers { count: 1 },
            ]
        );
        assert!(matchmaker.is_waiting(1));
        assert!(matchmaker.try_create_room(&GameConfig::default()).is_none());
    }

    #[test]
    fn second_join_forms_room_and_empties_lobby() {
        let config = GameConfig::default();
        let mut matchmaker = Matchmaker::new();
        let (c1, mut rx1) = ClientConnection::channel(8);
        let (c2, mut rx2) = ClientConnection::channel(8);

        matchmaker.join(c1, "P1".into());
        matchmaker.join(c2, "P2".into());
        let room = matchmaker.try_create_room(&config).unwrap().unwrap();

        assert_eq!(room.id(), 1);
        assert_eq!(room.player_ids(), [1, 2]);
        assert_eq!(matchmaker.lobby_size(), 0);
        assert!(!matchmaker.is_waiting(1));

        let first: Vec<_> = drain(&mut rx1).iter().map(|m| m.message_type()).collect();
        assert_eq!(
            first,
            vec![
                MessageType::JoinSuccess,
                MessageType::WaitingForPlayers,
                MessageType::WallsInfo,
                MessageType::GameStart,
            ]
        );

        let second = drain(&mut rx2);
        assert_eq!(second[1], ServerMsg::WaitingForPlayers { count: 2 });
        match &second[3] {
            ServerMsg::GameStart { players } => {
                assert_eq!((players[0].id, players[0].x), (1, 200.0));
                assert_eq!((players[1].id, players[1].x), (2, 1600.0));
                assert_eq!(players[1].name.to_string(), "P2");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn leave_only_affects_queued_players() {
        let mut matchmaker = Matchmaker::new();
        let id = matchmaker.join(ClientConnection::channel(4).0, "solo".into());

        assert!(matchmaker.leave(id));
        assert!(!matchmaker.leave(id));
        assert_eq!(matchmaker.lobby_size(), 0);
    }
}
