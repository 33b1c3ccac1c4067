//! Room state: two players, their bullets and the match phase

use bytes::Bytes;

use crate::config::GameConfig;
use crate::game::map::{MapLayout, SpawnPoint};
use crate::ws::connection::ClientConnection;
use crate::ws::protocol::{
    InputState, PlayerName, PlayerSnapshot, PlayerStart, PlayerSummary, ServerMsg,
};

use super::combat::Bullet;
use super::{GameError, PlayerId, RoomId};

/// Room phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Match in progress
    Active,
    /// Match ended, waiting for a rematch handshake
    GameOver,
}

/// Player state in a room (authoritative)
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: PlayerName,

    // Pose, as last reported by the client
    pub x: f32,
    pub y: f32,
    pub hull_rotation: f32,
    pub turret_rotation: f32,

    pub health: u8,

    // Stats
    pub kills: u8,
    pub deaths: u8,

    /// Rematch handshake flag
    pub ready: bool,
}

impl PlayerState {
    pub fn new(id: PlayerId, name: PlayerName, spawn: SpawnPoint, config: &GameConfig) -> Self {
        Self {
            id,
            name,
            x: spawn.x,
            y: spawn.y,
            hull_rotation: spawn.rotation,
            turret_rotation: spawn.rotation,
            health: config.max_health,
            kills: 0,
            deaths: 0,
            ready: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Restore everything except identity to spawn defaults
    pub fn respawn(&mut self, spawn: SpawnPoint, config: &GameConfig) {
        *self = Self::new(self.id, self.name.clone(), spawn, config);
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            x: self.x,
            y: self.y,
            hull_rotation: self.hull_rotation,
            turret_rotation: self.turret_rotation,
            health: self.health,
        }
    }

    pub fn start_info(&self) -> PlayerStart {
        PlayerStart {
            id: self.id,
            x: self.x,
            y: self.y,
            hull_rotation: self.hull_rotation,
            turret_rotation: self.turret_rotation,
            name: self.name.clone(),
        }
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id,
            kills: self.kills,
            deaths: self.deaths,
            name: self.name.clone(),
        }
    }
}

/// A player taking a seat in a new room
#[derive(Debug, Clone)]
pub struct Seat {
    pub player_id: PlayerId,
    pub name: PlayerName,
    pub connection: ClientConnection,
}

/// Result of a game over check that ended the match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    /// None when both players went down in the same pass
    pub winner: Option<PlayerId>,
}

/// One two-player session. Seat 0 spawns left, seat 1 spawns right.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    phase: RoomPhase,
    players: [PlayerState; 2],
    connections: [ClientConnection; 2],
    pub(super) bullets: Vec<Bullet>,
    /// Ticks simulated since the room was created
    pub ticks: u64,
}

impl Room {
    pub fn new(id: RoomId, seats: [Seat; 2], config: &GameConfig) -> Result<Self, GameError> {
        let [left, right] = seats;
        if left.player_id == right.player_id {
            return Err(GameError::InvariantViolation {
                room_id: id,
                reason: format!("player {} seated twice", left.player_id),
            });
        }

        Ok(Self {
            id,
            phase: RoomPhase::Active,
            players: [
                PlayerState::new(left.player_id, left.name, config.left_spawn, config),
                PlayerState::new(right.player_id, right.name, config.right_spawn, config),
            ],
            connections: [left.connection, right.connection],
            bullets: Vec::new(),
            ticks: 0,
        })
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == RoomPhase::GameOver
    }

    pub fn players(&self) -> &[PlayerState; 2] {
        &self.players
    }

    pub fn player_ids(&self) -> [PlayerId; 2] {
        [self.players[0].id, self.players[1].id]
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.seat_of(player_id).is_some()
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&PlayerState> {
        self.seat_of(player_id).map(|seat| &self.players[seat])
    }

    pub fn opponent_of(&self, player_id: PlayerId) -> Option<&PlayerState> {
        self.seat_of(player_id).map(|seat| &self.players[1 - seat])
    }

    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    fn seat_of(&self, player_id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == player_id)
    }

    fn player_mut(&mut self, player_id: PlayerId) -> Result<&mut PlayerState, GameError> {
        let room_id = self.id;
        self.players
            .iter_mut()
            .find(|p| p.id == player_id)
            .ok_or_else(|| {
                GameError::StateNotFound(format!("player {player_id} in room {room_id}"))
            })
    }

    /// Take one point of health. Returns the resulting health; hitting a
    /// dead player is a no-op returning 0.
    pub fn hit_player(&mut self, player_id: PlayerId) -> Result<u8, GameError> {
        let player = self.player_mut(player_id)?;
        player.health = player.health.saturating_sub(1);
        Ok(player.health)
    }

    pub fn record_kill(&mut self, player_id: PlayerId) -> Result<(), GameError> {
        let player = self.player_mut(player_id)?;
        player.kills = player.kills.saturating_add(1);
        Ok(())
    }

    pub fn record_death(&mut self, player_id: PlayerId) -> Result<(), GameError> {
        let player = self.player_mut(player_id)?;
        player.deaths = player.deaths.saturating_add(1);
        Ok(())
    }

    /// Move the room to `GameOver` once at most one player is alive
    pub fn check_game_over(&mut self) -> Option<MatchResult> {
        let mut alive = self.players.iter().filter(|p| p.is_alive());
        let first = alive.next();
        if first.is_some() && alive.next().is_some() {
            return None;
        }

        let winner = first.map(|p| p.id);
        self.phase = RoomPhase::GameOver;
        Some(MatchResult { winner })
    }

    pub fn set_player_ready(&mut self, player_id: PlayerId) -> Result<(), GameError> {
        self.player_mut(player_id)?.ready = true;
        Ok(())
    }

    pub fn are_both_players_ready(&self) -> bool {
        self.players.iter().all(|p| p.ready)
    }

    /// Put the room back into the state of a freshly created one.
    /// Ids, names and connections are kept.
    pub fn reset_for_rematch(&mut self, config: &GameConfig) {
        self.players[0].respawn(config.left_spawn, config);
        self.players[1].respawn(config.right_spawn, config);
        self.bullets.clear();
        self.phase = RoomPhase::Active;
    }

    /// Store a client-reported pose, clamped to the map
    pub fn update_player_position(
        &mut self,
        player_id: PlayerId,
        input: &InputState,
        map: &MapLayout,
    ) -> Result<(), GameError> {
        if !input.is_finite() {
            return Err(GameError::InvalidInput("non-finite player input"));
        }

        let player = self.player_mut(player_id)?;
        let (x, y) = map.clamp_point(input.x, input.y);
        player.x = x;
        player.y = y;
        player.hull_rotation = input.hull_rotation;
        player.turret_rotation = input.turret_rotation;
        Ok(())
    }

    pub fn add_bullet(&mut self, bullet: Bullet) {
        self.bullets.push(bullet);
    }

    /// Send to both players, optionally skipping one. Encodes once.
    /// Returns the number of connections that accepted the frame.
    pub fn broadcast(&self, msg: &ServerMsg, exclude: Option<PlayerId>) -> usize {
        self.broadcast_frame(msg.encode(), exclude)
    }

    pub fn broadcast_frame(&self, frame: Bytes, exclude: Option<PlayerId>) -> usize {
        self.players
            .iter()
            .zip(&self.connections)
            .filter(|(player, _)| Some(player.id) != exclude)
            .filter(|(_, conn)| conn.send_frame(frame.clone()))
            .count()
    }

    pub fn send_to(&self, player_id: PlayerId, msg: &ServerMsg) -> bool {
        self.seat_of(player_id)
            .map(|seat| self.connections[seat].send(msg))
            .unwrap_or(false)
    }

    pub fn game_start_msg(&self) -> ServerMsg {
        ServerMsg::GameStart {
            players: [self.players[0].start_info(), self.players[1].start_info()],
        }
    }

    pub fn game_over_msg(&self, result: MatchResult) -> ServerMsg {
        ServerMsg::GameOver {
            winner_id: result.winner,
            players: [self.players[0].summary(), self.players[1].summary()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::FireRequest;
    use tokio::sync::mpsc;

    fn seat(player_id: PlayerId, name: &str) -> (Seat, mpsc::Receiver<Bytes>) {
        let (connection, rx) = ClientConnection::channel(16);
        (
            Seat {
                player_id,
                name: name.into(),
                connection,
            },
            rx,
        )
    }

    fn room(config: &GameConfig) -> (Room, mpsc::Receiver<Bytes>, mpsc::Receiver<Bytes>) {
        let (a, rx_a) = seat(1, "P1");
        let (b, rx_b) = seat(2, "P2");
        (Room::new(1, [a, b], config).unwrap(), rx_a, rx_b)
    }

    #[test]
    fn new_room_uses_opposite_spawns() {
        let config = GameConfig::default();
        let (room, _, _) = room(&config);
        let [p1, p2] = room.players();

        assert_eq!((p1.x, p1.y, p1.hull_rotation), (200.0, 400.0, 0.0));
        assert_eq!((p2.x, p2.y, p2.hull_rotation), (1600.0, 400.0, std::f32::consts::PI));
        assert_eq!(p2.turret_rotation, std::f32::consts::PI);
        assert!(room.players().iter().all(|p| p.health == 3));
        assert!(!room.is_game_over());
    }

    #[test]
    fn duplicate_player_is_an_invariant_violation() {
        let config = GameConfig::default();
        let (a, _rx_a) = seat(5, "same");
        let (b, _rx_b) = seat(5, "same");
        let err = Room::new(9, [a, b], &config).unwrap_err();
        assert!(matches!(err, GameError::InvariantViolation { room_id: 9, .. }));
    }

    #[test]
    fn hit_player_floors_at_zero() {
        let config = GameConfig::default();
        let (mut room, _, _) = room(&config);

        assert_eq!(room.hit_player(2), Ok(2));
        assert_eq!(room.hit_player(2), Ok(1));
        assert_eq!(room.hit_player(2), Ok(0));
        assert_eq!(room.hit_player(2), Ok(0));
        assert!(matches!(room.hit_player(99), Err(GameError::StateNotFound(_))));
    }

    #[test]
    fn last_hit_ends_match_with_winner() {
        let config = GameConfig::default();
        let (mut room, _, _) = room(&config);

        room.hit_player(2).unwrap();
        room.hit_player(2).unwrap();
        assert_eq!(room.check_game_over(), None);

        assert_eq!(room.hit_player(2), Ok(0));
        assert_eq!(room.check_game_over(), Some(MatchResult { winner: Some(1) }));
        assert!(room.is_game_over());
    }

    #[test]
    fn double_elimination_has_no_winner() {
        let config = GameConfig::default();
        let (mut room, _, _) = room(&config);
        for _ in 0..3 {
            room.hit_player(1).unwrap();
            room.hit_player(2).unwrap();
        }
        assert_eq!(room.check_game_over(), Some(MatchResult { winner: None }));
    }

    #[test]
    fn stats_saturate() {
        let config = GameConfig::default();
        let (mut room, _, _) = room(&config);
        for _ in 0..300 {
            room.record_kill(1).unwrap();
            room.record_death(2).unwrap();
        }
        assert_eq!(room.player(1).unwrap().kills, u8::MAX);
        assert_eq!(room.player(2).unwrap().deaths, u8::MAX);
    }

    #[test]
    fn rematch_restores_fresh_state() {
        let config = GameConfig::default();
        let (fresh, _, _) = room(&config);
        let (mut played, _, _) = room(&config);

        played
            .update_player_position(
                1,
                &InputState {
                    x: 700.0,
                    y: 120.0,
                    hull_rotation: 1.0,
                    turret_rotation: 2.0,
                },
                &config.map,
            )
            .unwrap();
        let fire = FireRequest {
            x: 700.0,
            y: 120.0,
            rotation: 0.0,
            vel_x: 1.0,
            vel_y: 0.0,
        };
        played.add_bullet(Bullet::new(1, 1, fire, 0, &config));
        for _ in 0..3 {
            played.hit_player(2).unwrap();
        }
        played.record_kill(1).unwrap();
        played.record_death(2).unwrap();
        played.check_game_over();

        played.set_player_ready(1).unwrap();
        assert!(!played.are_both_players_ready());
        played.set_player_ready(2).unwrap();
        assert!(played.are_both_players_ready());

        played.reset_for_rematch(&config);

        assert_eq!(played.players(), fresh.players());
        assert!(played.bullets().is_empty());
        assert!(!played.is_game_over());
        assert_eq!(played.id(), fresh.id());
        assert!(!played.are_both_players_ready());
    }

    #[test]
    fn position_updates_are_clamped_and_validated() {
        let config = GameConfig::default();
        let (mut room, _, _) = room(&config);

        let input = InputState {
            x: -50.0,
            y: 5_000.0,
            hull_rotation: 0.5,
            turret_rotation: -0.5,
        };
        room.update_player_position(1, &input, &config.map).unwrap();
        let p1 = room.player(1).unwrap();
        assert_eq!((p1.x, p1.y), (0.0, 800.0));
        assert_eq!(p1.turret_rotation, -0.5);

        let bad = InputState {
            x: f32::NAN,
            ..input
        };
        assert_eq!(
            room.update_player_position(1, &bad, &config.map),
            Err(GameError::InvalidInput("non-finite player input"))
        );
    }

    #[test]
    fn bullets_are_kept_in_fire_order() {
        let config = GameConfig::default();
        let (mut room, _, _) = room(&config);
        let fire = FireRequest {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            vel_x: 1.0,
            vel_y: 0.0,
        };
        for id in 1..=3 {
            room.add_bullet(Bullet::new(id, 1, fire, 0, &config));
        }

        let ids: Vec<_> = room.bullets().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(room.bullets().iter().all(|b| b.owner_id == 1));
    }

    #[tokio::test]
    async fn broadcast_honours_exclusion() {
        let config = GameConfig::default();
        let (room, mut rx_a, mut rx_b) = room(&config);

        assert_eq!(room.broadcast(&ServerMsg::PlayerLeft { player_id: 1 }, Some(1)), 1);
        assert!(rx_a.try_recv().is_err());
        let frame = rx_b.recv().await.unwrap();
        assert_eq!(
            ServerMsg::decode(&frame).unwrap(),
            ServerMsg::PlayerLeft { player_id: 1 }
        );
    }

    #[tokio::test]
    async fn broadcast_survives_a_closed_peer() {
        let config = GameConfig::default();
        let (room, rx_a, mut rx_b) = room(&config);
        drop(rx_a);

        assert_eq!(room.broadcast(&ServerMsg::PlayerDied { player_id: 1 }, None), 1);
        assert!(rx_b.recv().await.is_some());
    }
}
