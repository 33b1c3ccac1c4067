//! Authoritative game loop
//!
//! One task owns every room, the lobby and the session table. Socket tasks
//! talk to it only through [`ServerEvent`]s, so no state is shared and no
//! locks are taken. Each event and each tick runs to completion before the
//! next one is looked at.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::matchmaking::Matchmaker;
use crate::util::time::{ServerClock, Timer};
use crate::ws::connection::ClientConnection;
use crate::ws::protocol::{ClientMsg, FireRequest, InputState, PlayerName, ServerMsg};

use super::combat::Bullet;
use super::registry::RoomRegistry;
use super::snapshot::SnapshotStats;
use super::tick::step_room;
use super::{BulletId, GameError, PlayerId, RoomId};

/// Capacity of the socket -> game loop channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Ticks between periodic debug summaries
const SUMMARY_INTERVAL_TICKS: u64 = 90;

/// Everything a socket task can tell the game loop
#[derive(Debug)]
pub enum ServerEvent {
    Connected {
        conn_id: Uuid,
        connection: ClientConnection,
    },
    Message {
        conn_id: Uuid,
        msg: ClientMsg,
    },
    Disconnected {
        conn_id: Uuid,
    },
}

/// Counters published after every tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub uptime_secs: u64,
    pub tick: u64,
    pub connections: usize,
    pub active_rooms: usize,
    pub active_players: usize,
    pub lobby_size: usize,
}

/// One open socket and the player it joined as, if any
#[derive(Debug)]
struct Session {
    connection: ClientConnection,
    player_id: Option<PlayerId>,
}

/// All mutable server state
pub struct ServerContext {
    config: Arc<GameConfig>,
    clock: ServerClock,
    matchmaker: Matchmaker,
    rooms: RoomRegistry,
    sessions: HashMap<Uuid, Session>,
    next_bullet_id: BulletId,
    tick: u64,
    snapshot_stats: SnapshotStats,
}

impl ServerContext {
    pub fn new(config: Arc<GameConfig>) -> Self {
        Self {
            config,
            clock: ServerClock::start(),
            matchmaker: Matchmaker::new(),
            rooms: RoomRegistry::new(),
            sessions: HashMap::new(),
            next_bullet_id: 1,
            tick: 0,
            snapshot_stats: SnapshotStats::default(),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Apply one socket event at server time `now` (ms)
    pub fn handle_event(&mut self, event: ServerEvent, now: u64) {
        match event {
            ServerEvent::Connected {
                conn_id,
                connection,
            } => self.connect(conn_id, connection),
            ServerEvent::Message { conn_id, msg } => {
                if let Err(e) = self.handle_message(conn_id, msg, now) {
                    self.report(Some(conn_id), e);
                }
            }
            ServerEvent::Disconnected { conn_id } => self.disconnect(conn_id),
        }
    }

    pub fn connect(&mut self, conn_id: Uuid, connection: ClientConnection) {
        debug!(conn_id = %conn_id, "Session opened");
        self.sessions.insert(
            conn_id,
            Session {
                connection,
                player_id: None,
            },
        );
    }

    pub fn handle_message(
        &mut self,
        conn_id: Uuid,
        msg: ClientMsg,
        now: u64,
    ) -> Result<(), GameError> {
        match msg {
            ClientMsg::Join { name } => self.handle_join(conn_id, name),
            ClientMsg::PlayerInput(input) => self.handle_input(conn_id, input),
            ClientMsg::FireBullet(request) => self.handle_fire(conn_id, request, now),
            ClientMsg::ReadyForRematch => self.handle_rematch(conn_id),
        }
    }

    fn handle_join(&mut self, conn_id: Uuid, name: PlayerName) -> Result<(), GameError> {
        let session = self
            .sessions
            .get_mut(&conn_id)
            .ok_or_else(|| GameError::StateNotFound(format!("session {conn_id}")))?;

        if let Some(player_id) = session.player_id {
            let waiting = self.matchmaker.is_waiting(player_id);
            if waiting || self.rooms.room_id_of(player_id).is_some() {
                debug!(conn_id = %conn_id, player_id, "Ignoring repeated join");
                return Ok(());
            }
        }

        let player_id = self.matchmaker.join(session.connection.clone(), name);
        session.player_id = Some(player_id);

        while let Some(created) = self.matchmaker.try_create_room(&self.config) {
            match created {
                Ok(room) => self.rooms.insert(room),
                Err(e) => error!(error = %e, "Dropped pair that could not be seated"),
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, conn_id: Uuid, input: InputState) -> Result<(), GameError> {
        let player_id = self.player_of(conn_id)?;
        let room = self.rooms.room_for_player_mut(player_id)?;

        if room.is_game_over() || !room.player(player_id).is_some_and(|p| p.is_alive()) {
            trace!(player_id, "Input ignored outside live play");
            return Ok(());
        }

        room.update_player_position(player_id, &input, &self.config.map)
    }

    fn handle_fire(
        &mut self,
        conn_id: Uuid,
        request: FireRequest,
        now: u64,
    ) -> Result<(), GameError> {
        let player_id = self.player_of(conn_id)?;
        if !request.is_finite() {
            return Err(GameError::InvalidInput("non-finite fire request"));
        }

        let room = self.rooms.room_for_player_mut(player_id)?;
        if room.is_game_over() || !room.player(player_id).is_some_and(|p| p.is_alive()) {
            trace!(player_id, "Fire ignored outside live play");
            return Ok(());
        }

        let bullet_id = self.next_bullet_id;
        self.next_bullet_id = self.next_bullet_id.wrapping_add(1).max(1);

        let bullet = Bullet::new(bullet_id, player_id, request, now, &self.config);
        let fired = ServerMsg::BulletFired(bullet.snapshot());
        room.add_bullet(bullet);
        room.broadcast(&fired, None);

        debug!(room_id = room.id(), player_id, bullet_id, "Bullet fired");
        Ok(())
    }

    fn handle_rematch(&mut self, conn_id: Uuid) -> Result<(), GameError> {
        let player_id = self.player_of(conn_id)?;
        let room = self.rooms.room_for_player_mut(player_id)?;

        if !room.is_game_over() {
            debug!(room_id = room.id(), player_id, "Rematch request during play ignored");
            return Ok(());
        }

        room.set_player_ready(player_id)?;
        info!(room_id = room.id(), player_id, "Player ready for rematch");

        if room.are_both_players_ready() {
            room.reset_for_rematch(&self.config);
            room.broadcast(&room.game_start_msg(), None);
            info!(room_id = room.id(), "Rematch started");
        }
        Ok(())
    }

    /// Drop a session. A queued player leaves the lobby; a seated player's
    /// room is destroyed after telling the opponent.
    pub fn disconnect(&mut self, conn_id: Uuid) {
        let Some(session) = self.sessions.remove(&conn_id) else {
            return;
        };
        info!(conn_id = %conn_id, player_id = ?session.player_id, "Session closed");

        let Some(player_id) = session.player_id else {
            return;
        };
        if self.matchmaker.leave(player_id) {
            return;
        }

        let room_id = match self.rooms.room_for_player_mut(player_id) {
            Ok(room) => room.id(),
            Err(e) => {
                self.report(Some(conn_id), e);
                return;
            }
        };
        if let Some(room) = self.rooms.remove(room_id) {
            room.broadcast(&ServerMsg::PlayerLeft { player_id }, Some(player_id));
            info!(
                room_id,
                player_id,
                opponent_id = ?room.opponent_of(player_id).map(|p| p.id),
                "Room closed after disconnect"
            );
        }
    }

    /// Advance every room by one tick and broadcast the results
    pub fn tick(&mut self, now: u64) {
        self.tick += 1;

        let mut broken = Vec::new();
        for room in self.rooms.iter_mut() {
            let msgs = match step_room(room, now, &self.config) {
                Ok(msgs) => msgs,
                Err(e) => {
                    broken.push(e);
                    continue;
                }
            };
            for msg in msgs {
                let frame = msg.encode();
                if let ServerMsg::BulletsState { bullets } = &msg {
                    self.snapshot_stats.record(bullets.len(), frame.len());
                }
                room.broadcast_frame(frame, None);
            }
        }
        for e in broken {
            self.report(None, e);
        }

        if self.tick % SUMMARY_INTERVAL_TICKS == 0 {
            debug!(
                tick = self.tick,
                rooms = self.rooms.active_rooms(),
                lobby = self.matchmaker.lobby_size(),
                snapshots = self.snapshot_stats.total_snapshots,
                snapshot_bytes = self.snapshot_stats.total_bytes,
                avg_bullets = self.snapshot_stats.avg_bullets_per_snapshot,
                "Server summary"
            );
        }
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            uptime_secs: self.clock.uptime_secs(),
            tick: self.tick,
            connections: self.sessions.len(),
            active_rooms: self.rooms.active_rooms(),
            active_players: self.rooms.total_players(),
            lobby_size: self.matchmaker.lobby_size(),
        }
    }

    fn player_of(&self, conn_id: Uuid) -> Result<PlayerId, GameError> {
        self.sessions
            .get(&conn_id)
            .and_then(|s| s.player_id)
            .ok_or_else(|| GameError::StateNotFound(format!("no player for session {conn_id}")))
    }

    fn report(&mut self, conn_id: Option<Uuid>, err: GameError) {
        match err {
            GameError::StateNotFound(what) => {
                trace!(conn_id = ?conn_id, what = %what, "Dropped message for untracked state");
            }
            GameError::InvalidInput(reason) => {
                warn!(conn_id = ?conn_id, reason, "Rejected invalid input");
            }
            GameError::InvariantViolation { room_id, reason } => {
                error!(room_id, reason = %reason, "Room invariant violated, tearing down");
                self.teardown(room_id);
            }
        }
    }

    fn teardown(&mut self, room_id: RoomId) {
        if let Some(room) = self.rooms.remove(room_id) {
            for player_id in room.player_ids() {
                room.send_to(player_id, &ServerMsg::PlayerLeft { player_id });
            }
        }
    }
}

/// Handle for socket tasks and the HTTP layer
#[derive(Clone)]
pub struct GameHandle {
    pub events_tx: mpsc::Sender<ServerEvent>,
    pub stats_rx: watch::Receiver<ServerStats>,
}

/// The game loop task
pub struct GameServer {
    ctx: ServerContext,
    events_rx: mpsc::Receiver<ServerEvent>,
    stats_tx: watch::Sender<ServerStats>,
}

impl GameServer {
    pub fn new(config: Arc<GameConfig>) -> (Self, GameHandle) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (stats_tx, stats_rx) = watch::channel(ServerStats::default());

        let server = Self {
            ctx: ServerContext::new(config),
            events_rx,
            stats_tx,
        };
        (server, GameHandle { events_tx, stats_rx })
    }

    /// Run until every event sender is gone
    pub async fn run(mut self) {
        let tick_duration = self.ctx.config().tick_duration();
        info!(
            tick_rate = self.ctx.config().tick_rate,
            tick_ms = self.ctx.config().tick_millis(),
            "Game loop started"
        );

        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(event) => {
                        let now = self.ctx.clock.now_millis();
                        self.ctx.handle_event(event, now);
                    }
                    None => break,
                },
                _ = tick_interval.tick() => {
                    let timer = Timer::new();
                    self.ctx.tick(self.ctx.clock.now_millis());
                    trace!(elapsed_us = timer.elapsed_micros(), "Tick complete");
                    let _ = self.stats_tx.send(self.ctx.stats());
                }
            }
        }

        info!("Game loop stopped");
    }
}
