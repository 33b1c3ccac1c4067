//! Lobby queue implementation

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::game::PlayerId;
use crate::ws::connection::ClientConnection;
use crate::ws::protocol::PlayerName;

/// Player waiting in the lobby
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub player_id: PlayerId,
    pub name: PlayerName,
    pub connection: ClientConnection,
    pub queued_at: Instant,
}

impl QueuedPlayer {
    pub fn new(player_id: PlayerId, name: PlayerName, connection: ClientConnection) -> Self {
        Self {
            player_id,
            name,
            connection,
            queued_at: Instant::now(),
        }
    }

    /// How long this player has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// First-in-first-out lobby
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    queue: VecDeque<QueuedPlayer>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player to the back of the queue
    pub fn enqueue(&mut self, player: QueuedPlayer) {
        // Remove if already in queue (rejoin)
        self.queue.retain(|p| p.player_id != player.player_id);
        self.queue.push_back(player);
    }

    /// Remove a player from the queue
    pub fn dequeue(&mut self, player_id: PlayerId) -> Option<QueuedPlayer> {
        let pos = self.queue.iter().position(|p| p.player_id == player_id)?;
        self.queue.remove(pos)
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.queue.iter().any(|p| p.player_id == player_id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Take the two oldest players, if there are two
    pub fn try_form_pair(&mut self) -> Option<[QueuedPlayer; 2]> {
        if self.queue.len() < 2 {
            return None;
        }
        let first = self.queue.pop_front()?;
        let second = self.queue.pop_front()?;
        Some([first, second])
    }
}
