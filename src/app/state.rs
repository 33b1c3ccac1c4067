//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::server::GameHandle;
use crate::game::{GameServer, ServerStats};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Event sender and stats feed of the game loop
    pub game: GameHandle,
}

impl AppState {
    /// Build the state together with the game loop it talks to.
    /// The caller spawns the returned server.
    pub fn new(config: Config) -> (Self, GameServer) {
        let config = Arc::new(config);
        let (server, game) = GameServer::new(Arc::new(config.game.clone()));

        (Self { config, game }, server)
    }

    /// Latest stats published by the game loop
    pub fn stats(&self) -> ServerStats {
        self.game.stats_rx.borrow().clone()
    }
}
