//! Configuration module - environment variable parsing

mod game;

pub use game::GameConfig;

use std::env;
use std::net::SocketAddr;

/// Default listening port of the arena server
const DEFAULT_PORT: u16 = 8090;

/// Highest accepted TICK_RATE; the tick timer needs a non-zero period
const MAX_TICK_RATE: u32 = 1000;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human readable ones
    pub log_json: bool,
    /// Allowed client origins for CORS (empty = any origin)
    pub client_origins: Vec<String>,
    /// Max inbound WebSocket messages per second per connection
    pub input_rate_limit: u32,
    /// Simulation constants, fixed for the lifetime of the process
    pub game: GameConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT takes precedence over SERVER_ADDR
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| format!("0.0.0.0:{}", DEFAULT_PORT))
        };

        let client_origins = env::var("CLIENT_ORIGIN")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let mut game = GameConfig::default();
        if let Ok(rate) = env::var("TICK_RATE") {
            game.tick_rate = parse_tick_rate(&rate)?;
        }

        let input_rate_limit = match env::var("INPUT_RATE_LIMIT") {
            Ok(limit) => limit
                .parse()
                .ok()
                .filter(|l| *l > 0)
                .ok_or(ConfigError::Invalid("INPUT_RATE_LIMIT"))?,
            Err(_) => crate::util::rate_limit::INPUT_RATE_LIMIT,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")),
            client_origins,
            input_rate_limit,
            game,
        })
    }
}

fn parse_tick_rate(value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse()
        .ok()
        .filter(|rate| (1..=MAX_TICK_RATE).contains(rate))
        .ok_or(ConfigError::Invalid("TICK_RATE"))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_rate_must_be_within_bounds() {
        assert_eq!(parse_tick_rate("30").unwrap(), 30);
        assert_eq!(parse_tick_rate(" 1000 ").unwrap(), 1000);

        for bad in ["0", "1001", "2000000", "-5", "fast"] {
            assert!(matches!(
                parse_tick_rate(bad),
                Err(ConfigError::Invalid("TICK_RATE"))
            ));
        }
    }

    #[test]
    fn highest_tick_rate_keeps_a_nonzero_period() {
        let config = GameConfig {
            tick_rate: MAX_TICK_RATE,
            ..GameConfig::default()
        };
        assert!(!config.tick_duration().is_zero());
        assert_eq!(config.tick_millis(), 1);
    }
}
