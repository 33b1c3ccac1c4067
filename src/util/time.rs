//! Time utilities for game simulation

use std::time::Instant;

/// Monotonic server clock, started when the game loop is built.
/// Bullet ages and grace deadlines are measured on this clock.
#[derive(Debug, Clone, Copy)]
pub struct ServerClock {
    start: Instant,
}

impl ServerClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds since the clock was started
    pub fn now_millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
