//! Simulation constants shared read-only by every room

use std::f32::consts::PI;
use std::time::Duration;

use crate::game::map::{MapLayout, SpawnPoint};

/// Fixed game tuning, built once at startup
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Static arena (dimensions and walls)
    pub map: MapLayout,
    /// Spawn for the first player of a room (left side)
    pub left_spawn: SpawnPoint,
    /// Spawn for the second player of a room (right side)
    pub right_spawn: SpawnPoint,
    /// Health every tank starts a match with
    pub max_health: u8,
    /// Tank hull hitbox width (along the hull's facing)
    pub tank_hitbox_width: f32,
    /// Tank hull hitbox height
    pub tank_hitbox_height: f32,
    /// Bullets older than this are destroyed
    pub bullet_lifetime_ms: u64,
    /// A bullet cannot hit its owner until this long after firing
    pub self_hit_grace_ms: u64,
    /// Client-reported bullet velocity is scaled by this factor
    pub bullet_speed_multiplier: f32,
    /// Edge length of the square bullet body used against walls
    pub bullet_size: f32,
    /// Bounce count at which the bullet is destroyed
    pub max_bounces: u8,
    /// Speed retained after a wall bounce (1.0 = perfectly elastic)
    pub restitution: f32,
    /// Distance a bounced bullet is pushed clear of the wall face
    pub bounce_correction: f32,
}

impl GameConfig {
    /// Seconds simulated by a single tick
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Wall-clock period of the tick timer
    pub fn tick_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate as u64)
    }

    /// Milliseconds of server time covered by one tick
    pub fn tick_millis(&self) -> u64 {
        1000 / self.tick_rate as u64
    }

    pub fn bullet_half_size(&self) -> f32 {
        self.bullet_size / 2.0
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30,
            map: MapLayout::arena(),
            left_spawn: SpawnPoint {
                x: 200.0,
                y: 400.0,
                rotation: 0.0,
            },
            right_spawn: SpawnPoint {
                x: 1600.0,
                y: 400.0,
                rotation: PI,
            },
            max_health: 3,
            tank_hitbox_width: 80.0,
            tank_hitbox_height: 50.0,
            bullet_lifetime_ms: 5000,
            self_hit_grace_ms: 500,
            bullet_speed_multiplier: 60.0,
            bullet_size: 10.0,
            max_bounces: 3,
            restitution: 0.95,
            bounce_correction: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tick_timing() {
        let config = GameConfig::default();
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.tick_millis(), 33);
        assert_eq!(config.tick_duration(), Duration::from_micros(33_333));
        assert!((config.tick_delta() - 1.0 / 30.0).abs() < f32::EPSILON);
    }

    #[test]
    fn spawns_face_each_other() {
        let config = GameConfig::default();
        assert_eq!(config.left_spawn.rotation, 0.0);
        assert_eq!(config.right_spawn.rotation, PI);
        assert!(config.left_spawn.x < config.right_spawn.x);
        assert_eq!(config.left_spawn.y, config.right_spawn.y);
    }
}
