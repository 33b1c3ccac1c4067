//! Combat system - bullets, self-hit protection, hit detection

use tracing::trace;

use crate::config::GameConfig;
use crate::ws::protocol::{BulletSnapshot, FireRequest};

use super::map::Wall;
use super::physics::PhysicsSystem;
use super::room::PlayerState;
use super::{BulletId, PlayerId};

/// What happened to a bullet during one simulation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulletStep {
    /// Moved freely
    Moved,
    /// Reflected off a wall
    Bounced,
    /// Hit a wall after using up its bounces
    Exhausted,
}

/// Active bullet in a room
#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub id: BulletId,
    pub owner_id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    /// Facing in radians, follows the velocity after a bounce
    pub rotation: f32,
    /// Server time the bullet was fired (ms)
    pub created_at: u64,
    /// The owner cannot be hit before this server time (ms)
    pub owner_immune_until: u64,
    pub bounces: u8,
}

impl Bullet {
    /// Create a bullet from a fire request, scaling the velocity
    pub fn new(
        id: BulletId,
        owner_id: PlayerId,
        request: FireRequest,
        now: u64,
        config: &GameConfig,
    ) -> Self {
        Self {
            id,
            owner_id,
            x: request.x,
            y: request.y,
            vel_x: request.vel_x * config.bullet_speed_multiplier,
            vel_y: request.vel_y * config.bullet_speed_multiplier,
            rotation: request.rotation,
            created_at: now,
            owner_immune_until: now + config.self_hit_grace_ms,
            bounces: 0,
        }
    }

    /// Integrate one tick and resolve at most one wall contact
    pub fn step(&mut self, dt: f32, walls: &[Wall], config: &GameConfig) -> BulletStep {
        let (x, y) = PhysicsSystem::integrate(self.x, self.y, self.vel_x, self.vel_y, dt);
        self.x = x;
        self.y = y;

        let Some(bounce) = PhysicsSystem::resolve_wall_bounce(
            self.x,
            self.y,
            self.vel_x,
            self.vel_y,
            config.bullet_half_size(),
            walls,
            config.restitution,
            config.bounce_correction,
        ) else {
            return BulletStep::Moved;
        };

        self.x = bounce.x;
        self.y = bounce.y;
        if !bounce.reflected {
            return BulletStep::Moved;
        }

        self.vel_x = bounce.vel_x;
        self.vel_y = bounce.vel_y;
        self.rotation = bounce.rotation;
        self.bounces = self.bounces.saturating_add(1);
        trace!(
            bullet_id = self.id,
            wall = bounce.contact.wall_index,
            face = ?bounce.contact.face,
            penetration = bounce.contact.penetration,
            bounces = self.bounces,
            "Bullet bounced"
        );

        if self.bounces >= config.max_bounces {
            BulletStep::Exhausted
        } else {
            BulletStep::Bounced
        }
    }

    /// Age in milliseconds at server time `now`
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }

    pub fn is_expired(&self, now: u64, lifetime_ms: u64) -> bool {
        self.age(now) > lifetime_ms
    }

    /// Whether this bullet may damage `target` at server time `now`
    pub fn can_hit(&self, target: PlayerId, now: u64) -> bool {
        target != self.owner_id || now >= self.owner_immune_until
    }

    pub fn snapshot(&self) -> BulletSnapshot {
        BulletSnapshot {
            id: self.id,
            owner_id: self.owner_id,
            x: self.x,
            y: self.y,
            rotation: self.rotation,
            vel_x: self.vel_x,
            vel_y: self.vel_y,
        }
    }

    /// Check the bullet point against a tank's rotated hull
    pub fn check_hit(&self, target: &PlayerState, config: &GameConfig) -> bool {
        PhysicsSystem::point_in_rotated_rect(
            self.x,
            self.y,
            target.x,
            target.y,
            config.tank_hitbox_width / 2.0,
            config.tank_hitbox_height / 2.0,
            target.hull_rotation,
        )
    }
}

/// Hit result from bullet resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitResult {
    pub bullet_id: BulletId,
    pub shooter_id: PlayerId,
    pub target_id: PlayerId,
    pub new_health: u8,
    pub target_killed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(x: f32, y: f32, vel_x: f32, vel_y: f32) -> FireRequest {
        FireRequest {
            x,
            y,
            rotation: vel_y.atan2(vel_x),
            vel_x,
            vel_y,
        }
    }

    #[test]
    fn new_bullet_scales_velocity_and_stamps_grace() {
        let config = GameConfig::default();
        let bullet = Bullet::new(7, 1, request(200.0, 300.0, 10.0, -2.0), 1_000, &config);
        assert_eq!(bullet.vel_x, 600.0);
        assert_eq!(bullet.vel_y, -120.0);
        assert_eq!(bullet.created_at, 1_000);
        assert_eq!(bullet.owner_immune_until, 1_500);
        assert_eq!(bullet.bounces, 0);
    }

    #[test]
    fn owner_protected_until_grace_deadline() {
        let config = GameConfig::default();
        let bullet = Bullet::new(1, 1, request(0.0, 0.0, 1.0, 0.0), 0, &config);

        assert!(!bullet.can_hit(1, 0));
        assert!(!bullet.can_hit(1, 499));
        assert!(bullet.can_hit(1, 500));
        assert!(bullet.can_hit(1, 10_000));
        // Anyone else is fair game immediately
        assert!(bullet.can_hit(2, 0));
    }

    #[test]
    fn expiry_uses_strict_age() {
        let config = GameConfig::default();
        let bullet = Bullet::new(1, 1, request(0.0, 0.0, 1.0, 0.0), 100, &config);
        assert!(!bullet.is_expired(5_100, config.bullet_lifetime_ms));
        assert!(bullet.is_expired(5_101, config.bullet_lifetime_ms));
    }

    #[test]
    fn free_flight_moves_one_tick() {
        let config = GameConfig::default();
        let mut bullet = Bullet::new(1, 1, request(500.0, 300.0, 10.0, 0.0), 0, &config);
        let step = bullet.step(config.tick_delta(), &config.map.walls, &config);
        assert_eq!(step, BulletStep::Moved);
        assert!((bullet.x - 520.0).abs() < 1e-3);
        assert_eq!(bullet.y, 300.0);
    }

    #[test]
    fn bounce_scales_speed_and_counts_once() {
        let config = GameConfig::default();
        let walls = [Wall::new(100.0, 0.0, 50.0, 400.0)];
        let mut bullet = Bullet::new(1, 1, request(90.0, 200.0, 1.0, 0.0), 0, &config);
        let speed_before = bullet.vel_x.hypot(bullet.vel_y);

        let step = bullet.step(0.1, &walls, &config);

        assert_eq!(step, BulletStep::Bounced);
        assert_eq!(bullet.bounces, 1);
        let speed_after = bullet.vel_x.hypot(bullet.vel_y);
        assert!((speed_after - speed_before * config.restitution).abs() < 1e-3);
        assert!(bullet.vel_x < 0.0);
    }

    #[test]
    fn reaching_bounce_cap_exhausts_bullet() {
        let config = GameConfig::default();
        // Narrow corridor between two walls
        let walls = [
            Wall::new(0.0, 0.0, 100.0, 400.0),
            Wall::new(130.0, 0.0, 100.0, 400.0),
        ];
        let mut bullet = Bullet::new(1, 1, request(115.0, 200.0, 5.0, 0.0), 0, &config);

        let mut steps = Vec::new();
        for _ in 0..200 {
            let step = bullet.step(1.0 / 30.0, &walls, &config);
            if step != BulletStep::Moved {
                steps.push(step);
            }
            if step == BulletStep::Exhausted {
                break;
            }
        }

        assert_eq!(
            steps,
            vec![BulletStep::Bounced, BulletStep::Bounced, BulletStep::Exhausted]
        );
        assert_eq!(bullet.bounces, config.max_bounces);
    }

    #[test]
    fn hit_uses_hull_rotation() {
        let config = GameConfig::default();
        let target = PlayerState::new(2, "target".into(), config.right_spawn, &config);
        let mut bullet = Bullet::new(1, 1, request(0.0, 0.0, 1.0, 0.0), 0, &config);

        bullet.x = target.x - 39.0;
        bullet.y = target.y;
        assert!(bullet.check_hit(&target, &config));

        bullet.x = target.x;
        bullet.y = target.y + 30.0;
        assert!(!bullet.check_hit(&target, &config));
    }
}
