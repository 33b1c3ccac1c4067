//! Collision tests and projectile motion

use super::map::Wall;

/// Face of a wall a body was pushed out through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallFace {
    Left,
    Right,
    Top,
    Bottom,
}

impl WallFace {
    /// Outward unit normal in screen coordinates (y grows downwards)
    pub fn normal(self) -> (f32, f32) {
        match self {
            WallFace::Left => (-1.0, 0.0),
            WallFace::Right => (1.0, 0.0),
            WallFace::Top => (0.0, -1.0),
            WallFace::Bottom => (0.0, 1.0),
        }
    }
}

/// A resolved overlap between a moving body and one wall
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallContact {
    /// Index of the wall in the layout
    pub wall_index: usize,
    pub face: WallFace,
    pub penetration: f32,
}

/// State of a body after wall resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BounceResult {
    pub contact: WallContact,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub rotation: f32,
    /// False when the body was only pushed out because it was already
    /// moving away from the face
    pub reflected: bool,
}

/// Physics system for hit tests and bullet motion
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Check if a point lies inside a rectangle rotated about its center.
    /// Bounds are inclusive.
    pub fn point_in_rotated_rect(
        px: f32,
        py: f32,
        center_x: f32,
        center_y: f32,
        half_width: f32,
        half_height: f32,
        rotation: f32,
    ) -> bool {
        let dx = px - center_x;
        let dy = py - center_y;

        // Rotate into the rectangle's local frame (by -rotation)
        let (sin, cos) = (-rotation).sin_cos();
        let local_x = dx * cos - dy * sin;
        let local_y = dx * sin + dy * cos;

        local_x >= -half_width
            && local_x <= half_width
            && local_y >= -half_height
            && local_y <= half_height
    }

    /// Advance a position by one step of constant velocity
    pub fn integrate(x: f32, y: f32, vel_x: f32, vel_y: f32, dt: f32) -> (f32, f32) {
        (x + vel_x * dt, y + vel_y * dt)
    }

    /// Reflect a velocity about a unit normal: v' = v - 2(v.n)n
    pub fn reflect(vel_x: f32, vel_y: f32, nx: f32, ny: f32) -> (f32, f32) {
        let dot = vel_x * nx + vel_y * ny;
        (vel_x - 2.0 * dot * nx, vel_y - 2.0 * dot * ny)
    }

    /// Find the first wall (declaration order) overlapping a square body
    /// centered at (x, y), with the face of least penetration
    pub fn find_wall_contact(x: f32, y: f32, half: f32, walls: &[Wall]) -> Option<WallContact> {
        walls
            .iter()
            .enumerate()
            .find(|(_, wall)| wall.overlaps_square(x, y, half))
            .map(|(wall_index, wall)| {
                let candidates = [
                    (WallFace::Left, (x + half) - wall.left()),
                    (WallFace::Right, wall.right() - (x - half)),
                    (WallFace::Top, (y + half) - wall.top()),
                    (WallFace::Bottom, wall.bottom() - (y - half)),
                ];

                // Ties keep the earlier face
                let (face, penetration) = candidates
                    .into_iter()
                    .reduce(|best, c| if c.1 < best.1 { c } else { best })
                    .unwrap_or(candidates[0]);

                WallContact {
                    wall_index,
                    face,
                    penetration,
                }
            })
    }

    /// Resolve at most one wall collision for a square body.
    ///
    /// The body is placed `correction` units outside the contact face. If it
    /// was moving into the face its velocity is reflected about the face
    /// normal and scaled by `restitution`.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve_wall_bounce(
        x: f32,
        y: f32,
        vel_x: f32,
        vel_y: f32,
        half: f32,
        walls: &[Wall],
        restitution: f32,
        correction: f32,
    ) -> Option<BounceResult> {
        let contact = Self::find_wall_contact(x, y, half, walls)?;
        let wall = &walls[contact.wall_index];
        let (nx, ny) = contact.face.normal();

        let (new_x, new_y) = match contact.face {
            WallFace::Left => (wall.left() - half - correction, y),
            WallFace::Right => (wall.right() + half + correction, y),
            WallFace::Top => (x, wall.top() - half - correction),
            WallFace::Bottom => (x, wall.bottom() + half + correction),
        };

        let approaching = vel_x * nx + vel_y * ny < 0.0;
        let (new_vel_x, new_vel_y) = if approaching {
            let (rx, ry) = Self::reflect(vel_x, vel_y, nx, ny);
            (rx * restitution, ry * restitution)
        } else {
            (vel_x, vel_y)
        };

        Some(BounceResult {
            contact,
            x: new_x,
            y: new_y,
            vel_x: new_vel_x,
            vel_y: new_vel_y,
            rotation: new_vel_y.atan2(new_vel_x),
            reflected: approaching,
        })
    }
}
