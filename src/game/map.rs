//! Static arena layout

/// Immutable axis-aligned wall, anchored at its top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Wall {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Strict overlap test against a square body centered at (cx, cy)
    pub fn overlaps_square(&self, cx: f32, cy: f32, half: f32) -> bool {
        cx + half > self.left()
            && cx - half < self.right()
            && cy + half > self.top()
            && cy - half < self.bottom()
    }
}

/// Where a tank starts a match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub x: f32,
    pub y: f32,
    /// Hull and turret rotation in radians
    pub rotation: f32,
}

/// Map dimensions plus the wall list, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct MapLayout {
    pub width: f32,
    pub height: f32,
    pub walls: Vec<Wall>,
}

impl MapLayout {
    /// The standard 1800x800 arena: border walls, a central block,
    /// mirrored L-shaped cover and a few small pillars
    pub fn arena() -> Self {
        let w = 1800.0;
        let h = 800.0;
        let border = 30.0;

        let walls = vec![
            // Borders
            Wall::new(0.0, 0.0, w, border),
            Wall::new(0.0, h - border, w, border),
            Wall::new(0.0, 0.0, border, h),
            Wall::new(w - border, 0.0, border, h),
            // Center block
            Wall::new(w / 2.0 - 60.0, h / 2.0 - 60.0, 120.0, 120.0),
            // Left L
            Wall::new(150.0, 150.0, 150.0, 30.0),
            Wall::new(150.0, 150.0, 30.0, 120.0),
            // Right L
            Wall::new(w - 300.0, 150.0, 150.0, 30.0),
            Wall::new(w - 180.0, 150.0, 30.0, 120.0),
            // Lower cover
            Wall::new(250.0, h - 200.0, 100.0, 30.0),
            Wall::new(w - 350.0, h - 200.0, 100.0, 30.0),
            // Pillars
            Wall::new(400.0, 400.0, 40.0, 40.0),
            Wall::new(w - 440.0, 400.0, 40.0, 40.0),
            Wall::new(w / 2.0 - 20.0, 100.0, 40.0, 40.0),
            Wall::new(w / 2.0 - 20.0, h - 140.0, 40.0, 40.0),
        ];

        Self {
            width: w,
            height: h,
            walls,
        }
    }

    /// Clamp a point into the map rectangle
    pub fn clamp_point(&self, x: f32, y: f32) -> (f32, f32) {
        (x.clamp(0.0, self.width), y.clamp(0.0, self.height))
    }
}
