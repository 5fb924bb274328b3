use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::DiagDir;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub const fn step(self, dir: DiagDir) -> Self {
        let (dx, dy) = dir.offset();
        self.offset(dx, dy)
    }

    pub const fn step_n(self, dir: DiagDir, n: i32) -> Self {
        let (dx, dy) = dir.offset();
        self.offset(dx * n, dy * n)
    }

    pub fn manhattan(self, other: TilePos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn max_distance(self, other: TilePos) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// `2 * max + min` of the axis deltas; prefers diagonal-free approaches.
    pub fn max_plus_manhattan(self, other: TilePos) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        2 * dx.max(dy) + dx.min(dy)
    }

    /// Point lying `pct / 256` of the way from `self` to `other`.
    pub fn percent_between(self, other: TilePos, pct: u8) -> TilePos {
        let lerp = |a: i32, b: i32| a + ((b - a) * pct as i32) / 256;
        TilePos::new(lerp(self.x, other.x), lerp(self.y, other.y))
    }

    /// Rotates an offset authored for a south-west facing block.
    pub const fn rotated(self, facing: DiagDir) -> TilePos {
        let mut p = self;
        let mut turns = (facing.index() + 4 - DiagDir::SouthWest.index()) & 3;
        while turns > 0 {
            p = TilePos::new(p.y, -p.x);
            turns -= 1;
        }
        p
    }

    /// Random tile within `radius` of `self` on both axes, kept inside `bounds`.
    pub fn jitter(self, radius: u32, bounds: (i32, i32), rng: &mut impl Rng) -> TilePos {
        if radius == 0 {
            return self;
        }
        let r = radius as i32;
        let x = (self.x + rng.gen_range(-r..=r)).clamp(1, bounds.0 - 2);
        let y = (self.y + rng.gen_range(-r..=r)).clamp(1, bounds.1 - 2);
        TilePos::new(x, y)
    }

    /// Direction of the dominant axis from `self` towards `other`.
    pub fn direction_to(self, other: TilePos) -> DiagDir {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        if dx.abs() >= dy.abs() {
            if dx >= 0 {
                DiagDir::SouthWest
            } else {
                DiagDir::NorthEast
            }
        } else if dy >= 0 {
            DiagDir::SouthEast
        } else {
            DiagDir::NorthWest
        }
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned tile rectangle, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRect {
    pub min: TilePos,
    pub max: TilePos,
}

impl TileRect {
    pub fn around(tile: TilePos) -> Self {
        Self {
            min: tile,
            max: tile,
        }
    }

    pub fn include(&mut self, tile: TilePos) {
        self.min.x = self.min.x.min(tile.x);
        self.min.y = self.min.y.min(tile.y);
        self.max.x = self.max.x.max(tile.x);
        self.max.y = self.max.y.max(tile.y);
    }

    pub fn expand(self, radius: i32) -> Self {
        Self {
            min: self.min.offset(-radius, -radius),
            max: self.max.offset(radius, radius),
        }
    }

    pub fn contains(&self, tile: TilePos) -> bool {
        (self.min.x..=self.max.x).contains(&tile.x) && (self.min.y..=self.max.y).contains(&tile.y)
    }

    pub fn tiles(&self) -> impl Iterator<Item = TilePos> + '_ {
        (self.min.y..=self.max.y)
            .flat_map(move |y| (self.min.x..=self.max.x).map(move |x| TilePos::new(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_matches_direction_rotation() {
        for facing in DiagDir::ALL {
            let (dx, dy) = DiagDir::SouthWest.offset();
            let rotated = TilePos::new(dx, dy).rotated(facing);
            assert_eq!((rotated.x, rotated.y), facing.offset());
        }
    }

    #[test]
    fn distance_metrics() {
        let a = TilePos::new(2, 3);
        let b = TilePos::new(7, 1);
        assert_eq!(a.manhattan(b), 7);
        assert_eq!(a.max_distance(b), 5);
        assert_eq!(a.max_plus_manhattan(b), 12);
    }

    #[test]
    fn percent_between_hits_the_middle() {
        let a = TilePos::new(0, 0);
        let b = TilePos::new(256, 512);
        assert_eq!(a.percent_between(b, 128), TilePos::new(128, 256));
    }
}
