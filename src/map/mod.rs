use std::collections::{HashMap, VecDeque};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::coords::{TilePos, TileRect};
use crate::types::DiagDir;

mod tile;

pub use tile::{Corner, RoadBits, Slope, StationPart, TileKind, TrackBits};

pub const MAX_HEIGHT: u8 = 15;

/// Tile grid with a height per tile corner. Tile `(x, y)` owns vertex
/// `(x, y)` as its north corner; the outermost ring of tiles is void.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Map {
    width: i32,
    height: i32,
    heights: Vec<u8>,
    tiles: Vec<TileKind>,
}

impl Map {
    pub fn flat(width: i32, height: i32, level: u8) -> Self {
        assert!(width >= 8 && height >= 8, "map must be at least 8x8");
        Self {
            width,
            height,
            heights: vec![level; ((width + 1) * (height + 1)) as usize],
            tiles: vec![TileKind::Clear; (width * height) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn bounds(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub fn num_tiles(&self) -> usize {
        self.tiles.len()
    }

    pub fn tile_at_index(&self, index: usize) -> TilePos {
        let index = index as i32;
        TilePos::new(index % self.width, index / self.width)
    }

    /// Inside the map and not on the void border.
    pub fn is_valid(&self, tile: TilePos) -> bool {
        tile.x >= 1 && tile.y >= 1 && tile.x < self.width - 1 && tile.y < self.height - 1
    }

    pub fn clamp(&self, tile: TilePos) -> TilePos {
        TilePos::new(
            tile.x.clamp(1, self.width - 2),
            tile.y.clamp(1, self.height - 2),
        )
    }

    fn index(&self, tile: TilePos) -> usize {
        (tile.y * self.width + tile.x) as usize
    }

    fn vertex_index(&self, vx: i32, vy: i32) -> usize {
        (vy * (self.width + 1) + vx) as usize
    }

    pub fn kind(&self, tile: TilePos) -> TileKind {
        if tile.x < 0 || tile.y < 0 || tile.x >= self.width || tile.y >= self.height {
            return TileKind::Water;
        }
        self.tiles[self.index(tile)]
    }

    pub fn set_kind(&mut self, tile: TilePos, kind: TileKind) {
        let idx = self.index(tile);
        self.tiles[idx] = kind;
    }

    pub fn vertex_height(&self, vx: i32, vy: i32) -> u8 {
        if vx < 0 || vy < 0 || vx > self.width || vy > self.height {
            return 0;
        }
        self.heights[self.vertex_index(vx, vy)]
    }

    fn set_vertex_height(&mut self, vx: i32, vy: i32, h: u8) {
        let idx = self.vertex_index(vx, vy);
        self.heights[idx] = h;
    }

    pub fn corner_height(&self, tile: TilePos, corner: Corner) -> u8 {
        let (dx, dy) = corner.offset();
        self.vertex_height(tile.x + dx, tile.y + dy)
    }

    /// Height of the lowest corner.
    pub fn tile_height(&self, tile: TilePos) -> u8 {
        Corner::ALL
            .iter()
            .map(|c| self.corner_height(tile, *c))
            .min()
            .unwrap_or(0)
    }

    pub fn max_corner_height(&self, tile: TilePos) -> u8 {
        Corner::ALL
            .iter()
            .map(|c| self.corner_height(tile, *c))
            .max()
            .unwrap_or(0)
    }

    /// Height of an edge, if both of its corners agree.
    pub fn edge_height(&self, tile: TilePos, edge: DiagDir) -> Option<u8> {
        let [a, b] = Corner::of_edge(edge);
        let (ha, hb) = (self.corner_height(tile, a), self.corner_height(tile, b));
        (ha == hb).then_some(ha)
    }

    pub fn slope(&self, tile: TilePos) -> Slope {
        let base = self.tile_height(tile);
        if self.max_corner_height(tile) == base {
            return Slope::Flat;
        }
        for dir in DiagDir::ALL {
            let raised = Corner::of_edge(dir);
            let matches = Corner::ALL.iter().all(|c| {
                let expected = if raised.contains(c) { base + 1 } else { base };
                self.corner_height(tile, *c) == expected
            });
            if matches {
                return Slope::Inclined(dir);
            }
        }
        Slope::Irregular
    }

    /// Vertex changes needed to move one tile corner by one step, keeping
    /// neighbouring vertices within one height step of each other.
    pub fn plan_corner_change(
        &self,
        tile: TilePos,
        corner: Corner,
        raise: bool,
    ) -> Option<Vec<(i32, i32, u8)>> {
        let (dx, dy) = corner.offset();
        let start = (tile.x + dx, tile.y + dy);
        let current = self.vertex_height(start.0, start.1);
        let target = if raise {
            if current >= MAX_HEIGHT {
                return None;
            }
            current + 1
        } else {
            current.checked_sub(1)?
        };

        let mut planned: HashMap<(i32, i32), u8> = HashMap::new();
        let mut queue = VecDeque::from([(start, target)]);
        while let Some(((vx, vy), h)) = queue.pop_front() {
            if vx <= 0 || vy <= 0 || vx >= self.width || vy >= self.height {
                return None;
            }
            let existing = planned
                .get(&(vx, vy))
                .copied()
                .unwrap_or_else(|| self.vertex_height(vx, vy));
            if (raise && existing >= h) || (!raise && existing <= h) {
                continue;
            }
            planned.insert((vx, vy), h);
            for ny in -1..=1 {
                for nx in -1..=1 {
                    if nx == 0 && ny == 0 {
                        continue;
                    }
                    let n = (vx + nx, vy + ny);
                    let nh = planned
                        .get(&n)
                        .copied()
                        .unwrap_or_else(|| self.vertex_height(n.0, n.1));
                    if raise && nh + 1 < h {
                        queue.push_back((n, h - 1));
                    } else if !raise && nh > h + 1 {
                        queue.push_back((n, h + 1));
                    }
                }
            }
        }
        let mut changes: Vec<_> = planned.into_iter().map(|((x, y), h)| (x, y, h)).collect();
        changes.sort_unstable();
        Some(changes)
    }

    /// Tiles touching any of the given vertices.
    pub fn tiles_touching(&self, changes: &[(i32, i32, u8)]) -> Vec<TilePos> {
        let mut tiles: Vec<TilePos> = changes
            .iter()
            .flat_map(|&(vx, vy, _)| {
                [(0, 0), (-1, 0), (0, -1), (-1, -1)]
                    .into_iter()
                    .map(move |(dx, dy)| TilePos::new(vx + dx, vy + dy))
            })
            .filter(|t| t.x >= 0 && t.y >= 0 && t.x < self.width && t.y < self.height)
            .collect();
        tiles.sort_unstable();
        tiles.dedup();
        tiles
    }

    pub fn apply_vertex_changes(&mut self, changes: &[(i32, i32, u8)]) {
        for &(vx, vy, h) in changes {
            self.set_vertex_height(vx, vy, h);
        }
    }

    pub fn set_tile_level(&mut self, tile: TilePos, level: u8) {
        for corner in Corner::ALL {
            let (dx, dy) = corner.offset();
            self.set_vertex_height(tile.x + dx, tile.y + dy, level);
        }
    }

    pub fn is_flat_area(&self, rect: TileRect) -> bool {
        let Some(level) = self.is_valid(rect.min).then(|| self.tile_height(rect.min)) else {
            return false;
        };
        rect.tiles().all(|t| {
            self.is_valid(t) && self.slope(t) == Slope::Flat && self.tile_height(t) == level
        })
    }

    /// Rolling hills, a sea-level lake or two and scattered trees.
    pub fn generate(width: i32, height: i32, rng: &mut impl Rng) -> Self {
        let mut map = Map::flat(width, height, 1);
        let hills = (width * height / 600).max(2);
        for _ in 0..hills {
            let cx = rng.gen_range(4..width - 4);
            let cy = rng.gen_range(4..height - 4);
            let peak = rng.gen_range(2..5u8);
            let radius = rng.gen_range(3..8);
            for vy in (cy - radius).max(1)..(cy + radius).min(height) {
                for vx in (cx - radius).max(1)..(cx + radius).min(width) {
                    let d = (cx - vx).abs().max((cy - vy).abs());
                    let h = 1 + peak.saturating_sub(d as u8);
                    if h > map.vertex_height(vx, vy) {
                        map.set_vertex_height(vx, vy, h);
                    }
                }
            }
        }

        let lakes = rng.gen_range(0..=(width * height / 2500).max(1));
        for _ in 0..lakes {
            let cx = rng.gen_range(6..width - 6);
            let cy = rng.gen_range(6..height - 6);
            let r = rng.gen_range(1..4);
            let area = TileRect {
                min: TilePos::new(cx - r, cy - r),
                max: TilePos::new(cx + r, cy + r),
            };
            if area.expand(1).tiles().all(|t| map.tile_height(t) == 1 && map.max_corner_height(t) == 1) {
                for t in area.tiles() {
                    map.set_tile_level(t, 0);
                }
                for t in area.tiles() {
                    if map.slope(t) == Slope::Flat && map.tile_height(t) == 0 {
                        map.set_kind(t, TileKind::Water);
                    }
                }
            }
        }

        for idx in 0..map.num_tiles() {
            let t = map.tile_at_index(idx);
            if !map.is_valid(t) {
                map.set_kind(t, TileKind::Water);
            } else if map.kind(t) == TileKind::Clear && rng.gen_ratio(1, 12) {
                map.set_kind(t, TileKind::Trees);
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raising_a_corner_inclines_the_tile() {
        let mut map = Map::flat(16, 16, 1);
        let tile = TilePos::new(5, 5);
        let changes = map
            .plan_corner_change(tile, Corner::West, true)
            .expect("raise");
        map.apply_vertex_changes(&changes);
        let changes = map
            .plan_corner_change(tile, Corner::South, true)
            .expect("raise");
        map.apply_vertex_changes(&changes);
        assert_eq!(map.slope(tile), Slope::Inclined(DiagDir::SouthWest));
        assert_eq!(map.edge_height(tile, DiagDir::SouthWest), Some(2));
    }

    #[test]
    fn corner_changes_cascade_to_neighbours() {
        let mut map = Map::flat(16, 16, 1);
        let tile = TilePos::new(6, 6);
        for _ in 0..2 {
            let changes = map
                .plan_corner_change(tile, Corner::North, true)
                .expect("raise");
            map.apply_vertex_changes(&changes);
        }
        assert_eq!(map.corner_height(tile, Corner::North), 3);
        assert_eq!(map.corner_height(tile, Corner::South), 2);
    }

    #[test]
    fn lowering_below_sea_level_is_refused() {
        let map = Map::flat(16, 16, 0);
        assert!(
            map.plan_corner_change(TilePos::new(4, 4), Corner::North, false)
                .is_none()
        );
    }
}
