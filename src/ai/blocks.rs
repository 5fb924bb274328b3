use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::coords::{TilePos, TileRect};
use crate::game::command::Command;
use crate::map::{RoadBits, TrackBits};
use crate::types::{Axis, DiagDir, Track, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockRole {
    Source,
    Destination,
    Waypoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    RailTerminus,
    RailPassing,
    RoadTerminus,
    Airport,
}

impl BlockKind {
    pub fn for_record(transport: Transport, role: BlockRole) -> Option<BlockKind> {
        match (transport, role) {
            (Transport::Rail, BlockRole::Waypoint) => Some(BlockKind::RailPassing),
            (Transport::Rail, _) => Some(BlockKind::RailTerminus),
            (Transport::Road, BlockRole::Waypoint) => None,
            (Transport::Road, _) => Some(BlockKind::RoadTerminus),
            (Transport::Air, _) => Some(BlockKind::Airport),
            (Transport::Water, _) => None,
        }
    }
}

/// One operation of a template, relative to the template origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPart {
    Rail { offset: TilePos, tracks: TrackBits },
    /// `start` is the platform tile with the smallest coordinates.
    Platform { start: TilePos, axis: Axis, length: u8 },
    Depot { offset: TilePos, dir: DiagDir, transport: Transport },
    Road { offset: TilePos, bits: RoadBits },
    RoadStop { offset: TilePos, dir: DiagDir, truck: bool },
    /// 3x3 pad, `offset` is its smallest corner.
    Airport { offset: TilePos },
}

const AIRPORT_SIZE: i32 = 3;

impl BlockPart {
    pub fn tiles(&self) -> SmallVec<[TilePos; 9]> {
        match *self {
            BlockPart::Rail { offset, .. }
            | BlockPart::Depot { offset, .. }
            | BlockPart::Road { offset, .. }
            | BlockPart::RoadStop { offset, .. } => smallvec::smallvec![offset],
            BlockPart::Platform {
                start,
                axis,
                length,
            } => {
                let dir = platform_dir(axis);
                (0..length as i32).map(|i| start.step_n(dir, i)).collect()
            }
            BlockPart::Airport { offset } => (0..AIRPORT_SIZE)
                .flat_map(|dy| (0..AIRPORT_SIZE).map(move |dx| offset.offset(dx, dy)))
                .collect(),
        }
    }

    pub fn is_station(&self) -> bool {
        matches!(
            self,
            BlockPart::Platform { .. } | BlockPart::RoadStop { .. } | BlockPart::Airport { .. }
        )
    }

    pub fn commands(&self, origin: TilePos) -> SmallVec<[Command; 2]> {
        let at = |offset: TilePos| origin.offset(offset.x, offset.y);
        match *self {
            BlockPart::Rail { offset, tracks } => tracks
                .iter()
                .map(|track| Command::BuildRail {
                    tile: at(offset),
                    track,
                })
                .collect(),
            BlockPart::Platform {
                start,
                axis,
                length,
            } => smallvec::smallvec![Command::BuildRailStation {
                tile: at(start),
                axis,
                length,
            }],
            BlockPart::Depot {
                offset,
                dir,
                transport: Transport::Road,
            } => smallvec::smallvec![Command::BuildRoadDepot { tile: at(offset), dir }],
            BlockPart::Depot { offset, dir, .. } => {
                smallvec::smallvec![Command::BuildRailDepot { tile: at(offset), dir }]
            }
            BlockPart::Road { offset, bits } => {
                smallvec::smallvec![Command::BuildRoad { tile: at(offset), bits }]
            }
            BlockPart::RoadStop { offset, dir, truck } => smallvec::smallvec![Command::BuildRoadStop {
                tile: at(offset),
                dir,
                truck,
            }],
            BlockPart::Airport { offset } => {
                smallvec::smallvec![Command::BuildAirport { tile: at(offset) }]
            }
        }
    }

    fn rotated(self, facing: DiagDir) -> BlockPart {
        match self {
            BlockPart::Rail { offset, tracks } => BlockPart::Rail {
                offset: offset.rotated(facing),
                tracks: tracks
                    .iter()
                    .filter_map(|t| rotate_track(t, facing))
                    .fold(TrackBits::EMPTY, TrackBits::with),
            },
            BlockPart::Platform { axis, length, .. } => {
                let tiles: SmallVec<[TilePos; 9]> = self
                    .tiles()
                    .into_iter()
                    .map(|t| t.rotated(facing))
                    .collect();
                let start = tiles
                    .iter()
                    .copied()
                    .min_by_key(|t| (t.x, t.y))
                    .unwrap_or_default();
                BlockPart::Platform {
                    start,
                    axis: platform_dir(axis).rotated_to(facing).axis(),
                    length,
                }
            }
            BlockPart::Depot {
                offset,
                dir,
                transport,
            } => BlockPart::Depot {
                offset: offset.rotated(facing),
                dir: dir.rotated_to(facing),
                transport,
            },
            BlockPart::Road { offset, bits } => BlockPart::Road {
                offset: offset.rotated(facing),
                bits: bits
                    .edges()
                    .fold(RoadBits::EMPTY, |acc, d| acc.union(RoadBits::edge(d.rotated_to(facing)))),
            },
            BlockPart::RoadStop { offset, dir, truck } => BlockPart::RoadStop {
                offset: offset.rotated(facing),
                dir: dir.rotated_to(facing),
                truck,
            },
            BlockPart::Airport { offset } => BlockPart::Airport { offset },
        }
    }
}

fn platform_dir(axis: Axis) -> DiagDir {
    match axis {
        Axis::X => DiagDir::SouthWest,
        Axis::Y => DiagDir::SouthEast,
    }
}

fn rotate_track(track: Track, facing: DiagDir) -> Option<Track> {
    let (a, b) = track.edges();
    Track::joining(a.rotated_to(facing), b.rotated_to(facing))
}

/// Where a link leaves a block: the first tile to build and the direction
/// of travel onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkEdge {
    pub offset: TilePos,
    pub dir: DiagDir,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub id: TemplateId,
    pub kind: BlockKind,
    /// Platform length for rail termini.
    pub wagons: u8,
    pub truck: bool,
    pub facing: DiagDir,
    pub parts: Vec<BlockPart>,
    pub edges: SmallVec<[LinkEdge; 2]>,
}

impl Template {
    pub fn tiles(&self, origin: TilePos) -> impl Iterator<Item = TilePos> + '_ {
        self.parts
            .iter()
            .flat_map(|p| p.tiles())
            .map(move |t| origin.offset(t.x, t.y))
    }

    pub fn station_rect(&self, origin: TilePos) -> Option<TileRect> {
        let mut tiles = self
            .parts
            .iter()
            .filter(|p| p.is_station())
            .flat_map(|p| p.tiles())
            .map(|t| origin.offset(t.x, t.y));
        let first = tiles.next()?;
        let mut rect = TileRect::around(first);
        for t in tiles {
            rect.include(t);
        }
        Some(rect)
    }

    pub fn depot_tile(&self, origin: TilePos) -> Option<TilePos> {
        self.parts.iter().find_map(|p| match *p {
            BlockPart::Depot { offset, .. } | BlockPart::Airport { offset } => {
                Some(origin.offset(offset.x, offset.y))
            }
            _ => None,
        })
    }

    pub fn link_edge(&self, origin: TilePos, edge: u8) -> Option<(TilePos, DiagDir)> {
        self.edges
            .get(edge as usize)
            .map(|e| (origin.offset(e.offset.x, e.offset.y), e.dir))
    }
}

/// Direction check used when picking a template: the exact facing, or once
/// that has been given up on, any of the other three.
pub fn facing_compatible(facing: DiagDir, wanted: Option<DiagDir>, any_other: bool) -> bool {
    match wanted {
        None => true,
        Some(w) if any_other => facing != w,
        Some(w) => facing == w,
    }
}

struct Draft {
    kind: BlockKind,
    wagons: u8,
    truck: bool,
    parts: Vec<BlockPart>,
    edges: SmallVec<[LinkEdge; 2]>,
}

impl Draft {
    fn rotate(&self, facing: DiagDir, id: usize) -> Template {
        Template {
            id: TemplateId(id as u16),
            kind: self.kind,
            wagons: self.wagons,
            truck: self.truck,
            facing,
            parts: self.parts.iter().map(|p| p.rotated(facing)).collect(),
            edges: self
                .edges
                .iter()
                .map(|e| LinkEdge {
                    offset: e.offset.rotated(facing),
                    dir: e.dir.rotated_to(facing),
                })
                .collect(),
        }
    }
}

fn tracks(list: &[Track]) -> TrackBits {
    list.iter().fold(TrackBits::EMPTY, |acc, t| acc.with(*t))
}

fn rail_terminus(wagons: u8, depot_south: bool) -> Draft {
    use DiagDir::*;
    let len = wagons as i32;
    let (junction, depot) = if depot_south {
        (Track::Right, BlockPart::Depot {
            offset: TilePos::new(len, 1),
            dir: NorthWest,
            transport: Transport::Rail,
        })
    } else {
        (Track::Upper, BlockPart::Depot {
            offset: TilePos::new(len, -1),
            dir: SouthEast,
            transport: Transport::Rail,
        })
    };
    Draft {
        kind: BlockKind::RailTerminus,
        wagons,
        truck: false,
        parts: vec![
            BlockPart::Platform {
                start: TilePos::new(0, 0),
                axis: Axis::X,
                length: wagons,
            },
            BlockPart::Rail {
                offset: TilePos::new(len, 0),
                tracks: tracks(&[Track::X, junction]),
            },
            depot,
            BlockPart::Rail {
                offset: TilePos::new(len + 1, 0),
                tracks: tracks(&[Track::X]),
            },
        ],
        edges: smallvec::smallvec![LinkEdge {
            offset: TilePos::new(len + 2, 0),
            dir: SouthWest,
        }],
    }
}

/// Straight line with a four tile siding next to it.
fn rail_passing(siding_south: bool) -> Draft {
    let (side, enter, split, join, merge) = if siding_south {
        (1, Track::Left, Track::Right, Track::Upper, Track::Lower)
    } else {
        (-1, Track::Lower, Track::Upper, Track::Right, Track::Left)
    };
    let mut parts = vec![
        BlockPart::Rail {
            offset: TilePos::new(-1, 0),
            tracks: tracks(&[Track::X]),
        },
        BlockPart::Rail {
            offset: TilePos::new(0, 0),
            tracks: tracks(&[Track::X, split]),
        },
        BlockPart::Rail {
            offset: TilePos::new(3, 0),
            tracks: tracks(&[Track::X, merge]),
        },
        BlockPart::Rail {
            offset: TilePos::new(0, side),
            tracks: tracks(&[enter]),
        },
        BlockPart::Rail {
            offset: TilePos::new(3, side),
            tracks: tracks(&[join]),
        },
        BlockPart::Rail {
            offset: TilePos::new(4, 0),
            tracks: tracks(&[Track::X]),
        },
    ];
    for x in 1..3 {
        parts.push(BlockPart::Rail {
            offset: TilePos::new(x, 0),
            tracks: tracks(&[Track::X]),
        });
        parts.push(BlockPart::Rail {
            offset: TilePos::new(x, side),
            tracks: tracks(&[Track::X]),
        });
    }
    Draft {
        kind: BlockKind::RailPassing,
        wagons: 0,
        truck: false,
        parts,
        edges: smallvec::smallvec![
            LinkEdge {
                offset: TilePos::new(-2, 0),
                dir: DiagDir::NorthEast,
            },
            LinkEdge {
                offset: TilePos::new(5, 0),
                dir: DiagDir::SouthWest,
            },
        ],
    }
}

fn road_terminus(truck: bool, depot_south: bool) -> Draft {
    use DiagDir::*;
    let (branch, depot) = if depot_south {
        (SouthEast, BlockPart::Depot {
            offset: TilePos::new(1, 1),
            dir: NorthWest,
            transport: Transport::Road,
        })
    } else {
        (NorthWest, BlockPart::Depot {
            offset: TilePos::new(1, -1),
            dir: SouthEast,
            transport: Transport::Road,
        })
    };
    Draft {
        kind: BlockKind::RoadTerminus,
        wagons: 0,
        truck,
        parts: vec![
            BlockPart::RoadStop {
                offset: TilePos::new(0, 0),
                dir: SouthWest,
                truck,
            },
            BlockPart::Road {
                offset: TilePos::new(1, 0),
                bits: RoadBits::axis(Axis::X).union(RoadBits::edge(branch)),
            },
            depot,
            BlockPart::Road {
                offset: TilePos::new(2, 0),
                bits: RoadBits::axis(Axis::X),
            },
        ],
        edges: smallvec::smallvec![LinkEdge {
            offset: TilePos::new(3, 0),
            dir: SouthWest,
        }],
    }
}

fn airport() -> Draft {
    Draft {
        kind: BlockKind::Airport,
        wagons: 0,
        truck: false,
        parts: vec![BlockPart::Airport {
            offset: TilePos::new(0, 0),
        }],
        edges: SmallVec::new(),
    }
}

pub static TEMPLATES: Lazy<Vec<Template>> = Lazy::new(|| {
    let mut drafts = Vec::new();
    for wagons in [2, 3] {
        for south in [true, false] {
            drafts.push(rail_terminus(wagons, south));
        }
    }
    for south in [true, false] {
        drafts.push(rail_passing(south));
    }
    for truck in [false, true] {
        for south in [true, false] {
            drafts.push(road_terminus(truck, south));
        }
    }

    let mut catalog = Vec::new();
    for draft in &drafts {
        for facing in DiagDir::ALL {
            let id = catalog.len();
            catalog.push(draft.rotate(facing, id));
        }
    }
    let id = catalog.len();
    catalog.push(airport().rotate(DiagDir::SouthWest, id));
    catalog
});

pub fn template(id: TemplateId) -> Option<&'static Template> {
    TEMPLATES.get(id.0 as usize)
}

pub fn candidates(
    kind: BlockKind,
    wagons: u8,
    truck: bool,
    wanted: Option<DiagDir>,
    any_other: bool,
) -> impl Iterator<Item = &'static Template> {
    TEMPLATES.iter().filter(move |t| {
        t.kind == kind
            && (kind != BlockKind::RailTerminus || t.wagons == wagons)
            && (kind != BlockKind::RoadTerminus || t.truck == truck)
            && (kind == BlockKind::Airport || facing_compatible(t.facing, wanted, any_other))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::TileKind;

    #[test]
    fn ids_match_catalog_positions() {
        for (idx, t) in TEMPLATES.iter().enumerate() {
            assert_eq!(t.id, TemplateId(idx as u16));
            assert_eq!(template(t.id).map(|x| x.id), Some(t.id));
        }
    }

    #[test]
    fn rotated_parts_never_share_a_tile() {
        for t in TEMPLATES.iter() {
            let mut tiles: Vec<TilePos> = t.tiles(TilePos::new(0, 0)).collect();
            let n = tiles.len();
            tiles.sort_unstable();
            tiles.dedup();
            assert_eq!(tiles.len(), n, "template {:?} overlaps itself", t.id);
        }
    }

    #[test]
    fn link_edges_point_away_from_the_block() {
        let origin = TilePos::new(20, 20);
        for t in TEMPLATES.iter() {
            let tiles: Vec<TilePos> = t.tiles(origin).collect();
            for edge in 0..t.edges.len() as u8 {
                let (cursor, dir) = t.link_edge(origin, edge).expect("edge");
                assert!(!tiles.contains(&cursor), "cursor inside block {:?}", t.id);
                let behind = cursor.step(dir.reverse());
                assert!(tiles.contains(&behind), "edge of {:?} detached", t.id);
            }
        }
    }

    #[test]
    fn rail_terminus_stub_is_straight_along_the_facing() {
        for t in candidates(BlockKind::RailTerminus, 3, false, None, false) {
            let origin = TilePos::new(10, 10);
            let (cursor, dir) = t.link_edge(origin, 0).expect("edge");
            assert_eq!(dir, t.facing);
            let stub = cursor.step(dir.reverse());
            let stub_part = t
                .parts
                .iter()
                .find(|p| p.tiles().iter().any(|o| origin.offset(o.x, o.y) == stub))
                .expect("stub part");
            let BlockPart::Rail { tracks, .. } = stub_part else {
                panic!("stub is not rail");
            };
            let kind = TileKind::Rail {
                owner: 0,
                tracks: *tracks,
            };
            assert!(kind.rail_opening(dir));
            assert!(kind.rail_opening(dir.reverse()));
        }
    }

    #[test]
    fn facing_filter_is_exact_then_any_other() {
        let wanted = Some(DiagDir::SouthWest);
        let facings = |any_other| -> Vec<DiagDir> {
            candidates(BlockKind::RoadTerminus, 0, true, wanted, any_other)
                .map(|t| t.facing)
                .collect()
        };
        assert!(facings(false).iter().all(|f| *f == DiagDir::SouthWest));
        assert!(!facings(false).is_empty());

        let fallback = facings(true);
        assert!(!fallback.contains(&DiagDir::SouthWest));
        for other in [DiagDir::SouthEast, DiagDir::NorthEast, DiagDir::NorthWest] {
            assert!(fallback.contains(&other), "{other:?}");
        }
    }

    #[test]
    fn station_rect_covers_every_platform_tile() {
        let t = candidates(BlockKind::RailTerminus, 3, false, Some(DiagDir::NorthWest), false)
            .next()
            .expect("template");
        let rect = t.station_rect(TilePos::new(30, 30)).expect("station");
        let platforms = t
            .parts
            .iter()
            .find(|p| matches!(p, BlockPart::Platform { .. }))
            .expect("platform");
        for tile in platforms.tiles() {
            assert!(rect.contains(TilePos::new(30 + tile.x, 30 + tile.y)));
        }
    }
}
