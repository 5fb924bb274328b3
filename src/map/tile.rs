use serde::{Deserialize, Serialize};

use crate::coords::TilePos;
use crate::types::{Axis, CompanyId, DiagDir, IndustryId, StationId, TownId, Track, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct TrackBits(u8);

impl TrackBits {
    pub const EMPTY: TrackBits = TrackBits(0);

    pub const fn single(track: Track) -> Self {
        Self(track.bit())
    }

    pub const fn contains(self, track: Track) -> bool {
        self.0 & track.bit() != 0
    }

    pub const fn with(self, track: Track) -> Self {
        Self(self.0 | track.bit())
    }

    pub const fn without(self, track: Track) -> Self {
        Self(self.0 & !track.bit())
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Track> {
        Track::ALL.into_iter().filter(move |t| self.contains(*t))
    }

    pub fn has_edge(self, edge: DiagDir) -> bool {
        self.iter().any(|t| t.has_edge(edge))
    }

    /// Pieces that cross without a shared edge cannot share a tile.
    pub fn accepts(self, track: Track) -> bool {
        if self.contains(track) {
            return false;
        }
        match track {
            Track::X => !self.contains(Track::Y),
            Track::Y => !self.contains(Track::X),
            _ => !(self.contains(Track::X) || self.contains(Track::Y)) || self.count() < 2,
        }
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct RoadBits(u8);

impl RoadBits {
    pub const EMPTY: RoadBits = RoadBits(0);
    pub const ALL: RoadBits = RoadBits(0b1111);

    pub const fn edge(dir: DiagDir) -> Self {
        Self(1 << dir.index())
    }

    pub const fn axis(axis: Axis) -> Self {
        match axis {
            Axis::X => Self(Self::edge(DiagDir::NorthEast).0 | Self::edge(DiagDir::SouthWest).0),
            Axis::Y => Self(Self::edge(DiagDir::NorthWest).0 | Self::edge(DiagDir::SouthEast).0),
        }
    }

    pub const fn pair(a: DiagDir, b: DiagDir) -> Self {
        Self(Self::edge(a).0 | Self::edge(b).0)
    }

    pub const fn union(self, other: RoadBits) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn minus(self, other: RoadBits) -> Self {
        Self(self.0 & !other.0)
    }

    pub const fn contains(self, other: RoadBits) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn has_edge(self, dir: DiagDir) -> bool {
        self.0 & (1 << dir.index()) != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn edges(self) -> impl Iterator<Item = DiagDir> {
        DiagDir::ALL.into_iter().filter(move |d| self.has_edge(*d))
    }

    /// Straight along one axis with nothing else.
    pub fn straight_axis(self) -> Option<Axis> {
        if self == Self::axis(Axis::X) {
            Some(Axis::X)
        } else if self == Self::axis(Axis::Y) {
            Some(Axis::Y)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    North,
    East,
    South,
    West,
}

impl Corner {
    pub const ALL: [Corner; 4] = [Corner::North, Corner::East, Corner::South, Corner::West];

    /// Vertex offset relative to the tile's own (north) vertex.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Corner::North => (0, 0),
            Corner::West => (1, 0),
            Corner::East => (0, 1),
            Corner::South => (1, 1),
        }
    }

    pub const fn of_edge(edge: DiagDir) -> [Corner; 2] {
        match edge {
            DiagDir::NorthEast => [Corner::North, Corner::East],
            DiagDir::SouthEast => [Corner::East, Corner::South],
            DiagDir::SouthWest => [Corner::West, Corner::South],
            DiagDir::NorthWest => [Corner::North, Corner::West],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slope {
    Flat,
    /// The edge facing the given direction is one step higher.
    Inclined(DiagDir),
    Irregular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StationPart {
    Platform(Axis),
    BusStop(DiagDir),
    TruckStop(DiagDir),
    Airport,
}

impl StationPart {
    pub fn transport(self) -> Transport {
        match self {
            StationPart::Platform(_) => Transport::Rail,
            StationPart::BusStop(_) | StationPart::TruckStop(_) => Transport::Road,
            StationPart::Airport => Transport::Air,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileKind {
    Clear,
    Trees,
    Water,
    House {
        town: TownId,
    },
    Industry {
        industry: IndustryId,
    },
    Rail {
        owner: CompanyId,
        tracks: TrackBits,
    },
    Road {
        owner: Option<CompanyId>,
        bits: RoadBits,
    },
    Station {
        owner: CompanyId,
        station: StationId,
        part: StationPart,
    },
    Depot {
        owner: CompanyId,
        transport: Transport,
        dir: DiagDir,
    },
    /// `dir` points from this portal into the tunnel.
    Tunnel {
        owner: CompanyId,
        transport: Transport,
        dir: DiagDir,
        other_end: TilePos,
    },
    /// `dir` points from this ramp across the span.
    BridgeRamp {
        owner: CompanyId,
        transport: Transport,
        dir: DiagDir,
        other_end: TilePos,
    },
    Headquarters {
        owner: CompanyId,
    },
}

impl TileKind {
    pub fn owner(&self) -> Option<CompanyId> {
        match *self {
            TileKind::Rail { owner, .. }
            | TileKind::Station { owner, .. }
            | TileKind::Depot { owner, .. }
            | TileKind::Tunnel { owner, .. }
            | TileKind::BridgeRamp { owner, .. }
            | TileKind::Headquarters { owner } => Some(owner),
            TileKind::Road { owner, .. } => owner,
            _ => None,
        }
    }

    pub fn is_clearable_ground(&self) -> bool {
        matches!(self, TileKind::Clear | TileKind::Trees)
    }

    /// Whether rail infrastructure on this tile has an opening on `edge`.
    pub fn rail_opening(&self, edge: DiagDir) -> bool {
        match *self {
            TileKind::Rail { tracks, .. } => tracks.has_edge(edge),
            TileKind::Station {
                part: StationPart::Platform(axis),
                ..
            } => edge.axis() == axis,
            TileKind::Depot {
                transport: Transport::Rail,
                dir,
                ..
            } => edge == dir,
            TileKind::Tunnel {
                transport: Transport::Rail,
                dir,
                ..
            }
            | TileKind::BridgeRamp {
                transport: Transport::Rail,
                dir,
                ..
            } => edge == dir.reverse(),
            _ => false,
        }
    }

    pub fn road_opening(&self, edge: DiagDir) -> bool {
        match *self {
            TileKind::Road { bits, .. } => bits.has_edge(edge),
            TileKind::Station {
                part: StationPart::BusStop(dir) | StationPart::TruckStop(dir),
                ..
            } => edge == dir,
            TileKind::Depot {
                transport: Transport::Road,
                dir,
                ..
            } => edge == dir,
            TileKind::Tunnel {
                transport: Transport::Road,
                dir,
                ..
            }
            | TileKind::BridgeRamp {
                transport: Transport::Road,
                dir,
                ..
            } => edge == dir.reverse(),
            _ => false,
        }
    }
}
