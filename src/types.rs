use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// One of the four tile edges. Map `x` grows towards south-west, `y` towards south-east.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagDir {
    NorthEast,
    SouthEast,
    SouthWest,
    NorthWest,
}

impl DiagDir {
    pub const ALL: [DiagDir; 4] = [
        DiagDir::NorthEast,
        DiagDir::SouthEast,
        DiagDir::SouthWest,
        DiagDir::NorthWest,
    ];

    pub const fn index(self) -> u8 {
        match self {
            DiagDir::NorthEast => 0,
            DiagDir::SouthEast => 1,
            DiagDir::SouthWest => 2,
            DiagDir::NorthWest => 3,
        }
    }

    pub const fn from_index(index: u8) -> Self {
        Self::ALL[(index & 3) as usize]
    }

    pub const fn reverse(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    /// Quarter turn clockwise as seen from above.
    pub const fn rotate_cw(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub const fn rotate_ccw(self) -> Self {
        Self::from_index(self.index() + 3)
    }

    pub const fn axis(self) -> Axis {
        match self {
            DiagDir::NorthEast | DiagDir::SouthWest => Axis::X,
            DiagDir::SouthEast | DiagDir::NorthWest => Axis::Y,
        }
    }

    pub const fn offset(self) -> (i32, i32) {
        match self {
            DiagDir::NorthEast => (-1, 0),
            DiagDir::SouthEast => (0, 1),
            DiagDir::SouthWest => (1, 0),
            DiagDir::NorthWest => (0, -1),
        }
    }

    /// Rotates a direction that was authored relative to south-west so it is
    /// relative to `facing` instead.
    pub const fn rotated_to(self, facing: DiagDir) -> Self {
        let turns = (facing.index() + 4 - DiagDir::SouthWest.index()) & 3;
        Self::from_index(self.index() + turns)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub const fn straight_track(self) -> Track {
        match self {
            Axis::X => Track::X,
            Axis::Y => Track::Y,
        }
    }

    pub const fn other(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

/// A single rail piece inside one tile, described by the two edges it joins.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Track {
    X,
    Y,
    Upper,
    Lower,
    Left,
    Right,
}

impl Track {
    pub const ALL: [Track; 6] = [
        Track::X,
        Track::Y,
        Track::Upper,
        Track::Lower,
        Track::Left,
        Track::Right,
    ];

    pub const fn bit(self) -> u8 {
        match self {
            Track::X => 1,
            Track::Y => 2,
            Track::Upper => 4,
            Track::Lower => 8,
            Track::Left => 16,
            Track::Right => 32,
        }
    }

    pub const fn edges(self) -> (DiagDir, DiagDir) {
        use DiagDir::*;
        match self {
            Track::X => (NorthEast, SouthWest),
            Track::Y => (NorthWest, SouthEast),
            Track::Upper => (NorthEast, NorthWest),
            Track::Lower => (SouthEast, SouthWest),
            Track::Left => (SouthWest, NorthWest),
            Track::Right => (NorthEast, SouthEast),
        }
    }

    pub fn has_edge(self, edge: DiagDir) -> bool {
        let (a, b) = self.edges();
        a == edge || b == edge
    }

    /// The piece joining two distinct edges.
    pub fn joining(a: DiagDir, b: DiagDir) -> Option<Track> {
        if a == b {
            return None;
        }
        Track::ALL
            .into_iter()
            .find(|track| track.has_edge(a) && track.has_edge(b))
    }

    /// Direction of travel when leaving a tile through this piece after
    /// entering it while moving in `dir`.
    pub fn exit_from(self, dir: DiagDir) -> Option<DiagDir> {
        let entry = dir.reverse();
        let (a, b) = self.edges();
        if a == entry {
            Some(b)
        } else if b == entry {
            Some(a)
        } else {
            None
        }
    }

    pub fn is_straight(self) -> bool {
        matches!(self, Track::X | Track::Y)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Transport {
    Rail,
    Road,
    Air,
    Water,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleClass {
    Train,
    Road,
    Aircraft,
    Ship,
}

impl VehicleClass {
    pub const fn transport(self) -> Transport {
        match self {
            VehicleClass::Train => Transport::Rail,
            VehicleClass::Road => Transport::Road,
            VehicleClass::Aircraft => Transport::Air,
            VehicleClass::Ship => Transport::Water,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Cargo {
    Passengers,
    Mail,
    Coal,
    Wood,
    Livestock,
    Grain,
    IronOre,
    Steel,
    Oil,
    Goods,
}

impl Cargo {
    pub const ALL: [Cargo; 10] = [
        Cargo::Passengers,
        Cargo::Mail,
        Cargo::Coal,
        Cargo::Wood,
        Cargo::Livestock,
        Cargo::Grain,
        Cargo::IronOre,
        Cargo::Steel,
        Cargo::Oil,
        Cargo::Goods,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn is_town_cargo(self) -> bool {
        matches!(self, Cargo::Passengers | Cargo::Mail)
    }
}

pub type CompanyId = usize;
pub type TownId = usize;
pub type IndustryId = usize;
pub type StationId = usize;

pub type Money = i64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_exit_follows_entry_edge() {
        assert_eq!(
            Track::X.exit_from(DiagDir::SouthWest),
            Some(DiagDir::SouthWest)
        );
        assert_eq!(
            Track::Upper.exit_from(DiagDir::SouthWest),
            Some(DiagDir::NorthWest)
        );
        assert_eq!(Track::Y.exit_from(DiagDir::SouthWest), None);
    }

    #[test]
    fn joining_edges_is_symmetric() {
        for a in DiagDir::ALL {
            for b in DiagDir::ALL {
                assert_eq!(Track::joining(a, b), Track::joining(b, a));
                assert_eq!(Track::joining(a, b).is_some(), a != b);
            }
        }
    }

    #[test]
    fn rotation_relative_to_south_west_is_identity() {
        for dir in DiagDir::ALL {
            assert_eq!(dir.rotated_to(DiagDir::SouthWest), dir);
            assert_eq!(dir.rotate_cw().rotate_ccw(), dir);
        }
    }
}
