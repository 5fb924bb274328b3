use std::collections::VecDeque;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::ai::blocks::{BlockRole, TemplateId};
use crate::ai::scout::RouteCategory;
use crate::coords::TilePos;
use crate::game::vehicles::VehicleId;
use crate::map::RoadBits;
use crate::types::{Cargo, DiagDir, StationId, Track, Transport};

pub const MAX_BUILD_RECORDS: usize = 4;
pub const BANNED_TILE_CAPACITY: usize = 16;
pub const NO_LINK: u8 = 0xFF;

/// Chains one edge of a block to an edge of another block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInstruction {
    pub own_edge: u8,
    pub to_record: u8,
    pub to_edge: u8,
}

impl LinkInstruction {
    pub const fn new(own_edge: u8, to_record: u8, to_edge: u8) -> Self {
        Self {
            own_edge,
            to_record,
            to_edge,
        }
    }

    pub const fn pack(self) -> u8 {
        (self.own_edge & 3) | ((self.to_edge & 3) << 2) | ((self.to_record & 0xF) << 4)
    }

    pub const fn unpack(packed: u8) -> Option<Self> {
        if packed == NO_LINK {
            return None;
        }
        Some(Self {
            own_edge: packed & 3,
            to_edge: (packed >> 2) & 3,
            to_record: packed >> 4,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockMatch {
    Template {
        id: TemplateId,
        origin: TilePos,
    },
    ExistingStation { station: StationId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub anchor: TilePos,
    pub use_tile: TilePos,
    pub radius: u8,
    pub role: BlockRole,
    pub transport: Transport,
    pub wagons: u8,
    /// Preferred facing of the block, towards its link partner.
    pub direction: Option<DiagDir>,
    /// Set once the preferred facing has failed for a whole turn; from then
    /// on any other facing is tried instead.
    #[serde(default)]
    pub any_direction: bool,
    pub cargo: Cargo,
    /// Source sites must produce the cargo, destinations accept it.
    pub produces: bool,
    pub truck: bool,
    pub matched: Option<BlockMatch>,
    pub links: [u8; 2],
    pub station: Option<StationId>,
    pub depot: Option<TilePos>,
}

impl BuildRecord {
    pub fn new(anchor: TilePos, radius: u8, role: BlockRole, transport: Transport, cargo: Cargo) -> Self {
        Self {
            anchor,
            use_tile: anchor,
            radius,
            role,
            transport,
            wagons: 0,
            direction: None,
            any_direction: false,
            cargo,
            produces: false,
            truck: false,
            matched: None,
            links: [NO_LINK; 2],
            station: None,
            depot: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.matched.is_some()
    }

    pub fn link_instructions(&self) -> impl Iterator<Item = LinkInstruction> + '_ {
        self.links.iter().filter_map(|packed| LinkInstruction::unpack(*packed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Piece {
    Rail(Track),
    Road(RoadBits),
    Bridge { end: TilePos, kind: u8 },
    Tunnel { end: TilePos },
}

impl Piece {
    /// Key under which a failed choice is remembered.
    pub fn choice_code(self) -> u8 {
        match self {
            Piece::Rail(track) => track.bit(),
            Piece::Road(bits) => bits.edges().fold(0x40, |acc, d| acc | (1 << d.index())),
            Piece::Bridge { .. } => 0x80,
            Piece::Tunnel { .. } => 0x81,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub tile: TilePos,
    pub dir: DiagDir,
    pub piece: Piece,
    /// The piece was already there and must not be removed on backoff.
    pub reused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkMode {
    Construct,
    Destruct { remaining: u8 },
    Recover { ticks: u8 },
}

/// One growing end of a link. `cur_tile` is the next tile to build on,
/// entered while travelling `cur_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkCursor {
    pub start_tile: TilePos,
    pub start_dir: DiagDir,
    pub cur_tile: TilePos,
    pub cur_dir: DiagDir,
    pub trail: Vec<Segment>,
    pub mode: LinkMode,
    pub fail_counter: u8,
}

impl LinkCursor {
    pub fn new(tile: TilePos, dir: DiagDir) -> Self {
        Self {
            start_tile: tile,
            start_dir: dir,
            cur_tile: tile,
            cur_dir: dir,
            trail: Vec::new(),
            mode: LinkMode::Construct,
            fail_counter: 0,
        }
    }

    pub fn at_start(&self) -> bool {
        self.trail.is_empty()
    }
}

/// Fixed-capacity memory of tile choices the path builder must avoid.
/// Inserting into a full list evicts the oldest entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BannedTiles {
    entries: VecDeque<(TilePos, u8)>,
}

impl BannedTiles {
    pub const ANY: u8 = 0xFF;

    pub fn ban(&mut self, tile: TilePos, choice: u8) {
        if self.entries.len() >= BANNED_TILE_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back((tile, choice));
    }

    pub fn is_banned(&self, tile: TilePos, choice: u8) -> bool {
        self.entries
            .iter()
            .any(|&(t, c)| t == tile && (c == choice || c == Self::ANY))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tiles(&self) -> impl Iterator<Item = TilePos> + '_ {
        self.entries.iter().map(|(t, _)| *t)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockProgress {
    pub fail_counter: u16,
    /// Raise (+1) or lower (-1) when terraforming around a stubborn site.
    pub terraform_mode: i8,
}

impl BlockProgress {
    pub fn new() -> Self {
        Self {
            fail_counter: 0,
            terraform_mode: -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkProgress {
    pub link_index: u8,
    pub a: LinkCursor,
    pub b: LinkCursor,
    pub advance_b: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FleetProgress {
    pub waited: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetPlan {
    pub cargo: Cargo,
    pub num_wagons: u8,
    pub vehicles_to_build: u8,
    pub num_want_fullload: u8,
    pub wagon_list: SmallVec<[VehicleId; 8]>,
    pub order_blocks: SmallVec<[u8; 4]>,
}

impl Default for FleetPlan {
    fn default() -> Self {
        Self {
            cargo: Cargo::Passengers,
            num_wagons: 0,
            vehicles_to_build: 0,
            num_want_fullload: 0,
            wagon_list: SmallVec::new(),
            order_blocks: SmallVec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Verdict {
    pub too_old: bool,
    pub unreliable: bool,
    pub unprofitable: bool,
}

impl Verdict {
    pub fn urgency(self) -> u8 {
        self.too_old as u8 + self.unreliable as u8 + self.unprofitable as u8
    }

    pub fn any(self) -> bool {
        self.urgency() > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AiState {
    Idle,
    RemoveTrack {
        next_index: u32,
    },
    RemoveSingleRailTile {
        tile: TilePos,
        track: Track,
        resume_index: u32,
    },
    RemoveStation,
    RestartVehicleScan,
    VehicleLoop,
    CheckReplaceVehicle,
    DoReplaceVehicle {
        waited: u16,
    },
    SellVehicle {
        waited: u16,
    },
    WantNewRoute {
        rounds: u16,
    },
    BuildDefaultRailBlocks(BlockProgress),
    BuildRail(LinkProgress),
    BuildRailVehicles(FleetProgress),
    DeleteRailBlocks,
    BuildDefaultRoadBlocks(BlockProgress),
    BuildRoad(LinkProgress),
    BuildRoadVehicles(FleetProgress),
    DeleteRoadBlocks,
    AirportStuff,
    BuildDefaultAirportBlocks(BlockProgress),
    BuildAircraftVehicles(FleetProgress),
    DeleteAirportBlocks,
    CheckShipStuff,
    BuildDefaultShipBlocks,
    DoShipStuff,
}

impl AiState {
    pub fn name(&self) -> &'static str {
        match self {
            AiState::Idle => "idle",
            AiState::RemoveTrack { .. } => "remove-track",
            AiState::RemoveSingleRailTile { .. } => "remove-single-rail-tile",
            AiState::RemoveStation => "remove-station",
            AiState::RestartVehicleScan => "restart-vehicle-scan",
            AiState::VehicleLoop => "vehicle-loop",
            AiState::CheckReplaceVehicle => "check-replace-vehicle",
            AiState::DoReplaceVehicle { .. } => "do-replace-vehicle",
            AiState::SellVehicle { .. } => "sell-vehicle",
            AiState::WantNewRoute { .. } => "want-new-route",
            AiState::BuildDefaultRailBlocks(_) => "build-default-rail-blocks",
            AiState::BuildRail(_) => "build-rail",
            AiState::BuildRailVehicles(_) => "build-rail-vehicles",
            AiState::DeleteRailBlocks => "delete-rail-blocks",
            AiState::BuildDefaultRoadBlocks(_) => "build-default-road-blocks",
            AiState::BuildRoad(_) => "build-road",
            AiState::BuildRoadVehicles(_) => "build-road-vehicles",
            AiState::DeleteRoadBlocks => "delete-road-blocks",
            AiState::AirportStuff => "airport-stuff",
            AiState::BuildDefaultAirportBlocks(_) => "build-default-airport-blocks",
            AiState::BuildAircraftVehicles(_) => "build-aircraft-vehicles",
            AiState::DeleteAirportBlocks => "delete-airport-blocks",
            AiState::CheckShipStuff => "check-ship-stuff",
            AiState::BuildDefaultShipBlocks => "build-default-ship-blocks",
            AiState::DoShipStuff => "do-ship-stuff",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerAiState {
    pub state: AiState,
    /// Shared by the block and link phases of a route; the route is
    /// abandoned when it runs out.
    pub timeout_counter: u16,
    /// Transports already tried: rail 1, road 2, air 4.
    pub route_type_mask: u8,
    pub category: Option<RouteCategory>,
    pub records: SmallVec<[BuildRecord; MAX_BUILD_RECORDS]>,
    pub banned: BannedTiles,
    pub fleet: FleetPlan,
    pub cur_veh: Option<VehicleId>,
    pub scan_queue: VecDeque<(VehicleId, Verdict)>,
    pub rng: ChaCha8Rng,
}

impl Default for PlayerAiState {
    fn default() -> Self {
        Self::new(0)
    }
}

impl PlayerAiState {
    pub fn new(seed: u64) -> Self {
        Self {
            state: AiState::Idle,
            timeout_counter: 0,
            route_type_mask: 0,
            category: None,
            records: SmallVec::new(),
            banned: BannedTiles::default(),
            fleet: FleetPlan::default(),
            cur_veh: None,
            scan_queue: VecDeque::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn reset_route(&mut self) {
        self.records.clear();
        self.category = None;
        self.timeout_counter = 0;
        self.fleet = FleetPlan::default();
        self.banned.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banned_tiles_evict_oldest_first() {
        let mut banned = BannedTiles::default();
        for i in 0..BANNED_TILE_CAPACITY as i32 {
            banned.ban(TilePos::new(i, 0), 1);
        }
        assert_eq!(banned.len(), BANNED_TILE_CAPACITY);
        banned.ban(TilePos::new(99, 99), 2);
        assert_eq!(banned.len(), BANNED_TILE_CAPACITY);
        assert!(!banned.is_banned(TilePos::new(0, 0), 1));
        assert!(banned.is_banned(TilePos::new(1, 0), 1));
        assert!(banned.is_banned(TilePos::new(99, 99), 2));
        assert!(!banned.is_banned(TilePos::new(99, 99), 1));
    }

    #[test]
    fn whole_tile_ban_covers_every_choice() {
        let mut banned = BannedTiles::default();
        banned.ban(TilePos::new(3, 3), BannedTiles::ANY);
        assert!(banned.is_banned(TilePos::new(3, 3), Track::X.bit()));
        assert!(banned.is_banned(TilePos::new(3, 3), 0x80));
    }

    #[test]
    fn link_instruction_packing_is_lossless() {
        for own_edge in 0..2 {
            for to_record in 0..MAX_BUILD_RECORDS as u8 {
                for to_edge in 0..2 {
                    let link = LinkInstruction::new(own_edge, to_record, to_edge);
                    assert_ne!(link.pack(), NO_LINK);
                    assert_eq!(LinkInstruction::unpack(link.pack()), Some(link));
                }
            }
        }
        assert_eq!(LinkInstruction::unpack(NO_LINK), None);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut ai = PlayerAiState::new(7);
        ai.banned.ban(TilePos::new(4, 5), 3);
        ai.state = AiState::BuildRail(LinkProgress {
            link_index: 0,
            a: LinkCursor::new(TilePos::new(10, 10), DiagDir::SouthWest),
            b: LinkCursor::new(TilePos::new(30, 10), DiagDir::NorthEast),
            advance_b: true,
        });
        let json = serde_json::to_string(&ai).expect("serialize");
        let back: PlayerAiState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.state, ai.state);
        assert_eq!(back.banned, ai.banned);
    }
}
