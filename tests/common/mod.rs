#![allow(dead_code)]

use tycoon_ai::ai::blocks::BlockRole;
use tycoon_ai::ai::state::{AiState, BlockProgress, BuildRecord, FleetPlan, LinkInstruction, NO_LINK};
use tycoon_ai::coords::TilePos;
use tycoon_ai::game::config::GameConfig;
use tycoon_ai::game::world::World;
use tycoon_ai::map::Map;
use tycoon_ai::types::{Cargo, DiagDir, Transport};

/// A flat world at height 2 where every company is a computer player.
pub fn flat_world(width: i32, height: i32, companies: usize) -> World {
    let config = GameConfig {
        seed: 7,
        num_ai_companies: companies,
        num_human_companies: 0,
        ..GameConfig::default()
    };
    World::with_map(config, Map::flat(width, height, 2))
}

/// Two towns forty tiles apart and company 0 about to place the blocks of a
/// passenger line between them.
pub fn passenger_line_world() -> World {
    let mut world = flat_world(64, 64, 1);
    world.found_town(TilePos::new(10, 30), 3);
    world.found_town(TilePos::new(50, 30), 3);

    let ai = &mut world.companies[0].ai;
    for (anchor, role, dir) in [
        (TilePos::new(15, 30), BlockRole::Source, DiagDir::SouthWest),
        (TilePos::new(45, 30), BlockRole::Destination, DiagDir::NorthEast),
    ] {
        let mut record = BuildRecord::new(anchor, 2, role, Transport::Rail, Cargo::Passengers);
        record.wagons = 2;
        record.direction = Some(dir);
        ai.records.push(record);
    }
    ai.records[0].links[0] = LinkInstruction::new(0, 1, 0).pack();
    ai.records[1].links[0] = NO_LINK;
    ai.fleet = FleetPlan {
        cargo: Cargo::Passengers,
        num_wagons: 2,
        vehicles_to_build: 1,
        num_want_fullload: 1,
        order_blocks: [0u8, 1].into_iter().collect(),
        ..FleetPlan::default()
    };
    ai.state = AiState::BuildDefaultRailBlocks(BlockProgress::new());
    world
}

pub fn state_name(world: &World, company: usize) -> &'static str {
    world.companies[company].ai.state.name()
}
