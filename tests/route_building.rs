//! Whole-controller scenarios: a company builds a line from placed blocks to
//! a running train, backs off when stuck, and survives a save/load cycle.

mod common;

use tycoon_ai::ai::path::{self, LinkTurn};
use tycoon_ai::ai::rail_path::Rail;
use tycoon_ai::ai::state::{AiState, FleetProgress, LinkCursor, LinkMode, LinkProgress, PlayerAiState};
use tycoon_ai::ai::{AiController, BannedTiles, CompanyController};
use tycoon_ai::coords::TilePos;
use tycoon_ai::game::economy::IndustryKind;
use tycoon_ai::map::TileKind;
use tycoon_ai::types::{Cargo, DiagDir, VehicleClass};

#[test]
fn passenger_line_goes_from_blocks_to_a_running_train() {
    let mut world = common::passenger_line_world();
    let mut seen = Vec::new();
    for _ in 0..2000 {
        AiController.run_turn(&mut world, 0);
        let name = common::state_name(&world, 0);
        if seen.last() != Some(&name) {
            seen.push(name);
        }
        if name == "idle" {
            break;
        }
    }
    assert!(seen.contains(&"build-rail"), "{seen:?}");
    assert!(seen.contains(&"build-rail-vehicles"), "{seen:?}");
    assert_eq!(seen.last(), Some(&"idle"), "{seen:?}");

    let train = world
        .vehicles
        .iter()
        .find(|v| v.owner == 0 && v.class == VehicleClass::Train && v.is_primary() && !v.wagons.is_empty())
        .expect("a train");
    assert_eq!(train.wagons.len(), 3);
    assert_eq!(train.orders.len(), 2);
    assert!(world.companies[0].ai.records.is_empty());
}

#[test]
fn stuck_cursor_bans_its_tile_and_backs_off() {
    let mut world = common::flat_world(80, 48, 1);
    let mut ai = PlayerAiState::new(3);
    ai.banned.ban(TilePos::new(10, 20), BannedTiles::ANY);
    let mut progress = LinkProgress {
        link_index: 0,
        a: LinkCursor::new(TilePos::new(10, 20), DiagDir::SouthWest),
        b: LinkCursor::new(TilePos::new(60, 20), DiagDir::NorthEast),
        advance_b: false,
    };

    // a moves on odd calls; its 21st fruitless turn is call 41
    for _ in 0..41 {
        match path::build_link::<Rail>(&mut world, 0, &mut ai, progress) {
            LinkTurn::Continue(next) => progress = next,
            other => panic!("link ended early: {other:?}"),
        }
    }
    assert_eq!(progress.a.mode, LinkMode::Destruct { remaining: 40 });
    assert_eq!(ai.banned.len(), 2);
    assert!(progress.a.at_start());
    assert!(!progress.b.at_start(), "the other end keeps growing");

    for _ in 0..2 {
        match path::build_link::<Rail>(&mut world, 0, &mut ai, progress) {
            LinkTurn::Continue(next) => progress = next,
            other => panic!("link ended early: {other:?}"),
        }
    }
    assert_eq!(progress.a.mode, LinkMode::Recover { ticks: 0 });
}

#[test]
fn a_wall_of_houses_sends_a_cursor_into_destruct() {
    let mut world = common::flat_world(80, 48, 1);
    for y in 0..48 {
        for x in [35, 36] {
            world.map.set_kind(TilePos::new(x, y), TileKind::House { town: 0 });
        }
    }
    let mut ai = PlayerAiState::new(3);
    let mut progress = LinkProgress {
        link_index: 0,
        a: LinkCursor::new(TilePos::new(10, 20), DiagDir::SouthWest),
        b: LinkCursor::new(TilePos::new(60, 20), DiagDir::NorthEast),
        advance_b: false,
    };

    let mut destructing = false;
    for _ in 0..1200 {
        match path::build_link::<Rail>(&mut world, 0, &mut ai, progress) {
            LinkTurn::Continue(next) => progress = next,
            other => panic!("link ended before backing off: {other:?}"),
        }
        let modes = [progress.a.mode, progress.b.mode];
        if modes.iter().any(|m| matches!(m, LinkMode::Destruct { .. })) {
            destructing = true;
            break;
        }
    }
    assert!(destructing, "no cursor gave up on the wall");
    assert!(!ai.banned.is_empty());
    for y in 0..48 {
        for x in [35, 36] {
            assert_eq!(world.map.kind(TilePos::new(x, y)), TileKind::House { town: 0 });
        }
    }
}

#[test]
fn a_fresh_company_goes_from_idle_to_placing_rail_blocks() {
    let mut world = common::flat_world(64, 48, 1);
    world.config.ai.disable_road_vehicles = true;
    world.config.ai.disable_aircraft = true;
    world.found_industry(IndustryKind::CoalMine, TilePos::new(10, 24));
    world.found_industry(IndustryKind::PowerStation, TilePos::new(35, 24));
    assert_eq!(common::state_name(&world, 0), "idle");

    let mut seen = Vec::new();
    for _ in 0..300 {
        AiController.run_turn(&mut world, 0);
        let name = common::state_name(&world, 0);
        if seen.last() != Some(&name) {
            seen.push(name);
        }
        if name == "build-default-rail-blocks" {
            break;
        }
    }
    assert!(seen.contains(&"remove-track"), "{seen:?}");
    assert!(seen.contains(&"want-new-route"), "{seen:?}");
    assert_eq!(seen.last(), Some(&"build-default-rail-blocks"), "{seen:?}");
    let ai = &world.companies[0].ai;
    assert_eq!(ai.records.len(), 2);
    assert_eq!(ai.fleet.cargo, Cargo::Coal);
}

#[test]
fn reloaded_company_continues_identically() {
    let mut world = common::passenger_line_world();
    for _ in 0..400 {
        AiController.run_turn(&mut world, 0);
        if let AiState::BuildRail(link) = &world.companies[0].ai.state {
            if link.a.trail.len() + link.b.trail.len() >= 4 {
                break;
            }
        }
    }
    assert_eq!(common::state_name(&world, 0), "build-rail");

    let mut reloaded = world.clone();
    let json = serde_json::to_string(&world.companies[0].ai).expect("serialize");
    reloaded.companies[0].ai = serde_json::from_str(&json).expect("deserialize");

    for _ in 0..30 {
        AiController.run_turn(&mut world, 0);
        AiController.run_turn(&mut reloaded, 0);
    }
    assert_eq!(
        serde_json::to_string(&world.companies[0].ai).expect("serialize"),
        serde_json::to_string(&reloaded.companies[0].ai).expect("serialize"),
    );
    assert_eq!(world.money(0), reloaded.money(0));
}

#[test]
fn fleet_waits_for_money_then_gives_up() {
    let mut world = common::passenger_line_world();
    world.companies[0].money = 0;
    world.companies[0].ai.records[0].depot = Some(TilePos::new(20, 20));
    world.companies[0].ai.state = AiState::BuildRoadVehicles(FleetProgress::default());

    AiController.run_turn(&mut world, 0);
    assert_eq!(
        world.companies[0].ai.state,
        AiState::BuildRoadVehicles(FleetProgress { waited: 1 })
    );

    world.companies[0].ai.state = AiState::BuildRoadVehicles(FleetProgress { waited: 999 });
    AiController.run_turn(&mut world, 0);
    assert_eq!(world.companies[0].ai.state, AiState::Idle);
    assert!(world.companies[0].ai.records.is_empty());
}

#[test]
#[should_panic(expected = "ship routes")]
fn ship_states_are_fatal() {
    let mut world = common::flat_world(32, 32, 1);
    world.companies[0].ai.state = AiState::CheckShipStuff;
    AiController.run_turn(&mut world, 0);
}
