use tracing::{debug, trace};

use crate::ai::path::{self, LinkTurn};
use crate::ai::rail_path::Rail;
use crate::ai::road_path::Road;
use crate::ai::state::{AiState, FleetProgress, LinkProgress, PlayerAiState};
use crate::ai::{fleet, maintenance, matcher, scout, treasury};
use crate::game::world::World;
use crate::types::{CompanyId, Transport};

/// Something that moves a company when its turn comes up.
pub trait CompanyController {
    fn run_turn(&self, world: &mut World, company: CompanyId);
}

/// The built-in computer player.
#[derive(Debug, Clone, Copy, Default)]
pub struct AiController;

/// Leaves the company alone; stands in for a human who never acts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassiveController;

impl CompanyController for PassiveController {
    fn run_turn(&self, _world: &mut World, _company: CompanyId) {}
}

impl CompanyController for AiController {
    fn run_turn(&self, world: &mut World, company: CompanyId) {
        let Some(c) = world.company(company) else {
            return;
        };
        if !c.active || !c.is_ai {
            return;
        }
        if c.is_for_sale() {
            treasury::handle_takeover(world, company);
            return;
        }
        treasury::adjust_loan(world, company);

        let Some(c) = world.company_mut(company) else {
            return;
        };
        let mut ai = std::mem::take(&mut c.ai);
        treasury::build_headquarters(world, company, &mut ai.rng);

        let state = std::mem::replace(&mut ai.state, AiState::Idle);
        let from = state.name();
        let next = step(world, company, &mut ai, state);
        if next.name() != from {
            debug!(company, from, to = next.name(), "state change");
        } else {
            trace!(company, state = from, "turn");
        }
        ai.state = next;
        if let Some(c) = world.company_mut(company) {
            c.ai = ai;
        }
    }
}

/// Runs the handler for `state` and returns the state for the next turn.
pub fn step(world: &mut World, company: CompanyId, ai: &mut PlayerAiState, state: AiState) -> AiState {
    match state {
        AiState::Idle => AiState::RemoveTrack { next_index: 0 },
        AiState::RemoveTrack { next_index } => maintenance::remove_track(world, company, next_index),
        AiState::RemoveSingleRailTile {
            tile,
            track,
            resume_index,
        } => maintenance::remove_single_rail_tile(world, company, tile, track, resume_index),
        AiState::RemoveStation => maintenance::remove_station(world, company),
        AiState::RestartVehicleScan => maintenance::restart_vehicle_scan(world, company, ai),
        AiState::VehicleLoop => maintenance::vehicle_loop(world, ai),
        AiState::CheckReplaceVehicle => maintenance::check_replace_vehicle(world, company, ai),
        AiState::DoReplaceVehicle { waited } => maintenance::do_replace_vehicle(world, company, ai, waited),
        AiState::SellVehicle { waited } => maintenance::sell_vehicle(world, company, ai, waited),
        AiState::WantNewRoute { rounds } => scout::want_new_route(world, company, ai, rounds),

        AiState::BuildDefaultRailBlocks(progress) => {
            matcher::build_default_blocks(world, company, ai, progress, Transport::Rail)
        }
        AiState::BuildRail(link) => after_link(
            path::build_link::<Rail>(world, company, ai, link),
            AiState::BuildRail,
            AiState::BuildRailVehicles,
            AiState::DeleteRailBlocks,
        ),
        AiState::BuildRailVehicles(progress) => fleet::build_rail_vehicles(world, company, ai, progress),

        AiState::BuildDefaultRoadBlocks(progress) => {
            matcher::build_default_blocks(world, company, ai, progress, Transport::Road)
        }
        AiState::BuildRoad(link) => after_link(
            path::build_link::<Road>(world, company, ai, link),
            AiState::BuildRoad,
            AiState::BuildRoadVehicles,
            AiState::DeleteRoadBlocks,
        ),
        AiState::BuildRoadVehicles(progress) => fleet::build_road_vehicles(world, company, ai, progress),

        AiState::AirportStuff => matcher::airport_stuff(world, company, ai),
        AiState::BuildDefaultAirportBlocks(progress) => {
            matcher::build_default_blocks(world, company, ai, progress, Transport::Air)
        }
        AiState::BuildAircraftVehicles(progress) => fleet::build_aircraft_vehicles(world, company, ai, progress),

        AiState::DeleteRailBlocks | AiState::DeleteRoadBlocks | AiState::DeleteAirportBlocks => {
            matcher::delete_blocks(world, company, ai)
        }

        AiState::CheckShipStuff | AiState::BuildDefaultShipBlocks | AiState::DoShipStuff => {
            panic!("computer players cannot run ship routes (state {})", state.name())
        }
    }
}

fn after_link(
    turn: LinkTurn,
    building: fn(LinkProgress) -> AiState,
    vehicles: fn(FleetProgress) -> AiState,
    abandon: AiState,
) -> AiState {
    match turn {
        LinkTurn::Continue(link) => building(link),
        LinkTurn::Finished => vehicles(FleetProgress::default()),
        LinkTurn::TimedOut => abandon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::GameConfig;
    use crate::map::Map;

    fn world() -> World {
        let config = GameConfig {
            num_ai_companies: 1,
            num_human_companies: 0,
            ..GameConfig::default()
        };
        World::with_map(config, Map::flat(32, 32, 2))
    }

    #[test]
    fn idle_starts_the_housekeeping_sweep() {
        let mut w = world();
        let mut ai = PlayerAiState::new(1);
        assert_eq!(step(&mut w, 0, &mut ai, AiState::Idle), AiState::RemoveTrack { next_index: 0 });
    }

    #[test]
    fn an_empty_company_cycles_to_route_search() {
        let mut w = world();
        let mut seen = Vec::new();
        for _ in 0..40 {
            AiController.run_turn(&mut w, 0);
            seen.push(w.companies[0].ai.state.name());
            if seen.last() == Some(&"want-new-route") {
                break;
            }
        }
        assert!(seen.contains(&"remove-station"), "{seen:?}");
        assert!(seen.contains(&"vehicle-loop"), "{seen:?}");
        assert_eq!(seen.last(), Some(&"want-new-route"));
    }

    #[test]
    fn companies_for_sale_only_negotiate() {
        let mut w = world();
        w.companies[0].bankrupt_asked = 1;
        w.companies[0].ai.state = AiState::RemoveStation;
        AiController.run_turn(&mut w, 0);
        assert_eq!(w.companies[0].ai.state, AiState::RemoveStation);
        assert_eq!(w.companies[0].bankrupt_asked, treasury::ALL_ASKED);
    }

    #[test]
    fn passive_controller_changes_nothing() {
        let mut w = world();
        PassiveController.run_turn(&mut w, 0);
        assert_eq!(w.companies[0].ai.state, AiState::Idle);
    }

    #[test]
    #[should_panic(expected = "ship routes")]
    fn ship_states_abort() {
        let mut w = world();
        let mut ai = PlayerAiState::new(1);
        step(&mut w, 0, &mut ai, AiState::DoShipStuff);
    }
}
