use smallvec::SmallVec;
use tracing::{debug, info, trace, warn};

use crate::ai::state::{AiState, FleetProgress, PlayerAiState};
use crate::coords::TilePos;
use crate::game::command::{Command, CommandError, CommandFlags};
use crate::game::engines::{self, EngineId};
use crate::game::vehicles::{Order, OrderFlags, VehicleId};
use crate::game::world::World;
use crate::types::{Cargo, CompanyId, Money, VehicleClass};

/// Lowest engine reliability, out of 65535, the computer players accept.
pub const MIN_RELIABILITY: u16 = 35_389;
/// Turns a route waits for money to buy its vehicles before giving up.
pub const FLEET_PATIENCE: u16 = 1000;

const EXEC: CommandFlags = CommandFlags::EXEC;

/// Best engine of `class` buildable in `depot` for at most `ceiling`.
/// Locomotives are ranked by pulling power, everything else by price.
pub fn choose_engine(
    world: &mut World,
    company: CompanyId,
    class: VehicleClass,
    cargo: Option<Cargo>,
    depot: TilePos,
    ceiling: Money,
) -> Option<(EngineId, Money)> {
    let year = world.year();
    let mut best: Option<(EngineId, Money, u16)> = None;
    for info in engines::engines_of(class) {
        if info.is_wagon || !info.is_available(year) || info.reliability < MIN_RELIABILITY {
            continue;
        }
        if class != VehicleClass::Train && cargo.is_some_and(|c| !info.carries(c)) {
            continue;
        }
        let command = Command::BuildVehicle {
            depot,
            engine: info.id,
        };
        let Ok(quote) = world.execute(company, command, CommandFlags::QUERY) else {
            continue;
        };
        if quote.cost > ceiling {
            continue;
        }
        let better = match best {
            None => true,
            Some((_, cost, score)) if class == VehicleClass::Train => {
                info.score > score || (info.score == score && quote.cost < cost)
            }
            Some((_, cost, _)) => quote.cost < cost,
        };
        if better {
            best = Some((info.id, quote.cost, info.score));
        }
    }
    best.map(|(id, cost, _)| (id, cost))
}

/// Order list for one vehicle of the route. Consumes one full-load slot
/// when any stop asks to wait for a full load.
fn route_orders(world: &World, ai: &mut PlayerAiState) -> SmallVec<[Order; 4]> {
    let cargo = ai.fleet.cargo;
    let full_load = ai.fleet.num_want_fullload > 0;
    let mut orders = SmallVec::new();
    for (stop, record) in ai.fleet.order_blocks.iter().enumerate() {
        let Some(station) = ai.records.get(*record as usize).and_then(|r| r.station) else {
            continue;
        };
        if world.stations.get(station).is_none() {
            continue;
        }
        let mut flags = OrderFlags::NONE;
        if full_load && (cargo == Cargo::Passengers || stop == 0) {
            flags |= OrderFlags::FULL_LOAD;
        }
        if cargo != Cargo::Passengers && stop != 0 {
            flags |= OrderFlags::UNLOAD;
        }
        orders.push(Order { station, flags });
    }
    if full_load {
        ai.fleet.num_want_fullload -= 1;
    }
    orders
}

/// Gives `vehicle` its orders, starts it and sets its service interval. A
/// vehicle that would not start is reported back.
pub fn dispatch(
    world: &mut World,
    company: CompanyId,
    vehicle: VehicleId,
    orders: &[Order],
) -> Result<(), CommandError> {
    for (index, order) in orders.iter().enumerate() {
        let command = Command::InsertOrder {
            vehicle,
            index: index as u8,
            order: *order,
        };
        if let Err(err) = world.execute(company, command, EXEC) {
            warn!(company, %err, "order rejected");
        }
    }
    let days = world.config.ai.service_interval_value();
    world.execute(company, Command::StartStopVehicle { vehicle }, EXEC)?;
    if let Err(err) = world.execute(company, Command::ChangeServiceInterval { vehicle, days }, EXEC) {
        trace!(company, %err, "service interval unchanged");
    }
    Ok(())
}

fn sell_all(world: &mut World, company: CompanyId, vehicles: impl IntoIterator<Item = VehicleId>) {
    for vehicle in vehicles {
        if let Err(err) = world.execute(company, Command::SellVehicle { vehicle }, EXEC) {
            warn!(company, %err, "vehicle not sold");
        }
    }
}

fn source_depot(ai: &PlayerAiState) -> Option<TilePos> {
    let first = *ai.fleet.order_blocks.first()?;
    ai.records.get(first as usize)?.depot
}

fn route_done(company: CompanyId, ai: &mut PlayerAiState) -> AiState {
    info!(company, category = ?ai.category, "route in service");
    ai.reset_route();
    AiState::Idle
}

/// Counts a turn without a new vehicle. Past the patience limit the route is
/// given up and whatever was bought for it so far is sold.
fn wait_for_money(
    world: &mut World,
    company: CompanyId,
    ai: &mut PlayerAiState,
    mut progress: FleetProgress,
    state: fn(FleetProgress) -> AiState,
) -> AiState {
    progress.waited += 1;
    if progress.waited < FLEET_PATIENCE {
        return state(progress);
    }
    warn!(company, wagons = ai.fleet.wagon_list.len(), "no money for vehicles, abandoning route");
    let wagons = std::mem::take(&mut ai.fleet.wagon_list);
    sell_all(world, company, wagons);
    ai.reset_route();
    AiState::Idle
}

/// One turn of equipping a rail route: a wagon per turn, then the engine
/// that pulls them.
pub fn build_rail_vehicles(
    world: &mut World,
    company: CompanyId,
    ai: &mut PlayerAiState,
    progress: FleetProgress,
) -> AiState {
    if ai.fleet.vehicles_to_build == 0 {
        return route_done(company, ai);
    }
    let Some(depot) = source_depot(ai) else {
        return route_done(company, ai);
    };

    let wanted = (2 * ai.fleet.num_wagons as usize).saturating_sub(1);
    if ai.fleet.wagon_list.len() < wanted {
        let Some(wagon) = engines::wagon_for(ai.fleet.cargo) else {
            return route_done(company, ai);
        };
        let command = Command::BuildVehicle {
            depot,
            engine: wagon.id,
        };
        return match world.execute(company, command, EXEC) {
            Ok(outcome) => {
                ai.fleet.wagon_list.extend(outcome.new_vehicle);
                AiState::BuildRailVehicles(FleetProgress::default())
            }
            Err(_) => wait_for_money(world, company, ai, progress, AiState::BuildRailVehicles),
        };
    }

    let money = world.money(company);
    let Some((engine, _)) = choose_engine(world, company, VehicleClass::Train, None, depot, money) else {
        return wait_for_money(world, company, ai, progress, AiState::BuildRailVehicles);
    };
    let Ok(outcome) = world.execute(company, Command::BuildVehicle { depot, engine }, EXEC) else {
        return wait_for_money(world, company, ai, progress, AiState::BuildRailVehicles);
    };
    let Some(head) = outcome.new_vehicle else {
        return route_done(company, ai);
    };
    let wagons = std::mem::take(&mut ai.fleet.wagon_list);
    for wagon in &wagons {
        if let Err(err) = world.execute(company, Command::AttachWagon { wagon: *wagon, head }, EXEC) {
            warn!(company, %err, "wagon left behind");
        }
    }
    let orders = route_orders(world, ai);
    if let Err(err) = dispatch(world, company, head, &orders) {
        warn!(company, %err, "train would not start, selling it");
        sell_all(world, company, std::iter::once(head).chain(wagons));
        return wait_for_money(world, company, ai, progress, AiState::BuildRailVehicles);
    }
    ai.fleet.vehicles_to_build -= 1;
    info!(company, engine = engine.0, stops = orders.len(), "train built");
    AiState::BuildRailVehicles(FleetProgress::default())
}

fn build_single_vehicles(
    world: &mut World,
    company: CompanyId,
    ai: &mut PlayerAiState,
    progress: FleetProgress,
    class: VehicleClass,
    state: fn(FleetProgress) -> AiState,
) -> AiState {
    if ai.fleet.vehicles_to_build == 0 {
        return route_done(company, ai);
    }
    let Some(depot) = source_depot(ai) else {
        return route_done(company, ai);
    };
    let money = world.money(company);
    let cargo = Some(ai.fleet.cargo);
    let Some((engine, cost)) = choose_engine(world, company, class, cargo, depot, money) else {
        debug!(company, %class, "no affordable vehicle yet");
        return wait_for_money(world, company, ai, progress, state);
    };
    let Ok(outcome) = world.execute(company, Command::BuildVehicle { depot, engine }, EXEC) else {
        return wait_for_money(world, company, ai, progress, state);
    };
    let Some(vehicle) = outcome.new_vehicle else {
        return route_done(company, ai);
    };
    let orders = route_orders(world, ai);
    if let Err(err) = dispatch(world, company, vehicle, &orders) {
        warn!(company, %class, %err, "vehicle would not start, selling it");
        sell_all(world, company, [vehicle]);
        return wait_for_money(world, company, ai, progress, state);
    }
    ai.fleet.vehicles_to_build -= 1;
    info!(company, %class, engine = engine.0, cost, "vehicle built");
    state(FleetProgress::default())
}

pub fn build_road_vehicles(
    world: &mut World,
    company: CompanyId,
    ai: &mut PlayerAiState,
    progress: FleetProgress,
) -> AiState {
    build_single_vehicles(world, company, ai, progress, VehicleClass::Road, AiState::BuildRoadVehicles)
}

pub fn build_aircraft_vehicles(
    world: &mut World,
    company: CompanyId,
    ai: &mut PlayerAiState,
    progress: FleetProgress,
) -> AiState {
    build_single_vehicles(
        world,
        company,
        ai,
        progress,
        VehicleClass::Aircraft,
        AiState::BuildAircraftVehicles,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::blocks::BlockRole;
    use crate::ai::state::BuildRecord;
    use crate::game::config::GameConfig;
    use crate::map::Map;
    use crate::types::{Axis, DiagDir, Transport};

    /// Two coal stations, a depot at the first, and the fleet plan for one
    /// train of `wagons` length.
    fn rail_route(wagons: u8) -> (World, PlayerAiState) {
        let mut world = World::with_map(GameConfig::default(), Map::flat(64, 64, 2));
        let mut ai = PlayerAiState::new(9);
        for (i, x) in [10, 40].into_iter().enumerate() {
            let tile = TilePos::new(x, 20);
            world
                .execute(
                    0,
                    Command::BuildRailStation {
                        tile,
                        axis: Axis::X,
                        length: wagons,
                    },
                    EXEC,
                )
                .expect("station");
            let role = if i == 0 {
                BlockRole::Source
            } else {
                BlockRole::Destination
            };
            let mut record = BuildRecord::new(tile, 0, role, Transport::Rail, Cargo::Coal);
            record.station = world.stations_of(0).last().map(|s| s.id);
            ai.records.push(record);
        }
        let depot = TilePos::new(10, 21);
        world
            .execute(
                0,
                Command::BuildRailDepot {
                    tile: depot,
                    dir: DiagDir::NorthWest,
                },
                EXEC,
            )
            .expect("depot");
        ai.records[0].depot = Some(depot);
        ai.fleet.cargo = Cargo::Coal;
        ai.fleet.num_wagons = wagons;
        ai.fleet.vehicles_to_build = 1;
        ai.fleet.num_want_fullload = 1;
        ai.fleet.order_blocks = smallvec::smallvec![0, 1];
        (world, ai)
    }

    #[test]
    fn reliable_locomotives_only() {
        let (mut world, ai) = rail_route(2);
        let depot = ai.records[0].depot.expect("depot");
        let (engine, _) =
            choose_engine(&mut world, 0, VehicleClass::Train, None, depot, Money::MAX).expect("an engine");
        let info = engine.lookup().expect("info");
        assert!(info.reliability >= MIN_RELIABILITY);
        assert!(!info.is_wagon);
    }

    #[test]
    fn train_is_assembled_wagon_by_wagon() {
        let (mut world, mut ai) = rail_route(2);
        let mut state = AiState::BuildRailVehicles(FleetProgress::default());
        for _ in 0..3 {
            let AiState::BuildRailVehicles(progress) = state else {
                panic!("left the fleet state early: {state:?}");
            };
            state = build_rail_vehicles(&mut world, 0, &mut ai, progress);
        }
        assert_eq!(ai.fleet.wagon_list.len(), 3);
        let AiState::BuildRailVehicles(progress) = state else {
            panic!("expected to continue");
        };
        state = build_rail_vehicles(&mut world, 0, &mut ai, progress);
        let head = world
            .vehicles
            .iter()
            .find(|v| v.owner == 0 && v.wagons.len() == 3)
            .expect("assembled train");
        assert_eq!(head.orders.len(), 2);
        assert!(head.orders[0].flags.contains(OrderFlags::FULL_LOAD));
        assert!(head.orders[1].flags.contains(OrderFlags::UNLOAD));
        assert!(!head.is_stopped_in_depot());
        let AiState::BuildRailVehicles(progress) = state else {
            panic!("expected the finishing turn");
        };
        assert_eq!(build_rail_vehicles(&mut world, 0, &mut ai, progress), AiState::Idle);
    }

    #[test]
    fn broke_company_waits_before_giving_up() {
        let (mut world, mut ai) = rail_route(2);
        if let Some(c) = world.company_mut(0) {
            c.money = 0;
        }
        let mut state = AiState::BuildRailVehicles(FleetProgress::default());
        for _ in 0..FLEET_PATIENCE - 1 {
            let AiState::BuildRailVehicles(progress) = state else {
                panic!("gave up too early");
            };
            state = build_rail_vehicles(&mut world, 0, &mut ai, progress);
        }
        assert!(matches!(state, AiState::BuildRailVehicles(FleetProgress { waited }) if waited == FLEET_PATIENCE - 1));
        let AiState::BuildRailVehicles(progress) = state else {
            unreachable!()
        };
        assert_eq!(build_rail_vehicles(&mut world, 0, &mut ai, progress), AiState::Idle);
        assert!(ai.records.is_empty());
    }

    #[test]
    fn dispatch_reports_a_vehicle_that_will_not_start() {
        let (mut world, ai) = rail_route(2);
        let depot = ai.records[0].depot.expect("depot");
        let wagon = engines::wagon_for(Cargo::Coal).expect("coal wagon");
        let outcome = world
            .execute(0, Command::BuildVehicle { depot, engine: wagon.id }, EXEC)
            .expect("wagon");
        let wagon = outcome.new_vehicle.expect("new wagon");
        let result = dispatch(&mut world, 0, wagon, &[]);
        assert_eq!(result, Err(CommandError::IncompatibleVehicle));
    }
}
