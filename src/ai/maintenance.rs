use itertools::Itertools;
use tracing::{debug, info, trace, warn};

use crate::ai::fleet::{self, MIN_RELIABILITY};
use crate::ai::rail_path;
use crate::ai::road_path;
use crate::ai::state::{AiState, PlayerAiState, Verdict};
use crate::coords::TilePos;
use crate::game::command::{Command, CommandFlags};
use crate::game::vehicles::{Vehicle, VehicleId};
use crate::game::world::World;
use crate::map::TileKind;
use crate::types::{CompanyId, Track, Transport};

/// Vehicles younger than this are never judged unprofitable.
pub const MIN_AGE_FOR_PROFIT: u32 = 730;
pub const REPLACE_PATIENCE: u16 = 1387;
pub const SELL_PATIENCE: u16 = 832;

const EXEC: CommandFlags = CommandFlags::EXEC;

/// Why, if at all, a vehicle should go.
pub fn judge(world: &World, vehicle: &Vehicle) -> Verdict {
    let Some(engine) = vehicle.engine.lookup() else {
        return Verdict::default();
    };
    let floor = 5 * world.prices.station_value;
    Verdict {
        too_old: vehicle.age_days >= vehicle.max_age_days,
        unreliable: engine.reliability < MIN_RELIABILITY,
        unprofitable: vehicle.age_days >= MIN_AGE_FOR_PROFIT
            && vehicle.profit_this_year < floor
            && vehicle.profit_last_year < floor,
    }
}

fn is_engine(vehicle: &Vehicle) -> bool {
    vehicle.is_primary() && vehicle.engine.lookup().is_some_and(|e| !e.is_wagon)
}

/// Collects this company's problem vehicles, most urgent first.
pub fn restart_vehicle_scan(world: &World, company: CompanyId, ai: &mut PlayerAiState) -> AiState {
    ai.scan_queue = world
        .vehicles
        .iter()
        .filter(|v| v.owner == company && is_engine(v))
        .map(|v| (v.id, judge(world, v)))
        .filter(|(_, verdict)| verdict.any())
        .sorted_by(|(a, va), (b, vb)| vb.urgency().cmp(&va.urgency()).then(a.index.cmp(&b.index)))
        .collect();
    if !ai.scan_queue.is_empty() {
        debug!(company, queued = ai.scan_queue.len(), "vehicles need attention");
    }
    AiState::VehicleLoop
}

pub fn vehicle_loop(world: &World, ai: &mut PlayerAiState) -> AiState {
    loop {
        let Some((id, verdict)) = ai.scan_queue.pop_front() else {
            ai.cur_veh = None;
            return AiState::WantNewRoute { rounds: 0 };
        };
        if world.vehicles.get(id).is_none() {
            continue;
        }
        ai.cur_veh = Some(id);
        return if verdict.unprofitable {
            AiState::SellVehicle { waited: 0 }
        } else {
            AiState::CheckReplaceVehicle
        };
    }
}

fn current(world: &World, ai: &PlayerAiState) -> Option<(VehicleId, Vehicle)> {
    let id = ai.cur_veh?;
    world.vehicles.get(id).map(|v| (id, v.clone()))
}

fn replacement_for(world: &mut World, company: CompanyId, old: &Vehicle) -> Option<crate::game::engines::EngineId> {
    let cargo = old.engine.lookup().and_then(|e| e.cargo);
    let ceiling = world.money(company) + old.value;
    fleet::choose_engine(world, company, old.class, cargo, old.depot, ceiling).map(|(engine, _)| engine)
}

/// Sends the vehicle home if something better can be bought for it.
pub fn check_replace_vehicle(world: &mut World, company: CompanyId, ai: &mut PlayerAiState) -> AiState {
    let Some((id, old)) = current(world, ai) else {
        return AiState::VehicleLoop;
    };
    if replacement_for(world, company, &old).is_none() {
        return AiState::VehicleLoop;
    }
    let command = Command::SendToDepot {
        vehicle: id,
        cancel: false,
    };
    match world.execute(company, command, EXEC) {
        Ok(_) => AiState::DoReplaceVehicle { waited: 0 },
        Err(_) => AiState::VehicleLoop,
    }
}

/// Swaps the engine once it is parked, keeping wagons and orders.
pub fn do_replace_vehicle(world: &mut World, company: CompanyId, ai: &mut PlayerAiState, waited: u16) -> AiState {
    let Some((id, old)) = current(world, ai) else {
        return AiState::VehicleLoop;
    };
    if !old.is_stopped_in_depot() {
        if waited + 1 >= REPLACE_PATIENCE {
            if let Err(err) = world.execute(company, Command::SendToDepot { vehicle: id, cancel: true }, EXEC) {
                trace!(company, vehicle = ?id, %err, "depot order not cancelled");
            }
            return AiState::VehicleLoop;
        }
        return AiState::DoReplaceVehicle { waited: waited + 1 };
    }

    let Some(engine) = replacement_for(world, company, &old) else {
        if let Err(err) = world.execute(company, Command::StartStopVehicle { vehicle: id }, EXEC) {
            warn!(company, vehicle = ?id, %err, "parked vehicle would not restart");
        }
        return AiState::VehicleLoop;
    };
    let orders = old.orders.clone();
    if world.execute(company, Command::SellVehicle { vehicle: id }, EXEC).is_err() {
        return AiState::VehicleLoop;
    }
    let built = world
        .execute(
            company,
            Command::BuildVehicle {
                depot: old.depot,
                engine,
            },
            EXEC,
        )
        .ok()
        .and_then(|o| o.new_vehicle);
    let Some(new) = built else {
        // The wagons stay in the depot; the track sweep never touches them.
        return AiState::VehicleLoop;
    };
    for wagon in &old.wagons {
        if let Err(err) = world.execute(company, Command::AttachWagon { wagon: *wagon, head: new }, EXEC) {
            warn!(company, %err, "wagon left behind");
        }
    }
    if let Err(err) = fleet::dispatch(world, company, new, &orders) {
        warn!(company, vehicle = ?new, %err, "replacement would not start");
    }
    info!(company, old = old.engine.0, new = engine.0, "vehicle replaced");
    ai.cur_veh = Some(new);
    AiState::VehicleLoop
}

/// Parks and sells the vehicle together with its wagons.
pub fn sell_vehicle(world: &mut World, company: CompanyId, ai: &mut PlayerAiState, waited: u16) -> AiState {
    let Some((id, old)) = current(world, ai) else {
        return AiState::VehicleLoop;
    };
    if !old.is_stopped_in_depot() {
        if waited == 0 {
            if let Err(err) = world.execute(company, Command::SendToDepot { vehicle: id, cancel: false }, EXEC) {
                trace!(company, vehicle = ?id, %err, "not sent to depot");
            }
        }
        if waited + 1 >= SELL_PATIENCE {
            return AiState::VehicleLoop;
        }
        return AiState::SellVehicle { waited: waited + 1 };
    }
    if world.execute(company, Command::SellVehicle { vehicle: id }, EXEC).is_ok() {
        for wagon in &old.wagons {
            if let Err(err) = world.execute(company, Command::SellVehicle { vehicle: *wagon }, EXEC) {
                warn!(company, %err, "wagon not sold");
            }
        }
        info!(company, engine = old.engine.0, "unprofitable vehicle sold");
    }
    ai.cur_veh = None;
    AiState::VehicleLoop
}

fn depot_connected(world: &World, tile: TilePos, transport: Transport, dir: crate::types::DiagDir) -> bool {
    let next = tile.step(dir);
    if !world.map.is_valid(next) {
        return false;
    }
    let kind = world.map.kind(next);
    match transport {
        Transport::Rail => kind.rail_opening(dir.reverse()),
        _ => kind.road_opening(dir.reverse()),
    }
}

/// Sweeps a slice of the map for loose track, road stubs and depots that
/// no longer lead anywhere.
pub fn remove_track(world: &mut World, company: CompanyId, next_index: u32) -> AiState {
    let total = world.map.num_tiles() as u32;
    let end = (next_index + 4 * world.map.width() as u32).min(total);
    for index in next_index..end {
        let tile = world.map.tile_at_index(index as usize);
        if let Some(track) = rail_path::dead_end_track(world, company, tile) {
            return AiState::RemoveSingleRailTile {
                tile,
                track,
                resume_index: index + 1,
            };
        }
        if let Some(bits) = road_path::dead_end_bits(world, company, tile) {
            if let Err(err) = world.execute(company, Command::RemoveRoad { tile, bits }, EXEC) {
                trace!(company, %tile, %err, "road stub kept");
            }
            continue;
        }
        if let TileKind::Depot {
            owner,
            transport,
            dir,
        } = world.map.kind(tile)
        {
            if owner == company && !depot_connected(world, tile, transport, dir) {
                if world.execute(company, Command::ClearTile { tile }, EXEC).is_ok() {
                    debug!(company, %tile, "unconnected depot removed");
                }
            }
        }
    }
    if end >= total {
        AiState::RemoveStation
    } else {
        AiState::RemoveTrack { next_index: end }
    }
}

/// Lifts one loose piece and follows the line it belonged to.
pub fn remove_single_rail_tile(
    world: &mut World,
    company: CompanyId,
    tile: TilePos,
    track: Track,
    resume_index: u32,
) -> AiState {
    if world
        .execute(company, Command::RemoveRail { tile, track }, EXEC)
        .is_err()
    {
        return AiState::RemoveTrack {
            next_index: resume_index,
        };
    }
    match rail_path::follow_dead_end(world, company, tile, track) {
        Some((tile, track)) => AiState::RemoveSingleRailTile {
            tile,
            track,
            resume_index,
        },
        None => AiState::RemoveTrack {
            next_index: resume_index,
        },
    }
}

/// Clears one own station no vehicle visits, or moves on when none is left.
pub fn remove_station(world: &mut World, company: CompanyId) -> AiState {
    let unused = world
        .stations_of(company)
        .find(|s| {
            !world
                .vehicles
                .iter()
                .any(|v| v.owner == company && v.orders.iter().any(|o| o.station == s.id))
        })
        .map(|s| (s.id, s.tiles.clone()));
    let Some((station, tiles)) = unused else {
        return AiState::RestartVehicleScan;
    };
    for tile in tiles {
        if matches!(world.map.kind(tile), TileKind::Station { station: s, .. } if s == station) {
            if let Err(err) = world.execute(company, Command::ClearTile { tile }, EXEC) {
                debug!(company, %tile, %err, "station tile kept");
            }
        }
    }
    info!(company, station, "unused station removed");
    AiState::RemoveStation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::GameConfig;
    use crate::game::engines::ENGINES;
    use crate::map::Map;
    use crate::types::{Axis, DiagDir, VehicleClass};

    fn world() -> World {
        World::with_map(GameConfig::default(), Map::flat(40, 40, 2))
    }

    fn road_depot(world: &mut World, tile: TilePos) {
        world
            .execute(
                0,
                Command::BuildRoadDepot {
                    tile,
                    dir: DiagDir::NorthWest,
                },
                EXEC,
            )
            .expect("depot");
    }

    fn bus(world: &mut World, depot: TilePos) -> VehicleId {
        let engine = ENGINES
            .iter()
            .find(|e| e.class == VehicleClass::Road && e.reliability >= MIN_RELIABILITY)
            .map(|e| e.id)
            .expect("bus");
        world
            .execute(0, Command::BuildVehicle { depot, engine }, EXEC)
            .expect("build")
            .new_vehicle
            .expect("id")
    }

    #[test]
    fn old_and_unreliable_goes_before_merely_old() {
        let mut w = world();
        let depot = TilePos::new(10, 10);
        road_depot(&mut w, depot);
        let merely_old = bus(&mut w, depot);
        let both = bus(&mut w, depot);
        let unreliable = ENGINES
            .iter()
            .find(|e| e.class == VehicleClass::Train && !e.is_wagon && e.reliability < MIN_RELIABILITY)
            .map(|e| e.id)
            .expect("an unreliable engine");
        for (id, engine) in [(merely_old, None), (both, Some(unreliable))] {
            let v = w.vehicles.get_mut(id).expect("vehicle");
            v.age_days = v.max_age_days;
            v.profit_last_year = 1_000_000;
            if let Some(engine) = engine {
                v.engine = engine;
            }
        }
        let mut ai = PlayerAiState::new(2);
        assert_eq!(restart_vehicle_scan(&w, 0, &mut ai), AiState::VehicleLoop);
        let order: Vec<VehicleId> = ai.scan_queue.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![both, merely_old]);
        assert_eq!(vehicle_loop(&w, &mut ai), AiState::CheckReplaceVehicle);
        assert_eq!(ai.cur_veh, Some(both));
    }

    #[test]
    fn unprofitable_vehicles_are_sold_with_their_wagons() {
        let mut w = world();
        let depot = TilePos::new(10, 10);
        road_depot(&mut w, depot);
        let id = bus(&mut w, depot);
        if let Some(v) = w.vehicles.get_mut(id) {
            v.age_days = MIN_AGE_FOR_PROFIT;
        }
        let mut ai = PlayerAiState::new(2);
        restart_vehicle_scan(&w, 0, &mut ai);
        assert_eq!(vehicle_loop(&w, &mut ai), AiState::SellVehicle { waited: 0 });
        assert_eq!(sell_vehicle(&mut w, 0, &mut ai, 0), AiState::VehicleLoop);
        assert!(w.vehicles.get(id).is_none());
        assert_eq!(vehicle_loop(&w, &mut ai), AiState::WantNewRoute { rounds: 0 });
    }

    #[test]
    fn stale_handles_are_skipped() {
        let mut w = world();
        let depot = TilePos::new(10, 10);
        road_depot(&mut w, depot);
        let id = bus(&mut w, depot);
        let mut ai = PlayerAiState::new(2);
        ai.scan_queue.push_back((id, Verdict { too_old: true, ..Verdict::default() }));
        w.execute(0, Command::SellVehicle { vehicle: id }, EXEC).expect("sell");
        assert_eq!(vehicle_loop(&w, &mut ai), AiState::WantNewRoute { rounds: 0 });
    }

    #[test]
    fn sweep_lifts_a_loose_line_end_to_end() {
        let mut w = world();
        for x in 5..9 {
            w.execute(
                0,
                Command::BuildRail {
                    tile: TilePos::new(x, 5),
                    track: Track::X,
                },
                EXEC,
            )
            .expect("rail");
        }
        let mut state = AiState::RemoveTrack { next_index: 0 };
        for _ in 0..200 {
            state = match state {
                AiState::RemoveTrack { next_index } => remove_track(&mut w, 0, next_index),
                AiState::RemoveSingleRailTile {
                    tile,
                    track,
                    resume_index,
                } => remove_single_rail_tile(&mut w, 0, tile, track, resume_index),
                other => other,
            };
        }
        assert_eq!(state, AiState::RemoveStation);
        for x in 5..9 {
            assert_eq!(w.map.kind(TilePos::new(x, 5)), TileKind::Clear);
        }
    }

    #[test]
    fn stations_without_orders_are_removed() {
        let mut w = world();
        w.execute(
            0,
            Command::BuildRailStation {
                tile: TilePos::new(12, 12),
                axis: Axis::X,
                length: 2,
            },
            EXEC,
        )
        .expect("station");
        assert_eq!(remove_station(&mut w, 0), AiState::RemoveStation);
        assert_eq!(w.stations_of(0).count(), 0);
        assert_eq!(remove_station(&mut w, 0), AiState::RestartVehicleScan);
    }
}
