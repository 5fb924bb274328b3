use rand::Rng;
use smallvec::SmallVec;
use tracing::{debug, info, trace};

use crate::ai::blocks::{self, BlockKind, BlockPart, BlockRole, Template};
use crate::ai::path;
use crate::ai::state::{AiState, BlockMatch, BlockProgress, BuildRecord, FleetProgress, PlayerAiState};
use crate::ai::terraform;
use crate::coords::TilePos;
use crate::game::command::{Command, CommandError, CommandFlags};
use crate::game::stations::Station;
use crate::game::world::World;
use crate::map::{StationPart, TileKind, TrackBits};
use crate::types::{Cargo, CompanyId, DiagDir, Money, StationId, Transport};

const ATTEMPTS_PER_TURN: usize = 8;
const TERRAFORMS_PER_TURN: usize = 8;
const FLIP_TERRAFORM_AFTER: u16 = 1000;
const MIN_ACCEPTANCE: u16 = 8;
const MIN_MAIL_ACCEPTANCE: u16 = 16;

const EXEC: CommandFlags = CommandFlags::EXEC.union(CommandFlags::NO_TOWN_RATING);
const QUERY: CommandFlags = EXEC.without(CommandFlags::EXEC);

/// Prices a template at `origin`, or builds it when `flags` executes. A
/// failed build leaves nothing of the block behind.
pub fn apply_template(
    world: &mut World,
    company: CompanyId,
    template: &Template,
    origin: TilePos,
    flags: CommandFlags,
) -> Result<Money, CommandError> {
    if flags.is_exec() {
        build_template(world, company, template, origin)
    } else {
        price_template(world, company, template, origin)
    }
}

fn price_template(
    world: &mut World,
    company: CompanyId,
    template: &Template,
    origin: TilePos,
) -> Result<Money, CommandError> {
    let mut total = 0;
    for part in &template.parts {
        let commands = part.commands(origin);
        let Some((first, rest)) = commands.split_first() else {
            continue;
        };
        total += world.execute(company, *first, QUERY)?.cost;
        if rest.is_empty() {
            continue;
        }
        if let BlockPart::Rail { offset, tracks } = *part {
            rail_tracks_combine(world, origin.offset(offset.x, offset.y), tracks)?;
        }
        // Later tracks share the tile the first one already paid to clear.
        for command in rest {
            world.execute(company, *command, QUERY)?;
            total += world.prices.build_rail;
        }
    }
    Ok(total)
}

/// Whether every track of a part can join the tile's rail one after another,
/// as the exec path lays them.
fn rail_tracks_combine(world: &World, tile: TilePos, tracks: TrackBits) -> Result<(), CommandError> {
    let mut laid = match world.map.kind(tile) {
        TileKind::Rail { tracks, .. } => tracks,
        _ => TrackBits::EMPTY,
    };
    for track in tracks.iter() {
        if laid.contains(track) {
            return Err(CommandError::AlreadyBuilt(tile));
        }
        if !laid.accepts(track) {
            return Err(CommandError::Occupied(tile));
        }
        laid = laid.with(track);
    }
    Ok(())
}

fn build_template(
    world: &mut World,
    company: CompanyId,
    template: &Template,
    origin: TilePos,
) -> Result<Money, CommandError> {
    let mut total = 0;
    let mut built: SmallVec<[&BlockPart; 8]> = SmallVec::new();
    for part in &template.parts {
        for command in part.commands(origin) {
            match world.execute(company, command, EXEC) {
                Ok(outcome) => total += outcome.cost,
                Err(err) => {
                    built.push(part);
                    roll_back(world, company, &built, origin);
                    return Err(err);
                }
            }
        }
        built.push(part);
    }
    Ok(total)
}

fn roll_back(world: &mut World, company: CompanyId, parts: &[&BlockPart], origin: TilePos) {
    for part in parts.iter().rev() {
        for tile in part.tiles() {
            let tile = origin.offset(tile.x, tile.y);
            if world.map.kind(tile).owner() == Some(company) {
                if let Err(err) = world.execute(company, Command::ClearTile { tile }, EXEC) {
                    trace!(company, %tile, %err, "rollback left a tile");
                }
            }
        }
    }
}

/// Whether the block's catchment has the cargo the site is there for.
pub fn resources_ok(world: &World, record: &BuildRecord, template: &Template, origin: TilePos) -> bool {
    if record.role == BlockRole::Waypoint {
        return true;
    }
    let Some(rect) = template.station_rect(origin) else {
        return false;
    };
    let rect = rect.expand(Station::catchment_radius(record.transport));
    if record.produces {
        world.production_around(rect).get(record.cargo) > 0
    } else {
        let floor = if record.cargo == Cargo::Mail {
            MIN_MAIL_ACCEPTANCE
        } else {
            MIN_ACCEPTANCE
        };
        world.acceptance_around(rect).get(record.cargo) >= floor
    }
}

fn station_at(world: &World, template: &Template, origin: TilePos) -> Option<StationId> {
    let rect = template.station_rect(origin)?;
    match world.map.kind(rect.min) {
        TileKind::Station { station, .. } => Some(station),
        _ => None,
    }
}

enum Attempt {
    Matched,
    NoFit,
    /// A block fits but there is not enough cash for it yet.
    Unaffordable,
}

fn try_record(world: &mut World, company: CompanyId, ai: &mut PlayerAiState, index: usize) -> Attempt {
    let bounds = world.map.bounds();
    let record = &mut ai.records[index];
    let Some(kind) = BlockKind::for_record(record.transport, record.role) else {
        return Attempt::NoFit;
    };
    record.use_tile = record.anchor.jitter(record.radius as u32, bounds, &mut ai.rng);
    let record = record.clone();
    let origin = record.use_tile;

    let templates = blocks::candidates(
        kind,
        record.wagons,
        record.truck,
        record.direction,
        record.any_direction,
    );
    for template in templates {
        let Ok(cost) = apply_template(world, company, template, origin, QUERY) else {
            continue;
        };
        if !resources_ok(world, &record, template, origin) {
            continue;
        }
        if cost > world.money(company) {
            return Attempt::Unaffordable;
        }
        if let Err(err) = apply_template(world, company, template, origin, EXEC) {
            trace!(company, tile = %origin, %err, "block failed to build");
            continue;
        }
        info!(company, tile = %origin, template = template.id.0, ?kind, cost, "block built");
        let rec = &mut ai.records[index];
        rec.matched = Some(BlockMatch::Template {
            id: template.id,
            origin,
        });
        rec.station = station_at(world, template, origin);
        rec.depot = template.depot_tile(origin);
        return Attempt::Matched;
    }
    Attempt::NoFit
}

pub fn build_default_blocks(
    world: &mut World,
    company: CompanyId,
    ai: &mut PlayerAiState,
    mut progress: BlockProgress,
    transport: Transport,
) -> AiState {
    ai.timeout_counter = ai.timeout_counter.saturating_add(1);
    if ai.timeout_counter >= path::ROUTE_TIMEOUT {
        info!(company, %transport, "gave up placing blocks");
        return delete_state(transport);
    }

    let mut matched_any = false;
    for _ in 0..ATTEMPTS_PER_TURN {
        for index in 0..ai.records.len() {
            if ai.records[index].is_matched() {
                continue;
            }
            match try_record(world, company, ai, index) {
                Attempt::Matched => matched_any = true,
                Attempt::NoFit => {}
                Attempt::Unaffordable => {
                    debug!(company, "block affordable later");
                    return blocks_state(transport, progress);
                }
            }
        }
    }

    for record in ai.records.iter_mut().filter(|r| !r.is_matched() && r.direction.is_some()) {
        if !record.any_direction {
            trace!(company, tile = %record.anchor, "preferred facing given up");
            record.any_direction = true;
        }
    }

    let Some(stuck) = ai.records.iter().find(|r| !r.is_matched()).map(|r| r.use_tile) else {
        return after_blocks(company, ai, transport);
    };
    if matched_any {
        return blocks_state(transport, progress);
    }

    progress.fail_counter += 1;
    if progress.fail_counter >= FLIP_TERRAFORM_AFTER {
        progress.fail_counter = 0;
        progress.terraform_mode = -progress.terraform_mode;
    } else if world.money(company) > 0 {
        for _ in 0..TERRAFORMS_PER_TURN {
            let dir = DiagDir::from_index(ai.rng.gen_range(0..4));
            terraform::nudge(world, company, stuck, dir, 3, progress.terraform_mode, &mut ai.rng);
        }
    }
    blocks_state(transport, progress)
}

fn blocks_state(transport: Transport, progress: BlockProgress) -> AiState {
    match transport {
        Transport::Rail => AiState::BuildDefaultRailBlocks(progress),
        Transport::Road => AiState::BuildDefaultRoadBlocks(progress),
        Transport::Air => AiState::BuildDefaultAirportBlocks(progress),
        Transport::Water => AiState::BuildDefaultShipBlocks,
    }
}

fn delete_state(transport: Transport) -> AiState {
    match transport {
        Transport::Rail => AiState::DeleteRailBlocks,
        Transport::Road => AiState::DeleteRoadBlocks,
        Transport::Air => AiState::DeleteAirportBlocks,
        Transport::Water => unreachable!("ship routes are never planned"),
    }
}

/// Every site stands; link them up or go straight to the fleet.
fn after_blocks(company: CompanyId, ai: &mut PlayerAiState, transport: Transport) -> AiState {
    debug!(company, %transport, records = ai.records.len(), "all blocks placed");
    let fleet = FleetProgress::default();
    match transport {
        Transport::Rail => match path::start_link(&ai.records, 0) {
            Some(link) => AiState::BuildRail(link),
            None => AiState::BuildRailVehicles(fleet),
        },
        Transport::Road => match path::start_link(&ai.records, 0) {
            Some(link) => AiState::BuildRoad(link),
            None => AiState::BuildRoadVehicles(fleet),
        },
        Transport::Air => AiState::BuildAircraftVehicles(fleet),
        Transport::Water => unreachable!("ship routes are never planned"),
    }
}

/// Reuses airports of ours already close to a site before new ones are
/// placed.
pub fn airport_stuff(world: &World, company: CompanyId, ai: &mut PlayerAiState) -> AiState {
    for record in ai.records.iter_mut() {
        let found = world
            .stations_of(company)
            .filter(|s| s.transport == Transport::Air)
            .find(|s| {
                s.xy().max_distance(record.anchor) <= record.radius as u32
                    && matches!(
                        world.map.kind(s.xy()),
                        TileKind::Station {
                            part: StationPart::Airport,
                            ..
                        }
                    )
            });
        if let Some(station) = found {
            debug!(company, station = station.id, "reusing airport");
            record.matched = Some(BlockMatch::ExistingStation { station: station.id });
            record.station = Some(station.id);
            record.depot = Some(station.xy());
        }
    }
    AiState::BuildDefaultAirportBlocks(BlockProgress::new())
}

pub fn delete_blocks(world: &mut World, company: CompanyId, ai: &mut PlayerAiState) -> AiState {
    for record in &ai.records {
        let Some(BlockMatch::Template { id, origin }) = record.matched else {
            continue;
        };
        let Some(template) = blocks::template(id) else {
            continue;
        };
        for tile in template.tiles(origin) {
            if world.map.kind(tile).owner() == Some(company) {
                if let Err(err) = world.execute(company, Command::ClearTile { tile }, EXEC) {
                    debug!(company, %tile, %err, "block tile not removed");
                }
            }
        }
    }
    info!(company, "route abandoned");
    ai.reset_route();
    AiState::Idle
}
