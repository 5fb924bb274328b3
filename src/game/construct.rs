use tracing::trace;

use crate::coords::{TilePos, TileRect};
use crate::game::command::{CommandError, CommandFlags, CommandOutcome};
use crate::game::world::World;
use crate::map::{Corner, RoadBits, Slope, StationPart, TileKind, TrackBits};
use crate::types::{Axis, CompanyId, DiagDir, Money, Track, Transport};

/// Maximum span (tiles between the ramps) and price factor per bridge type.
pub const BRIDGE_KINDS: [(u32, Money); 3] = [(4, 1), (8, 2), (12, 3)];
pub const MAX_TUNNEL_LENGTH: i32 = 20;

type Outcome = Result<Money, CommandError>;

impl World {
    fn check_valid(&self, tile: TilePos) -> Result<(), CommandError> {
        if self.map.is_valid(tile) {
            Ok(())
        } else {
            Err(CommandError::OffMap(tile))
        }
    }

    /// Cost of clearing the ground under a new structure.
    fn clearing_cost(&self, tile: TilePos) -> Outcome {
        match self.map.kind(tile) {
            TileKind::Clear => Ok(self.prices.clear_grass),
            TileKind::Trees => Ok(self.prices.clear_trees),
            TileKind::Water => Err(CommandError::Water(tile)),
            TileKind::House { .. } => Err(CommandError::TownBuilding(tile)),
            _ => Err(CommandError::Occupied(tile)),
        }
    }

    /// Felling trees upsets the local authority unless suppressed.
    fn note_clearing(&mut self, company: CompanyId, tile: TilePos, flags: CommandFlags) {
        if flags.contains(CommandFlags::NO_TOWN_RATING) || self.map.kind(tile) != TileKind::Trees {
            return;
        }
        if let Some(town) = self.nearest_town(tile, 20) {
            self.towns[town].change_rating(company, -35);
        }
    }

    fn check_flat(&self, tile: TilePos) -> Result<(), CommandError> {
        if self.map.slope(tile) == Slope::Flat {
            Ok(())
        } else {
            Err(CommandError::BadSlope(tile))
        }
    }

    fn check_straight_on_slope(&self, tile: TilePos, axis: Option<Axis>) -> Result<(), CommandError> {
        match self.map.slope(tile) {
            Slope::Flat => Ok(()),
            Slope::Inclined(d) if Some(d.axis()) == axis => Ok(()),
            _ => Err(CommandError::BadSlope(tile)),
        }
    }

    pub(crate) fn build_rail(
        &mut self,
        company: CompanyId,
        tile: TilePos,
        track: Track,
        flags: CommandFlags,
    ) -> Outcome {
        self.check_valid(tile)?;
        let axis = match track {
            Track::X => Some(Axis::X),
            Track::Y => Some(Axis::Y),
            _ => None,
        };
        self.check_straight_on_slope(tile, axis)?;
        let (tracks, cost) = match self.map.kind(tile) {
            TileKind::Rail { owner, tracks } => {
                if owner != company {
                    return Err(CommandError::NotOwner(tile));
                }
                if tracks.contains(track) {
                    return Err(CommandError::AlreadyBuilt(tile));
                }
                if !tracks.accepts(track) {
                    return Err(CommandError::Occupied(tile));
                }
                (tracks, self.prices.build_rail)
            }
            _ => (
                TrackBits::EMPTY,
                self.clearing_cost(tile)? + self.prices.build_rail,
            ),
        };
        if flags.is_exec() {
            self.note_clearing(company, tile, flags);
            self.map.set_kind(
                tile,
                TileKind::Rail {
                    owner: company,
                    tracks: tracks.with(track),
                },
            );
        }
        Ok(cost)
    }

    pub(crate) fn remove_rail(
        &mut self,
        company: CompanyId,
        tile: TilePos,
        track: Track,
        flags: CommandFlags,
    ) -> Outcome {
        self.check_valid(tile)?;
        match self.map.kind(tile) {
            TileKind::Rail { owner, tracks } if tracks.contains(track) => {
                if owner != company {
                    return Err(CommandError::NotOwner(tile));
                }
                if flags.is_exec() {
                    let left = tracks.without(track);
                    let kind = if left.is_empty() {
                        TileKind::Clear
                    } else {
                        TileKind::Rail {
                            owner,
                            tracks: left,
                        }
                    };
                    self.map.set_kind(tile, kind);
                }
                Ok(self.prices.remove_rail)
            }
            _ => Err(CommandError::NothingToRemove(tile)),
        }
    }

    pub(crate) fn build_rail_station(
        &mut self,
        company: CompanyId,
        tile: TilePos,
        axis: Axis,
        length: u8,
        flags: CommandFlags,
    ) -> Outcome {
        let dir = match axis {
            Axis::X => DiagDir::SouthWest,
            Axis::Y => DiagDir::SouthEast,
        };
        let tiles: Vec<TilePos> = (0..length.max(1) as i32).map(|i| tile.step_n(dir, i)).collect();
        let level = self.map.tile_height(tile);
        let mut cost = 0;
        for t in &tiles {
            self.check_valid(*t)?;
            self.check_flat(*t)?;
            if self.map.tile_height(*t) != level {
                return Err(CommandError::BadSlope(*t));
            }
            cost += self.clearing_cost(*t)? + self.prices.build_station;
        }
        if flags.is_exec() {
            let town = self.nearest_town(tile, 20);
            let station = self.stations.add(company, Transport::Rail, tiles.clone(), town);
            for t in tiles {
                self.note_clearing(company, t, flags);
                self.map.set_kind(
                    t,
                    TileKind::Station {
                        owner: company,
                        station,
                        part: StationPart::Platform(axis),
                    },
                );
            }
        }
        Ok(cost)
    }

    pub(crate) fn build_depot(
        &mut self,
        company: CompanyId,
        tile: TilePos,
        dir: DiagDir,
        transport: Transport,
        flags: CommandFlags,
    ) -> Outcome {
        self.check_valid(tile)?;
        self.check_flat(tile)?;
        let cost = self.clearing_cost(tile)? + self.prices.build_depot;
        if flags.is_exec() {
            self.note_clearing(company, tile, flags);
            self.map.set_kind(
                tile,
                TileKind::Depot {
                    owner: company,
                    transport,
                    dir,
                },
            );
        }
        Ok(cost)
    }

    pub(crate) fn build_road(
        &mut self,
        company: CompanyId,
        tile: TilePos,
        bits: RoadBits,
        flags: CommandFlags,
    ) -> Outcome {
        self.check_valid(tile)?;
        if bits.is_empty() {
            return Err(CommandError::NothingToRemove(tile));
        }
        let (owner, existing, base) = match self.map.kind(tile) {
            TileKind::Road { owner, bits: existing } => {
                if owner.is_some_and(|o| o != company) {
                    return Err(CommandError::NotOwner(tile));
                }
                (owner, existing, 0)
            }
            _ => (Some(company), RoadBits::EMPTY, self.clearing_cost(tile)?),
        };
        let added = bits.minus(existing);
        if added.is_empty() {
            return Err(CommandError::AlreadyBuilt(tile));
        }
        self.check_straight_on_slope(tile, existing.union(bits).straight_axis())?;
        let cost = base + self.prices.build_road * added.edges().count() as Money;
        if flags.is_exec() {
            self.note_clearing(company, tile, flags);
            self.map.set_kind(
                tile,
                TileKind::Road {
                    owner,
                    bits: existing.union(bits),
                },
            );
        }
        Ok(cost)
    }

    pub(crate) fn remove_road(
        &mut self,
        company: CompanyId,
        tile: TilePos,
        bits: RoadBits,
        flags: CommandFlags,
    ) -> Outcome {
        self.check_valid(tile)?;
        match self.map.kind(tile) {
            TileKind::Road { owner, bits: existing } if existing.contains(bits) && !bits.is_empty() => {
                if owner != Some(company) {
                    return Err(CommandError::NotOwner(tile));
                }
                let left = existing.minus(bits);
                if !left.is_empty() {
                    self.check_straight_on_slope(tile, left.straight_axis())?;
                }
                if flags.is_exec() {
                    let kind = if left.is_empty() {
                        TileKind::Clear
                    } else {
                        TileKind::Road { owner, bits: left }
                    };
                    self.map.set_kind(tile, kind);
                }
                Ok(self.prices.remove_road * bits.edges().count() as Money)
            }
            _ => Err(CommandError::NothingToRemove(tile)),
        }
    }

    pub(crate) fn build_road_stop(
        &mut self,
        company: CompanyId,
        tile: TilePos,
        dir: DiagDir,
        truck: bool,
        flags: CommandFlags,
    ) -> Outcome {
        self.check_valid(tile)?;
        self.check_flat(tile)?;
        let cost = self.clearing_cost(tile)? + self.prices.build_station;
        if flags.is_exec() {
            let town = self.nearest_town(tile, 20);
            let station = self.stations.add(company, Transport::Road, vec![tile], town);
            let part = if truck {
                StationPart::TruckStop(dir)
            } else {
                StationPart::BusStop(dir)
            };
            self.note_clearing(company, tile, flags);
            self.map.set_kind(
                tile,
                TileKind::Station {
                    owner: company,
                    station,
                    part,
                },
            );
        }
        Ok(cost)
    }

    pub(crate) fn build_airport(&mut self, company: CompanyId, tile: TilePos, flags: CommandFlags) -> Outcome {
        let area = TileRect {
            min: tile,
            max: tile.offset(2, 2),
        };
        let level = self.map.tile_height(tile);
        let mut cost = 0;
        for t in area.tiles() {
            self.check_valid(t)?;
            self.check_flat(t)?;
            if self.map.tile_height(t) != level {
                return Err(CommandError::BadSlope(t));
            }
            cost += self.clearing_cost(t)? + self.prices.build_airport;
        }
        if let Some(town) = self.nearest_town(tile, 20) {
            if self.towns[town].rating(company) < -200 {
                return Err(CommandError::TownRefuses(tile));
            }
        }
        if flags.is_exec() {
            let tiles: Vec<TilePos> = area.tiles().collect();
            let town = self.nearest_town(tile, 20);
            let station = self.stations.add(company, Transport::Air, tiles.clone(), town);
            for t in tiles {
                self.note_clearing(company, t, flags);
                self.map.set_kind(
                    t,
                    TileKind::Station {
                        owner: company,
                        station,
                        part: StationPart::Airport,
                    },
                );
            }
        }
        Ok(cost)
    }

    /// Deck level of a bridge ramp at `tile` whose span leaves towards `dir`.
    pub fn bridge_ramp_level(&self, tile: TilePos, dir: DiagDir) -> Option<u8> {
        let h = self.map.tile_height(tile);
        match self.map.slope(tile) {
            Slope::Flat => Some(h),
            Slope::Inclined(d) if d == dir.reverse() => Some(h + 1),
            _ => None,
        }
    }

    pub(crate) fn build_bridge(
        &mut self,
        company: CompanyId,
        start: TilePos,
        end: TilePos,
        transport: Transport,
        kind: u8,
        flags: CommandFlags,
    ) -> Outcome {
        self.check_valid(start)?;
        self.check_valid(end)?;
        if start.x != end.x && start.y != end.y {
            return Err(CommandError::NoCrossingEnd(start));
        }
        let dir = start.direction_to(end);
        let length = start.manhattan(end);
        let (max_span, factor) = BRIDGE_KINDS
            .get(kind as usize)
            .copied()
            .ok_or(CommandError::NoCrossingEnd(start))?;
        if length < 2 || length - 1 > max_span {
            return Err(CommandError::NoCrossingEnd(start));
        }
        let deck = self
            .bridge_ramp_level(start, dir)
            .ok_or(CommandError::BadSlope(start))?;
        let end_deck = self
            .bridge_ramp_level(end, dir.reverse())
            .ok_or(CommandError::BadSlope(end))?;
        if deck != end_deck || deck == 0 {
            return Err(CommandError::BadSlope(end));
        }
        for i in 1..length as i32 {
            let t = start.step_n(dir, i);
            let passable = matches!(
                self.map.kind(t),
                TileKind::Clear
                    | TileKind::Trees
                    | TileKind::Water
                    | TileKind::Rail { .. }
                    | TileKind::Road { .. }
            );
            if !passable || self.map.max_corner_height(t) > deck {
                return Err(CommandError::Occupied(t));
            }
        }
        let cost = self.clearing_cost(start)?
            + self.clearing_cost(end)?
            + self.prices.build_bridge * factor * (length as Money + 1);
        if flags.is_exec() {
            trace!(company, %start, %end, "bridge built");
            self.note_clearing(company, start, flags);
            self.note_clearing(company, end, flags);
            self.map.set_kind(
                start,
                TileKind::BridgeRamp {
                    owner: company,
                    transport,
                    dir,
                    other_end: end,
                },
            );
            self.map.set_kind(
                end,
                TileKind::BridgeRamp {
                    owner: company,
                    transport,
                    dir: dir.reverse(),
                    other_end: start,
                },
            );
        }
        Ok(cost)
    }

    /// Far portal of a tunnel dug from `start` into the hill it faces.
    pub fn tunnel_end(&self, start: TilePos) -> Result<(DiagDir, TilePos), CommandError> {
        let Slope::Inclined(dir) = self.map.slope(start) else {
            return Err(CommandError::BadSlope(start));
        };
        let level = self.map.tile_height(start);
        for i in 1..=MAX_TUNNEL_LENGTH {
            let t = start.step_n(dir, i);
            if !self.map.is_valid(t) {
                break;
            }
            if self.map.slope(t) == Slope::Inclined(dir.reverse()) && self.map.tile_height(t) == level {
                if i < 2 {
                    break;
                }
                return Ok((dir, t));
            }
            if self.map.tile_height(t) <= level {
                break;
            }
        }
        Err(CommandError::NoCrossingEnd(start))
    }

    pub(crate) fn build_tunnel(
        &mut self,
        company: CompanyId,
        start: TilePos,
        transport: Transport,
        flags: CommandFlags,
    ) -> Result<CommandOutcome, CommandError> {
        self.check_valid(start)?;
        let (dir, end) = self.tunnel_end(start)?;
        let length = start.manhattan(end) as Money;
        let cost = self.clearing_cost(start)?
            + self.clearing_cost(end)?
            + self.prices.build_tunnel * (length + 1);
        if flags.is_exec() {
            self.note_clearing(company, start, flags);
            self.note_clearing(company, end, flags);
            self.map.set_kind(
                start,
                TileKind::Tunnel {
                    owner: company,
                    transport,
                    dir,
                    other_end: end,
                },
            );
            self.map.set_kind(
                end,
                TileKind::Tunnel {
                    owner: company,
                    transport,
                    dir: dir.reverse(),
                    other_end: start,
                },
            );
        }
        Ok(CommandOutcome {
            cost,
            new_vehicle: None,
            end_tile: Some(end),
        })
    }

    pub(crate) fn clear_tile(&mut self, company: CompanyId, tile: TilePos, flags: CommandFlags) -> Outcome {
        self.check_valid(tile)?;
        let kind = self.map.kind(tile);
        if let Some(owner) = kind.owner() {
            if owner != company {
                return Err(CommandError::NotOwner(tile));
            }
        }
        let exec = flags.is_exec();
        let cost = match kind {
            TileKind::Clear => self.prices.clear_grass,
            TileKind::Trees => self.prices.clear_trees,
            TileKind::Water => return Err(CommandError::Water(tile)),
            TileKind::House { .. } => return Err(CommandError::TownBuilding(tile)),
            TileKind::Industry { .. } => return Err(CommandError::Occupied(tile)),
            TileKind::Road { owner: None, .. } => return Err(CommandError::TownBuilding(tile)),
            TileKind::Rail { tracks, .. } => self.prices.remove_rail * tracks.count() as Money,
            TileKind::Road { bits, .. } => self.prices.remove_road * bits.edges().count() as Money,
            TileKind::Station { station, part, .. } => {
                let tiles: Vec<TilePos> = match part {
                    StationPart::Airport => self
                        .stations
                        .get(station)
                        .map(|s| s.tiles.clone())
                        .unwrap_or_else(|| vec![tile]),
                    _ => vec![tile],
                };
                if exec {
                    self.remove_station_tiles(station, &tiles);
                }
                return Ok(self.prices.clear_structure * tiles.len() as Money);
            }
            TileKind::Depot { .. } => {
                if self.vehicles.iter().any(|v| v.depot == tile) {
                    return Err(CommandError::Occupied(tile));
                }
                self.prices.clear_structure
            }
            TileKind::Tunnel { other_end, .. } | TileKind::BridgeRamp { other_end, .. } => {
                if exec {
                    self.map.set_kind(other_end, TileKind::Clear);
                }
                self.prices.clear_structure * 2
            }
            TileKind::Headquarters { owner } => {
                let hq = self.companies.get(owner).and_then(|c| c.hq);
                if exec {
                    if let Some(base) = hq {
                        let area = TileRect {
                            min: base,
                            max: base.offset(1, 1),
                        };
                        for t in area.tiles() {
                            self.map.set_kind(t, TileKind::Clear);
                        }
                    }
                    if let Some(c) = self.companies.get_mut(owner) {
                        c.hq = None;
                    }
                }
                self.prices.clear_structure * 4
            }
        };
        if exec {
            self.note_clearing(company, tile, flags);
            self.map.set_kind(tile, TileKind::Clear);
        }
        Ok(cost)
    }

    fn remove_station_tiles(&mut self, station: usize, tiles: &[TilePos]) {
        for t in tiles {
            self.map.set_kind(*t, TileKind::Clear);
        }
        let empty = match self.stations.get_mut(station) {
            Some(s) => {
                s.tiles.retain(|t| !tiles.contains(t));
                s.tiles.is_empty()
            }
            None => false,
        };
        if empty {
            self.stations.remove(station);
        }
    }

    pub(crate) fn terraform(
        &mut self,
        company: CompanyId,
        tile: TilePos,
        corner: Corner,
        raise: bool,
        flags: CommandFlags,
    ) -> Outcome {
        self.check_valid(tile)?;
        let changes = self
            .map
            .plan_corner_change(tile, corner, raise)
            .ok_or(CommandError::TerraformLimit(tile))?;
        let touched = self.map.tiles_touching(&changes);
        let mut cost = self.prices.terraform * changes.len() as Money;
        for t in &touched {
            if !self.map.is_valid(*t) {
                return Err(CommandError::OffMap(*t));
            }
            match self.map.kind(*t) {
                TileKind::Clear => {}
                TileKind::Trees => cost += self.prices.clear_trees,
                TileKind::Water if !flags.contains(CommandFlags::NO_WATER) => {}
                TileKind::Water => return Err(CommandError::Water(*t)),
                TileKind::House { .. } => return Err(CommandError::TownBuilding(*t)),
                _ => return Err(CommandError::Occupied(*t)),
            }
        }
        if flags.is_exec() {
            self.map.apply_vertex_changes(&changes);
            for t in touched {
                let kind = self.map.kind(t);
                if kind == TileKind::Trees {
                    self.note_clearing(company, t, flags);
                }
                let flooded = self.map.tile_height(t) == 0 && self.map.slope(t) == Slope::Flat;
                let next = match kind {
                    TileKind::Water if !flooded => TileKind::Clear,
                    TileKind::Water => TileKind::Water,
                    _ => TileKind::Clear,
                };
                self.map.set_kind(t, next);
            }
        }
        Ok(cost)
    }

    pub(crate) fn build_headquarters(&mut self, company: CompanyId, tile: TilePos, flags: CommandFlags) -> Outcome {
        if self.company(company).and_then(|c| c.hq).is_some() {
            return Err(CommandError::HeadquartersExists);
        }
        let area = TileRect {
            min: tile,
            max: tile.offset(1, 1),
        };
        let level = self.map.tile_height(tile);
        let mut cost = self.prices.build_headquarters;
        for t in area.tiles() {
            self.check_valid(t)?;
            self.check_flat(t)?;
            if self.map.tile_height(t) != level {
                return Err(CommandError::BadSlope(t));
            }
            cost += self.clearing_cost(t)?;
        }
        if flags.is_exec() {
            for t in area.tiles() {
                self.note_clearing(company, t, flags);
                self.map
                    .set_kind(t, TileKind::Headquarters { owner: company });
            }
            if let Some(c) = self.company_mut(company) {
                c.hq = Some(tile);
            }
        }
        Ok(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::command::Command;
    use crate::game::config::GameConfig;
    use crate::map::Map;

    fn world() -> World {
        World::with_map(GameConfig::default(), Map::flat(48, 48, 2))
    }


    #[test]
    fn bridge_spans_rail() {
        let mut world = world();
        let start = TilePos::new(10, 10);
        let end = TilePos::new(14, 10);
        world
            .execute(0, Command::BuildRail { tile: TilePos::new(12, 10), track: Track::Y }, CommandFlags::EXEC)
            .expect("rail");
        let outcome = world
            .execute(
                0,
                Command::BuildBridge {
                    start,
                    end,
                    transport: Transport::Rail,
                    kind: 0,
                },
                CommandFlags::EXEC,
            )
            .expect("bridge");
        assert!(outcome.cost > 0);
        assert!(matches!(
            world.map.kind(start),
            TileKind::BridgeRamp { dir: DiagDir::SouthWest, other_end, .. } if other_end == end
        ));
    }

    #[test]
    fn tunnel_finds_far_portal() {
        let mut world = world();
        // a ridge three tiles wide along y, with ramps on both sides
        for y in 6..16 {
            for x in 10..13 {
                world.map.set_tile_level(TilePos::new(x, y), 3);
            }
        }
        let start = TilePos::new(9, 10);
        assert_eq!(world.map.slope(start), Slope::Inclined(DiagDir::SouthWest));
        let outcome = world
            .execute(
                0,
                Command::BuildTunnel {
                    start,
                    transport: Transport::Road,
                },
                CommandFlags::QUERY,
            )
            .expect("tunnel");
        assert_eq!(outcome.end_tile, Some(TilePos::new(13, 10)));
    }

    #[test]
    fn houses_are_never_cleared() {
        let mut world = world();
        let tile = TilePos::new(8, 8);
        world.map.set_kind(tile, TileKind::House { town: 0 });
        assert_eq!(
            world.execute(0, Command::ClearTile { tile }, CommandFlags::EXEC),
            Err(CommandError::TownBuilding(tile))
        );
        assert!(
            world
                .execute(0, Command::BuildRail { tile, track: Track::X }, CommandFlags::QUERY)
                .is_err()
        );
    }

    #[test]
    fn removing_a_bridge_ramp_clears_both_ends() {
        let mut world = world();
        let start = TilePos::new(20, 20);
        let end = TilePos::new(20, 23);
        world
            .execute(
                0,
                Command::BuildBridge {
                    start,
                    end,
                    transport: Transport::Road,
                    kind: 0,
                },
                CommandFlags::EXEC,
            )
            .expect("bridge");
        world
            .execute(0, Command::ClearTile { tile: end }, CommandFlags::EXEC)
            .expect("clear");
        assert_eq!(world.map.kind(start), TileKind::Clear);
        assert_eq!(world.map.kind(end), TileKind::Clear);
    }
}
