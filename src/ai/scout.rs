use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use smallvec::smallvec;
use strum::{Display, EnumIter};
use tracing::{debug, info};

use crate::ai::blocks::BlockRole;
use crate::ai::state::{AiState, BlockProgress, BuildRecord, FleetPlan, LinkInstruction, PlayerAiState};
use crate::coords::TilePos;
use crate::game::economy::{Endpoint, MAX_SUBSIDIES};
use crate::game::world::World;
use crate::types::{Cargo, CompanyId, Transport};

const ROLLS_PER_TURN: usize = 200;
/// Turns of fruitless searching before the company gives up for a while.
pub const MAX_SEARCH_TURNS: u16 = 556;
const ATTEMPTS_PER_CATEGORY: usize = 60;
/// Largest share, out of 255, of a source's output that may already be
/// carried away.
const MAX_TRANSPORTED: u8 = 0x99;
const MIN_TOWN_RATING: i16 = -100;
const FAR_FROM_NETWORK: u32 = 37;
const POPULATION_PER_STATION: u32 = 350;
const MIN_GOODS_TOWN: u32 = 900;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum RouteCategory {
    LongIndustryRail,
    MediumIndustryRail,
    ShortIndustryRail,
    PassengerRail,
    MailRail,
    LongIndustryRoad,
    MediumIndustryRoad,
    LongPassengerRoad,
    TownPassengerRoad,
    PassengerAir,
}

/// What a route category looks for and what it builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteProfile {
    pub transport: Transport,
    pub min_distance: u32,
    pub max_distance: u32,
    pub records: u8,
    pub wagons: u8,
    pub vehicles: u8,
    pub full_load: u8,
    /// Cargo fixed by the category; industry routes carry whatever the
    /// source makes.
    pub cargo: Option<Cargo>,
    pub radius: u8,
}

impl RouteCategory {
    pub fn profile(self) -> RouteProfile {
        use RouteCategory::*;
        let (transport, min_distance, max_distance, records, wagons, vehicles, full_load, cargo) = match self {
            LongIndustryRail => (Transport::Rail, 60, 90, 4, 3, 2, 2, None),
            MediumIndustryRail => (Transport::Rail, 40, 60, 2, 3, 1, 1, None),
            ShortIndustryRail => (Transport::Rail, 15, 40, 2, 2, 1, 1, None),
            PassengerRail => (Transport::Rail, 50, 100, 2, 2, 1, 1, Some(Cargo::Passengers)),
            MailRail => (Transport::Rail, 60, 110, 2, 2, 1, 1, Some(Cargo::Mail)),
            LongIndustryRoad => (Transport::Road, 35, 55, 2, 0, 3, 2, None),
            MediumIndustryRoad => (Transport::Road, 15, 40, 2, 0, 2, 1, None),
            LongPassengerRoad => (Transport::Road, 30, 65, 2, 0, 2, 1, Some(Cargo::Passengers)),
            TownPassengerRoad => (Transport::Road, 0, 0, 2, 0, 2, 1, Some(Cargo::Passengers)),
            PassengerAir => (Transport::Air, 70, 250, 2, 0, 2, 1, Some(Cargo::Passengers)),
        };
        let radius = match transport {
            Transport::Rail => 9,
            Transport::Road => 6,
            _ => 12,
        };
        RouteProfile {
            transport,
            min_distance,
            max_distance,
            records,
            wagons,
            vehicles,
            full_load,
            cargo,
            radius,
        }
    }

    pub fn in_band(self, distance: u32) -> bool {
        let p = self.profile();
        (p.min_distance..=p.max_distance).contains(&distance)
    }

    fn type_bit(self) -> u8 {
        match self.profile().transport {
            Transport::Rail => 1,
            Transport::Road => 2,
            _ => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoundRoute {
    pub from: Endpoint,
    pub to: Endpoint,
    pub cargo: Cargo,
    pub distance: u32,
}

impl FoundRoute {
    fn between(world: &World, from: Endpoint, to: Endpoint, cargo: Cargo) -> Option<Self> {
        let a = world.endpoint_tile(from)?;
        let b = world.endpoint_tile(to)?;
        Some(FoundRoute {
            from,
            to,
            cargo,
            distance: a.manhattan(b),
        })
    }
}

fn cargo_fits(category: RouteCategory, cargo: Cargo) -> bool {
    match category.profile().cargo {
        Some(wanted) => wanted == cargo,
        None => !cargo.is_town_cargo(),
    }
}

fn subsidy_route(world: &World, company: CompanyId, category: RouteCategory, slot: usize) -> Option<FoundRoute> {
    let s = world.subsidies.get(slot)?;
    if !s.awarded.is_none_or(|c| c == company) || !cargo_fits(category, s.cargo) {
        return None;
    }
    FoundRoute::between(world, s.from, s.to, s.cargo).filter(|r| category.in_band(r.distance))
}

fn random_industry_route(world: &World, rng: &mut impl Rng) -> Option<FoundRoute> {
    let source = world.industries.choose(rng)?;
    let cargo = *source.kind.produces().choose(rng)?;
    let to = if cargo == Cargo::Goods {
        let town = world.towns.choose(rng)?;
        if town.population < MIN_GOODS_TOWN {
            return None;
        }
        Endpoint::Town(town.id)
    } else {
        let dest = world.industries.choose(rng)?;
        if !dest.kind.accepts().contains(&cargo) {
            return None;
        }
        Endpoint::Industry(dest.id)
    };
    FoundRoute::between(world, Endpoint::Industry(source.id), to, cargo)
}

fn random_town_route(world: &World, cargo: Cargo, same_town: bool, rng: &mut impl Rng) -> Option<FoundRoute> {
    let from = world.towns.choose(rng)?;
    let to = if same_town {
        from
    } else {
        world.towns.choose(rng)?
    };
    if !same_town && from.id == to.id {
        return None;
    }
    FoundRoute::between(world, Endpoint::Town(from.id), Endpoint::Town(to.id), cargo)
}

fn random_route(world: &World, category: RouteCategory, rng: &mut impl Rng) -> Option<FoundRoute> {
    match category.profile().cargo {
        None => random_industry_route(world, rng),
        Some(cargo) => random_town_route(world, cargo, category == RouteCategory::TownPassengerRoad, rng),
    }
}

/// Up to a fixed number of tries for a pair in the category's band. Each try
/// draws a subsidy slot first and falls back to a random pair when the slot
/// is empty or unusable.
pub fn find_route(
    world: &World,
    company: CompanyId,
    category: RouteCategory,
    rng: &mut impl Rng,
) -> Option<FoundRoute> {
    for _ in 0..ATTEMPTS_PER_CATEGORY {
        let slot = rng.gen_range(0..MAX_SUBSIDIES);
        if let Some(route) = subsidy_route(world, company, category, slot) {
            return Some(route);
        }
        if let Some(route) = random_route(world, category, rng).filter(|r| category.in_band(r.distance)) {
            return Some(route);
        }
    }
    None
}

/// Whether the route is worth building for this company right now. Marks
/// the category's transport as tried on success.
pub fn route_is_good(
    world: &World,
    company: CompanyId,
    ai: &mut PlayerAiState,
    category: RouteCategory,
    route: &FoundRoute,
) -> bool {
    if !category.in_band(route.distance) {
        return false;
    }
    let (Some(from_tile), Some(to_tile)) = (world.endpoint_tile(route.from), world.endpoint_tile(route.to)) else {
        return false;
    };
    let transport = category.profile().transport;

    let nearest = world
        .stations_of(company)
        .map(|s| s.xy().max_distance(from_tile).min(s.xy().max_distance(to_tile)))
        .min();
    if nearest.is_some_and(|d| d > FAR_FROM_NETWORK) && ai.rng.gen_ratio(3, 4) {
        return false;
    }

    if let (Transport::Road | Transport::Air, Endpoint::Town(town)) = (transport, route.from) {
        let here = world
            .stations_of(company)
            .filter(|s| s.transport == transport && s.town == Some(town))
            .count() as u32;
        let population = world.towns.get(town).map_or(0, |t| t.population);
        if here > 2 && population < here * POPULATION_PER_STATION {
            return false;
        }
    }

    let bit = category.type_bit();
    if ai.route_type_mask != 0 && ai.route_type_mask & bit == 0 && !ai.rng.gen_ratio(1, 5) {
        return false;
    }

    let supplied = match (route.from, route.to) {
        (Endpoint::Town(a), Endpoint::Town(b)) if route.cargo.is_town_cargo() => [a, b].iter().all(|id| {
            world.towns.get(*id).is_some_and(|t| {
                let carried = if route.cargo == Cargo::Mail {
                    t.pct_mail_transported
                } else {
                    t.pct_pass_transported
                };
                carried <= MAX_TRANSPORTED && t.rating(company) >= MIN_TOWN_RATING
            })
        }),
        (Endpoint::Industry(id), _) => world.industries.get(id).is_some_and(|i| {
            i.produced_slot(route.cargo)
                .is_some_and(|slot| i.pct_transported[slot] <= MAX_TRANSPORTED && i.last_month_production[slot] > 0)
        }),
        _ => false,
    };
    if !supplied {
        return false;
    }
    ai.route_type_mask |= bit;
    true
}

/// Lays out the build records and the fleet plan for an accepted route.
pub fn plan_route(world: &World, ai: &mut PlayerAiState, category: RouteCategory, route: &FoundRoute) -> Option<()> {
    let profile = category.profile();
    let from = world.endpoint_tile(route.from)?;
    let to = world.endpoint_tile(route.to)?;
    let same_place = from == to;
    let towards = |a: TilePos, b: TilePos| (!same_place).then(|| a.direction_to(b));

    let site = |anchor: TilePos, role: BlockRole, direction| {
        let mut record = BuildRecord::new(anchor, profile.radius, role, profile.transport, route.cargo);
        record.wagons = profile.wagons;
        record.direction = direction;
        record.produces = role == BlockRole::Source;
        record.truck = profile.transport == Transport::Road && route.cargo != Cargo::Passengers;
        record
    };

    ai.reset_route();
    let mut src = site(from, BlockRole::Source, towards(from, to));
    let mut dst = site(to, BlockRole::Destination, towards(to, from));
    if profile.records == 4 {
        // src -> mid1 -> mid2 <- dst; waypoints sit in records 2 and 3
        src.links[0] = LinkInstruction::new(0, 2, 0).pack();
        dst.links[0] = LinkInstruction::new(0, 3, 1).pack();
        let mut mid1 = site(from.percent_between(to, 0x55), BlockRole::Waypoint, towards(from, to));
        mid1.links[0] = LinkInstruction::new(1, 3, 0).pack();
        let mid2 = site(from.percent_between(to, 0xAA), BlockRole::Waypoint, towards(from, to));
        ai.records.extend([src, dst, mid1, mid2]);
    } else {
        if profile.transport != Transport::Air {
            src.links[0] = LinkInstruction::new(0, 1, 0).pack();
        }
        ai.records.extend([src, dst]);
    }

    ai.category = Some(category);
    ai.fleet = FleetPlan {
        cargo: route.cargo,
        num_wagons: profile.wagons,
        vehicles_to_build: profile.vehicles,
        num_want_fullload: profile.full_load,
        wagon_list: smallvec![],
        order_blocks: smallvec![0, 1],
    };
    Some(())
}

fn roll_category(r: u16, sub: u16, world: &World) -> Option<RouteCategory> {
    use RouteCategory::*;
    let ai = &world.config.ai;
    if r < 0x7626 {
        if ai.disable_trains {
            return None;
        }
        Some(match sub {
            s if s > 0xD000 => LongIndustryRail,
            s if s > 0x6000 => MediumIndustryRail,
            s if s > 0x1000 => ShortIndustryRail,
            s if s > 0x0800 => PassengerRail,
            _ => MailRail,
        })
    } else if r < 0xC4EA {
        if ai.disable_road_vehicles {
            return None;
        }
        Some(if sub > 0x4000 {
            if sub > 0xA000 {
                LongIndustryRoad
            } else {
                MediumIndustryRoad
            }
        } else if sub > 0x1000 {
            LongPassengerRoad
        } else {
            TownPassengerRoad
        })
    } else if r < 0xD89B {
        if ai.disable_aircraft {
            return None;
        }
        Some(PassengerAir)
    } else {
        // ships: never built, the roll is spent
        None
    }
}

pub fn want_new_route(world: &World, company: CompanyId, ai: &mut PlayerAiState, rounds: u16) -> AiState {
    let base = world.prices.ai_base();
    if world.money(company) < base * 500 {
        debug!(company, "too poor for a new route");
        return AiState::Idle;
    }
    let cfg = &world.config.ai;
    if cfg.disable_trains && cfg.disable_road_vehicles && cfg.disable_aircraft {
        return AiState::Idle;
    }

    for _ in 0..ROLLS_PER_TURN {
        let r: u16 = ai.rng.r#gen();
        let sub: u16 = ai.rng.r#gen();
        let Some(category) = roll_category(r, sub, world) else {
            continue;
        };
        let Some(route) = find_route(world, company, category, &mut ai.rng) else {
            continue;
        };
        if !route_is_good(world, company, ai, category, &route) || plan_route(world, ai, category, &route).is_none()
        {
            continue;
        }
        info!(company, %category, cargo = %route.cargo, distance = route.distance, "new route");
        return match category.profile().transport {
            Transport::Rail => AiState::BuildDefaultRailBlocks(BlockProgress::new()),
            Transport::Road => AiState::BuildDefaultRoadBlocks(BlockProgress::new()),
            _ => AiState::AirportStuff,
        };
    }

    if rounds + 1 >= MAX_SEARCH_TURNS {
        AiState::Idle
    } else {
        AiState::WantNewRoute { rounds: rounds + 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::path;
    use crate::game::config::GameConfig;
    use crate::game::economy::{IndustryKind, Subsidy};
    use crate::map::Map;
    use strum::IntoEnumIterator;

    #[test]
    fn bands_are_inclusive_and_exclusive_outside() {
        for category in RouteCategory::iter() {
            let p = category.profile();
            assert!(category.in_band(p.min_distance), "{category}");
            assert!(category.in_band(p.max_distance), "{category}");
            assert!(!category.in_band(p.max_distance + 1), "{category}");
            if p.min_distance > 0 {
                assert!(!category.in_band(p.min_distance - 1), "{category}");
            }
        }
    }

    fn coal_world(distance: i32) -> World {
        let mut w = World::with_map(GameConfig::default(), Map::flat(160, 64, 2));
        w.found_industry(IndustryKind::CoalMine, TilePos::new(10, 30));
        w.found_industry(IndustryKind::PowerStation, TilePos::new(10 + distance, 30));
        w
    }

    #[test]
    fn routes_outside_the_band_are_rejected() {
        let w = coal_world(25);
        let mut ai = PlayerAiState::new(4);
        let route = FoundRoute::between(&w, Endpoint::Industry(0), Endpoint::Industry(1), Cargo::Coal)
            .expect("route");
        assert_eq!(route.distance, 25);
        assert!(!route_is_good(&w, 0, &mut ai, RouteCategory::LongIndustryRail, &route));
        assert!(!route_is_good(&w, 0, &mut ai, RouteCategory::MediumIndustryRail, &route));
        assert!(route_is_good(&w, 0, &mut ai, RouteCategory::ShortIndustryRail, &route));
        assert_eq!(ai.route_type_mask, 1);
    }

    #[test]
    fn saturated_sources_are_rejected() {
        let mut w = coal_world(25);
        w.industries[0].pct_transported[0] = 0xC0;
        let mut ai = PlayerAiState::new(4);
        let route = FoundRoute::between(&w, Endpoint::Industry(0), Endpoint::Industry(1), Cargo::Coal)
            .expect("route");
        assert!(!route_is_good(&w, 0, &mut ai, RouteCategory::ShortIndustryRail, &route));
    }

    #[test]
    fn long_routes_chain_through_two_waypoints() {
        let w = coal_world(75);
        let mut ai = PlayerAiState::new(4);
        let route = FoundRoute::between(&w, Endpoint::Industry(0), Endpoint::Industry(1), Cargo::Coal)
            .expect("route");
        plan_route(&w, &mut ai, RouteCategory::LongIndustryRail, &route).expect("planned");
        assert_eq!(ai.records.len(), 4);
        assert!(ai.records[0].produces && !ai.records[1].produces);
        assert_eq!(ai.records[2].role, BlockRole::Waypoint);
        let jobs = path::link_jobs(&ai.records);
        assert_eq!(jobs, vec![(0, 0, 2, 0), (1, 0, 3, 1), (2, 1, 3, 0)]);
        assert_eq!(ai.fleet.vehicles_to_build, 2);
        assert_eq!(ai.fleet.num_wagons, 3);
    }

    #[test]
    fn poor_companies_do_not_look() {
        let mut w = coal_world(25);
        let mut ai = PlayerAiState::new(4);
        w.companies[0].money = 0;
        assert_eq!(want_new_route(&w, 0, &mut ai, 0), AiState::Idle);
    }

    #[test]
    fn a_refused_subsidy_does_not_hide_other_pairs() {
        let mut w = coal_world(25);
        w.config.ai.disable_road_vehicles = true;
        w.config.ai.disable_aircraft = true;
        w.industries[0].pct_transported[0] = 0xC0;
        w.subsidies.push(Subsidy {
            cargo: Cargo::Coal,
            from: Endpoint::Industry(0),
            to: Endpoint::Industry(1),
            age_months: 0,
            awarded: None,
        });
        let mine = w.found_industry(IndustryKind::CoalMine, TilePos::new(100, 30));
        w.found_industry(IndustryKind::PowerStation, TilePos::new(125, 30));

        let mut ai = PlayerAiState::new(9);
        let mut state = AiState::WantNewRoute { rounds: 0 };
        for _ in 0..20 {
            let AiState::WantNewRoute { rounds } = state else {
                break;
            };
            state = want_new_route(&w, 0, &mut ai, rounds);
        }
        assert!(matches!(state, AiState::BuildDefaultRailBlocks(_)), "{state:?}");
        assert_eq!(ai.records[0].anchor, w.industries[mine].centre());
    }

    #[test]
    fn a_short_coal_route_is_found() {
        let mut w = coal_world(25);
        w.config.ai.disable_road_vehicles = true;
        let mut ai = PlayerAiState::new(4);
        let mut state = AiState::WantNewRoute { rounds: 0 };
        for _ in 0..20 {
            let AiState::WantNewRoute { rounds } = state else {
                break;
            };
            state = want_new_route(&w, 0, &mut ai, rounds);
        }
        assert!(matches!(state, AiState::BuildDefaultRailBlocks(_)), "{state:?}");
        assert_eq!(ai.category, Some(RouteCategory::ShortIndustryRail));
    }
}
