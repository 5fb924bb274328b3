use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, info, warn};

use crate::coords::{TilePos, TileRect};
use crate::game::cargo::CargoAmounts;
use crate::game::command::{Command, CommandError, CommandFlags, CommandOutcome};
use crate::game::company::Company;
use crate::game::config::GameConfig;
use crate::game::economy::{
    Endpoint, Industry, IndustryKind, MAX_COMPANIES, MAX_SUBSIDIES, Prices, Subsidy, Town,
};
use crate::game::stations::{Station, StationList};
use crate::game::vehicles::{VehiclePool, VehicleStatus};
use crate::map::{Map, RoadBits, Slope, TileKind};
use crate::types::{Axis, Cargo, CompanyId, DiagDir, Money, TownId, Transport};

pub const TICKS_PER_DAY: u64 = 74;
pub const DAYS_PER_MONTH: u32 = 30;
pub const DAYS_PER_YEAR: u32 = 360;

/// Share of production a served source reports as picked up, out of 255.
const SERVED_PCT: u8 = 0xB0;

const TOWN_NAMES: &[&str] = &[
    "Fort Blinwell",
    "Pondston",
    "Wuntwell",
    "Nordham",
    "Grinnington",
    "Tedham",
    "Little Bury",
    "Sunbridge",
    "Chutford",
    "Kennwell",
    "Mallingtown",
    "Fustington",
    "Prunthill",
    "Whadburg",
    "Gobingbury",
    "Slindley",
];

/// The shared game world: terrain, economy and every company's assets.
#[derive(Debug, Clone)]
pub struct World {
    pub config: GameConfig,
    pub map: Map,
    pub prices: Prices,
    pub companies: Vec<Company>,
    pub towns: Vec<Town>,
    pub industries: Vec<Industry>,
    pub subsidies: Vec<Subsidy>,
    pub stations: StationList,
    pub vehicles: VehiclePool,
    pub tick: u64,
    pub days: u32,
    rng: StdRng,
}

impl World {
    pub fn new(config: GameConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let map = Map::generate(config.map_width, config.map_height, &mut rng);
        let mut world = Self::from_parts(config, map, rng);
        world.place_towns();
        world.place_industries();
        world
    }

    /// A world on a prepared map with no towns or industries; companies are
    /// created from the config.
    pub fn with_map(config: GameConfig, map: Map) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self::from_parts(config, map, rng)
    }

    fn from_parts(config: GameConfig, map: Map, rng: StdRng) -> Self {
        let prices = Prices::default();
        let num_companies = (config.num_human_companies + config.num_ai_companies).min(MAX_COMPANIES);
        let companies = (0..num_companies)
            .map(|id| {
                let is_ai = id >= config.num_human_companies;
                let name = if is_ai {
                    format!("AI Transport {}", id + 1)
                } else {
                    format!("Player {}", id + 1)
                };
                let seed = config.seed.wrapping_mul(31).wrapping_add(id as u64);
                Company::new(id, name, is_ai, config.starting_loan, config.starting_loan, seed)
            })
            .collect();
        Self {
            config,
            map,
            prices,
            companies,
            towns: Vec::new(),
            industries: Vec::new(),
            subsidies: Vec::new(),
            stations: StationList::default(),
            vehicles: VehiclePool::default(),
            tick: 0,
            days: 0,
            rng,
        }
    }

    pub fn year(&self) -> u32 {
        self.config.start_year + self.days / DAYS_PER_YEAR
    }

    pub fn company(&self, id: CompanyId) -> Option<&Company> {
        self.companies.get(id)
    }

    pub fn company_mut(&mut self, id: CompanyId) -> Option<&mut Company> {
        self.companies.get_mut(id)
    }

    pub fn money(&self, id: CompanyId) -> Money {
        self.company(id).map(|c| c.money).unwrap_or(0)
    }

    // ---- world queries ----

    /// Cargo production of every tile in `rect`; one unit per producing tile.
    pub fn production_around(&self, rect: TileRect) -> CargoAmounts {
        let mut amounts = CargoAmounts::zero();
        for tile in rect.tiles().filter(|t| self.map.is_valid(*t)) {
            match self.map.kind(tile) {
                TileKind::House { .. } => {
                    amounts.add(Cargo::Passengers, 1);
                    amounts.add(Cargo::Mail, 1);
                }
                TileKind::Industry { industry } => {
                    if let Some(ind) = self.industries.get(industry) {
                        for (slot, cargo) in ind.kind.produces().iter().enumerate() {
                            if ind.production_rate[slot] > 0 {
                                amounts.add(*cargo, 1);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        amounts
    }

    /// Cargo acceptance of every tile in `rect`, in eighths.
    pub fn acceptance_around(&self, rect: TileRect) -> CargoAmounts {
        let mut amounts = CargoAmounts::zero();
        for tile in rect.tiles().filter(|t| self.map.is_valid(*t)) {
            match self.map.kind(tile) {
                TileKind::House { .. } => {
                    amounts.add(Cargo::Passengers, 4);
                    amounts.add(Cargo::Mail, 2);
                    amounts.add(Cargo::Goods, 2);
                }
                TileKind::Industry { industry } => {
                    if let Some(ind) = self.industries.get(industry) {
                        for cargo in ind.kind.accepts() {
                            amounts.add(*cargo, 8);
                        }
                    }
                }
                _ => {}
            }
        }
        amounts
    }

    pub fn stations_of(&self, company: CompanyId) -> impl Iterator<Item = &Station> {
        self.stations.iter().filter(move |s| s.owner == company)
    }

    /// Distance to the nearest station owned by `company`.
    pub fn nearest_own_station(&self, company: CompanyId, tile: TilePos) -> Option<u32> {
        self.stations_of(company)
            .map(|s| s.xy().manhattan(tile))
            .min()
    }

    pub fn nearest_town(&self, tile: TilePos, max_distance: u32) -> Option<TownId> {
        self.towns
            .iter()
            .map(|t| (t.centre.manhattan(tile), t.id))
            .filter(|(d, _)| *d <= max_distance)
            .min()
            .map(|(_, id)| id)
    }

    pub fn endpoint_tile(&self, endpoint: Endpoint) -> Option<TilePos> {
        match endpoint {
            Endpoint::Town(id) => self.towns.get(id).map(|t| t.centre),
            Endpoint::Industry(id) => self.industries.get(id).map(|i| i.centre()),
        }
    }

    /// Whether a running vehicle of any company carries `cargo` to or from a
    /// station near `rect`.
    pub fn is_served(&self, rect: TileRect, cargo: Cargo) -> bool {
        let near: Vec<usize> = self
            .stations
            .iter()
            .filter(|s| {
                let reach = rect.expand(Station::catchment_radius(s.transport));
                s.tiles.iter().any(|t| reach.contains(*t))
            })
            .map(|s| s.id)
            .collect();
        if near.is_empty() {
            return false;
        }
        self.vehicles.iter().any(|v| {
            v.is_primary()
                && v.status != VehicleStatus::Stopped
                && v.orders.iter().any(|o| near.contains(&o.station))
                && self.vehicle_carries(v.id, cargo)
        })
    }

    pub fn vehicle_carries(&self, id: crate::game::vehicles::VehicleId, cargo: Cargo) -> bool {
        let Some(v) = self.vehicles.get(id) else {
            return false;
        };
        let engine_carries = v.engine.lookup().is_some_and(|e| e.carries(cargo));
        engine_carries
            || v.wagons.iter().any(|w| {
                self.vehicles
                    .get(*w)
                    .and_then(|wagon| wagon.engine.lookup())
                    .is_some_and(|e| e.carries(cargo))
            })
    }

    pub fn company_value(&self, company: CompanyId) -> Money {
        let Some(c) = self.company(company) else {
            return 0;
        };
        let vehicles: Money = self
            .vehicles
            .iter()
            .filter(|v| v.owner == company)
            .map(|v| v.value)
            .sum();
        let stations = self.stations_of(company).count() as Money * self.prices.station_value;
        c.money - c.loan + vehicles + stations
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    // ---- command boundary ----

    /// Runs a command. Without `EXEC` nothing changes and only the cost is
    /// computed; with it the command is first costed, checked against the
    /// company's cash and then carried out.
    pub fn execute(
        &mut self,
        company: CompanyId,
        command: Command,
        flags: CommandFlags,
    ) -> Result<CommandOutcome, CommandError> {
        if self.company(company).is_none_or(|c| !c.active) {
            return Err(CommandError::InvalidCompany(company));
        }
        let quoted = self.run(company, command, flags.without(CommandFlags::EXEC))?;
        if !flags.is_exec() {
            return Ok(quoted);
        }
        let available = self.money(company);
        if quoted.cost > 0 && quoted.cost > available {
            return Err(CommandError::NotEnoughMoney {
                needed: quoted.cost,
                available,
            });
        }
        let outcome = self.run(company, command, flags)?;
        debug_assert_eq!(outcome.cost, quoted.cost, "{command:?} cost changed on execute");
        if let Some(c) = self.company_mut(company) {
            c.spend(outcome.cost);
        }
        Ok(outcome)
    }

    fn run(
        &mut self,
        company: CompanyId,
        command: Command,
        flags: CommandFlags,
    ) -> Result<CommandOutcome, CommandError> {
        let cost = CommandOutcome::cost;
        match command {
            Command::BuildRail { tile, track } => self.build_rail(company, tile, track, flags).map(cost),
            Command::RemoveRail { tile, track } => self.remove_rail(company, tile, track, flags).map(cost),
            Command::BuildRailStation { tile, axis, length } => self
                .build_rail_station(company, tile, axis, length, flags)
                .map(cost),
            Command::BuildRailDepot { tile, dir } => self
                .build_depot(company, tile, dir, Transport::Rail, flags)
                .map(cost),
            Command::BuildRoad { tile, bits } => self.build_road(company, tile, bits, flags).map(cost),
            Command::RemoveRoad { tile, bits } => self.remove_road(company, tile, bits, flags).map(cost),
            Command::BuildRoadDepot { tile, dir } => self
                .build_depot(company, tile, dir, Transport::Road, flags)
                .map(cost),
            Command::BuildRoadStop { tile, dir, truck } => self
                .build_road_stop(company, tile, dir, truck, flags)
                .map(cost),
            Command::BuildAirport { tile } => self.build_airport(company, tile, flags).map(cost),
            Command::BuildBridge {
                start,
                end,
                transport,
                kind,
            } => self
                .build_bridge(company, start, end, transport, kind, flags)
                .map(cost),
            Command::BuildTunnel { start, transport } => {
                self.build_tunnel(company, start, transport, flags)
            }
            Command::ClearTile { tile } => self.clear_tile(company, tile, flags).map(cost),
            Command::Terraform {
                tile,
                corner,
                raise,
            } => self.terraform(company, tile, corner, raise, flags).map(cost),
            Command::BuildVehicle { depot, engine } => {
                self.build_vehicle(company, depot, engine, flags)
            }
            Command::SellVehicle { vehicle } => self.sell_vehicle(company, vehicle, flags).map(cost),
            Command::AttachWagon { wagon, head } => {
                self.attach_wagon(company, wagon, head, flags).map(cost)
            }
            Command::InsertOrder {
                vehicle,
                index,
                order,
            } => self
                .insert_order(company, vehicle, index, order, flags)
                .map(cost),
            Command::StartStopVehicle { vehicle } => {
                self.start_stop_vehicle(company, vehicle, flags).map(cost)
            }
            Command::ChangeServiceInterval { vehicle, days } => self
                .change_service_interval(company, vehicle, days, flags)
                .map(cost),
            Command::SendToDepot { vehicle, cancel } => {
                self.send_to_depot(company, vehicle, cancel, flags).map(cost)
            }
            Command::IncreaseLoan => self.increase_loan(company, flags).map(cost),
            Command::DecreaseLoan => self.decrease_loan(company, flags).map(cost),
            Command::BuyCompany { target } => self.buy_company(company, target, flags).map(cost),
            Command::BuildHeadquarters { tile } => {
                self.build_headquarters(company, tile, flags).map(cost)
            }
        }
    }

    fn increase_loan(&mut self, company: CompanyId, flags: CommandFlags) -> Result<Money, CommandError> {
        let step = self.prices.loan_step;
        let max = self.prices.max_loan;
        let c = self
            .company_mut(company)
            .ok_or(CommandError::InvalidCompany(company))?;
        if c.loan + step > max {
            return Err(CommandError::LoanLimit);
        }
        if flags.is_exec() {
            c.loan += step;
            c.money += step;
        }
        Ok(0)
    }

    fn decrease_loan(&mut self, company: CompanyId, flags: CommandFlags) -> Result<Money, CommandError> {
        let step = self.prices.loan_step;
        let c = self
            .company_mut(company)
            .ok_or(CommandError::InvalidCompany(company))?;
        if c.loan == 0 {
            return Err(CommandError::LoanLimit);
        }
        let amount = step.min(c.loan);
        if c.money < amount {
            return Err(CommandError::NotEnoughMoney {
                needed: amount,
                available: c.money,
            });
        }
        if flags.is_exec() {
            c.loan -= amount;
            c.money -= amount;
        }
        Ok(0)
    }

    fn buy_company(
        &mut self,
        company: CompanyId,
        target: CompanyId,
        flags: CommandFlags,
    ) -> Result<Money, CommandError> {
        if target == company {
            return Err(CommandError::NotForSale);
        }
        let seller = self
            .company(target)
            .ok_or(CommandError::InvalidCompany(target))?;
        if !seller.active || !seller.is_for_sale() {
            return Err(CommandError::NotForSale);
        }
        let price = seller.bankrupt_value;
        if flags.is_exec() {
            self.merge_company(target, company);
        }
        Ok(price)
    }

    /// Hands every asset of `from` over to `to` and retires `from`.
    fn merge_company(&mut self, from: CompanyId, to: CompanyId) {
        info!(seller = from, buyer = to, "company taken over");
        let inherited = self.companies[from].money;
        self.companies[to].money += inherited;
        for v in self.vehicles.iter_mut().filter(|v| v.owner == from) {
            v.owner = to;
        }
        let ids: Vec<usize> = self.stations_of(from).map(|s| s.id).collect();
        for id in ids {
            if let Some(s) = self.stations.get_mut(id) {
                s.owner = to;
            }
        }
        for idx in 0..self.map.num_tiles() {
            let tile = self.map.tile_at_index(idx);
            let kind = self.map.kind(tile);
            if kind.owner() == Some(from) {
                self.map.set_kind(tile, reown(kind, to));
            }
        }
        let seller = &mut self.companies[from];
        seller.active = false;
        seller.money = 0;
        seller.loan = 0;
        seller.bankrupt_asked = 0;
        seller.hq = None;
    }

    /// Removes a company that nobody bought.
    fn close_company(&mut self, id: CompanyId) {
        warn!(company = id, "company closed down");
        let owned: Vec<_> = self
            .vehicles
            .iter()
            .filter(|v| v.owner == id)
            .map(|v| v.id)
            .collect();
        for v in owned {
            self.vehicles.remove(v);
        }
        let ids: Vec<usize> = self.stations_of(id).map(|s| s.id).collect();
        for sid in ids {
            self.stations.remove(sid);
        }
        for idx in 0..self.map.num_tiles() {
            let tile = self.map.tile_at_index(idx);
            if self.map.kind(tile).owner() == Some(id) {
                self.map.set_kind(tile, TileKind::Clear);
            }
        }
        let c = &mut self.companies[id];
        c.active = false;
        c.bankrupt_asked = 0;
        c.hq = None;
    }

    // ---- time ----

    pub fn tick(&mut self) {
        self.tick += 1;
        if self.tick % TICKS_PER_DAY == 0 {
            self.on_new_day();
        }
    }

    fn on_new_day(&mut self) {
        self.days += 1;
        self.update_vehicles_daily();
        if self.days % DAYS_PER_MONTH == 0 {
            self.on_new_month();
        }
        if self.days % (DAYS_PER_MONTH * 3) == 0 {
            self.on_new_quarter();
        }
        if self.days % DAYS_PER_YEAR == 0 {
            self.on_new_year();
        }
    }

    fn update_vehicles_daily(&mut self) {
        let mut earnings: Vec<(CompanyId, Money)> = Vec::new();
        let ids: Vec<_> = self.vehicles.iter().map(|v| v.id).collect();
        for id in ids {
            let income = self.daily_income(id);
            let Some(v) = self.vehicles.get_mut(id) else {
                continue;
            };
            let Some(engine) = v.engine.lookup() else {
                continue;
            };
            v.age_days += 1;
            if engine.is_wagon {
                continue;
            }
            v.days_since_service += 1;
            v.reliability = v.reliability.saturating_sub(12);
            match v.status {
                VehicleStatus::Running => {
                    if v.days_since_service >= v.service_interval as u32 {
                        v.reliability = engine.reliability;
                        v.days_since_service = 0;
                    }
                }
                VehicleStatus::GoingToDepot {
                    days_left,
                    stop_there,
                } => {
                    if days_left <= 1 {
                        v.reliability = engine.reliability;
                        v.days_since_service = 0;
                        if stop_there {
                            v.in_depot = true;
                            v.status = VehicleStatus::Stopped;
                        } else {
                            v.status = VehicleStatus::Running;
                        }
                    } else {
                        v.status = VehicleStatus::GoingToDepot {
                            days_left: days_left - 1,
                            stop_there,
                        };
                    }
                }
                VehicleStatus::Stopped => {}
            }
            let running_cost = if v.status == VehicleStatus::Stopped {
                0
            } else {
                engine.running_cost / DAYS_PER_YEAR as Money
            };
            let profit = income - running_cost;
            v.profit_this_year += profit;
            earnings.push((v.owner, profit));
        }
        for (owner, profit) in earnings {
            if let Some(c) = self.company_mut(owner) {
                c.spend(-profit);
            }
        }
    }

    /// Revenue per day of a running vehicle shuttling between its first two
    /// order destinations.
    fn daily_income(&self, id: crate::game::vehicles::VehicleId) -> Money {
        let Some(v) = self.vehicles.get(id) else {
            return 0;
        };
        if v.status != VehicleStatus::Running || v.orders.len() < 2 {
            return 0;
        }
        let ends: Vec<TilePos> = v
            .orders
            .iter()
            .take(2)
            .filter_map(|o| self.stations.get(o.station).map(|s| s.xy()))
            .collect();
        let [a, b] = ends.as_slice() else {
            return 0;
        };
        let capacity: u32 = v.capacity as u32
            + v.wagons
                .iter()
                .filter_map(|w| self.vehicles.get(*w))
                .map(|w| w.capacity as u32)
                .sum::<u32>();
        (capacity as Money * a.manhattan(*b) as Money) / 20
    }

    fn on_new_month(&mut self) {
        for idx in 0..self.industries.len() {
            let ind = &self.industries[idx];
            let footprint = ind.footprint();
            let kind = ind.kind;
            let fed = kind.accepts().iter().any(|c| self.is_served(footprint, *c));
            let served: Vec<bool> = kind
                .produces()
                .iter()
                .map(|c| self.is_served(footprint, *c))
                .collect();
            let ind = &mut self.industries[idx];
            if kind.base_production() == 0 {
                let rate = if fed { 60 } else { 0 };
                ind.production_rate = [rate, 0];
            }
            for slot in 0..kind.produces().len() {
                let produced = ind.production_rate[slot];
                ind.last_month_production[slot] = produced;
                let pct = if served[slot] && produced > 0 { SERVED_PCT } else { 0 };
                ind.pct_transported[slot] = pct;
                ind.last_month_transported[slot] = (produced as u32 * pct as u32 / 255) as u16;
            }
        }
        for idx in 0..self.towns.len() {
            let area = TileRect::around(self.towns[idx].centre).expand(4);
            let pass = self.is_served(area, Cargo::Passengers);
            let mail = self.is_served(area, Cargo::Mail);
            let town = &mut self.towns[idx];
            town.pct_pass_transported = if pass { SERVED_PCT } else { 0 };
            town.pct_mail_transported = if mail { SERVED_PCT } else { 0 };
        }
        self.update_subsidies();
        self.check_bankruptcies();
    }

    fn on_new_quarter(&mut self) {
        for id in 0..self.companies.len() {
            if !self.companies[id].active {
                continue;
            }
            let vehicles = self
                .vehicles
                .iter()
                .filter(|v| v.owner == id && v.is_primary())
                .count() as i32;
            let stations = self.stations_of(id).count() as i32;
            let money = self.companies[id].money;
            let performance =
                (vehicles * 10 + stations * 5 + (money / 1_000).clamp(-500, 500) as i32).clamp(0, 1000);
            self.companies[id].close_quarter(performance);
        }
    }

    fn on_new_year(&mut self) {
        for v in self.vehicles.iter_mut() {
            v.profit_last_year = v.profit_this_year;
            v.profit_this_year = 0;
            v.value -= v.value / 8;
        }
    }

    fn update_subsidies(&mut self) {
        for s in &mut self.subsidies {
            s.age_months = s.age_months.saturating_add(1);
        }
        self.subsidies.retain(|s| s.awarded.is_some() || s.age_months <= 12);
        if self.subsidies.len() >= MAX_SUBSIDIES || !self.rng.gen_ratio(1, 3) {
            return;
        }
        if let Some(subsidy) = self.propose_subsidy() {
            debug!(cargo = %subsidy.cargo, "new subsidy offered");
            self.subsidies.push(subsidy);
        }
    }

    fn propose_subsidy(&mut self) -> Option<Subsidy> {
        if self.rng.gen_ratio(1, 2) && self.towns.len() >= 2 {
            let from = self.rng.gen_range(0..self.towns.len());
            let to = self.rng.gen_range(0..self.towns.len());
            let dist = self.towns[from].centre.manhattan(self.towns[to].centre);
            if from == to || dist > 70 {
                return None;
            }
            return Some(Subsidy {
                cargo: Cargo::Passengers,
                from: Endpoint::Town(from),
                to: Endpoint::Town(to),
                age_months: 0,
                awarded: None,
            });
        }
        let source = self.industries.choose(&mut self.rng)?;
        let cargo = *source.kind.produces().first()?;
        if source.production_rate[0] == 0 {
            return None;
        }
        let src_tile = source.centre();
        let from = Endpoint::Industry(source.id);
        let to = if cargo == Cargo::Goods {
            self.towns
                .iter()
                .filter(|t| t.population >= 900)
                .map(|t| (t.centre.manhattan(src_tile), Endpoint::Town(t.id)))
                .filter(|(d, _)| *d <= 70)
                .min_by_key(|(d, _)| *d)?
                .1
        } else {
            self.industries
                .iter()
                .filter(|i| i.kind.accepts().contains(&cargo))
                .map(|i| (i.centre().manhattan(src_tile), Endpoint::Industry(i.id)))
                .filter(|(d, _)| *d <= 70)
                .min_by_key(|(d, _)| *d)?
                .1
        };
        Some(Subsidy {
            cargo,
            from,
            to,
            age_months: 0,
            awarded: None,
        })
    }

    fn check_bankruptcies(&mut self) {
        for id in 0..self.companies.len() {
            let (active, money, months) = {
                let c = &self.companies[id];
                (c.active, c.money, c.months_of_bankruptcy)
            };
            if !active {
                continue;
            }
            if money >= 0 {
                let c = &mut self.companies[id];
                c.months_of_bankruptcy = 0;
                c.bankrupt_asked = 0;
                continue;
            }
            let months = months.saturating_add(1);
            self.companies[id].months_of_bankruptcy = months;
            match months {
                1 | 2 => warn!(company = id, months, "company in financial trouble"),
                3 => {
                    let value = self.company_value(id);
                    if value <= 0 {
                        self.close_company(id);
                        continue;
                    }
                    info!(company = id, value, "company offered for sale");
                    let c = &mut self.companies[id];
                    c.bankrupt_value = value;
                    c.bankrupt_asked = 1 << id;
                    c.bankrupt_timeout = 0;
                }
                4..=6 => {}
                _ => {
                    if self.companies[id].is_for_sale() {
                        self.close_company(id);
                    }
                }
            }
        }
    }

    // ---- generation ----

    fn place_towns(&mut self) {
        let (w, h) = self.map.bounds();
        let mut attempts = 0;
        while self.towns.len() < self.config.num_towns && attempts < 400 {
            attempts += 1;
            let centre = TilePos::new(self.rng.gen_range(8..w - 8), self.rng.gen_range(8..h - 8));
            let site = TileRect::around(centre).expand(1);
            if !self.map.is_flat_area(site)
                || !site.tiles().all(|t| self.map.kind(t).is_clearable_ground())
                || self.towns.iter().any(|t| t.centre.manhattan(centre) < 20)
            {
                continue;
            }
            let radius = self.rng.gen_range(3..6);
            self.found_town(centre, radius);
        }
    }

    /// Lays out a cross of town roads with houses along it.
    pub fn found_town(&mut self, centre: TilePos, radius: i32) -> TownId {
        let id = self.towns.len();
        for axis in [Axis::X, Axis::Y] {
            let dir = match axis {
                Axis::X => DiagDir::SouthWest,
                Axis::Y => DiagDir::SouthEast,
            };
            for i in -radius..=radius {
                let tile = centre.step_n(dir, i);
                if !self.map.is_valid(tile) {
                    continue;
                }
                let slope_ok = match self.map.slope(tile) {
                    Slope::Flat => true,
                    Slope::Inclined(d) => d.axis() == axis,
                    Slope::Irregular => false,
                };
                let bits = RoadBits::axis(axis);
                match self.map.kind(tile) {
                    TileKind::Clear | TileKind::Trees if slope_ok => {
                        self.map.set_kind(tile, TileKind::Road { owner: None, bits });
                    }
                    TileKind::Road { owner: None, bits: existing } => {
                        self.map.set_kind(
                            tile,
                            TileKind::Road {
                                owner: None,
                                bits: existing.union(bits),
                            },
                        );
                    }
                    _ => {}
                }
            }
        }
        let mut houses = 0;
        let area = TileRect::around(centre).expand(radius);
        let candidates: Vec<TilePos> = area.tiles().collect();
        for tile in candidates {
            if !self.map.is_valid(tile)
                || !self.map.kind(tile).is_clearable_ground()
                || self.map.slope(tile) != Slope::Flat
            {
                continue;
            }
            let by_road = DiagDir::ALL
                .iter()
                .any(|d| matches!(self.map.kind(tile.step(*d)), TileKind::Road { owner: None, .. }));
            if by_road && self.rng.gen_ratio(2, 3) {
                self.map.set_kind(tile, TileKind::House { town: id });
                houses += 1;
            }
        }
        let name = TOWN_NAMES
            .get(id % TOWN_NAMES.len())
            .map(|n| n.to_string())
            .unwrap_or_default();
        let population = houses * 30 + self.rng.gen_range(0..20);
        debug!(town = %name, population, "town founded");
        self.towns.push(Town {
            id,
            name,
            centre,
            population,
            pct_pass_transported: 0,
            pct_mail_transported: 0,
            ratings: [Town::INITIAL_RATING; MAX_COMPANIES],
        });
        id
    }

    fn place_industries(&mut self) {
        use strum::IntoEnumIterator;
        let kinds: Vec<IndustryKind> = IndustryKind::iter().collect();
        let (w, h) = self.map.bounds();
        let mut attempts = 0;
        while self.industries.len() < self.config.num_industries && attempts < 2_000 {
            attempts += 1;
            let kind = kinds[self.industries.len() % kinds.len()];
            let tile = TilePos::new(self.rng.gen_range(4..w - 5), self.rng.gen_range(4..h - 5));
            let footprint = TileRect {
                min: tile,
                max: tile.offset(1, 1),
            };
            if !self.map.is_flat_area(footprint)
                || !footprint.tiles().all(|t| self.map.kind(t).is_clearable_ground())
                || self.towns.iter().any(|t| t.centre.manhattan(tile) < 10)
                || self.industries.iter().any(|i| i.tile.manhattan(tile) < 8)
            {
                continue;
            }
            self.found_industry(kind, tile);
        }
    }

    pub fn found_industry(&mut self, kind: IndustryKind, tile: TilePos) -> usize {
        let id = self.industries.len();
        let footprint = TileRect {
            min: tile,
            max: tile.offset(1, 1),
        };
        for t in footprint.tiles() {
            self.map.set_kind(t, TileKind::Industry { industry: id });
        }
        let base = kind.base_production();
        let rates = match kind.produces().len() {
            0 => [0, 0],
            1 => [base, 0],
            _ => [base, base],
        };
        self.industries.push(Industry {
            id,
            kind,
            tile,
            production_rate: rates,
            last_month_production: rates,
            last_month_transported: [0, 0],
            pct_transported: [0, 0],
        });
        id
    }
}

fn reown(kind: TileKind, to: CompanyId) -> TileKind {
    match kind {
        TileKind::Rail { tracks, .. } => TileKind::Rail { owner: to, tracks },
        TileKind::Road { bits, .. } => TileKind::Road {
            owner: Some(to),
            bits,
        },
        TileKind::Station { station, part, .. } => TileKind::Station {
            owner: to,
            station,
            part,
        },
        TileKind::Depot { transport, dir, .. } => TileKind::Depot {
            owner: to,
            transport,
            dir,
        },
        TileKind::Tunnel {
            transport,
            dir,
            other_end,
            ..
        } => TileKind::Tunnel {
            owner: to,
            transport,
            dir,
            other_end,
        },
        TileKind::BridgeRamp {
            transport,
            dir,
            other_end,
            ..
        } => TileKind::BridgeRamp {
            owner: to,
            transport,
            dir,
            other_end,
        },
        TileKind::Headquarters { .. } => TileKind::Clear,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Track;

    fn flat_world() -> World {
        let config = GameConfig {
            num_ai_companies: 2,
            ..GameConfig::default()
        };
        World::with_map(config, Map::flat(64, 64, 2))
    }

    #[test]
    fn query_matches_execute_cost() {
        let mut world = flat_world();
        world.map.set_kind(TilePos::new(10, 10), TileKind::Trees);
        let commands = [
            Command::BuildRail {
                tile: TilePos::new(10, 10),
                track: Track::X,
            },
            Command::BuildRailStation {
                tile: TilePos::new(20, 20),
                axis: Axis::X,
                length: 3,
            },
            Command::BuildRoad {
                tile: TilePos::new(30, 30),
                bits: RoadBits::axis(Axis::Y),
            },
            Command::BuildAirport {
                tile: TilePos::new(40, 40),
            },
        ];
        for command in commands {
            let money_before = world.money(0);
            let quoted = world
                .execute(0, command, CommandFlags::QUERY)
                .expect("query");
            assert_eq!(world.money(0), money_before, "query spent money");
            let done = world
                .execute(0, command, CommandFlags::EXEC)
                .expect("exec");
            assert_eq!(quoted.cost, done.cost);
            assert_eq!(world.money(0), money_before - done.cost);
        }
    }

    #[test]
    fn query_has_no_side_effects() {
        let mut world = flat_world();
        let tile = TilePos::new(12, 12);
        world
            .execute(0, Command::BuildRail { tile, track: Track::Y }, CommandFlags::QUERY)
            .expect("query");
        assert_eq!(world.map.kind(tile), TileKind::Clear);
    }

    #[test]
    fn unaffordable_exec_is_refused() {
        let mut world = flat_world();
        world.companies[0].money = 10;
        let err = world
            .execute(
                0,
                Command::BuildAirport {
                    tile: TilePos::new(40, 40),
                },
                CommandFlags::EXEC,
            )
            .unwrap_err();
        assert!(matches!(err, CommandError::NotEnoughMoney { .. }));
        assert!(
            world
                .execute(
                    0,
                    Command::BuildAirport {
                        tile: TilePos::new(40, 40)
                    },
                    CommandFlags::QUERY
                )
                .is_ok()
        );
    }

    #[test]
    fn loan_moves_money() {
        let mut world = flat_world();
        let before = world.money(1);
        world
            .execute(1, Command::IncreaseLoan, CommandFlags::EXEC)
            .expect("borrow");
        assert_eq!(world.money(1), before + world.prices.loan_step);
        world
            .execute(1, Command::DecreaseLoan, CommandFlags::EXEC)
            .expect("repay");
        assert_eq!(world.money(1), before);
    }

    #[test]
    fn negative_cash_puts_company_up_for_sale() {
        let mut world = flat_world();
        world.companies[1].money = -10;
        world.companies[1].loan = 0;
        world.stations.add(1, Transport::Road, vec![TilePos::new(5, 5)], None);
        for _ in 0..3 {
            world.check_bankruptcies();
        }
        let seller = &world.companies[1];
        assert!(seller.is_for_sale());
        assert_eq!(seller.bankrupt_asked, 1 << 1);
        assert_eq!(seller.bankrupt_value, world.prices.station_value - 10);
    }

    #[test]
    fn generated_world_has_towns_and_industries() {
        let world = World::new(GameConfig::default());
        assert!(!world.towns.is_empty());
        assert!(!world.industries.is_empty());
        assert!(world.towns.iter().all(|t| t.population > 0));
    }
}
