use std::collections::HashMap;
use std::time::Duration;

use crate::game::game::Game;
use crate::types::{Money, Transport, VehicleClass};

#[derive(Debug, Default, Clone)]
pub struct GameStats {
    pub games: u32,
    pub total_ticks: u64,
    pub total_duration: Duration,
    /// Computer companies seen across all games.
    pub companies: u32,
    pub closed_companies: u32,
    pub stations: HashMap<Transport, u32>,
    pub vehicles: HashMap<VehicleClass, u32>,
    /// State each computer company was left in when its game ended.
    pub final_states: HashMap<&'static str, u32>,
    pub net_worth: Vec<Money>,
}

impl GameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_game(&mut self, game: &Game, duration: Duration) {
        let world = &game.world;
        self.games += 1;
        self.total_duration += duration;
        self.total_ticks += world.tick;

        for company in world.companies.iter().filter(|c| c.is_ai) {
            self.companies += 1;
            if !company.active {
                self.closed_companies += 1;
                continue;
            }
            *self.final_states.entry(company.ai.state.name()).or_insert(0) += 1;
            self.net_worth.push(world.company_value(company.id));
            for station in world.stations_of(company.id) {
                *self.stations.entry(station.transport).or_insert(0) += 1;
            }
            for vehicle in world
                .vehicles
                .iter()
                .filter(|v| v.owner == company.id && v.is_primary())
            {
                *self.vehicles.entry(vehicle.class).or_insert(0) += 1;
            }
        }
    }

    pub fn get_avg_ticks(&self) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        self.total_ticks as f64 / self.games as f64
    }

    pub fn get_avg_net_worth(&self) -> f64 {
        if self.net_worth.is_empty() {
            return 0.0;
        }
        self.net_worth.iter().sum::<Money>() as f64 / self.net_worth.len() as f64
    }

    pub fn get_avg_duration(&self) -> Duration {
        if self.games == 0 {
            return Duration::ZERO;
        }
        self.total_duration / self.games
    }

    pub fn merge(&mut self, other: GameStats) {
        self.games += other.games;
        self.total_ticks += other.total_ticks;
        self.total_duration += other.total_duration;
        self.companies += other.companies;
        self.closed_companies += other.closed_companies;
        for (k, v) in other.stations {
            *self.stations.entry(k).or_insert(0) += v;
        }
        for (k, v) in other.vehicles {
            *self.vehicles.entry(k).or_insert(0) += v;
        }
        for (k, v) in other.final_states {
            *self.final_states.entry(k).or_insert(0) += v;
        }
        self.net_worth.extend(other.net_worth);
    }
}

#[derive(Debug, Default)]
pub struct StatisticsAccumulator {
    pub stats: GameStats,
}

impl StatisticsAccumulator {
    pub fn new() -> Self {
        Self {
            stats: GameStats::new(),
        }
    }

    pub fn after(&mut self, game: &Game, duration: Duration) {
        self.stats.record_game(game, duration);
    }
}
