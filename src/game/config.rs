use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Competitor speed, 0 (slowest) to 4 (a turn every tick).
    pub speed: u8,
    pub disable_trains: bool,
    pub disable_road_vehicles: bool,
    pub disable_aircraft: bool,
    /// Days between depot visits when servicing by days.
    pub service_interval: u16,
    /// Service interval expressed as a reliability percentage instead of days.
    pub service_interval_is_percent: bool,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            speed: 4,
            disable_trains: false,
            disable_road_vehicles: false,
            disable_aircraft: false,
            service_interval: 180,
            service_interval_is_percent: false,
        }
    }
}

impl AiConfig {
    /// Whether a computer player may move on this tick.
    pub fn turn_allowed(&self, tick: u64) -> bool {
        let speed = self.speed.min(4) as u32;
        tick & ((1u64 << (4 - speed)) - 1) == 0
    }

    pub fn service_interval_value(&self) -> u16 {
        if self.service_interval_is_percent {
            80
        } else {
            self.service_interval
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub seed: u64,
    pub map_width: i32,
    pub map_height: i32,
    pub num_towns: usize,
    pub num_industries: usize,
    pub num_ai_companies: usize,
    pub num_human_companies: usize,
    pub starting_loan: Money,
    pub start_year: u32,
    pub ai: AiConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            map_width: 128,
            map_height: 128,
            num_towns: 8,
            num_industries: 16,
            num_ai_companies: 2,
            num_human_companies: 0,
            starting_loan: 100_000,
            start_year: 1960,
            ai: AiConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("map must be at least 32x32, got {0}x{1}")]
    MapTooSmall(i32, i32),
    #[error("at most 8 companies are supported, got {0}")]
    TooManyCompanies(usize),
}

impl GameConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_width < 32 || self.map_height < 32 {
            return Err(ConfigError::MapTooSmall(self.map_width, self.map_height));
        }
        let companies = self.num_ai_companies + self.num_human_companies;
        if companies > crate::game::economy::MAX_COMPANIES {
            return Err(ConfigError::TooManyCompanies(companies));
        }
        Ok(())
    }
}
