pub mod cargo;
pub mod command;
pub mod company;
pub mod config;
pub(crate) mod construct;
pub mod economy;
pub mod engines;
pub mod game;
pub mod stations;
mod vehicle_commands;
pub mod vehicles;
pub mod world;

pub use command::{Command, CommandError, CommandFlags, CommandOutcome};
pub use company::Company;
pub use config::{AiConfig, ConfigError, GameConfig};
pub use game::Game;
pub use world::World;
