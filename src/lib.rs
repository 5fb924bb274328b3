#![warn(clippy::all)]
#![deny(rust_2018_idioms)]

pub mod ai;
pub mod cli;
pub mod coords;
pub mod game;
pub mod map;
pub mod types;

pub use ai::{AiController, AiState, CompanyController, PassiveController, PlayerAiState};
pub use coords::TilePos;
pub use game::{Game, GameConfig, World};
pub use map::Map;
pub use types::{Cargo, CompanyId, Money, Transport};
