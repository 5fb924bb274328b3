pub mod blocks;
pub mod controller;
pub mod fleet;
pub mod maintenance;
pub mod matcher;
pub mod path;
pub mod rail_path;
pub mod road_path;
pub mod scout;
pub mod state;
pub mod terraform;
pub mod treasury;

pub use controller::{AiController, CompanyController, PassiveController};
pub use scout::RouteCategory;
pub use state::{AiState, BannedTiles, BuildRecord, LinkCursor, PlayerAiState};
