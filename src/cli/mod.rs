pub mod controllers;
pub mod stats;

pub use controllers::{
    CLI_CONTROLLERS, CliController, ControllerInstance, apply_disabled_classes, create_controller,
    print_controller_help,
};
pub use stats::{GameStats, StatisticsAccumulator};
