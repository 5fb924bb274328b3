use crate::ai::{AiController, CompanyController, PassiveController};
use crate::game::config::AiConfig;
use crate::game::world::World;
use crate::types::{CompanyId, VehicleClass};

pub struct CliController {
    pub code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const CLI_CONTROLLERS: &[CliController] = &[
    CliController {
        code: "A",
        name: "AiController",
        description: "The built-in computer player: scouts routes, builds them and runs their fleets.",
    },
    CliController {
        code: "P",
        name: "PassiveController",
        description: "Never acts. Useful as a baseline for how the world evolves on its own.",
    },
];

#[derive(Debug, Clone, Copy)]
pub enum ControllerInstance {
    Ai(AiController),
    Passive(PassiveController),
}

impl CompanyController for ControllerInstance {
    fn run_turn(&self, world: &mut World, company: CompanyId) {
        match self {
            ControllerInstance::Ai(c) => c.run_turn(world, company),
            ControllerInstance::Passive(c) => c.run_turn(world, company),
        }
    }
}

pub fn create_controller(code: &str) -> Option<ControllerInstance> {
    match code.to_uppercase().as_str() {
        "A" => Some(ControllerInstance::Ai(AiController)),
        "P" => Some(ControllerInstance::Passive(PassiveController)),
        _ => None,
    }
}

pub fn print_controller_help() {
    println!("Controller Legend:");
    println!("{:<5} {:<25} {}", "CODE", "CONTROLLER", "DESCRIPTION");
    println!("{}", "-".repeat(80));
    for c in CLI_CONTROLLERS {
        println!("{:<5} {:<25} {}", c.code, c.name, c.description);
    }
}

/// Applies a comma separated list of vehicle classes the computer players
/// must not use, e.g. `train,aircraft`.
pub fn apply_disabled_classes(config: &mut AiConfig, list: &str) -> Result<(), String> {
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let class: VehicleClass = item
            .to_uppercase()
            .parse()
            .map_err(|_| format!("unknown vehicle class '{item}'"))?;
        match class {
            VehicleClass::Train => config.disable_trains = true,
            VehicleClass::Road => config.disable_road_vehicles = true,
            VehicleClass::Aircraft => config.disable_aircraft = true,
            VehicleClass::Ship => {}
        }
    }
    Ok(())
}
