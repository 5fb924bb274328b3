use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tycoon_ai::cli::{
    ControllerInstance, StatisticsAccumulator, apply_disabled_classes, create_controller,
    print_controller_help,
};
use tycoon_ai::game::{Game, GameConfig};

#[derive(Debug, Parser, Clone)]
#[command(name = "tycoon-sim")]
#[command(about = "Transport tycoon simulator - run seeded worlds with computer companies")]
struct Args {
    /// Number of worlds to simulate
    #[arg(short = 'n', long, default_value_t = 1)]
    num: u32,

    /// Ticks to run per world
    #[arg(long, default_value_t = 200_000)]
    ticks: u64,

    /// Controller code for the computer companies (A=AiController, P=Passive)
    #[arg(long, default_value = "A")]
    controller: String,

    /// Game config as JSON; the flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Number of computer companies
    #[arg(long)]
    companies: Option<usize>,

    /// Competitor speed, 0 (slowest) to 4
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=4))]
    speed: Option<u8>,

    /// Comma-separated vehicle classes the computer may not use (train,road,aircraft)
    #[arg(long)]
    disable: Option<String>,

    /// Write the AI state of every company of the last world to this file
    #[arg(long)]
    dump_state: Option<PathBuf>,

    /// Show controller codes and exit
    #[arg(long)]
    help_controllers: bool,

    /// Silence console output
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    if args.help_controllers {
        print_controller_help();
        return Ok(());
    }

    let Some(controller) = create_controller(&args.controller) else {
        eprintln!("Error: Unknown controller code '{}'", args.controller);
        eprintln!("Use --help-controllers to see available codes");
        std::process::exit(1);
    };

    let config = build_config(&args)?;
    let mut stats = StatisticsAccumulator::new();
    let mut last = None;

    for game_idx in 0..args.num {
        let config = GameConfig {
            seed: config.seed + game_idx as u64,
            ..config.clone()
        };
        let start = Instant::now();
        let game = run_world(config, args.ticks, &controller);
        let duration = start.elapsed();
        stats.after(&game, duration);

        if !args.quiet {
            let states: Vec<String> = game
                .ai_companies()
                .filter_map(|id| game.world.company(id))
                .map(|c| format!("{}:{}", c.id, c.ai.state.name()))
                .collect();
            println!(
                "World {:>4}: Seed={:>6}, Year={}, States=[{}], Duration={:?}",
                game_idx + 1,
                game.seed,
                game.world.year(),
                states.join(","),
                duration
            );
        }
        last = Some(game);
    }

    if let (Some(path), Some(game)) = (&args.dump_state, &last) {
        let dump: Vec<_> = game
            .world
            .companies
            .iter()
            .filter(|c| c.is_ai)
            .map(|c| (c.id, &c.ai))
            .collect();
        std::fs::write(path, serde_json::to_string_pretty(&dump)?)?;
    }

    if !args.quiet {
        print_summary(&stats);
    }
    Ok(())
}

fn build_config(args: &Args) -> Result<GameConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(n) = args.companies {
        config.num_ai_companies = n;
    }
    if let Some(speed) = args.speed {
        config.ai.speed = speed;
    }
    if let Some(list) = &args.disable {
        apply_disabled_classes(&mut config.ai, list)?;
    }
    config.validate()?;
    Ok(config)
}

fn run_world(config: GameConfig, ticks: u64, controller: &ControllerInstance) -> Game {
    let mut game = Game::new(config);
    game.play(ticks, controller);
    game
}

fn print_summary(stats: &StatisticsAccumulator) {
    let s = &stats.stats;
    println!("\n{}", "=".repeat(80));
    println!("SIMULATION SUMMARY");
    println!("{}", "=".repeat(80));

    println!("\nCompanies:");
    println!("  Computer companies: {}", s.companies);
    println!("  Closed or sold: {}", s.closed_companies);
    println!("  Avg net worth: {:.0}", s.get_avg_net_worth());

    println!("\nFinal states:");
    let mut states: Vec<_> = s.final_states.iter().collect();
    states.sort();
    for (state, count) in states {
        println!("  {:<30} {}", state, count);
    }

    println!("\nInfrastructure:");
    for (transport, count) in &s.stations {
        println!("  {:<10} stations {}", transport, count);
    }
    for (class, count) in &s.vehicles {
        println!("  {:<10} vehicles {}", class, count);
    }

    println!("\nRun Summary:");
    println!("  Total Worlds: {}", s.games);
    println!("  Avg Ticks: {:.2}", s.get_avg_ticks());
    println!("  Avg Duration: {:.2?}", s.get_avg_duration());
}
