use std::path::PathBuf;

use clap::Parser;
use plotters::prelude::*;
use tycoon_ai::ai::AiController;
use tycoon_ai::game::{Game, GameConfig, World};
use tycoon_ai::map::TileKind;
use tycoon_ai::types::Transport;

const GRASS_COLOR: RGBColor = RGBColor(0x6B, 0x8E, 0x23);
const TREES_COLOR: RGBColor = RGBColor(0x22, 0x5E, 0x22);
const WATER_COLOR: RGBColor = RGBColor(0x41, 0x69, 0xE1);
const HOUSE_COLOR: RGBColor = RGBColor(0xB2, 0x22, 0x22);
const INDUSTRY_COLOR: RGBColor = RGBColor(0x70, 0x50, 0x90);
const TOWN_ROAD_COLOR: RGBColor = RGBColor(0x80, 0x80, 0x80);
const COMPANY_COLORS: [RGBColor; 8] = [
    RGBColor(0xFF, 0xD7, 0x00),
    RGBColor(0x00, 0xCE, 0xD1),
    RGBColor(0xFF, 0x8C, 0x00),
    RGBColor(0xF5, 0xF5, 0xF5),
    RGBColor(0xFF, 0x14, 0x93),
    RGBColor(0x7C, 0xFC, 0x00),
    RGBColor(0x1E, 0x90, 0xFF),
    RGBColor(0x00, 0x00, 0x00),
];

#[derive(Debug, Parser)]
#[command(name = "visualize-world")]
#[command(about = "Run a world for a while and render it to PNG")]
struct Args {
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Ticks to simulate before rendering
    #[arg(long, default_value_t = 100_000)]
    ticks: u64,

    #[arg(long, default_value_t = 2)]
    companies: usize,

    /// Pixels per tile
    #[arg(long, default_value_t = 6)]
    scale: u32,

    #[arg(long, default_value = "tycoon_world.png")]
    out: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = GameConfig {
        seed: args.seed,
        num_ai_companies: args.companies,
        ..GameConfig::default()
    };
    config.validate()?;

    println!("Simulating {} ticks...", args.ticks);
    let mut game = Game::new(config);
    game.play(args.ticks, &AiController);

    render_world(&game.world, &args.out, args.scale)?;
    println!("Wrote {}", args.out.display());
    Ok(())
}

fn tile_color(world: &World, kind: TileKind, height: u8) -> RGBColor {
    match kind {
        TileKind::Clear => shade(GRASS_COLOR, height),
        TileKind::Trees => shade(TREES_COLOR, height),
        TileKind::Water => WATER_COLOR,
        TileKind::House { .. } => HOUSE_COLOR,
        TileKind::Industry { .. } => INDUSTRY_COLOR,
        TileKind::Road { owner: None, .. } => TOWN_ROAD_COLOR,
        other => match other.owner() {
            Some(owner) if world.company(owner).is_some() => COMPANY_COLORS[owner % COMPANY_COLORS.len()],
            _ => TOWN_ROAD_COLOR,
        },
    }
}

/// Lighter the higher the ground.
fn shade(base: RGBColor, height: u8) -> RGBColor {
    let lift = |c: u8| c.saturating_add(height.saturating_mul(12));
    RGBColor(lift(base.0), lift(base.1), lift(base.2))
}

fn render_world(world: &World, out: &PathBuf, scale: u32) -> Result<(), Box<dyn std::error::Error>> {
    let (w, h) = world.map.bounds();
    let size = (w as u32 * scale, h as u32 * scale);
    let root = BitMapBackend::new(out, size).into_drawing_area();
    root.fill(&BLACK)?;

    let s = scale as i32;
    for index in 0..world.map.num_tiles() {
        let tile = world.map.tile_at_index(index);
        let kind = world.map.kind(tile);
        let color = tile_color(world, kind, world.map.tile_height(tile));
        let (px, py) = (tile.x * s, tile.y * s);
        root.draw(&Rectangle::new([(px, py), (px + s, py + s)], color.filled()))?;
        if let TileKind::Station { .. } | TileKind::Depot { .. } = kind {
            root.draw(&Rectangle::new([(px, py), (px + s - 1, py + s - 1)], BLACK.stroke_width(1)))?;
        }
    }

    for town in &world.towns {
        let (px, py) = (town.centre.x * s, town.centre.y * s);
        root.draw(&Text::new(
            town.name.clone(),
            (px, py),
            ("sans-serif", 12).into_font().color(&WHITE),
        ))?;
    }

    for company in world.companies.iter().filter(|c| c.active) {
        let stations = world.stations_of(company.id).count();
        let rail = world
            .stations_of(company.id)
            .filter(|st| st.transport == Transport::Rail)
            .count();
        println!(
            "{:<20} money {:>9} loan {:>7} stations {:>3} (rail {:>2}) state {}",
            company.name,
            company.money,
            company.loan,
            stations,
            rail,
            company.ai.state.name()
        );
    }

    root.present()?;
    Ok(())
}
