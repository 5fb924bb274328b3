use rand::Rng;
use tracing::trace;

use crate::coords::TilePos;
use crate::game::command::{Command, CommandFlags};
use crate::game::world::World;
use crate::map::{Corner, Slope};
use crate::types::{CompanyId, DiagDir, Money};

const FLAGS: CommandFlags = CommandFlags::EXEC.union(CommandFlags::NO_WATER);

/// Wanders up to `steps` tiles from `tile` in a randomly wobbling
/// direction and flattens the tile it ends on, raising its low corners or
/// lowering its high ones. `mode` forces raising (> 0) or lowering (< 0);
/// zero leaves it to chance. Returns whether any land moved.
pub fn nudge(
    world: &mut World,
    company: CompanyId,
    tile: TilePos,
    dir: DiagDir,
    steps: u32,
    mode: i8,
    rng: &mut impl Rng,
) -> bool {
    let mut r: u32 = rng.r#gen();
    let steps = steps & r;
    let mut tile = tile;
    let mut dir = dir;
    for _ in 0..=steps {
        tile = world.map.clamp(tile.step(dir));
        r >>= 2;
        if r & 2 != 0 {
            dir = if r & 1 != 0 {
                dir.rotate_ccw()
            } else {
                dir.rotate_cw()
            };
        }
        dir = dir.rotate_ccw();
    }
    let raise = mode > 0 || (mode == 0 && r & 0xC == 0);
    level(world, company, tile, raise)
}

/// Moves every out-of-level corner of a sloped tile by one step.
pub fn level(world: &mut World, company: CompanyId, tile: TilePos, raise: bool) -> bool {
    if world.map.slope(tile) == Slope::Flat {
        return false;
    }
    let low = world.map.tile_height(tile);
    let high = world.map.max_corner_height(tile);
    if !raise && low == 0 {
        return false;
    }
    let budget = world.money(company) >> 5;
    let corners: Vec<Corner> = Corner::ALL
        .into_iter()
        .filter(|c| {
            let h = world.map.corner_height(tile, *c);
            if raise { h == low } else { h == high }
        })
        .collect();
    let mut spent: Money = 0;
    let mut moved = false;
    for corner in corners {
        let command = Command::Terraform {
            tile,
            corner,
            raise,
        };
        let Ok(quote) = world.execute(company, command, FLAGS.without(CommandFlags::EXEC)) else {
            continue;
        };
        if spent + quote.cost > budget {
            break;
        }
        if let Ok(done) = world.execute(company, command, FLAGS) {
            spent += done.cost;
            moved = true;
        }
    }
    if moved {
        trace!(company, %tile, raise, spent, "terraformed");
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::GameConfig;
    use crate::map::Map;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn levelling_flattens_a_single_raised_corner() {
        let mut map = Map::flat(32, 32, 2);
        let tile = TilePos::new(10, 10);
        let changes = map
            .plan_corner_change(tile, Corner::North, true)
            .expect("raise");
        map.apply_vertex_changes(&changes);
        let mut world = World::with_map(GameConfig::default(), map);
        assert_ne!(world.map.slope(tile), Slope::Flat);
        assert!(level(&mut world, 0, tile, false));
        assert_eq!(world.map.slope(tile), Slope::Flat);
        assert!(world.money(0) < world.config.starting_loan);
    }

    #[test]
    fn flat_land_is_left_alone() {
        let mut world = World::with_map(GameConfig::default(), Map::flat(32, 32, 2));
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..20 {
            assert!(!nudge(&mut world, 0, TilePos::new(15, 15), DiagDir::SouthWest, 3, 0, &mut rng));
        }
        assert_eq!(world.money(0), world.config.starting_loan);
    }
}
