use crate::ai::path::Pathway;
use crate::ai::state::Piece;
use crate::coords::TilePos;
use crate::game::command::{Command, CommandError};
use crate::game::world::World;
use crate::map::{RoadBits, TileKind};
use crate::types::{CompanyId, DiagDir, Transport};

/// Road laying for the path builder. Existing road, town streets included,
/// is driven over rather than rebuilt.
pub struct Road;

impl Pathway for Road {
    const TRANSPORT: Transport = Transport::Road;

    fn piece(dir: DiagDir, exit: DiagDir) -> Option<Piece> {
        let entry = dir.reverse();
        (entry != exit).then(|| Piece::Road(RoadBits::pair(entry, exit)))
    }

    fn build_command(tile: TilePos, piece: Piece) -> Command {
        match piece {
            Piece::Road(bits) => Command::BuildRoad { tile, bits },
            _ => Command::ClearTile { tile },
        }
    }

    fn remove_command(tile: TilePos, piece: Piece) -> Command {
        match piece {
            Piece::Road(bits) => Command::RemoveRoad { tile, bits },
            _ => Command::ClearTile { tile },
        }
    }

    fn can_reuse(err: &CommandError) -> bool {
        matches!(err, CommandError::AlreadyBuilt(_))
    }
}

/// An own road tile with a half that leads nowhere.
pub fn dead_end_bits(world: &World, company: CompanyId, tile: TilePos) -> Option<RoadBits> {
    let TileKind::Road { owner, bits } = world.map.kind(tile) else {
        return None;
    };
    if owner != Some(company) {
        return None;
    }
    bits.edges()
        .find(|edge| {
            let next = tile.step(*edge);
            !(world.map.is_valid(next) && world.map.kind(next).road_opening(edge.reverse()))
        })
        .map(RoadBits::edge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::command::CommandFlags;
    use crate::game::config::GameConfig;
    use crate::map::Map;
    use crate::types::Axis;

    #[test]
    fn u_turns_have_no_piece() {
        assert_eq!(Road::piece(DiagDir::NorthEast, DiagDir::SouthWest), None);
        assert_eq!(
            Road::piece(DiagDir::NorthEast, DiagDir::NorthEast),
            Some(Piece::Road(RoadBits::axis(Axis::X)))
        );
    }

    #[test]
    fn town_streets_are_reusable() {
        let mut world = World::with_map(GameConfig::default(), Map::flat(32, 32, 2));
        let tile = TilePos::new(12, 12);
        world.map.set_kind(
            tile,
            TileKind::Road {
                owner: None,
                bits: RoadBits::axis(Axis::X),
            },
        );
        let err = world
            .execute(
                0,
                Command::BuildRoad {
                    tile,
                    bits: RoadBits::axis(Axis::X),
                },
                CommandFlags::QUERY,
            )
            .expect_err("already there");
        assert!(Road::can_reuse(&err));
        assert_eq!(dead_end_bits(&world, 0, tile), None);
    }

    #[test]
    fn lone_own_road_is_a_dead_end() {
        let mut world = World::with_map(GameConfig::default(), Map::flat(32, 32, 2));
        let tile = TilePos::new(12, 12);
        world
            .execute(
                0,
                Command::BuildRoad {
                    tile,
                    bits: RoadBits::axis(Axis::Y),
                },
                CommandFlags::EXEC,
            )
            .expect("road");
        assert!(dead_end_bits(&world, 0, tile).is_some());
    }
}
