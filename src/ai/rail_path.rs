use crate::ai::path::Pathway;
use crate::ai::state::Piece;
use crate::coords::TilePos;
use crate::game::command::Command;
use crate::game::world::World;
use crate::map::TileKind;
use crate::types::{CompanyId, DiagDir, Track, Transport};

/// Track laying for the path builder.
pub struct Rail;

impl Pathway for Rail {
    const TRANSPORT: Transport = Transport::Rail;

    fn piece(dir: DiagDir, exit: DiagDir) -> Option<Piece> {
        Track::joining(dir.reverse(), exit).map(Piece::Rail)
    }

    fn build_command(tile: TilePos, piece: Piece) -> Command {
        match piece {
            Piece::Rail(track) => Command::BuildRail { tile, track },
            _ => Command::ClearTile { tile },
        }
    }

    fn remove_command(tile: TilePos, piece: Piece) -> Command {
        match piece {
            Piece::Rail(track) => Command::RemoveRail { tile, track },
            _ => Command::ClearTile { tile },
        }
    }
}

/// Whether anything on the far side of `edge` connects back into `tile`.
pub fn rail_connected(world: &World, tile: TilePos, edge: DiagDir) -> bool {
    let next = tile.step(edge);
    world.map.is_valid(next) && world.map.kind(next).rail_opening(edge.reverse())
}

/// A track of `company` on `tile` with at least one loose end.
pub fn dead_end_track(world: &World, company: CompanyId, tile: TilePos) -> Option<Track> {
    let TileKind::Rail { owner, tracks } = world.map.kind(tile) else {
        return None;
    };
    if owner != company {
        return None;
    }
    tracks.iter().find(|track| {
        let (a, b) = track.edges();
        !rail_connected(world, tile, a) || !rail_connected(world, tile, b)
    })
}

/// After `track` was lifted from `tile`, the next loose piece along the
/// line it used to continue into, if any.
pub fn follow_dead_end(world: &World, company: CompanyId, tile: TilePos, track: Track) -> Option<(TilePos, Track)> {
    let (a, b) = track.edges();
    [a, b].into_iter().find_map(|edge| {
        let next = tile.step(edge);
        let TileKind::Rail { owner, tracks } = world.map.kind(next) else {
            return None;
        };
        if owner != company {
            return None;
        }
        tracks
            .iter()
            .find(|t| t.has_edge(edge.reverse()))
            .filter(|_| dead_end_track(world, company, next).is_some())
            .map(|t| (next, t))
    })
}
