use rand::Rng;
use smallvec::SmallVec;
use tracing::{debug, info, trace};

use crate::ai::blocks;
use crate::ai::state::{
    BannedTiles, BlockMatch, BuildRecord, LinkCursor, LinkMode, LinkProgress, Piece, PlayerAiState, Segment,
};
use crate::ai::terraform;
use crate::coords::TilePos;
use crate::game::command::{Command, CommandError, CommandFlags};
use crate::game::construct::BRIDGE_KINDS;
use crate::game::world::World;
use crate::map::{Slope, TileKind};
use crate::types::{CompanyId, DiagDir, Money, Transport};

pub const MAX_DEPTH: u8 = 4;
/// Turns shared by the block and link phases before a route is given up.
pub const ROUTE_TIMEOUT: u16 = 1388;
const MAX_BRIDGE_LENGTH: i32 = 13;
const LOOP_LOOKBACK: usize = 20;
const LOOP_RADIUS: u32 = 4;
const LOOP_LIMIT: usize = 8;
const NO_OPTION_TERRAFORMS: usize = 5;
const NO_OPTION_LIMIT: u8 = 21;
const STUCK_DESTRUCT: u8 = 40;
const RECOVER_TURNS: u8 = 4;
const RECOVER_NUDGES: usize = 4;
const DESTRUCT_PER_TURN: usize = 4;

const QUERY: CommandFlags = CommandFlags::NO_TOWN_RATING;
const EXEC: CommandFlags = QUERY.union(CommandFlags::EXEC);

pub trait Pathway {
    const TRANSPORT: Transport;

    /// Plain piece entered while moving `dir` and left towards `exit`.
    fn piece(dir: DiagDir, exit: DiagDir) -> Option<Piece>;

    fn build_command(tile: TilePos, piece: Piece) -> Command;

    fn remove_command(tile: TilePos, piece: Piece) -> Command;

    /// Whether a refusal to build means the piece is already in place and
    /// can simply be driven over.
    fn can_reuse(_err: &CommandError) -> bool {
        false
    }
}

fn build_command<P: Pathway>(tile: TilePos, piece: Piece) -> Command {
    match piece {
        Piece::Bridge { end, kind } => Command::BuildBridge {
            start: tile,
            end,
            transport: P::TRANSPORT,
            kind,
        },
        Piece::Tunnel { .. } => Command::BuildTunnel {
            start: tile,
            transport: P::TRANSPORT,
        },
        plain => P::build_command(tile, plain),
    }
}

fn remove_command<P: Pathway>(tile: TilePos, piece: Piece) -> Command {
    match piece {
        Piece::Bridge { .. } | Piece::Tunnel { .. } => Command::ClearTile { tile },
        plain => P::remove_command(tile, plain),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    /// Shallowest depth at which the other cursor was met.
    pub reached: Option<u8>,
    /// Distance and depth of the closest tile at the depth limit.
    pub closest: Option<(u32, u8)>,
}

impl Probe {
    pub const NONE: Probe = Probe {
        reached: None,
        closest: None,
    };

    fn reached(depth: u8) -> Self {
        Probe {
            reached: Some(depth),
            closest: None,
        }
    }

    fn closest(distance: u32, depth: u8) -> Self {
        Probe {
            reached: None,
            closest: Some((distance, depth)),
        }
    }

    pub fn is_none(&self) -> bool {
        self.reached.is_none() && self.closest.is_none()
    }

    /// Reaching beats getting close; shallower reaches and nearer, then
    /// shallower, approaches win ties.
    pub fn beats(&self, other: &Probe) -> bool {
        match (self.reached, other.reached) {
            (Some(a), Some(b)) => a < b,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => match (self.closest, other.closest) {
                (Some(a), Some(b)) => a < b,
                (Some(_), None) => true,
                _ => false,
            },
        }
    }

    fn best(self, other: Probe) -> Probe {
        if other.beats(&self) { other } else { self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub tile: TilePos,
    pub dir: DiagDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathOption {
    pub piece: Piece,
    pub reused: bool,
    pub next_tile: TilePos,
    pub next_dir: DiagDir,
    pub cost: Money,
}

struct SearchCtx<'a> {
    company: CompanyId,
    target: Target,
    banned: &'a BannedTiles,
    money: Money,
}

fn query(world: &mut World, company: CompanyId, command: Command) -> Result<Money, CommandError> {
    world.execute(company, command, QUERY).map(|o| o.cost)
}

fn plain_option<P: Pathway>(
    world: &mut World,
    ctx: &SearchCtx<'_>,
    tile: TilePos,
    dir: DiagDir,
    exit: DiagDir,
) -> Option<PathOption> {
    let piece = P::piece(dir, exit)?;
    if ctx.banned.is_banned(tile, piece.choice_code()) || world.map.tile_height(tile) == 0 {
        return None;
    }
    let (reused, cost) = match query(world, ctx.company, P::build_command(tile, piece)) {
        Ok(cost) => (false, cost),
        Err(err) if P::can_reuse(&err) => (true, 0),
        Err(_) => return None,
    };
    Some(PathOption {
        piece,
        reused,
        next_tile: tile.step(exit),
        next_dir: exit,
        cost,
    })
}

/// Bridge starting on `tile` and heading `dir`, preferring the sturdiest
/// type that stays under the budget.
fn bridge_option<P: Pathway>(
    world: &mut World,
    ctx: &SearchCtx<'_>,
    tile: TilePos,
    dir: DiagDir,
) -> Option<PathOption> {
    if ctx.banned.is_banned(tile, 0x80) {
        return None;
    }
    let deck = world.bridge_ramp_level(tile, dir)?;
    if deck == 0 {
        return None;
    }
    let ahead = tile.step(dir);
    let blocked = matches!(
        world.map.kind(ahead),
        TileKind::Water | TileKind::Rail { .. } | TileKind::Road { .. }
    ) || world.map.max_corner_height(ahead) < deck;
    if !blocked {
        return None;
    }
    let end = (2..=MAX_BRIDGE_LENGTH)
        .map(|i| tile.step_n(dir, i))
        .take_while(|t| world.map.is_valid(*t))
        .find(|t| {
            world.map.kind(*t).is_clearable_ground()
                && world.bridge_ramp_level(*t, dir.reverse()) == Some(deck)
        })?;
    let ceiling = ctx.money >> 5;
    for kind in (0..BRIDGE_KINDS.len() as u8).rev() {
        let piece = Piece::Bridge { end, kind };
        if let Ok(cost) = query(world, ctx.company, build_command::<P>(tile, piece)) {
            if cost < ceiling {
                return Some(PathOption {
                    piece,
                    reused: false,
                    next_tile: end.step(dir),
                    next_dir: dir,
                    cost,
                });
            }
        }
    }
    None
}

fn tunnel_option<P: Pathway>(
    world: &mut World,
    ctx: &SearchCtx<'_>,
    tile: TilePos,
    dir: DiagDir,
) -> Option<PathOption> {
    if ctx.banned.is_banned(tile, 0x81) || world.map.slope(tile) != Slope::Inclined(dir) {
        return None;
    }
    if world.map.tile_height(tile) == 0 {
        return None;
    }
    let command = Command::BuildTunnel {
        start: tile,
        transport: P::TRANSPORT,
    };
    let outcome = world.execute(ctx.company, command, QUERY).ok()?;
    let end = outcome.end_tile?;
    if outcome.cost > ctx.money >> 4 {
        return None;
    }
    Some(PathOption {
        piece: Piece::Tunnel { end },
        reused: false,
        next_tile: end.step(dir),
        next_dir: dir,
        cost: outcome.cost,
    })
}

fn options<P: Pathway>(
    world: &mut World,
    ctx: &SearchCtx<'_>,
    tile: TilePos,
    dir: DiagDir,
) -> SmallVec<[PathOption; 5]> {
    let mut found = SmallVec::new();
    for exit in [dir, dir.rotate_ccw(), dir.rotate_cw()] {
        if let Some(option) = plain_option::<P>(world, ctx, tile, dir, exit) {
            found.push(option);
        }
    }
    found.extend(bridge_option::<P>(world, ctx, tile, dir));
    found.extend(tunnel_option::<P>(world, ctx, tile, dir));
    found
}

/// The piece that joins a cursor standing on the target tile to the other
/// end, if it can be built there.
fn closing_piece<P: Pathway>(
    world: &mut World,
    ctx: &SearchCtx<'_>,
    tile: TilePos,
    dir: DiagDir,
) -> Option<PathOption> {
    if dir == ctx.target.dir {
        return None;
    }
    let piece = P::piece(dir, ctx.target.dir.reverse())?;
    let (reused, cost) = match query(world, ctx.company, P::build_command(tile, piece)) {
        Ok(cost) => (false, cost),
        Err(err) if P::can_reuse(&err) => (true, 0),
        Err(_) => return None,
    };
    Some(PathOption {
        piece,
        reused,
        next_tile: tile,
        next_dir: dir,
        cost,
    })
}

fn explore<P: Pathway>(world: &mut World, ctx: &SearchCtx<'_>, tile: TilePos, dir: DiagDir, depth: u8) -> Probe {
    debug_assert!(depth <= MAX_DEPTH);
    if tile == ctx.target.tile {
        return match closing_piece::<P>(world, ctx, tile, dir) {
            Some(_) => Probe::reached(depth),
            None => Probe::NONE,
        };
    }
    if depth >= MAX_DEPTH {
        return Probe::closest(tile.manhattan(ctx.target.tile), depth);
    }
    options::<P>(world, ctx, tile, dir)
        .into_iter()
        .fold(Probe::NONE, |best, option| {
            best.best(explore::<P>(world, ctx, option.next_tile, option.next_dir, depth + 1))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Close(PathOption),
    Extend(PathOption, Probe),
}

/// Picks the next piece for `cursor`, or `None` when nothing can be built.
pub fn choose_step<P: Pathway>(
    world: &mut World,
    company: CompanyId,
    cursor: &LinkCursor,
    target: Target,
    banned: &BannedTiles,
) -> Option<Step> {
    let ctx = SearchCtx {
        company,
        target,
        banned,
        money: world.money(company),
    };
    if cursor.cur_tile == target.tile {
        return closing_piece::<P>(world, &ctx, cursor.cur_tile, cursor.cur_dir).map(Step::Close);
    }
    let mut best: Option<(PathOption, Probe)> = None;
    for option in options::<P>(world, &ctx, cursor.cur_tile, cursor.cur_dir) {
        let probe = explore::<P>(world, &ctx, option.next_tile, option.next_dir, 1);
        if probe.is_none() {
            continue;
        }
        if best.as_ref().is_none_or(|(_, b)| probe.beats(b)) {
            best = Some((option, probe));
        }
    }
    best.map(|(option, probe)| Step::Extend(option, probe))
}

pub fn is_looping(cursor: &LinkCursor) -> bool {
    cursor
        .trail
        .iter()
        .rev()
        .take(LOOP_LOOKBACK)
        .filter(|s| s.tile.max_distance(cursor.cur_tile) < LOOP_RADIUS)
        .count()
        > LOOP_LIMIT
}

// ---- link bookkeeping ----

/// Every (record, edge) → (record, edge) connection the route asks for.
pub fn link_jobs(records: &[BuildRecord]) -> Vec<(usize, u8, usize, u8)> {
    records
        .iter()
        .enumerate()
        .flat_map(|(idx, r)| {
            r.link_instructions()
                .map(move |l| (idx, l.own_edge, l.to_record as usize, l.to_edge))
        })
        .collect()
}

fn edge_cursor(records: &[BuildRecord], record: usize, edge: u8) -> Option<LinkCursor> {
    let Some(BlockMatch::Template { id, origin }) = records.get(record)?.matched else {
        return None;
    };
    let (tile, dir) = blocks::template(id)?.link_edge(origin, edge)?;
    Some(LinkCursor::new(tile, dir))
}

pub fn start_link(records: &[BuildRecord], index: u8) -> Option<LinkProgress> {
    let jobs = link_jobs(records);
    let &(from, from_edge, to, to_edge) = jobs.get(index as usize)?;
    Some(LinkProgress {
        link_index: index,
        a: edge_cursor(records, from, from_edge)?,
        b: edge_cursor(records, to, to_edge)?,
        advance_b: false,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkTurn {
    Continue(LinkProgress),
    Finished,
    TimedOut,
}

pub fn build_link<P: Pathway>(
    world: &mut World,
    company: CompanyId,
    ai: &mut PlayerAiState,
    mut progress: LinkProgress,
) -> LinkTurn {
    ai.timeout_counter = ai.timeout_counter.saturating_add(1);
    if ai.timeout_counter >= ROUTE_TIMEOUT {
        info!(company, transport = %P::TRANSPORT, "link building timed out");
        return LinkTurn::TimedOut;
    }

    let use_b = progress.advance_b;
    progress.advance_b = !use_b;
    let (cursor, other) = if use_b {
        (&mut progress.b, &progress.a)
    } else {
        (&mut progress.a, &progress.b)
    };
    let target = Target {
        tile: other.cur_tile,
        dir: other.cur_dir,
    };

    let closed = match cursor.mode {
        LinkMode::Construct => construct::<P>(world, company, ai, cursor, target),
        LinkMode::Destruct { remaining } => {
            destruct::<P>(world, company, cursor, remaining);
            false
        }
        LinkMode::Recover { ticks } => {
            for _ in 0..RECOVER_NUDGES {
                terraform::nudge(world, company, cursor.cur_tile, cursor.cur_dir, 3, 0, &mut ai.rng);
            }
            cursor.mode = if ticks + 1 >= RECOVER_TURNS {
                LinkMode::Construct
            } else {
                LinkMode::Recover { ticks: ticks + 1 }
            };
            false
        }
    };
    if !closed {
        return LinkTurn::Continue(progress);
    }

    info!(company, link = progress.link_index, "link complete");
    match start_link(&ai.records, progress.link_index + 1) {
        Some(next) => LinkTurn::Continue(next),
        None => LinkTurn::Finished,
    }
}

fn construct<P: Pathway>(
    world: &mut World,
    company: CompanyId,
    ai: &mut PlayerAiState,
    cursor: &mut LinkCursor,
    target: Target,
) -> bool {
    if is_looping(cursor) {
        if let Some(last) = cursor.trail.last() {
            ai.banned.ban(last.tile, last.piece.choice_code());
            debug!(company, tile = %last.tile, "link loops back on itself, backing off");
        }
        let remaining = 6 + 2 * ai.rng.gen_range(0..=7u8);
        cursor.mode = LinkMode::Destruct { remaining };
        return false;
    }

    match choose_step::<P>(world, company, cursor, target, &ai.banned) {
        Some(Step::Close(option)) => {
            if commit::<P>(world, company, cursor, option) {
                return true;
            }
            false
        }
        Some(Step::Extend(option, probe)) => {
            if commit::<P>(world, company, cursor, option) {
                trace!(company, tile = %cursor.cur_tile, ?probe, "link extended");
                cursor.fail_counter = 0;
                for _ in 0..2 {
                    terraform::nudge(world, company, cursor.cur_tile, cursor.cur_dir, 3, 0, &mut ai.rng);
                }
            }
            false
        }
        None => {
            for _ in 0..NO_OPTION_TERRAFORMS {
                terraform::nudge(world, company, cursor.cur_tile, cursor.cur_dir, 3, 0, &mut ai.rng);
            }
            cursor.fail_counter += 1;
            if cursor.fail_counter >= NO_OPTION_LIMIT {
                debug!(company, tile = %cursor.cur_tile, "no way forward, banning tile");
                ai.banned.ban(cursor.cur_tile, BannedTiles::ANY);
                cursor.fail_counter = 0;
                cursor.mode = LinkMode::Destruct {
                    remaining: STUCK_DESTRUCT,
                };
            }
            false
        }
    }
}

/// Builds the chosen piece for real and moves the cursor past it. An
/// unaffordable piece leaves everything as it was for the next turn.
fn commit<P: Pathway>(world: &mut World, company: CompanyId, cursor: &mut LinkCursor, option: PathOption) -> bool {
    let tile = cursor.cur_tile;
    if !option.reused {
        if let Err(err) = world.execute(company, build_command::<P>(tile, option.piece), EXEC) {
            trace!(company, %tile, %err, "piece not built");
            return false;
        }
    }
    cursor.trail.push(Segment {
        tile,
        dir: cursor.cur_dir,
        piece: option.piece,
        reused: option.reused,
    });
    cursor.cur_tile = option.next_tile;
    cursor.cur_dir = option.next_dir;
    true
}

fn destruct<P: Pathway>(world: &mut World, company: CompanyId, cursor: &mut LinkCursor, remaining: u8) {
    let mut remaining = remaining;
    for _ in 0..DESTRUCT_PER_TURN {
        if remaining == 0 {
            break;
        }
        let Some(segment) = cursor.trail.pop() else {
            break;
        };
        if !segment.reused {
            if let Err(err) = world.execute(company, remove_command::<P>(segment.tile, segment.piece), EXEC) {
                trace!(company, tile = %segment.tile, %err, "piece not removed");
            }
        }
        cursor.cur_tile = segment.tile;
        cursor.cur_dir = segment.dir;
        remaining -= 1;
    }
    cursor.mode = if remaining == 0 || cursor.at_start() {
        LinkMode::Recover { ticks: 0 }
    } else {
        LinkMode::Destruct { remaining }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::rail_path::Rail;
    use crate::game::config::GameConfig;
    use crate::map::Map;

    fn world() -> World {
        World::with_map(GameConfig::default(), Map::flat(48, 48, 2))
    }

    #[test]
    fn probe_ordering_prefers_reaching_then_distance() {
        let reached_deep = Probe::reached(3);
        let reached_shallow = Probe::reached(1);
        let near = Probe::closest(2, 4);
        let far = Probe::closest(9, 4);
        assert!(reached_shallow.beats(&reached_deep));
        assert!(reached_deep.beats(&near));
        assert!(near.beats(&far));
        assert!(far.beats(&Probe::NONE));
        assert!(!Probe::NONE.beats(&far));
    }

    #[test]
    fn search_heads_straight_for_the_target() {
        let mut w = world();
        let cursor = LinkCursor::new(TilePos::new(10, 20), DiagDir::SouthWest);
        let target = Target {
            tile: TilePos::new(30, 20),
            dir: DiagDir::NorthEast,
        };
        let banned = BannedTiles::default();
        let Some(Step::Extend(option, _)) = choose_step::<Rail>(&mut w, 0, &cursor, target, &banned) else {
            panic!("expected a step");
        };
        assert_eq!(option.piece, Piece::Rail(crate::types::Track::X));
        assert_eq!(option.next_tile, TilePos::new(11, 20));
        assert_eq!(w.map.kind(TilePos::new(10, 20)), TileKind::Clear);
    }

    #[test]
    fn water_is_crossed_by_the_cheapest_affordable_bridge() {
        let mut w = world();
        for y in 0..48 {
            for x in 20..23 {
                w.map.set_kind(TilePos::new(x, y), TileKind::Water);
            }
        }
        let cursor = LinkCursor::new(TilePos::new(19, 20), DiagDir::SouthWest);
        let target = Target {
            tile: TilePos::new(40, 20),
            dir: DiagDir::NorthEast,
        };
        let banned = BannedTiles::default();
        let Some(Step::Extend(option, _)) = choose_step::<Rail>(&mut w, 0, &cursor, target, &banned) else {
            panic!("expected a step");
        };
        assert_eq!(
            option.piece,
            Piece::Bridge {
                end: TilePos::new(23, 20),
                kind: 0
            }
        );
        assert_eq!(option.next_tile, TilePos::new(24, 20));
    }

    #[test]
    fn the_other_end_is_seen_only_within_the_depth_limit() {
        let mut w = world();
        let cursor = LinkCursor::new(TilePos::new(10, 20), DiagDir::SouthWest);
        let banned = BannedTiles::default();
        let at = |x| Target {
            tile: TilePos::new(x, 20),
            dir: DiagDir::NorthEast,
        };
        let horizon = 10 + MAX_DEPTH as i32;

        let Some(Step::Extend(_, probe)) = choose_step::<Rail>(&mut w, 0, &cursor, at(horizon), &banned) else {
            panic!("expected a step");
        };
        assert_eq!(probe.reached, Some(MAX_DEPTH));

        let Some(Step::Extend(_, probe)) = choose_step::<Rail>(&mut w, 0, &cursor, at(horizon + 1), &banned) else {
            panic!("expected a step");
        };
        assert_eq!(probe.reached, None);
        assert_eq!(probe.closest, Some((1, MAX_DEPTH)));
    }

    #[test]
    fn search_stays_bounded_on_rough_ground() {
        use rand::SeedableRng;

        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let mut w = World::with_map(GameConfig::default(), Map::generate(48, 48, &mut rng));
        for y in (2..46).step_by(3) {
            for x in (2..46).step_by(4) {
                w.map.set_kind(TilePos::new(x, y), TileKind::Water);
            }
        }
        let banned = BannedTiles::default();
        let kinds = |w: &World| -> Vec<TileKind> {
            (0..w.map.num_tiles())
                .map(|i| w.map.kind(w.map.tile_at_index(i)))
                .collect()
        };
        let before = kinds(&w);
        for (x, y) in [(5, 5), (20, 20), (30, 8), (12, 40), (40, 40)] {
            for dir in DiagDir::ALL {
                let cursor = LinkCursor::new(TilePos::new(x, y), dir);
                let target = Target {
                    tile: TilePos::new(47 - x, 47 - y),
                    dir: dir.reverse(),
                };
                if let Some(Step::Extend(_, probe)) = choose_step::<Rail>(&mut w, 0, &cursor, target, &banned) {
                    assert!(probe.reached.is_none_or(|d| d <= MAX_DEPTH), "{probe:?}");
                    assert!(probe.closest.is_none_or(|(_, d)| d == MAX_DEPTH), "{probe:?}");
                }
            }
        }
        assert_eq!(kinds(&w), before, "searching built something");
    }

    #[test]
    fn meeting_head_on_closes_the_link() {
        let mut w = world();
        let cursor = LinkCursor::new(TilePos::new(10, 20), DiagDir::SouthWest);
        let target = Target {
            tile: TilePos::new(10, 20),
            dir: DiagDir::NorthEast,
        };
        let banned = BannedTiles::default();
        assert!(matches!(
            choose_step::<Rail>(&mut w, 0, &cursor, target, &banned),
            Some(Step::Close(_))
        ));
        let same_way = Target {
            tile: TilePos::new(10, 20),
            dir: DiagDir::SouthWest,
        };
        assert_eq!(choose_step::<Rail>(&mut w, 0, &cursor, same_way, &banned), None);
    }

    #[test]
    fn banned_choices_are_skipped() {
        let mut w = world();
        let cursor = LinkCursor::new(TilePos::new(10, 20), DiagDir::SouthWest);
        let target = Target {
            tile: TilePos::new(30, 20),
            dir: DiagDir::NorthEast,
        };
        let mut banned = BannedTiles::default();
        banned.ban(TilePos::new(10, 20), BannedTiles::ANY);
        assert_eq!(choose_step::<Rail>(&mut w, 0, &cursor, target, &banned), None);
    }

    #[test]
    fn curled_trail_counts_as_a_loop() {
        let mut cursor = LinkCursor::new(TilePos::new(10, 10), DiagDir::SouthWest);
        let ring = [
            (10, 10),
            (11, 10),
            (12, 10),
            (12, 11),
            (12, 12),
            (11, 12),
            (10, 12),
            (10, 11),
            (10, 10),
            (11, 10),
        ];
        for (x, y) in ring {
            cursor.trail.push(Segment {
                tile: TilePos::new(x, y),
                dir: DiagDir::SouthWest,
                piece: Piece::Rail(crate::types::Track::X),
                reused: false,
            });
        }
        cursor.cur_tile = TilePos::new(11, 11);
        assert!(is_looping(&cursor));

        let mut straight = LinkCursor::new(TilePos::new(10, 10), DiagDir::SouthWest);
        for x in 10..30 {
            straight.trail.push(Segment {
                tile: TilePos::new(x, 10),
                dir: DiagDir::SouthWest,
                piece: Piece::Rail(crate::types::Track::X),
                reused: false,
            });
        }
        straight.cur_tile = TilePos::new(30, 10);
        assert!(!is_looping(&straight));
    }

    #[test]
    fn destruct_undoes_exactly_what_was_built() {
        let mut w = world();
        let mut cursor = LinkCursor::new(TilePos::new(10, 20), DiagDir::SouthWest);
        let target = Target {
            tile: TilePos::new(30, 20),
            dir: DiagDir::NorthEast,
        };
        let banned = BannedTiles::default();
        for _ in 0..3 {
            let Some(Step::Extend(option, _)) = choose_step::<Rail>(&mut w, 0, &cursor, target, &banned) else {
                panic!("expected a step");
            };
            assert!(commit::<Rail>(&mut w, 0, &mut cursor, option));
        }
        assert_eq!(cursor.trail.len(), 3);
        destruct::<Rail>(&mut w, 0, &mut cursor, 10);
        assert!(cursor.at_start());
        assert_eq!(cursor.cur_tile, TilePos::new(10, 20));
        assert_eq!(cursor.mode, LinkMode::Recover { ticks: 0 });
        for x in 10..13 {
            assert_eq!(w.map.kind(TilePos::new(x, 20)), TileKind::Clear);
        }
    }
}
