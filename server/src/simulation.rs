//! One tick of movement, trail laying, collisions and territory capture.
//!
//! Players are processed in ascending id order. A player killed earlier in the
//! tick does not move; every dead player is swept off the board at the end.

use crate::board::{FLAG_OUTSIDE, FLAG_QUEUED};
use crate::game::BoardMut;
use log::{debug, warn};
use shared::{is_player, Direction, PlayerId, TrailType, UNOCCUPIED};

/// What happened during one call to [`advance`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    /// Players removed this tick with their final score.
    pub deaths: Vec<(PlayerId, u32)>,
    /// A player owning every cell of the board.
    pub winner: Option<PlayerId>,
    /// No player is left on the board.
    pub empty: bool,
}

/// Direction a player actually moves this tick.
///
/// Freshly spawned players stay put for `grace` ticks. A reversal, or no
/// request at all, keeps the previous heading.
pub fn resolve_direction(
    requested: Direction,
    last: Direction,
    ticks_alive: u32,
    grace: u32,
) -> Direction {
    if ticks_alive < grace {
        return Direction::None;
    }
    if requested == Direction::None {
        return last;
    }
    if last != Direction::None && requested == last.opposite() {
        return last;
    }
    requested
}

/// Runs one simulation pass over every living player, then sweeps the dead.
pub fn advance<B: BoardMut>(view: &mut B, grace: u32) -> TickOutcome {
    let tick = view.tick();
    for id in view.player_ids() {
        step_player(view, id, tick, grace);
    }

    let deaths = sweep_dead(view);
    let total = view.total_cells();
    let ids = view.player_ids();
    let winner = ids
        .iter()
        .copied()
        .find(|&id| view.player(id).is_some_and(|p| p.score == total));

    TickOutcome {
        deaths,
        winner,
        empty: ids.is_empty(),
    }
}

fn kill<B: BoardMut>(view: &mut B, id: PlayerId) {
    if let Some(player) = view.player_mut(id) {
        if player.alive {
            debug!("Player {} died", id);
        }
        player.alive = false;
    }
}

fn step_player<B: BoardMut>(view: &mut B, id: PlayerId, tick: u32, grace: u32) {
    let Some(player) = view.player(id) else {
        warn!("Player {} vanished mid-tick", id);
        return;
    };
    if !player.alive {
        return;
    }
    let (x, y) = player.position();
    let last = player.last_direction;
    let dir = resolve_direction(
        player.requested_direction(),
        last,
        tick.wrapping_sub(player.spawn_tick),
        grace,
    );
    if dir == Direction::None {
        return;
    }

    // Trail under the player, unless standing on home territory.
    if view.cell(x, y).owner() != id {
        view.set_trail_owner(x, y, id);
        view.set_trail_type(x, y, TrailType::between(last, dir));
        if let Some(player) = view.player_mut(id) {
            player.trail_len += 1;
        }
    }

    let (dx, dy) = dir.offset();
    let (nx, ny) = (x + dx, y + dy);
    if !view.in_bounds(nx, ny) {
        kill(view, id);
        return;
    }

    let dest = view.cell(nx, ny);
    let blocker = dest.occupant();
    if is_player(blocker) && blocker != id && view.player(blocker).is_some_and(|p| p.alive) {
        if dest.owner() == id {
            kill(view, blocker);
        } else {
            kill(view, id);
            return;
        }
    }

    view.set_occupant(x, y, UNOCCUPIED);
    view.set_direction(x, y, Direction::None);
    view.set_occupant(nx, ny, id);
    view.set_direction(nx, ny, dir);
    if let Some(player) = view.player_mut(id) {
        player.x = nx;
        player.y = ny;
        player.last_direction = dir;
    }

    let trail_owner = dest.trail_owner();
    if trail_owner == id {
        kill(view, id);
        return;
    }
    if is_player(trail_owner) {
        kill(view, trail_owner);
    }

    let trailing = view.player(id).is_some_and(|p| p.trail_len > 0);
    if dest.owner() == id && trailing {
        capture(view, id);
    }
}

/// Flood fills from the padding ring and hands every cell the fill cannot
/// reach to `id`. Returns how many cells changed owner.
///
/// Cells owned by `id` or carrying its trail are walls. Previous owners of
/// captured cells lose a point each, and `id`'s own trail inside the
/// captured area is cleared.
pub fn capture<B: BoardMut>(view: &mut B, id: PlayerId) -> u32 {
    let (width, height) = (view.width(), view.height());
    let passable = |view: &B, x: i32, y: i32| {
        if !view.in_bounds(x, y) {
            return true;
        }
        let cell = view.cell(x, y);
        cell.owner() != id && cell.trail_owner() != id
    };

    let mut stack = vec![(-1, -1)];
    view.set_flags(-1, -1, FLAG_QUEUED);
    while let Some((x, y)) = stack.pop() {
        view.set_flags(x, y, FLAG_OUTSIDE);
        for dir in Direction::ALL {
            let (dx, dy) = dir.offset();
            let (nx, ny) = (x + dx, y + dy);
            if nx < -1 || ny < -1 || nx > width || ny > height {
                continue;
            }
            if view.flags(nx, ny) & FLAG_QUEUED != 0 || !passable(view, nx, ny) {
                continue;
            }
            view.set_flags(nx, ny, FLAG_QUEUED);
            stack.push((nx, ny));
        }
    }

    let mut captured = 0;
    for y in 0..height {
        for x in 0..width {
            if view.flags(x, y) & FLAG_OUTSIDE != 0 {
                continue;
            }
            let cell = view.cell(x, y);
            if cell.trail_owner() == id {
                view.set_trail_owner(x, y, UNOCCUPIED);
                view.set_trail_type(x, y, TrailType::None);
            }
            let previous = cell.owner();
            if previous == id {
                continue;
            }
            if is_player(previous) {
                if let Some(loser) = view.player_mut(previous) {
                    loser.score = loser.score.saturating_sub(1);
                }
            }
            view.set_owner(x, y, id);
            captured += 1;
        }
    }
    view.clear_flags();

    if let Some(player) = view.player_mut(id) {
        player.score += captured;
        player.trail_len = 0;
    }
    captured
}

/// Clears every board field naming a dead player, then removes those players.
fn sweep_dead<B: BoardMut>(view: &mut B) -> Vec<(PlayerId, u32)> {
    let dead: Vec<PlayerId> = view
        .player_ids()
        .into_iter()
        .filter(|&id| view.player(id).is_some_and(|p| !p.alive))
        .collect();
    if dead.is_empty() {
        return Vec::new();
    }

    for y in 0..view.height() {
        for x in 0..view.width() {
            let cell = view.cell(x, y);
            if dead.contains(&cell.trail_owner()) {
                view.set_trail_owner(x, y, UNOCCUPIED);
                view.set_trail_type(x, y, TrailType::None);
            }
            if dead.contains(&cell.owner()) {
                view.set_owner(x, y, UNOCCUPIED);
            }
            if dead.contains(&cell.occupant()) {
                view.set_occupant(x, y, UNOCCUPIED);
                view.set_direction(x, y, Direction::None);
            }
        }
    }

    dead.into_iter()
        .filter_map(|id| view.remove_player(id).map(|p| (id, p.score)))
        .collect()
}
