//! Heuristic controller for AI players.
//!
//! Each tick an AI scores going straight, left and right with a shallow
//! recursive look-ahead and requests the best one. The scoring rewards cutting
//! opponents' trails, closing loops once the trail reaches a comfortable
//! length, leaving home territory, and staying near home while trailing.

use crate::game::BoardView;
use shared::{is_player, Direction, PlayerId};
use std::collections::{HashMap, VecDeque};

/// Look-ahead depth of [`assess`].
pub const SEARCH_DEPTH: u32 = 6;
/// Distance search stops this many steps away from home territory.
pub const DISTANCE_RADIUS: u32 = 15;

const TRAIL_BONUS: f64 = 10_000.0;
const TARGET_TRAIL: f64 = 12.0;
const SHORT_TRAIL_SPREAD: f64 = 4.0;
const LONG_TRAIL_SPREAD: f64 = 8.0;
const RETURN_BONUS: f64 = 1_000.0;
const LEAVE_BONUS: f64 = 250.0;
const HOME_PULL: f64 = 20.0;
const STRAIGHT_WEIGHT: f64 = 0.2;
const TURN_WEIGHT: f64 = 0.25;

/// Steps from each cell to the nearest cell owned by one player, up to
/// [`DISTANCE_RADIUS`].
#[derive(Debug, Clone)]
pub struct DistanceField {
    tick: u32,
    width: i32,
    height: i32,
    steps: Vec<u32>,
}

impl DistanceField {
    pub fn compute<B: BoardView>(view: &B, id: PlayerId) -> Self {
        let (width, height) = (view.width(), view.height());
        let mut steps = vec![u32::MAX; (width * height).max(0) as usize];
        let mut queue = VecDeque::new();
        for y in 0..height {
            for x in 0..width {
                if view.cell(x, y).owner() == id {
                    steps[(y * width + x) as usize] = 0;
                    queue.push_back((x, y));
                }
            }
        }

        while let Some((x, y)) = queue.pop_front() {
            let here = steps[(y * width + x) as usize];
            if here >= DISTANCE_RADIUS {
                continue;
            }
            for dir in Direction::ALL {
                let (dx, dy) = dir.offset();
                let (nx, ny) = (x + dx, y + dy);
                if !view.in_bounds(nx, ny) {
                    continue;
                }
                let slot = &mut steps[(ny * width + nx) as usize];
                if *slot == u32::MAX {
                    *slot = here + 1;
                    queue.push_back((nx, ny));
                }
            }
        }

        Self {
            tick: view.tick(),
            width,
            height,
            steps,
        }
    }

    /// Steps to home, `None` when farther than the search radius or off the board.
    pub fn get(&self, x: i32, y: i32) -> Option<u32> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        match self.steps[(y * self.width + x) as usize] {
            u32::MAX => None,
            steps => Some(steps),
        }
    }
}

/// Score of moving onto `(x, y)` heading `dir` with `trail_len` trail cells
/// already laid. Zero means the move is fatal.
pub fn assess<B: BoardView>(
    view: &B,
    field: &DistanceField,
    id: PlayerId,
    dir: Direction,
    (x, y): (i32, i32),
    trail_len: u32,
    depth: u32,
) -> f64 {
    let cell = view.cell(x, y);
    if cell.is_out_of_bounds() || cell.trail_owner() == id {
        return 0.0;
    }

    let mut score = 0.0;
    let trail = cell.trail_owner();
    if is_player(trail) {
        score += TRAIL_BONUS;
    }

    let mut trail_len = trail_len;
    if cell.owner() == id {
        score *= 2.0;
        if trail_len > 0 {
            let offset = f64::from(trail_len) - TARGET_TRAIL;
            let spread = if offset < 0.0 {
                SHORT_TRAIL_SPREAD
            } else {
                LONG_TRAIL_SPREAD
            };
            let closeness = (offset / spread).powi(2);
            return score + (-closeness).exp() * RETURN_BONUS;
        }
    } else {
        trail_len += 1;
        let tl = f64::from(trail_len);
        score += (-(tl * tl)).exp() * LEAVE_BONUS;
        let steps = field.get(x, y).unwrap_or(DISTANCE_RADIUS + 1);
        score += HOME_PULL * tl / f64::from(1 + steps);
    }

    if depth > 0 {
        let branches = [
            (dir, STRAIGHT_WEIGHT),
            (dir.turn_left(), TURN_WEIGHT),
            (dir.turn_right(), TURN_WEIGHT),
        ];
        for (next, weight) in branches {
            let (dx, dy) = next.offset();
            score += weight * assess(view, field, id, next, (x + dx, y + dy), trail_len, depth - 1);
        }
    }
    score
}

/// Per-session AI state: one cached distance field per AI player.
#[derive(Debug, Default)]
pub struct AiController {
    fields: HashMap<PlayerId, DistanceField>,
}

impl AiController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops cached state of a removed player.
    pub fn forget(&mut self, id: PlayerId) {
        self.fields.remove(&id);
    }

    fn field<B: BoardView>(&mut self, view: &B, id: PlayerId) -> &DistanceField {
        let tick = view.tick();
        let stale = self.fields.get(&id).map_or(true, |f| f.tick != tick);
        if stale {
            self.fields.insert(id, DistanceField::compute(view, id));
        }
        &self.fields[&id]
    }

    /// Best direction for `id`, or `None` if it is not a living player.
    ///
    /// A moving AI considers straight, left and right; a stationary one all
    /// four directions. Ties go to the first candidate, so straight beats an
    /// equally scored turn.
    pub fn choose_direction<B: BoardView>(&mut self, view: &B, id: PlayerId) -> Option<Direction> {
        let player = view.player(id).filter(|p| p.alive)?;
        let (x, y) = player.position();
        let last = player.last_direction;
        let trail_len = player.trail_len;

        let candidates: Vec<Direction> = if last == Direction::None {
            Direction::ALL.to_vec()
        } else {
            vec![last, last.turn_left(), last.turn_right()]
        };

        let field = self.field(view, id);
        let mut best: Option<(Direction, f64)> = None;
        for dir in candidates {
            let (dx, dy) = dir.offset();
            let score = assess(view, field, id, dir, (x + dx, y + dy), trail_len, SEARCH_DEPTH);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((dir, score));
            }
        }
        best.map(|(dir, _)| dir)
    }
}
