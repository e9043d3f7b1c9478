//! Autopilot for the headless client.
//!
//! Steers the local player from the synced window alone. It runs the same
//! straight/left/right look-ahead and weights as the server's AI players, but
//! measures the distance home inside the 31×31 window instead of the board.

use crate::game::{ClientGameState, ViewSnapshot};
use crate::input::DirectionSink;
use log::{debug, info};
use shared::{is_player, Cell, Direction, VIEW_RADIUS, VIEW_SIZE, WINDOW_CELLS};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};

/// Look-ahead depth of [`assess`]. Keeps every visited cell inside the window.
pub const SEARCH_DEPTH: u32 = 6;
/// Distances home beyond this many steps count as "far".
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

fn index(dx: i32, dy: i32) -> Option<usize> {
    let size = VIEW_SIZE as i32;
    let (x, y) = (dx + VIEW_RADIUS, dy + VIEW_RADIUS);
    (x >= 0 && y >= 0 && x < size && y < size).then(|| (y * size + x) as usize)
}

/// Steps from each window cell to the nearest visible cell the player owns.
#[derive(Debug, Clone)]
pub struct HomeSteps {
    steps: Vec<u32>,
}

impl HomeSteps {
    pub fn compute(view: &ViewSnapshot<'_>) -> Self {
        let mut steps = vec![u32::MAX; WINDOW_CELLS];
        let mut queue = VecDeque::new();
        for dy in -VIEW_RADIUS..=VIEW_RADIUS {
            for dx in -VIEW_RADIUS..=VIEW_RADIUS {
                let home = view
                    .relative(dx, dy)
                    .is_some_and(|cell| cell.owner() == view.player_id);
                if let (true, Some(i)) = (home, index(dx, dy)) {
                    steps[i] = 0;
                    queue.push_back((dx, dy));
                }
            }
        }

        while let Some((x, y)) = queue.pop_front() {
            let Some(here) = index(x, y).map(|i| steps[i]) else {
                continue;
            };
            if here >= DISTANCE_RADIUS {
                continue;
            }
            for dir in Direction::ALL {
                let (ox, oy) = dir.offset();
                let (nx, ny) = (x + ox, y + oy);
                let open = view
                    .relative(nx, ny)
                    .is_some_and(|cell| !cell.is_out_of_bounds());
                let Some(i) = index(nx, ny).filter(|_| open) else {
                    continue;
                };
                if steps[i] == u32::MAX {
                    steps[i] = here + 1;
                    queue.push_back((nx, ny));
                }
            }
        }
        Self { steps }
    }

    /// Steps home from an offset, `None` when farther than [`DISTANCE_RADIUS`].
    pub fn get(&self, dx: i32, dy: i32) -> Option<u32> {
        match self.steps[index(dx, dy)?] {
            u32::MAX => None,
            steps => Some(steps),
        }
    }
}

/// Score of moving onto offset `(dx, dy)` heading `dir` with `trail_len`
/// trail cells already laid. Zero means the move is fatal or leaves the window.
pub fn assess(
    view: &ViewSnapshot<'_>,
    home: &HomeSteps,
    dir: Direction,
    (dx, dy): (i32, i32),
    trail_len: u32,
    depth: u32,
) -> f64 {
    let me = view.player_id;
    let Some(cell) = view.relative(dx, dy) else {
        return 0.0;
    };
    if cell.is_out_of_bounds() || cell.trail_owner() == me {
        return 0.0;
    }

    let mut score = 0.0;
    if is_player(cell.trail_owner()) {
        score += TRAIL_BONUS;
    }

    let mut trail_len = trail_len;
    if cell.owner() == me {
        score *= 2.0;
        if trail_len > 0 {
            let offset = f64::from(trail_len) - TARGET_TRAIL;
            let spread = if offset < 0.0 {
                SHORT_TRAIL_SPREAD
            } else {
                LONG_TRAIL_SPREAD
            };
            return score + (-(offset / spread).powi(2)).exp() * RETURN_BONUS;
        }
    } else {
        trail_len += 1;
        let tl = f64::from(trail_len);
        score += (-(tl * tl)).exp() * LEAVE_BONUS;
        let steps = home.get(dx, dy).unwrap_or(DISTANCE_RADIUS + 1);
        score += HOME_PULL * tl / f64::from(1 + steps);
    }

    if depth > 0 {
        let branches = [
            (dir, STRAIGHT_WEIGHT),
            (dir.turn_left(), TURN_WEIGHT),
            (dir.turn_right(), TURN_WEIGHT),
        ];
        for (next, weight) in branches {
            let (ox, oy) = next.offset();
            score += weight * assess(view, home, next, (dx + ox, dy + oy), trail_len, depth - 1);
        }
    }
    score
}

/// Own trail cells visible in the window.
fn visible_trail(view: &ViewSnapshot<'_>) -> u32 {
    view.window
        .cells()
        .iter()
        .filter(|&&bits| Cell::from_bits(bits).trail_owner() == view.player_id)
        .count() as u32
}

/// Best direction for the view. A moving player never reverses; ties keep
/// the current heading.
pub fn choose_direction(view: &ViewSnapshot<'_>) -> Direction {
    let heading = view.heading;
    let candidates: Vec<Direction> = if heading == Direction::None {
        Direction::ALL.to_vec()
    } else {
        vec![heading, heading.turn_left(), heading.turn_right()]
    };

    let home = HomeSteps::compute(view);
    let trail_len = visible_trail(view);
    let mut best: Option<(Direction, f64)> = None;
    for dir in candidates {
        let score = assess(view, &home, dir, dir.offset(), trail_len, SEARCH_DEPTH);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((dir, score));
        }
    }
    best.map_or(heading, |(dir, _)| dir)
}

/// Picks one direction per tick.
#[derive(Debug, Default)]
pub struct Autopilot {
    last_tick: Option<u32>,
}

impl Autopilot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direction for this view, or `None` if its tick was already handled.
    pub fn steer(&mut self, view: &ViewSnapshot<'_>) -> Option<Direction> {
        if self.last_tick == Some(view.tick) {
            return None;
        }
        self.last_tick = Some(view.tick);
        Some(choose_direction(view))
    }
}

/// Polls the client state and steers on every new tick until the network
/// loop is gone.
pub async fn run(state: Arc<RwLock<ClientGameState>>, sink: DirectionSink, poll: Duration) {
    info!("Autopilot engaged");
    let mut pilot = Autopilot::new();
    let mut timer = interval(poll);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while !sink.is_closed() {
        timer.tick().await;
        let choice = {
            let state = state.read().await;
            state.snapshot().and_then(|view| pilot.steer(&view))
        };
        if let Some(dir) = choice {
            debug!("Autopilot steers {:?}", dir);
            if !sink.steer(dir) {
                break;
            }
        }
    }
    debug!("Autopilot stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Intent;
    use shared::{
        checksum, GameJoin, LeaderboardUpdate, Packet, PlayerId, PlayersUpdate, ResendBoard,
        Window, LEADERBOARD_SIZE, OUT_OF_BOUNDS_STATE,
    };
    use std::collections::BTreeMap;

    const ME: PlayerId = 3;
    const OTHER: PlayerId = 7;

    fn at(dx: i32, dy: i32) -> usize {
        index(dx, dy).unwrap()
    }

    /// Window with the player in the middle of a 3×3 home patch.
    fn home_cells() -> Vec<u32> {
        let mut cells = vec![0u32; WINDOW_CELLS];
        for dy in -1..=1 {
            for dx in -1..=1 {
                cells[at(dx, dy)] = u32::from(ME) << 24;
            }
        }
        cells[at(0, 0)] |= u32::from(ME) << 16;
        cells
    }

    struct Fixture {
        window: Window,
        names: BTreeMap<PlayerId, String>,
        leaderboard: [(PlayerId, u32); LEADERBOARD_SIZE],
    }

    impl Fixture {
        fn new(cells: Vec<u32>) -> Self {
            Self {
                window: Window::from_cells(cells).unwrap(),
                names: BTreeMap::new(),
                leaderboard: [(0, 0); LEADERBOARD_SIZE],
            }
        }

        fn view(&self, tick: u32, heading: Direction) -> ViewSnapshot<'_> {
            ViewSnapshot {
                tick,
                player_id: ME,
                heading,
                score: 9,
                total_cells: 900,
                window: &self.window,
                names: &self.names,
                leaderboard: &self.leaderboard,
            }
        }
    }

    #[test]
    fn test_home_steps_count_from_owned_cells() {
        let mut cells = vec![0u32; WINDOW_CELLS];
        cells[at(-VIEW_RADIUS, 0)] = u32::from(ME) << 24;
        let fixture = Fixture::new(cells);
        let home = HomeSteps::compute(&fixture.view(1, Direction::None));
        assert_eq!(home.get(-VIEW_RADIUS, 0), Some(0));
        assert_eq!(home.get(-12, 0), Some(3));
        assert_eq!(home.get(0, 0), Some(DISTANCE_RADIUS));
        assert_eq!(home.get(1, 0), None);
        assert_eq!(home.get(0, -16), None);
    }

    #[test]
    fn test_never_steps_off_the_board() {
        let mut cells = home_cells();
        for dy in -VIEW_RADIUS..=VIEW_RADIUS {
            for dx in 1..=VIEW_RADIUS {
                cells[at(dx, dy)] = OUT_OF_BOUNDS_STATE;
            }
        }
        let fixture = Fixture::new(cells);
        let view = fixture.view(1, Direction::Right);
        let home = HomeSteps::compute(&view);
        assert_eq!(assess(&view, &home, Direction::Right, (1, 0), 0, 3), 0.0);
        assert_ne!(choose_direction(&view), Direction::Right);
    }

    #[test]
    fn test_ties_keep_heading_straight() {
        let mut cells = home_cells();
        for (dx, dy) in [(1, 0), (0, -1), (0, 1)] {
            cells[at(dx, dy)] |= u32::from(ME) << 8;
        }
        let fixture = Fixture::new(cells);
        assert_eq!(
            choose_direction(&fixture.view(1, Direction::Right)),
            Direction::Right
        );
    }

    #[test]
    fn test_opponent_trail_attracts() {
        let mut cells = home_cells();
        cells[at(0, -1)] |= u32::from(OTHER) << 8;
        let fixture = Fixture::new(cells);
        assert_eq!(
            choose_direction(&fixture.view(1, Direction::Right)),
            Direction::Up
        );
    }

    #[test]
    fn test_never_reverses() {
        let mut cells = home_cells();
        cells[at(-1, 0)] |= u32::from(OTHER) << 8;
        let fixture = Fixture::new(cells);
        assert_ne!(
            choose_direction(&fixture.view(1, Direction::Right)),
            Direction::Left
        );
    }

    #[test]
    fn test_steers_once_per_tick() {
        let fixture = Fixture::new(home_cells());
        let mut pilot = Autopilot::new();
        assert!(pilot.steer(&fixture.view(4, Direction::Up)).is_some());
        assert_eq!(pilot.steer(&fixture.view(4, Direction::Up)), None);
        assert!(pilot.steer(&fixture.view(5, Direction::Up)).is_some());
    }

    #[tokio::test]
    async fn test_run_steers_until_sink_closes() {
        let cells = home_cells();
        let mut names = BTreeMap::new();
        names.insert(ME, "ada".to_string());
        let mut game = ClientGameState::new();
        let join = Packet::GameJoin(GameJoin {
            player_id: ME,
            score: 9,
            total_cells: 900,
            tick_rate: 10,
            players: PlayersUpdate { tick: 1, names },
            leaderboard: LeaderboardUpdate {
                tick: 1,
                entries: [(ME, 9), (0, 0), (0, 0), (0, 0), (0, 0)],
            },
            board: ResendBoard {
                tick: 1,
                checksum: checksum(&cells),
                cells,
            },
        });
        assert_eq!(game.apply(join), None);

        let state = Arc::new(RwLock::new(game));
        let (sink, mut intents) = DirectionSink::channel();
        let task = tokio::spawn(run(state, sink, Duration::from_millis(5)));

        match tokio::time::timeout(Duration::from_secs(2), intents.recv()).await {
            Ok(Some(Intent::Steer(dir))) => assert_ne!(dir, Direction::None),
            other => panic!("expected a steer intent, got {:?}", other),
        }
        drop(intents);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
