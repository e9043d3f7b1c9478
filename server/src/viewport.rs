//! Per-connection encoder for viewport updates.
//!
//! A [`ViewportSync`] remembers what the client was last sent. When the client
//! is known to hold the previous tick's window centred one step behind the
//! player, it gets an incremental GAME_TICK; otherwise a full RESEND_BOARD.

use crate::game::BoardView;
use log::debug;
use shared::{
    checksum, edge_positions, rle_encode, Direction, GameTick, Packet, PlayerId, ResendBoard,
    VIEW_RADIUS, WINDOW_CELLS,
};
use std::collections::VecDeque;

/// Number of `(tick, checksum)` pairs kept for client reports.
pub const CHECKSUM_HISTORY: usize = 32;

/// Cell words of the window centred on `(cx, cy)`, row major.
pub fn extract_window<B: BoardView>(view: &B, cx: i32, cy: i32) -> Vec<u32> {
    let mut cells = Vec::with_capacity(WINDOW_CELLS);
    for y in cy - VIEW_RADIUS..=cy + VIEW_RADIUS {
        for x in cx - VIEW_RADIUS..=cx + VIEW_RADIUS {
            cells.push(view.cell(x, y).bits());
        }
    }
    cells
}

/// This tick's diff restricted to the window centred on `(cx, cy)`.
pub fn extract_diff<B: BoardView>(view: &B, cx: i32, cy: i32) -> Vec<u32> {
    let mut diff = Vec::with_capacity(WINDOW_CELLS);
    for y in cy - VIEW_RADIUS..=cy + VIEW_RADIUS {
        for x in cx - VIEW_RADIUS..=cx + VIEW_RADIUS {
            diff.push(view.diff(x, y));
        }
    }
    diff
}

#[derive(Debug)]
pub struct ViewportSync {
    last_tick: Option<u32>,
    center: Option<(i32, i32)>,
    resync: bool,
    history: VecDeque<(u32, u64)>,
}

impl Default for ViewportSync {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewportSync {
    pub fn new() -> Self {
        Self {
            last_tick: None,
            center: None,
            resync: true,
            history: VecDeque::with_capacity(CHECKSUM_HISTORY),
        }
    }

    /// Forgets the client's window; the next packet is a full resend.
    pub fn request_resync(&mut self) {
        self.resync = true;
    }

    /// Compares a client's checksum with ours. Returns `true` when a resend
    /// was scheduled: on a mismatch, or for a tick no longer in the history,
    /// since the client has dropped its window either way.
    pub fn report_checksum(&mut self, tick: u32, reported: u64) -> bool {
        let Some(&(_, ours)) = self.history.iter().find(|(t, _)| *t == tick) else {
            debug!("Checksum report for tick {} outside history, resending", tick);
            self.resync = true;
            return true;
        };
        if ours != reported {
            self.resync = true;
            return true;
        }
        false
    }

    fn remember(&mut self, tick: u32, center: (i32, i32), sum: u64) {
        if self.history.len() == CHECKSUM_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back((tick, sum));
        self.last_tick = Some(tick);
        self.center = Some(center);
        self.resync = false;
    }

    /// Full window dump for `id`'s current position.
    pub fn full_window<B: BoardView>(&mut self, view: &B, id: PlayerId) -> Option<ResendBoard> {
        let player = view.player(id)?;
        let center = player.position();
        let cells = extract_window(view, center.0, center.1);
        let sum = checksum(&cells);
        let tick = view.tick();
        self.remember(tick, center, sum);
        Some(ResendBoard {
            tick,
            cells,
            checksum: sum,
        })
    }

    /// Direction that turns the last sent centre into `center`, if the client
    /// can follow incrementally.
    fn step_from_last(&self, tick: u32, center: (i32, i32)) -> Option<Direction> {
        if self.resync || self.last_tick != Some(tick.wrapping_sub(1)) {
            return None;
        }
        let (px, py) = self.center?;
        [Direction::None]
            .into_iter()
            .chain(Direction::ALL)
            .find(|d| {
                let (dx, dy) = d.offset();
                (px + dx, py + dy) == center
            })
    }

    /// The board packet for this tick: GAME_TICK when the client can apply a
    /// diff, RESEND_BOARD otherwise. `None` if `id` is not on the board or
    /// this tick was already sent.
    pub fn next_packet<B: BoardView>(&mut self, view: &B, id: PlayerId) -> Option<Packet> {
        let player = view.player(id)?;
        let center = player.position();
        let score = player.score;
        let tick = view.tick();
        if !self.resync && self.last_tick == Some(tick) {
            return None;
        }

        let Some(direction) = self.step_from_last(tick, center) else {
            return self.full_window(view, id).map(Packet::ResendBoard);
        };

        let (cx, cy) = center;
        let edge = edge_positions(direction)
            .into_iter()
            .map(|(x, y)| {
                view.cell(cx - VIEW_RADIUS + x as i32, cy - VIEW_RADIUS + y as i32)
                    .bits()
            })
            .collect();
        let diff = rle_encode(&extract_diff(view, cx, cy));
        let sum = checksum(&extract_window(view, cx, cy));
        self.remember(tick, center, sum);

        Some(Packet::GameTick(GameTick {
            tick,
            direction,
            score,
            edge,
            diff,
            checksum: sum,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::GameState;
    use crate::player::Controller;
    use crate::simulation;
    use shared::{Window, VIEW_SIZE};

    fn game() -> (GameState, PlayerId) {
        let mut state = GameState::new(GameConfig {
            width: 40,
            height: 40,
            ..GameConfig::default()
        });
        state.begin_tick();
        let id = state
            .add_player("ada".into(), Controller::Human, (20, 20))
            .unwrap();
        crate::spawn::grant_territory(&mut state, id, 20, 20);
        (state, id)
    }

    fn tick(state: &mut GameState, id: PlayerId, dir: Direction) {
        state.begin_tick();
        state.request_direction(id, dir);
        simulation::advance(state, 0);
    }

    #[test]
    fn test_first_packet_is_full_resend() {
        let (state, id) = game();
        let mut sync = ViewportSync::new();
        match sync.next_packet(&state, id) {
            Some(Packet::ResendBoard(board)) => {
                assert_eq!(board.cells.len(), WINDOW_CELLS);
                assert_eq!(board.checksum, checksum(&board.cells));
                // The player sits in the middle of the window.
                let middle = board.cells[WINDOW_CELLS / 2];
                assert_eq!(shared::Cell::from_bits(middle).occupant(), id);
            }
            other => panic!("expected resend, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_board_cells_read_as_sentinel() {
        let (state, _) = game();
        let cells = extract_window(&state, 0, 0);
        assert_eq!(cells[0], shared::OUT_OF_BOUNDS_STATE);
        assert_eq!(cells[WINDOW_CELLS / 2], state.cell(0, 0).bits());
    }

    #[test]
    fn test_client_follows_ticks_incrementally() {
        let (mut state, id) = game();
        let mut sync = ViewportSync::new();
        let mut window = match sync.next_packet(&state, id) {
            Some(Packet::ResendBoard(board)) => Window::from_cells(board.cells).unwrap(),
            other => panic!("expected resend, got {:?}", other),
        };

        let moves = [
            Direction::Right,
            Direction::Right,
            Direction::Up,
            Direction::Up,
            Direction::Left,
            Direction::Left,
            Direction::Down,
        ];
        for dir in moves {
            tick(&mut state, id, dir);
            match sync.next_packet(&state, id) {
                Some(Packet::GameTick(update)) => {
                    assert_eq!(update.direction, dir);
                    assert_eq!(update.edge.len(), VIEW_SIZE);
                    window
                        .apply_tick(update.direction, &update.edge, &update.diff)
                        .unwrap();
                    assert_eq!(window.checksum(), update.checksum);
                    let (x, y) = state.player(id).unwrap().position();
                    assert_eq!(window.cells(), extract_window(&state, x, y).as_slice());
                }
                other => panic!("expected tick, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_stationary_tick_has_no_edge() {
        let (mut state, id) = game();
        let mut sync = ViewportSync::new();
        sync.next_packet(&state, id);

        state.begin_tick();
        simulation::advance(&mut state, 0);
        match sync.next_packet(&state, id) {
            Some(Packet::GameTick(update)) => {
                assert_eq!(update.direction, Direction::None);
                assert!(update.edge.is_empty());
            }
            other => panic!("expected tick, got {:?}", other),
        }
    }

    #[test]
    fn test_checksum_mismatch_forces_resend() {
        let (mut state, id) = game();
        let mut sync = ViewportSync::new();
        sync.next_packet(&state, id);
        tick(&mut state, id, Direction::Right);
        let sent = match sync.next_packet(&state, id) {
            Some(Packet::GameTick(update)) => update,
            other => panic!("expected tick, got {:?}", other),
        };

        // A matching report changes nothing.
        assert!(!sync.report_checksum(sent.tick, sent.checksum));
        assert!(sync.report_checksum(sent.tick, sent.checksum ^ 1));
        tick(&mut state, id, Direction::Right);
        assert!(matches!(
            sync.next_packet(&state, id),
            Some(Packet::ResendBoard(_))
        ));
        // Back in step afterwards.
        tick(&mut state, id, Direction::Right);
        assert!(matches!(sync.next_packet(&state, id), Some(Packet::GameTick(_))));
    }

    #[test]
    fn test_report_older_than_history_forces_resend() {
        let (mut state, id) = game();
        let mut sync = ViewportSync::new();
        sync.next_packet(&state, id);
        state.begin_tick();
        simulation::advance(&mut state, 0);
        let stale = match sync.next_packet(&state, id) {
            Some(Packet::GameTick(update)) => update,
            other => panic!("expected tick, got {:?}", other),
        };

        // Let the reported tick fall out of the history.
        for _ in 0..CHECKSUM_HISTORY + 8 {
            state.begin_tick();
            simulation::advance(&mut state, 0);
            assert!(matches!(sync.next_packet(&state, id), Some(Packet::GameTick(_))));
        }
        assert!(sync.history.iter().all(|&(t, _)| t != stale.tick));

        assert!(sync.report_checksum(stale.tick, stale.checksum ^ 1));
        state.begin_tick();
        simulation::advance(&mut state, 0);
        match sync.next_packet(&state, id) {
            Some(Packet::ResendBoard(board)) => {
                let (x, y) = state.player(id).unwrap().position();
                assert_eq!(board.cells, extract_window(&state, x, y));
            }
            other => panic!("expected resend, got {:?}", other),
        }
    }

    #[test]
    fn test_skipped_tick_forces_resend() {
        let (mut state, id) = game();
        let mut sync = ViewportSync::new();
        sync.next_packet(&state, id);
        tick(&mut state, id, Direction::Right);
        tick(&mut state, id, Direction::Right);
        assert!(matches!(
            sync.next_packet(&state, id),
            Some(Packet::ResendBoard(_))
        ));
    }

    #[test]
    fn test_history_is_bounded() {
        let (mut state, id) = game();
        let mut sync = ViewportSync::new();
        for _ in 0..40 {
            sync.next_packet(&state, id);
            state.begin_tick();
            simulation::advance(&mut state, 0);
        }
        assert_eq!(sync.history.len(), CHECKSUM_HISTORY);
        assert_eq!(sync.history.back().map(|&(t, _)| t), Some(40));
    }
}
