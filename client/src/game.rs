//! Client-side view of one game: the synced window plus the side tables.

use log::{debug, info, warn};
use shared::{
    Cell, ChecksumReport, Direction, GameTick, Packet, PlayerId, ResendBoard, Window,
    LEADERBOARD_SIZE, VIEW_RADIUS, VIEW_SIZE,
};
use std::collections::BTreeMap;

/// Ticks to wait for a full window before asking for it again.
pub const RESEND_RETRY_TICKS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// Connected, not asked to join yet.
    Idle,
    Queued,
    Playing,
    /// The last game ended with this score.
    Ended { score: u32 },
}

/// Read-only view handed to a presentation layer.
#[derive(Debug, Clone, Copy)]
pub struct ViewSnapshot<'a> {
    pub tick: u32,
    pub player_id: PlayerId,
    /// Step the player took on the last tick; `None` while standing still.
    pub heading: Direction,
    pub score: u32,
    pub total_cells: u32,
    pub window: &'a Window,
    pub names: &'a BTreeMap<PlayerId, String>,
    pub leaderboard: &'a [(PlayerId, u32); LEADERBOARD_SIZE],
}

impl ViewSnapshot<'_> {
    /// Cell at an offset from the player, both axes in `-15..=15`.
    pub fn relative(&self, dx: i32, dy: i32) -> Option<Cell> {
        let x = usize::try_from(dx + VIEW_RADIUS).ok()?;
        let y = usize::try_from(dy + VIEW_RADIUS).ok()?;
        self.window.get(x, y).map(Cell::from_bits)
    }

    pub fn name(&self, id: PlayerId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Owned share of the board in percent.
    pub fn coverage(&self) -> f32 {
        if self.total_cells == 0 {
            return 0.0;
        }
        self.score as f32 * 100.0 / self.total_cells as f32
    }

    /// Rows of the window as text, `@` for the player, letters for others.
    pub fn render_ascii(&self) -> String {
        let mut out = String::with_capacity(VIEW_SIZE * (VIEW_SIZE + 1));
        for y in 0..VIEW_SIZE {
            for x in 0..VIEW_SIZE {
                let cell = self.window.get(x, y).map_or(Cell::OUT_OF_BOUNDS, Cell::from_bits);
                out.push(glyph(cell, self.player_id));
            }
            out.push('\n');
        }
        out
    }
}

fn glyph(cell: Cell, me: PlayerId) -> char {
    if cell.is_out_of_bounds() {
        return '#';
    }
    let letter = |id: PlayerId| char::from(b'a' + (id % 26));
    if cell.occupant() == me {
        '@'
    } else if cell.is_occupied() {
        letter(cell.occupant()).to_ascii_uppercase()
    } else if cell.has_trail() {
        if cell.trail_owner() == me {
            '+'
        } else {
            '~'
        }
    } else if cell.owner() == me {
        'o'
    } else if cell.is_owned() {
        letter(cell.owner())
    } else {
        '.'
    }
}

#[derive(Debug)]
pub struct ClientGameState {
    phase: ClientPhase,
    player_id: Option<PlayerId>,
    score: u32,
    total_cells: u32,
    tick_rate_ms: u16,
    tick: Option<u32>,
    heading: Direction,
    window: Option<Window>,
    awaiting_board: bool,
    waiting_ticks: u32,
    names: BTreeMap<PlayerId, String>,
    leaderboard: [(PlayerId, u32); LEADERBOARD_SIZE],
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            phase: ClientPhase::Idle,
            player_id: None,
            score: 0,
            total_cells: 0,
            tick_rate_ms: 0,
            tick: None,
            heading: Direction::None,
            window: None,
            awaiting_board: false,
            waiting_ticks: 0,
            names: BTreeMap::new(),
            leaderboard: [(0, 0); LEADERBOARD_SIZE],
        }
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn tick(&self) -> Option<u32> {
        self.tick
    }

    pub fn tick_rate_ms(&self) -> u16 {
        self.tick_rate_ms
    }

    /// Whether the local window is known to match the server.
    pub fn is_synced(&self) -> bool {
        self.window.is_some()
    }

    /// Current view, if in a game with a synced window.
    pub fn snapshot(&self) -> Option<ViewSnapshot<'_>> {
        if self.phase != ClientPhase::Playing {
            return None;
        }
        Some(ViewSnapshot {
            tick: self.tick?,
            player_id: self.player_id?,
            heading: self.heading,
            score: self.score,
            total_cells: self.total_cells,
            window: self.window.as_ref()?,
            names: &self.names,
            leaderboard: &self.leaderboard,
        })
    }

    /// Applies a server packet. Returns the reply the client owes the server, if any.
    pub fn apply(&mut self, packet: Packet) -> Option<Packet> {
        match packet {
            Packet::KeepAlive => None,
            Packet::Queued => {
                debug!("Waiting for a free slot");
                self.phase = ClientPhase::Queued;
                None
            }
            Packet::GameJoin(join) => {
                info!(
                    "Joined as player {} ({} cells, {}ms ticks)",
                    join.player_id, join.total_cells, join.tick_rate
                );
                self.phase = ClientPhase::Playing;
                self.player_id = Some(join.player_id);
                self.score = join.score;
                self.total_cells = join.total_cells;
                self.tick_rate_ms = join.tick_rate;
                self.heading = Direction::None;
                self.names = join.players.names;
                self.leaderboard = join.leaderboard.entries;
                self.load_board(join.board)
            }
            Packet::ResendBoard(board) => {
                if self.phase != ClientPhase::Playing {
                    return None;
                }
                self.load_board(board)
            }
            Packet::GameTick(update) => {
                if self.phase != ClientPhase::Playing {
                    return None;
                }
                self.apply_tick(update)
            }
            Packet::PlayersUpdate(players) => {
                self.names = players.names;
                None
            }
            Packet::LeaderboardUpdate(leaderboard) => {
                self.leaderboard = leaderboard.entries;
                None
            }
            Packet::GameEnd(end) => {
                info!("Game over, final score {}", end.score);
                self.phase = ClientPhase::Ended { score: end.score };
                self.score = end.score;
                self.player_id = None;
                self.window = None;
                self.tick = None;
                self.heading = Direction::None;
                self.awaiting_board = false;
                self.waiting_ticks = 0;
                None
            }
            other => {
                warn!("Server sent unexpected packet {}", other.id());
                None
            }
        }
    }

    fn load_board(&mut self, board: ResendBoard) -> Option<Packet> {
        self.tick = Some(board.tick);
        let window = match Window::from_cells(board.cells) {
            Ok(window) if window.checksum() == board.checksum => window,
            Ok(_) => {
                warn!("Board for tick {} failed its checksum", board.tick);
                return self.lose_sync(Packet::RequestResend);
            }
            Err(e) => {
                warn!("Bad board for tick {}: {}", board.tick, e);
                return self.lose_sync(Packet::RequestResend);
            }
        };
        self.window = Some(window);
        self.awaiting_board = false;
        self.waiting_ticks = 0;
        None
    }

    fn apply_tick(&mut self, update: GameTick) -> Option<Packet> {
        self.score = update.score;
        let expected = self.tick.map(|t| t.wrapping_add(1));
        self.tick = Some(update.tick);

        let Some(window) = self.window.as_mut() else {
            return self.lose_sync(Packet::RequestResend);
        };
        if expected != Some(update.tick) {
            debug!("Tick {} arrived out of sequence", update.tick);
            return self.lose_sync(Packet::RequestResend);
        }
        if let Err(e) = window.apply_tick(update.direction, &update.edge, &update.diff) {
            warn!("Could not apply tick {}: {}", update.tick, e);
            return self.lose_sync(Packet::RequestResend);
        }
        self.heading = update.direction;

        let ours = window.checksum();
        if ours != update.checksum {
            warn!("Checksum mismatch at tick {}", update.tick);
            return self.lose_sync(Packet::ChecksumReport(ChecksumReport {
                tick: update.tick,
                checksum: ours,
            }));
        }
        None
    }

    /// Drops the window and asks for a new one. While a board is pending
    /// only every [`RESEND_RETRY_TICKS`]th failure asks again.
    fn lose_sync(&mut self, reply: Packet) -> Option<Packet> {
        self.window = None;
        if !self.awaiting_board {
            self.awaiting_board = true;
            self.waiting_ticks = 0;
            return Some(reply);
        }
        self.waiting_ticks += 1;
        if self.waiting_ticks < RESEND_RETRY_TICKS {
            return None;
        }
        self.waiting_ticks = 0;
        debug!("No board after {} ticks, asking again", RESEND_RETRY_TICKS);
        Some(Packet::RequestResend)
    }
}
