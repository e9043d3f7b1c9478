//! Authoritative state of one game session and the board capability traits
//! the simulation, spawn allocator, AI and viewport encoder are written against.

use crate::board::Board;
use crate::config::GameConfig;
use crate::player::{Controller, Player, PlayerRegistry};
use log::{info, warn};
use shared::{
    Cell, Direction, LeaderboardUpdate, PlayerId, PlayersUpdate, TrailType, LEADERBOARD_SIZE,
    UNOCCUPIED,
};

/// Read access to a board and its players.
pub trait BoardView {
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    fn tick(&self) -> u32;
    fn cell(&self, x: i32, y: i32) -> Cell;
    /// Accumulated change of a cell during the current tick.
    fn diff(&self, x: i32, y: i32) -> u32;
    fn player(&self, id: PlayerId) -> Option<&Player>;
    /// Ids of every registered player in ascending order.
    fn player_ids(&self) -> Vec<PlayerId>;

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width() && y < self.height()
    }

    fn total_cells(&self) -> u32 {
        (self.width() * self.height()) as u32
    }
}

/// Mutation access used while the session holds the write lock.
pub trait BoardMut: BoardView {
    fn set_trail_type(&mut self, x: i32, y: i32, trail: TrailType) -> bool;
    fn set_direction(&mut self, x: i32, y: i32, dir: Direction) -> bool;
    fn set_trail_owner(&mut self, x: i32, y: i32, id: PlayerId) -> bool;
    fn set_occupant(&mut self, x: i32, y: i32, id: PlayerId) -> bool;
    fn set_owner(&mut self, x: i32, y: i32, id: PlayerId) -> bool;

    fn flags(&self, x: i32, y: i32) -> u8;
    fn set_flags(&mut self, x: i32, y: i32, bits: u8);
    fn clear_flags(&mut self);

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player>;
    fn remove_player(&mut self, id: PlayerId) -> Option<Player>;
}

/// Board, players and leaderboard of one session.
#[derive(Debug)]
pub struct GameState {
    pub config: GameConfig,
    board: Board,
    players: PlayerRegistry,
    tick: u32,
    leaderboard: [(PlayerId, u32); LEADERBOARD_SIZE],
    leaderboard_changed: u32,
    players_changed: u32,
}

impl GameState {
    pub fn new(config: GameConfig) -> Self {
        let board = Board::new(config.width, config.height);
        Self {
            config,
            board,
            players: PlayerRegistry::new(),
            tick: 0,
            leaderboard: [(UNOCCUPIED, 0); LEADERBOARD_SIZE],
            leaderboard_changed: 0,
            players_changed: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    /// Starts a new tick: the diff buffer is reset so it only reflects this tick.
    pub fn begin_tick(&mut self) {
        self.board.clear_diff();
        self.tick = self.tick.wrapping_add(1);
    }

    /// Adds a player standing at `at`. The caller grants starting territory.
    pub fn add_player(
        &mut self,
        name: String,
        controller: Controller,
        at: (i32, i32),
    ) -> Option<PlayerId> {
        let Some(id) = self.players.allocate_id() else {
            warn!("No player id free for {}", name);
            return None;
        };
        info!("Player {} ({}) spawned at {:?}", id, name, at);
        self.board.set_occupant(at.0, at.1, id);
        self.players
            .insert(Player::new(id, name, at, self.tick, controller));
        self.players_changed = self.tick;
        Some(id)
    }

    /// Marks a player dead. The simulation's death sweep removes it.
    pub fn kill(&mut self, id: PlayerId) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.alive = false;
                true
            }
            None => false,
        }
    }

    /// Sets a player's requested direction; only needs shared access.
    pub fn request_direction(&self, id: PlayerId, dir: Direction) -> bool {
        match self.players.get(id) {
            Some(player) if player.alive => {
                player.request_direction(dir);
                true
            }
            _ => false,
        }
    }

    /// Recomputes the top five. Records the tick if it differs from before.
    pub fn update_leaderboard(&mut self) {
        let mut ranked: Vec<(PlayerId, u32)> =
            self.players.iter().map(|p| (p.id, p.score)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut top = [(UNOCCUPIED, 0); LEADERBOARD_SIZE];
        for (slot, entry) in top.iter_mut().zip(ranked) {
            *slot = entry;
        }
        if top != self.leaderboard {
            self.leaderboard = top;
            self.leaderboard_changed = self.tick;
        }
    }

    pub fn leaderboard(&self) -> [(PlayerId, u32); LEADERBOARD_SIZE] {
        self.leaderboard
    }

    pub fn leaderboard_changed(&self) -> u32 {
        self.leaderboard_changed
    }

    pub fn players_changed(&self) -> u32 {
        self.players_changed
    }

    pub fn players_update(&self) -> PlayersUpdate {
        PlayersUpdate {
            tick: self.tick,
            names: self.players.iter().map(|p| (p.id, p.name.clone())).collect(),
        }
    }

    pub fn leaderboard_update(&self) -> LeaderboardUpdate {
        LeaderboardUpdate {
            tick: self.tick,
            entries: self.leaderboard,
        }
    }

    /// Sum of every player's score plus the unowned cells. Always the board size.
    pub fn accounted_cells(&self) -> u64 {
        let scores: u64 = self.players.iter().map(|p| u64::from(p.score)).sum();
        scores + self.board.unowned_cells() as u64
    }
}

impl BoardView for GameState {
    fn width(&self) -> i32 {
        self.board.width()
    }

    fn height(&self) -> i32 {
        self.board.height()
    }

    fn tick(&self) -> u32 {
        self.tick
    }

    fn cell(&self, x: i32, y: i32) -> Cell {
        self.board.get(x, y)
    }

    fn diff(&self, x: i32, y: i32) -> u32 {
        self.board.diff(x, y)
    }

    fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    fn player_ids(&self) -> Vec<PlayerId> {
        self.players.ids()
    }
}

impl BoardMut for GameState {
    fn set_trail_type(&mut self, x: i32, y: i32, trail: TrailType) -> bool {
        self.board.set_trail_type(x, y, trail)
    }

    fn set_direction(&mut self, x: i32, y: i32, dir: Direction) -> bool {
        self.board.set_direction(x, y, dir)
    }

    fn set_trail_owner(&mut self, x: i32, y: i32, id: PlayerId) -> bool {
        self.board.set_trail_owner(x, y, id)
    }

    fn set_occupant(&mut self, x: i32, y: i32, id: PlayerId) -> bool {
        self.board.set_occupant(x, y, id)
    }

    fn set_owner(&mut self, x: i32, y: i32, id: PlayerId) -> bool {
        self.board.set_owner(x, y, id)
    }

    fn flags(&self, x: i32, y: i32) -> u8 {
        self.board.flags(x, y)
    }

    fn set_flags(&mut self, x: i32, y: i32, bits: u8) {
        self.board.set_flags(x, y, bits)
    }

    fn clear_flags(&mut self) {
        self.board.clear_flags()
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let removed = self.players.remove(id);
        if removed.is_some() {
            self.players_changed = self.tick;
        }
        removed
    }
}
