//! Player records and the per-game registry that owns them.

use shared::{Direction, PlayerId, MAX_PLAYER_ID, MIN_PLAYER_ID};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, Ordering};

/// Who decides a player's direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controller {
    Human,
    Ai,
}

/// One player in a game session.
///
/// Everything except the requested direction is only touched while the
/// session holds its write lock. The requested direction is written by input
/// handlers and the AI under the read lock and consumed once per tick.
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub x: i32,
    pub y: i32,
    requested: AtomicU8,
    pub last_direction: Direction,
    pub score: u32,
    pub alive: bool,
    pub spawn_tick: u32,
    /// Trail cells laid since the player last stood on their own territory.
    pub trail_len: u32,
    pub controller: Controller,
}

impl Player {
    pub fn new(
        id: PlayerId,
        name: String,
        (x, y): (i32, i32),
        spawn_tick: u32,
        controller: Controller,
    ) -> Self {
        Self {
            id,
            name,
            x,
            y,
            requested: AtomicU8::new(Direction::None as u8),
            last_direction: Direction::None,
            score: 0,
            alive: true,
            spawn_tick,
            trail_len: 0,
            controller,
        }
    }

    pub fn request_direction(&self, dir: Direction) {
        self.requested.store(dir as u8, Ordering::Relaxed);
    }

    pub fn requested_direction(&self) -> Direction {
        Direction::try_from(self.requested.load(Ordering::Relaxed)).unwrap_or(Direction::None)
    }

    pub fn is_ai(&self) -> bool {
        self.controller == Controller::Ai
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

/// Players of one game, iterated in ascending id order.
#[derive(Debug)]
pub struct PlayerRegistry {
    players: BTreeMap<PlayerId, Player>,
    last_id: PlayerId,
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: BTreeMap::new(),
            last_id: MAX_PLAYER_ID,
        }
    }

    /// Next free id after the last one handed out, wrapping within `1..=254`.
    pub fn allocate_id(&mut self) -> Option<PlayerId> {
        let span = (MAX_PLAYER_ID - MIN_PLAYER_ID + 1) as usize;
        let mut candidate = self.last_id;
        for _ in 0..span {
            candidate = if candidate >= MAX_PLAYER_ID {
                MIN_PLAYER_ID
            } else {
                candidate + 1
            };
            if !self.players.contains_key(&candidate) {
                self.last_id = candidate;
                return Some(candidate);
            }
        }
        None
    }

    pub fn insert(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        self.players.remove(&id)
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn count(&self, controller: Controller) -> usize {
        self.players
            .values()
            .filter(|p| p.controller == controller)
            .count()
    }
}
