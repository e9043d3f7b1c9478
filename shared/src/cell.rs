//! The packed 32-bit cell word and the small enums stored inside it.
//!
//! Layout of a cell word:
//!
//! | bits  | field             |
//! |-------|-------------------|
//! | 0-2   | trail type        |
//! | 3-5   | last-move direction |
//! | 8-15  | trail owner id    |
//! | 16-23 | occupying player  |
//! | 24-31 | owning player     |
//!
//! Every setter returns the XOR between the old and new word so callers can
//! fold the change into a diff buffer without recomputing it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 8-bit player identifier. `0` means "unoccupied", `255` marks out of bounds.
pub type PlayerId = u8;

/// No player occupies / owns / trails this cell.
pub const UNOCCUPIED: PlayerId = 0;
/// Sentinel id reported by every field of an out-of-bounds cell.
pub const OUT_OF_BOUNDS: PlayerId = 255;
/// Lowest and highest assignable player ids.
pub const MIN_PLAYER_ID: PlayerId = 1;
pub const MAX_PLAYER_ID: PlayerId = 254;

/// Word reported for any cell outside the board.
pub const OUT_OF_BOUNDS_STATE: u32 = 0xFFFF_FF00;

const TRAIL_TYPE_MASK: u32 = 0x0000_0007;
const DIRECTION_SHIFT: u32 = 3;
const DIRECTION_MASK: u32 = 0x0000_0038;
const TRAIL_OWNER_SHIFT: u32 = 8;
const TRAIL_OWNER_MASK: u32 = 0x0000_FF00;
const OCCUPANT_SHIFT: u32 = 16;
const OCCUPANT_MASK: u32 = 0x00FF_0000;
const OWNER_SHIFT: u32 = 24;
const OWNER_MASK: u32 = 0xFF00_0000;

/// Movement direction. Origin is the top-left corner: +x is right, +y is down.
///
/// The discriminants are the wire values; turning left is `(d % 4) + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Direction {
    #[default]
    None = 0,
    Up = 1,
    Left = 2,
    Down = 3,
    Right = 4,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Left,
        Direction::Down,
        Direction::Right,
    ];

    /// Unit step `(dx, dy)` for this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::None => (0, 0),
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::None => Direction::None,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Counter-clockwise quarter turn.
    pub fn turn_left(self) -> Direction {
        match self {
            Direction::None => Direction::None,
            Direction::Up => Direction::Left,
            Direction::Left => Direction::Down,
            Direction::Down => Direction::Right,
            Direction::Right => Direction::Up,
        }
    }

    /// Clockwise quarter turn.
    pub fn turn_right(self) -> Direction {
        match self {
            Direction::None => Direction::None,
            Direction::Up => Direction::Right,
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Up | Direction::Down)
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }
}

impl From<Direction> for u8 {
    fn from(dir: Direction) -> u8 {
        dir as u8
    }
}

impl TryFrom<u8> for Direction {
    type Error = InvalidDirection;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Direction::None),
            1 => Ok(Direction::Up),
            2 => Ok(Direction::Left),
            3 => Ok(Direction::Down),
            4 => Ok(Direction::Right),
            other => Err(InvalidDirection(other)),
        }
    }
}

/// A direction byte outside `0..=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidDirection(pub u8);

impl fmt::Display for InvalidDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid direction byte {}", self.0)
    }
}

impl std::error::Error for InvalidDirection {}

/// Shape of the trail drawn through a cell. Only used for rendering continuity;
/// each turn shape names the two cell edges the trail connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TrailType {
    #[default]
    None = 0,
    EastWest = 1,
    NorthSouth = 2,
    NorthEast = 3,
    NorthWest = 4,
    SouthEast = 5,
    SouthWest = 6,
}

impl TrailType {
    /// Shape left in a cell that was entered moving `from` and is left moving `to`.
    ///
    /// A stationary or unknown previous direction yields the straight shape of `to`.
    pub fn between(from: Direction, to: Direction) -> TrailType {
        let from = if from == Direction::None { to } else { from };
        if from == to || from == to.opposite() {
            return if to.is_vertical() {
                TrailType::NorthSouth
            } else if to.is_horizontal() {
                TrailType::EastWest
            } else {
                TrailType::None
            };
        }

        // The trail enters through the edge opposite to `from` and exits through `to`.
        let entry = from.opposite();
        let north = entry == Direction::Up || to == Direction::Up;
        let east = entry == Direction::Right || to == Direction::Right;
        match (north, east) {
            (true, true) => TrailType::NorthEast,
            (true, false) => TrailType::NorthWest,
            (false, true) => TrailType::SouthEast,
            (false, false) => TrailType::SouthWest,
        }
    }

    fn from_bits(bits: u32) -> TrailType {
        match bits {
            1 => TrailType::EastWest,
            2 => TrailType::NorthSouth,
            3 => TrailType::NorthEast,
            4 => TrailType::NorthWest,
            5 => TrailType::SouthEast,
            6 => TrailType::SouthWest,
            _ => TrailType::None,
        }
    }
}

/// One board cell as a packed word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cell(u32);

impl Cell {
    pub const EMPTY: Cell = Cell(0);
    pub const OUT_OF_BOUNDS: Cell = Cell(OUT_OF_BOUNDS_STATE);

    pub fn from_bits(bits: u32) -> Self {
        Cell(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_out_of_bounds(self) -> bool {
        self.owner() == OUT_OF_BOUNDS
    }

    pub fn trail_type(self) -> TrailType {
        TrailType::from_bits(self.0 & TRAIL_TYPE_MASK)
    }

    pub fn direction(self) -> Direction {
        let raw = ((self.0 & DIRECTION_MASK) >> DIRECTION_SHIFT) as u8;
        Direction::try_from(raw).unwrap_or(Direction::None)
    }

    pub fn trail_owner(self) -> PlayerId {
        ((self.0 & TRAIL_OWNER_MASK) >> TRAIL_OWNER_SHIFT) as PlayerId
    }

    pub fn occupant(self) -> PlayerId {
        ((self.0 & OCCUPANT_MASK) >> OCCUPANT_SHIFT) as PlayerId
    }

    pub fn owner(self) -> PlayerId {
        ((self.0 & OWNER_MASK) >> OWNER_SHIFT) as PlayerId
    }

    pub fn has_trail(self) -> bool {
        is_player(self.trail_owner())
    }

    pub fn is_occupied(self) -> bool {
        is_player(self.occupant())
    }

    pub fn is_owned(self) -> bool {
        is_player(self.owner())
    }

    pub fn set_trail_type(&mut self, trail: TrailType) -> u32 {
        self.replace(TRAIL_TYPE_MASK, trail as u32)
    }

    pub fn set_direction(&mut self, dir: Direction) -> u32 {
        self.replace(DIRECTION_MASK, (dir as u32) << DIRECTION_SHIFT)
    }

    pub fn set_trail_owner(&mut self, id: PlayerId) -> u32 {
        self.replace(TRAIL_OWNER_MASK, u32::from(id) << TRAIL_OWNER_SHIFT)
    }

    pub fn set_occupant(&mut self, id: PlayerId) -> u32 {
        self.replace(OCCUPANT_MASK, u32::from(id) << OCCUPANT_SHIFT)
    }

    pub fn set_owner(&mut self, id: PlayerId) -> u32 {
        self.replace(OWNER_MASK, u32::from(id) << OWNER_SHIFT)
    }

    fn replace(&mut self, mask: u32, value: u32) -> u32 {
        let change = (self.0 & mask) ^ (value & mask);
        self.0 ^= change;
        change
    }
}

/// True for ids that name an actual player (not unoccupied, not out of bounds).
pub fn is_player(id: PlayerId) -> bool {
    id != UNOCCUPIED && id != OUT_OF_BOUNDS
}
