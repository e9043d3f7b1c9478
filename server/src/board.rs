//! The authoritative board: a grid of packed [`Cell`] words, the per-tick diff
//! accumulated by every mutation, and the scratch flag bytes used by flood fill.
//!
//! The flag array is two cells wider and taller than the board so a fill can
//! walk the padding ring around the playable area.

use shared::{Cell, Direction, PlayerId, TrailType};

/// Longest board side. Keeps coordinates and cell counts inside `i32`/`u32`.
pub const MAX_BOARD_SIDE: usize = 4096;

/// Flood fill reached this cell from outside.
pub const FLAG_OUTSIDE: u8 = 0b01;
/// Cell has been pushed onto the fill work list.
pub const FLAG_QUEUED: u8 = 0b10;

#[derive(Debug, Clone)]
pub struct Board {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    diff: Vec<u32>,
    flags: Vec<u8>,
}

impl Board {
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.clamp(1, MAX_BOARD_SIDE);
        let height = height.clamp(1, MAX_BOARD_SIDE);
        let cells = width * height;
        Self {
            width: width as i32,
            height: height as i32,
            cells: vec![Cell::EMPTY; cells],
            diff: vec![0; cells],
            flags: vec![0; (width + 2) * (height + 2)],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.in_bounds(x, y)
            .then(|| y as usize * self.width as usize + x as usize)
    }

    /// Cell at `(x, y)`; anything off the board reads as the out-of-bounds cell.
    pub fn get(&self, x: i32, y: i32) -> Cell {
        self.index(x, y)
            .map_or(Cell::OUT_OF_BOUNDS, |i| self.cells[i])
    }

    /// XOR of this cell between the start of the tick and now. Zero off the board.
    pub fn diff(&self, x: i32, y: i32) -> u32 {
        self.index(x, y).map_or(0, |i| self.diff[i])
    }

    pub fn clear_diff(&mut self) {
        self.diff.fill(0);
    }

    fn mutate(&mut self, x: i32, y: i32, apply: impl FnOnce(&mut Cell) -> u32) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        if self.cells[i].is_out_of_bounds() {
            return false;
        }
        let change = apply(&mut self.cells[i]);
        self.diff[i] ^= change;
        true
    }

    pub fn set_trail_type(&mut self, x: i32, y: i32, trail: TrailType) -> bool {
        self.mutate(x, y, |cell| cell.set_trail_type(trail))
    }

    pub fn set_direction(&mut self, x: i32, y: i32, dir: Direction) -> bool {
        self.mutate(x, y, |cell| cell.set_direction(dir))
    }

    pub fn set_trail_owner(&mut self, x: i32, y: i32, id: PlayerId) -> bool {
        self.mutate(x, y, |cell| cell.set_trail_owner(id))
    }

    pub fn set_occupant(&mut self, x: i32, y: i32, id: PlayerId) -> bool {
        self.mutate(x, y, |cell| cell.set_occupant(id))
    }

    pub fn set_owner(&mut self, x: i32, y: i32, id: PlayerId) -> bool {
        self.mutate(x, y, |cell| cell.set_owner(id))
    }

    fn flag_index(&self, x: i32, y: i32) -> Option<usize> {
        let inside = x >= -1 && y >= -1 && x <= self.width && y <= self.height;
        inside.then(|| (y + 1) as usize * (self.width + 2) as usize + (x + 1) as usize)
    }

    /// Flag bits at `(x, y)`, including the one-cell padding ring. Zero further out.
    pub fn flags(&self, x: i32, y: i32) -> u8 {
        self.flag_index(x, y).map_or(0, |i| self.flags[i])
    }

    pub fn set_flags(&mut self, x: i32, y: i32, bits: u8) {
        if let Some(i) = self.flag_index(x, y) {
            self.flags[i] |= bits;
        }
    }

    pub fn clear_flags(&mut self) {
        self.flags.fill(0);
    }

    /// Number of in-bounds cells whose owner is unset.
    pub fn unowned_cells(&self) -> usize {
        self.cells.iter().filter(|cell| !cell.is_owned()).count()
    }
}
