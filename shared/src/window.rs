//! Viewport window math shared by the server encoder and the client decoder.
//!
//! A window is a `VIEW_SIZE` x `VIEW_SIZE` square of cell words, stored row
//! major, centred on one player. Each tick the server sends the XOR diff of
//! the window run-length encoded, plus the row or column that scrolled into
//! view. Both ends derive the same checksum from the resulting words.

use crate::cell::Direction;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Side length of the square viewport. Always odd so the player sits in the middle.
pub const VIEW_SIZE: usize = 31;
/// Distance from the centre cell to the window border.
pub const VIEW_RADIUS: i32 = (VIEW_SIZE / 2) as i32;
/// Number of cell words in one window.
pub const WINDOW_CELLS: usize = VIEW_SIZE * VIEW_SIZE;

/// One RLE run: how many consecutive cells share `word`.
pub type Run = (u8, u32);

/// Failures while decoding a window payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RleError {
    #[error("run {index} has zero length")]
    ZeroLengthRun { index: usize },
    #[error("runs decode past the {expected} cells of the window")]
    Overflow { expected: usize },
    #[error("runs decode to {decoded} cells, window holds {expected}")]
    Underflow { decoded: usize, expected: usize },
    #[error("edge carries {actual} cells, expected {expected}")]
    EdgeLength { expected: usize, actual: usize },
}

/// Run-length encodes `words`. Runs saturate at 255 and restart with the same word.
pub fn rle_encode(words: &[u32]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for &word in words {
        match runs.last_mut() {
            Some((count, last)) if *last == word && *count < u8::MAX => *count += 1,
            _ => runs.push((1, word)),
        }
    }
    runs
}

/// Expands `runs` back into exactly `expected` words.
pub fn rle_decode(runs: &[Run], expected: usize) -> Result<Vec<u32>, RleError> {
    let mut words = Vec::with_capacity(expected);
    for (index, &(count, word)) in runs.iter().enumerate() {
        if count == 0 {
            return Err(RleError::ZeroLengthRun { index });
        }
        if words.len() + count as usize > expected {
            return Err(RleError::Overflow { expected });
        }
        words.extend(std::iter::repeat(word).take(count as usize));
    }
    if words.len() != expected {
        return Err(RleError::Underflow {
            decoded: words.len(),
            expected,
        });
    }
    Ok(words)
}

/// First eight bytes of SHA-256 over the big-endian cell words.
pub fn checksum(words: &[u32]) -> u64 {
    let mut hasher = Sha256::new();
    for word in words {
        hasher.update(word.to_be_bytes());
    }
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Window-local coordinates `(x, y)` of the row or column that enters view
/// after the centre moves one step in `dir`. Empty when stationary.
pub fn edge_positions(dir: Direction) -> Vec<(usize, usize)> {
    let last = VIEW_SIZE - 1;
    match dir {
        Direction::None => Vec::new(),
        Direction::Up => (0..VIEW_SIZE).map(|x| (x, 0)).collect(),
        Direction::Down => (0..VIEW_SIZE).map(|x| (x, last)).collect(),
        Direction::Left => (0..VIEW_SIZE).map(|y| (0, y)).collect(),
        Direction::Right => (0..VIEW_SIZE).map(|y| (last, y)).collect(),
    }
}

/// A client-side copy of one viewport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    cells: Vec<u32>,
}

impl Default for Window {
    fn default() -> Self {
        Self::new()
    }
}

impl Window {
    pub fn new() -> Self {
        Self {
            cells: vec![0; WINDOW_CELLS],
        }
    }

    /// Builds a window from a full dump. Fails unless exactly `WINDOW_CELLS` words are given.
    pub fn from_cells(cells: Vec<u32>) -> Result<Self, RleError> {
        if cells.len() != WINDOW_CELLS {
            return Err(if cells.len() > WINDOW_CELLS {
                RleError::Overflow {
                    expected: WINDOW_CELLS,
                }
            } else {
                RleError::Underflow {
                    decoded: cells.len(),
                    expected: WINDOW_CELLS,
                }
            });
        }
        Ok(Self { cells })
    }

    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn get(&self, x: usize, y: usize) -> Option<u32> {
        if x >= VIEW_SIZE || y >= VIEW_SIZE {
            return None;
        }
        Some(self.cells[y * VIEW_SIZE + x])
    }

    pub fn checksum(&self) -> u64 {
        checksum(&self.cells)
    }

    /// Scrolls the contents so the centre moves one step in `dir`.
    /// Cells scrolled in from outside are zeroed until the edge is written.
    pub fn shift(&mut self, dir: Direction) {
        let (dx, dy) = dir.offset();
        if (dx, dy) == (0, 0) {
            return;
        }
        let mut shifted = vec![0u32; WINDOW_CELLS];
        for y in 0..VIEW_SIZE {
            for x in 0..VIEW_SIZE {
                let sx = x as i32 + dx;
                let sy = y as i32 + dy;
                if (0..VIEW_SIZE as i32).contains(&sx) && (0..VIEW_SIZE as i32).contains(&sy) {
                    shifted[y * VIEW_SIZE + x] = self.cells[sy as usize * VIEW_SIZE + sx as usize];
                }
            }
        }
        self.cells = shifted;
    }

    /// Applies one incremental update: scroll by `dir`, XOR the diff into every
    /// cell that was already visible, then write the new edge verbatim.
    pub fn apply_tick(&mut self, dir: Direction, edge: &[u32], runs: &[Run]) -> Result<(), RleError> {
        let positions = edge_positions(dir);
        if edge.len() != positions.len() {
            return Err(RleError::EdgeLength {
                expected: positions.len(),
                actual: edge.len(),
            });
        }
        let diff = rle_decode(runs, WINDOW_CELLS)?;

        self.shift(dir);
        let mut is_edge = vec![false; WINDOW_CELLS];
        for &(x, y) in &positions {
            is_edge[y * VIEW_SIZE + x] = true;
        }
        for (i, change) in diff.into_iter().enumerate() {
            if !is_edge[i] {
                self.cells[i] ^= change;
            }
        }
        for (&(x, y), &word) in positions.iter().zip(edge) {
            self.cells[y * VIEW_SIZE + x] = word;
        }
        Ok(())
    }
}
