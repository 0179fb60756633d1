//! Move representation and coordinate conversions.
//!
//! Action index layout for a `size x size` board:
//! - idx `0..size*size` : `Play(row * size + col)`, row 0 is the top edge
//! - idx `size*size`    : `Pass`

use thiserror::Error;

/// Column letters as printed on a Go board ("I" is skipped).
pub const COLUMNS: &[u8; 25] = b"ABCDEFGHJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    /// Place a stone on the flat point index.
    Play(usize),
    Pass,
}

impl Move {
    /// Policy index of this move (pass is the last slot).
    pub fn to_index(self, size: usize) -> usize {
        match self {
            Move::Play(p) => p,
            Move::Pass => size * size,
        }
    }

    /// Inverse of [`Move::to_index`]. Any index `>= size*size` is a pass.
    pub fn from_index(idx: usize, size: usize) -> Move {
        if idx >= size * size {
            Move::Pass
        } else {
            Move::Play(idx)
        }
    }

    pub fn is_pass(self) -> bool {
        matches!(self, Move::Pass)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordError {
    #[error("empty coordinate")]
    Empty,
    #[error("bad column in {0:?}")]
    BadColumn(String),
    #[error("bad row in {0:?}")]
    BadRow(String),
}

#[inline]
pub fn flatten(row: usize, col: usize, size: usize) -> usize {
    debug_assert!(row < size && col < size);
    row * size + col
}

#[inline]
pub fn unflatten(p: usize, size: usize) -> (usize, usize) {
    (p / size, p % size)
}

/// Render a move the way GTP front-ends print it ("D4", "pass").
pub fn move_to_human(mv: Move, size: usize) -> String {
    match mv {
        Move::Pass => "pass".to_string(),
        Move::Play(p) => {
            let (row, col) = unflatten(p, size);
            format!("{}{}", COLUMNS[col] as char, size - row)
        }
    }
}

/// Parse "D4" / "d4" / "pass" for a board of the given size.
pub fn parse_human(s: &str, size: usize) -> Result<Move, CoordError> {
    let t = s.trim();
    if t.is_empty() {
        return Err(CoordError::Empty);
    }
    if t.eq_ignore_ascii_case("pass") {
        return Ok(Move::Pass);
    }

    let upper = t.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    if !bytes[0].is_ascii_alphabetic() {
        return Err(CoordError::BadColumn(t.to_string()));
    }
    let col = COLUMNS[..size.min(COLUMNS.len())]
        .iter()
        .position(|&c| c == bytes[0])
        .ok_or_else(|| CoordError::BadColumn(t.to_string()))?;

    let row_num: usize = upper[1..]
        .parse()
        .map_err(|_| CoordError::BadRow(t.to_string()))?;
    if row_num == 0 || row_num > size {
        return Err(CoordError::BadRow(t.to_string()));
    }

    Ok(Move::Play(flatten(size - row_num, col, size)))
}
