//! Board position and move legality.
//!
//! This module is the single place that mutates a `Position` via rules. Positions are
//! immutable from the outside: `play_move` returns the successor.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coords::{move_to_human, unflatten, Move, COLUMNS};
use crate::scoring::{self, GameOutcome};
use crate::MAX_BOARD_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn opponent(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// +1 for Black, -1 for White.
    pub fn sign(self) -> f32 {
        match self {
            Color::Black => 1.0,
            Color::White => -1.0,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Color::Black => 0,
            Color::White => 1,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Black => f.write_str("B"),
            Color::White => f.write_str("W"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RulesError {
    #[error("point {0} is off the board")]
    OffBoard(usize),
    #[error("point {0} is occupied")]
    Occupied(usize),
    #[error("point {0} is a ko recapture")]
    Ko(usize),
    #[error("point {0} is suicide")]
    Suicide(usize),
    #[error("game is already over")]
    GameOver,
    #[error("unsupported board size {0}")]
    BadSize(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    size: usize,
    board: Vec<Option<Color>>,
    to_play: Color,
    /// Point that may not be played this turn (simple ko).
    ko: Option<usize>,
    komi: f32,
    /// Moves played so far, passes included.
    n: u32,
    consecutive_passes: u8,
    /// Stones captured by [Black, White].
    captures: [u32; 2],
    last_move: Option<Move>,
}

impl Position {
    /// Empty board, Black to move.
    pub fn new(size: usize, komi: f32) -> Result<Self, RulesError> {
        if !(2..=MAX_BOARD_SIZE).contains(&size) {
            return Err(RulesError::BadSize(size));
        }
        Ok(Self {
            size,
            board: vec![None; size * size],
            to_play: Color::Black,
            ko: None,
            komi,
            n: 0,
            consecutive_passes: 0,
            captures: [0, 0],
            last_move: None,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn to_play(&self) -> Color {
        self.to_play
    }

    pub fn komi(&self) -> f32 {
        self.komi
    }

    pub fn n(&self) -> u32 {
        self.n
    }

    pub fn ko(&self) -> Option<usize> {
        self.ko
    }

    pub fn last_move(&self) -> Option<Move> {
        self.last_move
    }

    pub fn captures(&self, c: Color) -> u32 {
        self.captures[c.index()]
    }

    pub fn stone_at(&self, p: usize) -> Option<Color> {
        self.board.get(p).copied().flatten()
    }

    pub fn stones(&self) -> &[Option<Color>] {
        &self.board
    }

    /// Policy vector length for this board (points + pass).
    pub fn action_space(&self) -> usize {
        crate::action_space(self.size)
    }

    /// Terminal when both players passed in a row.
    pub fn is_game_over(&self) -> bool {
        self.consecutive_passes >= 2
    }

    /// Place a stone directly, ignoring turn order. Used to set up test positions.
    pub fn with_stone(mut self, p: usize, c: Color) -> Self {
        self.board[p] = Some(c);
        self
    }

    /// Force the side to move (setup helper).
    pub fn with_to_play(mut self, c: Color) -> Self {
        self.to_play = c;
        self
    }

    pub(crate) fn neighbors(&self, p: usize) -> Neighbors {
        Neighbors::new(p, self.size)
    }

    /// Cheap legality check that avoids cloning the board in the common case.
    pub fn is_move_legal(&self, mv: Move) -> bool {
        if self.is_game_over() {
            return false;
        }
        let p = match mv {
            Move::Pass => return true,
            Move::Play(p) => p,
        };
        if p >= self.board.len() || self.board[p].is_some() || self.ko == Some(p) {
            return false;
        }
        if self.neighbors(p).any(|q| self.board[q].is_none()) {
            return true;
        }
        self.play_move(mv).is_ok()
    }

    /// Legality for every action index (points then pass).
    pub fn legal_moves(&self) -> Vec<bool> {
        let a = self.action_space();
        (0..a)
            .map(|idx| self.is_move_legal(Move::from_index(idx, self.size)))
            .collect()
    }

    /// Apply `mv` for the side to move, producing the successor position.
    pub fn play_move(&self, mv: Move) -> Result<Position, RulesError> {
        if self.is_game_over() {
            return Err(RulesError::GameOver);
        }

        let mut next = self.clone();
        next.n += 1;
        next.ko = None;
        next.last_move = Some(mv);
        next.to_play = self.to_play.opponent();

        let p = match mv {
            Move::Pass => {
                next.consecutive_passes = self.consecutive_passes.saturating_add(1);
                return Ok(next);
            }
            Move::Play(p) => p,
        };

        if p >= self.board.len() {
            return Err(RulesError::OffBoard(p));
        }
        if self.board[p].is_some() {
            return Err(RulesError::Occupied(p));
        }
        if self.ko == Some(p) {
            return Err(RulesError::Ko(p));
        }

        let me = self.to_play;
        let opp = me.opponent();
        next.board[p] = Some(me);
        next.consecutive_passes = 0;

        let mut captured: Vec<usize> = Vec::new();
        for q in self.neighbors(p) {
            if next.board[q] != Some(opp) {
                continue;
            }
            let (group, libs) = next.group_and_liberties(q);
            if libs == 0 {
                for &s in &group {
                    next.board[s] = None;
                }
                captured.extend(group);
            }
        }

        let (own_group, own_libs) = next.group_and_liberties(p);
        if own_libs == 0 {
            return Err(RulesError::Suicide(p));
        }

        if captured.len() == 1 && own_group.len() == 1 && own_libs == 1 {
            next.ko = Some(captured[0]);
        }
        next.captures[me.index()] += captured.len() as u32;

        Ok(next)
    }

    /// Stones in the chain containing `start` and its number of distinct liberties.
    pub fn group_and_liberties(&self, start: usize) -> (Vec<usize>, usize) {
        let color = self.board[start];
        debug_assert!(color.is_some(), "group of an empty point");

        let mut seen = vec![false; self.board.len()];
        let mut lib_seen = vec![false; self.board.len()];
        let mut stack = vec![start];
        let mut group = Vec::new();
        let mut libs = 0usize;
        seen[start] = true;

        while let Some(s) = stack.pop() {
            group.push(s);
            for q in self.neighbors(s) {
                match self.board[q] {
                    None => {
                        if !lib_seen[q] {
                            lib_seen[q] = true;
                            libs += 1;
                        }
                    }
                    c if c == color && !seen[q] => {
                        seen[q] = true;
                        stack.push(q);
                    }
                    _ => {}
                }
            }
        }
        (group, libs)
    }

    /// Area score, Black minus White minus komi.
    pub fn score(&self) -> f32 {
        scoring::area_score(self)
    }

    pub fn result(&self) -> GameOutcome {
        GameOutcome::from_score(self.score())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = match self.last_move {
            Some(Move::Play(p)) => Some(p),
            _ => None,
        };
        for row in 0..self.size {
            write!(f, "{:>2} ", self.size - row)?;
            for col in 0..self.size {
                let p = row * self.size + col;
                let c = match self.board[p] {
                    Some(Color::Black) => 'X',
                    Some(Color::White) => 'O',
                    None => '.',
                };
                if last == Some(p) {
                    write!(f, "{c}<")?;
                } else {
                    write!(f, "{c} ")?;
                }
            }
            writeln!(f)?;
        }
        write!(f, "   ")?;
        for col in 0..self.size {
            write!(f, "{} ", COLUMNS[col] as char)?;
        }
        writeln!(f)?;
        let last = self
            .last_move
            .map(|m| move_to_human(m, self.size))
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "Move: {}. Captures X: {} O: {}. To play: {}. Last: {}",
            self.n, self.captures[0], self.captures[1], self.to_play, last
        )
    }
}

/// Orthogonal neighbours of a point, without allocation.
pub(crate) struct Neighbors {
    pts: [usize; 4],
    len: usize,
    i: usize,
}

impl Neighbors {
    fn new(p: usize, size: usize) -> Self {
        let (row, col) = unflatten(p, size);
        let mut pts = [0usize; 4];
        let mut len = 0;
        if row > 0 {
            pts[len] = p - size;
            len += 1;
        }
        if row + 1 < size {
            pts[len] = p + size;
            len += 1;
        }
        if col > 0 {
            pts[len] = p - 1;
            len += 1;
        }
        if col + 1 < size {
            pts[len] = p + 1;
            len += 1;
        }
        Self { pts, len, i: 0 }
    }
}

impl Iterator for Neighbors {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.i < self.len {
            let p = self.pts[self.i];
            self.i += 1;
            Some(p)
        } else {
            None
        }
    }
}
