//! Tromp-Taylor area scoring and game outcomes.

use serde::{Deserialize, Serialize};

use crate::position::{Color, Position};

/// Final result of a naturally finished game.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameOutcome {
    /// `None` on a jigo (only possible with an integer komi).
    pub winner: Option<Color>,
    /// Black area minus White area minus komi.
    pub score: f32,
}

impl GameOutcome {
    pub fn from_score(score: f32) -> Self {
        let winner = if score > 0.0 {
            Some(Color::Black)
        } else if score < 0.0 {
            Some(Color::White)
        } else {
            None
        };
        Self { winner, score }
    }

    /// Value target from `pov`'s side: +1 win, -1 loss, 0 jigo.
    pub fn z_for(&self, pov: Color) -> f32 {
        match self.winner {
            Some(w) if w == pov => 1.0,
            Some(_) => -1.0,
            None => 0.0,
        }
    }

    /// Short result such as "B+3.5". Resignations use [`resign_notation`].
    pub fn notation(&self) -> String {
        match self.winner {
            Some(Color::Black) => format!("B+{:.1}", self.score),
            Some(Color::White) => format!("W+{:.1}", -self.score),
            None => "0".to_string(),
        }
    }
}

/// Result string for a game won by resignation.
pub fn resign_notation(winner: Color) -> String {
    format!("{winner}+R")
}

/// Stones plus empty regions that touch only one colour.
pub fn area_score(pos: &Position) -> f32 {
    let stones = pos.stones();
    let len = stones.len();
    let mut area = [0u32; 2];
    let mut seen = vec![false; len];

    for p in 0..len {
        if let Some(c) = stones[p] {
            area[c.index()] += 1;
            continue;
        }
        if seen[p] {
            continue;
        }

        // Flood the empty region, noting which colours border it.
        let mut region = 0u32;
        let mut borders = [false; 2];
        let mut stack = vec![p];
        seen[p] = true;
        while let Some(s) = stack.pop() {
            region += 1;
            for q in pos.neighbors(s) {
                match stones[q] {
                    Some(c) => borders[c.index()] = true,
                    None if !seen[q] => {
                        seen[q] = true;
                        stack.push(q);
                    }
                    None => {}
                }
            }
        }

        match borders {
            [true, false] => area[0] += region,
            [false, true] => area[1] += region,
            _ => {}
        }
    }

    area[0] as f32 - area[1] as f32 - pos.komi()
}
