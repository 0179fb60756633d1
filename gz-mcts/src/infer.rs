//! Evaluator interface and reference evaluators.
//!
//! - `probs` has one entry per action (points then pass) and sums to 1 over legal moves.
//! - `value` is in [-1,1] from the POV of the position's side to move.

use std::hash::{Hash, Hasher};

use gz_core::{Color, Move, Position};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use rustc_hash::FxHasher;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub probs: Vec<f32>,
    pub value: f32,
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("batch size mismatch: sent {expected} positions, got {got} results")]
    BatchSize { expected: usize, got: usize },
    #[error("evaluator backend failed: {0}")]
    Backend(String),
}

/// A (possibly batched) position evaluator.
pub trait Evaluator {
    /// Evaluate all positions in one call; results are returned in input order.
    fn evaluate_batch(&self, positions: &[&Position]) -> Result<Vec<Evaluation>, EvalError>;

    fn evaluate(&self, position: &Position) -> Result<Evaluation, EvalError> {
        let mut out = self.evaluate_batch(&[position])?;
        if out.len() != 1 {
            return Err(EvalError::BatchSize {
                expected: 1,
                got: out.len(),
            });
        }
        Ok(out.remove(0))
    }
}

impl<E: Evaluator + ?Sized> Evaluator for &E {
    fn evaluate_batch(&self, positions: &[&Position]) -> Result<Vec<Evaluation>, EvalError> {
        (**self).evaluate_batch(positions)
    }
}

pub fn uniform_over_legal(legal: &[bool]) -> Vec<f32> {
    let cnt = legal.iter().filter(|&&ok| ok).count();
    let mut out = vec![0.0f32; legal.len()];
    if cnt == 0 {
        return out;
    }
    let u = 1.0 / (cnt as f32);
    for (o, &ok) in out.iter_mut().zip(legal) {
        if ok {
            *o = u;
        }
    }
    out
}

/// Uniform policy + zero value (baseline stub).
pub struct UniformEvaluator;

impl Evaluator for UniformEvaluator {
    fn evaluate_batch(&self, positions: &[&Position]) -> Result<Vec<Evaluation>, EvalError> {
        Ok(positions
            .iter()
            .map(|pos| Evaluation {
                probs: uniform_over_legal(&pos.legal_moves()),
                value: 0.0,
            })
            .collect())
    }
}

/// Uniform policy + the outcome of one random playout as value.
///
/// Playouts never fill a single-point eye of the side to move and pass when nothing else is
/// left. The random stream is derived from the position and `seed`, so evaluating the same
/// position twice gives the same value.
pub struct RolloutEvaluator {
    pub seed: u64,
}

impl RolloutEvaluator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn rollout_value(&self, pos: &Position) -> f32 {
        let pov = pos.to_play();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed ^ position_hash(pos));
        let size = pos.size();
        let limit = pos.n() + 3 * (size * size) as u32;

        let mut cur = pos.clone();
        let mut candidates: Vec<usize> = Vec::with_capacity(size * size);
        while !cur.is_game_over() && cur.n() < limit {
            candidates.clear();
            for p in 0..size * size {
                if cur.stone_at(p).is_none() && !is_own_eye(&cur, p, cur.to_play()) {
                    candidates.push(p);
                }
            }
            candidates.shuffle(&mut rng);

            let mut next = None;
            for &p in &candidates {
                if let Ok(n) = cur.play_move(Move::Play(p)) {
                    next = Some(n);
                    break;
                }
            }
            cur = match next {
                Some(n) => n,
                None => match cur.play_move(Move::Pass) {
                    Ok(n) => n,
                    Err(_) => break,
                },
            };
        }
        cur.result().z_for(pov)
    }
}

impl Evaluator for RolloutEvaluator {
    fn evaluate_batch(&self, positions: &[&Position]) -> Result<Vec<Evaluation>, EvalError> {
        Ok(positions
            .iter()
            .map(|pos| Evaluation {
                probs: uniform_over_legal(&pos.legal_moves()),
                value: self.rollout_value(pos),
            })
            .collect())
    }
}

fn is_own_eye(pos: &Position, p: usize, me: Color) -> bool {
    let size = pos.size();
    let (row, col) = gz_core::coords::unflatten(p, size);
    let mut any = false;
    let neighbors = [
        (row > 0).then(|| p - size),
        (row + 1 < size).then(|| p + size),
        (col > 0).then(|| p - 1),
        (col + 1 < size).then(|| p + 1),
    ];
    for q in neighbors.into_iter().flatten() {
        if pos.stone_at(q) != Some(me) {
            return false;
        }
        any = true;
    }
    any
}

/// Stable hash of the board, side to move and move number.
pub fn position_hash(pos: &Position) -> u64 {
    let mut h = FxHasher::default();
    pos.stones().hash(&mut h);
    pos.to_play().hash(&mut h);
    pos.n().hash(&mut h);
    h.finish()
}
