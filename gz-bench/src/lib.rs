//! Shared fixtures for the criterion benches.

use gz_core::{Move, Position, RulesError};
use gz_mcts::node::Node;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;

/// Play up to `plies` random non-pass moves from the empty board.
///
/// Stops early if a side has no legal point left. Deterministic in `seed`.
pub fn midgame_position(
    size: usize,
    komi: f32,
    plies: u32,
    seed: u64,
) -> Result<Position, RulesError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut pos = Position::new(size, komi)?;
    for _ in 0..plies {
        let points: Vec<usize> = pos
            .legal_moves()
            .iter()
            .take(size * size)
            .enumerate()
            .filter_map(|(p, &ok)| ok.then_some(p))
            .collect();
        let Some(&p) = points.choose(&mut rng) else {
            break;
        };
        pos = pos.play_move(Move::Play(p))?;
    }
    Ok(pos)
}

/// An expanded node with uniform priors over the legal moves and uneven visit counts.
pub fn visited_node(pos: Position) -> Node {
    let legal = pos.legal_moves();
    let count = legal.iter().filter(|&&ok| ok).count().max(1) as f32;
    let priors = legal
        .iter()
        .map(|&ok| if ok { 1.0 / count } else { 0.0 })
        .collect();
    let mut node = Node::new(pos);
    node.expand(priors, legal, 0.0);
    for a in 0..node.n.len() {
        if node.legal[a] {
            node.n[a] = a as u32 % 17;
            node.w[a] = (a as f32).sin() * node.n[a] as f32 * 0.5;
            node.n_sum += node.n[a];
        }
    }
    node.visits = node.n_sum + 1;
    node
}
