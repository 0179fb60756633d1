//! MCTS implementation (PUCT) for AlphaZero-style self-play on Go.
//!
//! The design uses:
//! - Action space `size*size + 1` (every point plus pass), sized at runtime from the position
//! - Arena-backed node storage; re-rooting compacts the arena onto the kept subtree
//! - Leaf-at-a-time selection with virtual loss so callers can batch evaluations

pub mod arena;
pub mod infer;
pub mod mcts;
pub mod node;
pub mod tree;

pub use infer::{EvalError, Evaluation, Evaluator, RolloutEvaluator, UniformEvaluator};
pub use mcts::{bench_select_action, Mcts, MctsConfig, MctsError, PendingLeaf, SearchStats};
pub use tree::{LeafSelection, SearchTree};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


#[cfg(test)]
mod mcts_tests;
