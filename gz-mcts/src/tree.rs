//! The search-tree seam used by the self-play driver.

use gz_core::{Move, Position};
use rand_core::RngCore;

use crate::infer::Evaluation;
use crate::mcts::MctsError;

/// Outcome of one leaf selection.
#[derive(Debug)]
pub enum LeafSelection<L> {
    /// Unexpanded leaf; virtual loss is applied along its path until it is incorporated or
    /// reverted.
    Pending(L),
    /// The descent reached a leaf that is already waiting for an evaluation. Virtual loss is
    /// applied as for `Pending`; the caller must revert it and must not evaluate the leaf.
    Collision(L),
    /// The descent reached a finished game; the tree has already backed up its result.
    Terminal,
}

/// Tree operations the episode driver relies on.
///
/// The tree owns every node. Callers only hold leaf handles between selection and
/// incorporation, and every handle must be given back through `incorporate_results` or
/// `revert_virtual_loss`.
pub trait SearchTree {
    type Leaf;

    fn root_position(&self) -> &Position;

    /// Completed backups through the root, its own evaluation included.
    fn root_visits(&self) -> u32;

    /// Mean root value, POV of the side to move at the root.
    fn root_q(&self) -> f32;

    /// Evaluator value recorded when the root was expanded.
    fn root_raw_value(&self) -> f32;

    fn is_root_expanded(&self) -> bool;

    fn select_leaf(&mut self) -> Result<LeafSelection<Self::Leaf>, MctsError>;

    fn leaf_position<'a>(&'a self, leaf: &Self::Leaf) -> &'a Position;

    /// Expand the leaf and back up its value. Virtual loss is released even when the
    /// evaluation is rejected.
    fn incorporate_results(&mut self, leaf: Self::Leaf, eval: Evaluation)
        -> Result<(), MctsError>;

    /// Release a leaf's virtual loss without backing anything up.
    fn revert_virtual_loss(&mut self, leaf: Self::Leaf);

    /// Mix exploration noise into the root priors.
    fn inject_noise(&mut self, rng: &mut dyn RngCore);

    /// Visit distribution over all actions (zero on illegal moves).
    fn children_as_pi(&self, squash: bool) -> Vec<f32>;

    /// Move number before which moves are sampled rather than picked greedily.
    fn softpick_move_cutoff(&self) -> u32;

    fn pick_move(&self, rng: &mut dyn RngCore) -> Move;

    fn should_resign(&self, threshold: f32) -> bool;

    /// Advance the root to the child reached by `mv`, releasing every other subtree.
    fn play_move(&mut self, mv: Move) -> Result<(), MctsError>;

    /// Multi-line human-readable summary of the root.
    fn describe(&self) -> String;
}
