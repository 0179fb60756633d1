//! Core PUCT MCTS over Go positions, driven leaf by leaf by an external caller.

use std::collections::VecDeque;
use std::fmt::Write as _;

use gz_core::{move_to_human, Move, Position, RulesError};
use rand::Rng;
use rand_core::RngCore;
use rand_distr::{Distribution, Gamma};
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::arena::Arena;
use crate::infer::{uniform_over_legal, Evaluation};
use crate::node::{Node, NodeId};
use crate::tree::{LeafSelection, SearchTree};

#[derive(Debug, Clone, Copy)]
pub struct MctsConfig {
    pub c_puct: f32,
    /// Root Dirichlet alpha.
    pub dirichlet_alpha: f32,
    /// Root Dirichlet epsilon mix-in fraction. 0 disables noise.
    pub dirichlet_epsilon: f32,
    /// Virtual loss to apply while a leaf is pending.
    pub virtual_loss: f32,
    /// Moves before this number are sampled proportionally to visits.
    pub softpick_move_cutoff: u32,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            c_puct: 1.5,
            dirichlet_alpha: 0.03,
            dirichlet_epsilon: 0.25,
            virtual_loss: 1.0,
            softpick_move_cutoff: 6,
        }
    }
}

impl MctsConfig {
    pub fn validate(&self) -> Result<(), MctsError> {
        if !(self.c_puct.is_finite() && self.c_puct > 0.0) {
            return Err(MctsError::InvalidConfig {
                msg: "c_puct must be finite and > 0",
            });
        }
        if !(self.dirichlet_alpha.is_finite() && self.dirichlet_alpha > 0.0) {
            return Err(MctsError::InvalidConfig {
                msg: "dirichlet_alpha must be finite and > 0",
            });
        }
        if !(self.dirichlet_epsilon.is_finite() && (0.0..=1.0).contains(&self.dirichlet_epsilon))
        {
            return Err(MctsError::InvalidConfig {
                msg: "dirichlet_epsilon must be in [0, 1]",
            });
        }
        if !(self.virtual_loss.is_finite() && self.virtual_loss >= 0.0) {
            return Err(MctsError::InvalidConfig {
                msg: "virtual_loss must be finite and >= 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum MctsError {
    #[error("invalid config: {msg}")]
    InvalidConfig { msg: &'static str },
    #[error("illegal move {mv:?}: {source}")]
    IllegalMove {
        mv: Move,
        #[source]
        source: RulesError,
    },
    #[error("evaluation has {got} move probabilities, expected {expected}")]
    MalformedEvaluation { expected: usize, got: usize },
    #[error("evaluation contains non-finite numbers")]
    NonFiniteEvaluation,
}

#[derive(Debug, Default, Clone)]
pub struct SearchStats {
    pub node_count: usize,
    pub expansions: u32,
    pub fallbacks: u32,
    pub pending_collisions: u32,
    pub terminal_backups: u32,
}

/// Handle for a selected leaf. Holds the edges from the root down to it.
#[derive(Debug)]
pub struct PendingLeaf {
    node: NodeId,
    path: Vec<(NodeId, usize)>,
    /// This handle set the node's `pending` flag (false for collisions).
    claim: bool,
}

impl PendingLeaf {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

pub struct Mcts {
    cfg: MctsConfig,
    arena: Arena,
    root: NodeId,
    // Child mapping per parent: (parent_node_id, action_idx) -> child_node_id.
    children: FxHashMap<(NodeId, u16), NodeId>,
    stats: SearchStats,
}

impl Mcts {
    pub fn new(cfg: MctsConfig, position: Position) -> Result<Self, MctsError> {
        cfg.validate()?;
        let mut arena = Arena::new();
        let root = arena.push(Node::new(position));
        Ok(Self {
            cfg,
            arena,
            root,
            children: FxHashMap::default(),
            stats: SearchStats {
                node_count: 1,
                ..SearchStats::default()
            },
        })
    }

    pub fn config(&self) -> &MctsConfig {
        &self.cfg
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn root(&self) -> &Node {
        self.arena.get(self.root)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.arena.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Child of the root reached by action index `a`, if it has been created.
    pub fn root_child(&self, a: usize) -> Option<&Node> {
        self.children
            .get(&(self.root, a as u16))
            .map(|&id| self.arena.get(id))
    }

    fn child_or_insert(&mut self, parent: NodeId, a: usize) -> Result<NodeId, MctsError> {
        if let Some(&cid) = self.children.get(&(parent, a as u16)) {
            return Ok(cid);
        }
        let pos = &self.arena.get(parent).position;
        let mv = Move::from_index(a, pos.size());
        let next = pos
            .play_move(mv)
            .map_err(|source| MctsError::IllegalMove { mv, source })?;
        let cid = self.arena.push(Node::new(next));
        self.children.insert((parent, a as u16), cid);
        self.stats.node_count = self.arena.len();
        Ok(cid)
    }

    fn select_action(&mut self, node_id: NodeId) -> usize {
        let n = self.arena.get(node_id);
        let use_vl = self.cfg.virtual_loss > 0.0;
        let n_sum_eff = if use_vl {
            n.n_sum.saturating_add(n.vl_sum)
        } else {
            n.n_sum
        };
        // Keep exploration alive on the very first descent through a node.
        let sqrt_sum = (n_sum_eff.max(1) as f32).sqrt();

        let mut best_score = f32::NEG_INFINITY;
        let mut best_a: usize = n.legal.len().saturating_sub(1);

        for (a, &ok) in n.legal.iter().enumerate() {
            if !ok {
                continue;
            }
            let q = n.q_eff(a, use_vl);
            let n_eff = if use_vl {
                n.n[a].saturating_add(n.vl_n[a]) as f32
            } else {
                n.n[a] as f32
            };
            let u = self.cfg.c_puct * n.p[a] * sqrt_sum / (1.0 + n_eff);
            let score = q + u;
            // Strict comparison: ties go to the lowest index.
            if score > best_score {
                best_score = score;
                best_a = a;
            }
        }
        best_a
    }

    fn apply_virtual_loss_path(&mut self, path: &[(NodeId, usize)]) {
        for &(node_id, a) in path {
            let n = self.arena.get_mut(node_id);
            n.vl_n[a] = n.vl_n[a].saturating_add(1);
            n.vl_w[a] += self.cfg.virtual_loss;
            n.vl_sum = n.vl_sum.saturating_add(1);
        }
    }

    fn remove_virtual_loss_path(&mut self, path: &[(NodeId, usize)]) {
        for &(node_id, a) in path.iter().rev() {
            let n = self.arena.get_mut(node_id);
            n.vl_n[a] = n.vl_n[a].saturating_sub(1);
            n.vl_w[a] -= self.cfg.virtual_loss;
            n.vl_sum = n.vl_sum.saturating_sub(1);
        }
    }

    fn backup(&mut self, path: &[(NodeId, usize)], leaf: NodeId, v_leaf: f32) {
        // v_leaf is from POV of the leaf's side to move; every ply (pass included) flips it.
        let l = self.arena.get_mut(leaf);
        l.visits += 1;
        l.value_sum += v_leaf;

        let mut v = v_leaf;
        for &(node_id, a) in path.iter().rev() {
            v = -v;
            let n = self.arena.get_mut(node_id);
            n.n[a] += 1;
            n.w[a] += v;
            n.n_sum += 1;
            n.visits += 1;
            n.value_sum += v;
        }
    }

    /// Keep only the subtree under `new_root`, renumbering nodes into a fresh arena.
    fn reroot(&mut self, new_root: NodeId) {
        let mut by_parent: FxHashMap<NodeId, Vec<(u16, NodeId)>> = FxHashMap::default();
        for (&(parent, a), &child) in &self.children {
            by_parent.entry(parent).or_default().push((a, child));
        }

        let mut old = std::mem::take(&mut self.arena).into_slots();
        let mut arena = Arena::with_capacity(old.len());
        let mut children = FxHashMap::default();
        let mut queue: VecDeque<(NodeId, NodeId)> = VecDeque::new();

        if let Some(node) = old[new_root as usize].take() {
            queue.push_back((new_root, arena.push(node)));
        }
        while let Some((old_id, new_id)) = queue.pop_front() {
            let Some(kids) = by_parent.get(&old_id) else {
                continue;
            };
            for &(a, old_child) in kids {
                if let Some(node) = old[old_child as usize].take() {
                    let new_child = arena.push(node);
                    children.insert((new_id, a), new_child);
                    queue.push_back((old_child, new_child));
                }
            }
        }

        self.arena = arena;
        self.children = children;
        self.root = 0;
        self.stats.node_count = self.arena.len();
    }
}

impl SearchTree for Mcts {
    type Leaf = PendingLeaf;

    fn root_position(&self) -> &Position {
        &self.root().position
    }

    fn root_visits(&self) -> u32 {
        self.root().visits
    }

    fn root_q(&self) -> f32 {
        self.root().q()
    }

    fn root_raw_value(&self) -> f32 {
        self.root().raw_value
    }

    fn is_root_expanded(&self) -> bool {
        self.root().is_expanded
    }

    fn select_leaf(&mut self) -> Result<LeafSelection<PendingLeaf>, MctsError> {
        let mut path: Vec<(NodeId, usize)> = Vec::new();
        let mut node_id = self.root;

        loop {
            let node = self.arena.get(node_id);

            if node.position.is_game_over() {
                let pos = &node.position;
                let z = pos.result().z_for(pos.to_play());
                self.backup(&path, node_id, z);
                self.stats.terminal_backups += 1;
                return Ok(LeafSelection::Terminal);
            }

            if !node.is_expanded {
                self.apply_virtual_loss_path(&path);
                let n = self.arena.get_mut(node_id);
                if n.pending {
                    self.stats.pending_collisions += 1;
                    return Ok(LeafSelection::Collision(PendingLeaf {
                        node: node_id,
                        path,
                        claim: false,
                    }));
                }
                n.pending = true;
                return Ok(LeafSelection::Pending(PendingLeaf {
                    node: node_id,
                    path,
                    claim: true,
                }));
            }

            let a = self.select_action(node_id);
            let child = self.child_or_insert(node_id, a)?;
            path.push((node_id, a));
            node_id = child;
        }
    }

    fn leaf_position<'a>(&'a self, leaf: &PendingLeaf) -> &'a Position {
        &self.arena.get(leaf.node).position
    }

    fn incorporate_results(
        &mut self,
        leaf: PendingLeaf,
        eval: Evaluation,
    ) -> Result<(), MctsError> {
        self.remove_virtual_loss_path(&leaf.path);
        if leaf.claim {
            self.arena.get_mut(leaf.node).pending = false;
        }

        let node = self.arena.get(leaf.node);
        let expected = node.position.action_space();
        if eval.probs.len() != expected {
            return Err(MctsError::MalformedEvaluation {
                expected,
                got: eval.probs.len(),
            });
        }
        if !eval.value.is_finite() || eval.probs.iter().any(|p| !p.is_finite()) {
            return Err(MctsError::NonFiniteEvaluation);
        }
        if node.is_expanded {
            // A second evaluation of the same node adds nothing.
            return Ok(());
        }

        let legal = node.position.legal_moves();
        let (priors, used_fallback) = normalize_over_legal(&eval.probs, &legal);
        if used_fallback {
            self.stats.fallbacks += 1;
        }
        let value = eval.value.clamp(-1.0, 1.0);
        self.arena.get_mut(leaf.node).expand(priors, legal, value);
        self.stats.expansions += 1;

        self.backup(&leaf.path, leaf.node, value);
        Ok(())
    }

    fn revert_virtual_loss(&mut self, leaf: PendingLeaf) {
        self.remove_virtual_loss_path(&leaf.path);
        if leaf.claim {
            self.arena.get_mut(leaf.node).pending = false;
        }
    }

    fn inject_noise(&mut self, rng: &mut dyn RngCore) {
        let (alpha, eps) = (self.cfg.dirichlet_alpha, self.cfg.dirichlet_epsilon);
        let root = self.arena.get_mut(self.root);
        if !root.is_expanded || eps <= 0.0 {
            return;
        }
        root.p = apply_root_dirichlet_noise(&root.p, &root.legal, alpha, eps, rng);
    }

    fn children_as_pi(&self, squash: bool) -> Vec<f32> {
        let root = self.root();
        if !root.is_expanded {
            return uniform_over_legal(&root.position.legal_moves());
        }
        let mut pi = vec![0.0f32; root.legal.len()];
        let mut sum = 0.0f32;
        for (a, &ok) in root.legal.iter().enumerate() {
            if ok {
                let mut v = root.n[a] as f32;
                if squash {
                    v = v.powf(0.98);
                }
                pi[a] = v;
                sum += v;
            }
        }
        if !(sum.is_finite() && sum > 0.0) {
            return uniform_over_legal(&root.legal);
        }
        for v in &mut pi {
            *v /= sum;
        }
        pi
    }

    fn softpick_move_cutoff(&self) -> u32 {
        self.cfg.softpick_move_cutoff
    }

    fn pick_move(&self, rng: &mut dyn RngCore) -> Move {
        let root = self.root();
        let size = root.position.size();
        if !root.is_expanded {
            return Move::Pass;
        }

        if root.position.n() < self.cfg.softpick_move_cutoff && root.n_sum > 0 {
            let target = rng.gen_range(0..root.n_sum);
            let mut acc = 0u32;
            for (a, &ok) in root.legal.iter().enumerate() {
                if !ok {
                    continue;
                }
                acc += root.n[a];
                if target < acc {
                    return Move::from_index(a, size);
                }
            }
        }

        // Greedy: most visits, then highest prior; lowest index on ties.
        let mut best: Option<(usize, u32, f32)> = None;
        for (a, &ok) in root.legal.iter().enumerate() {
            if !ok {
                continue;
            }
            let key = (root.n[a], root.p[a]);
            match best {
                Some((_, bn, bp)) if (key.0, key.1) <= (bn, bp) => {}
                _ => best = Some((a, key.0, key.1)),
            }
        }
        best.map(|(a, _, _)| Move::from_index(a, size))
            .unwrap_or(Move::Pass)
    }

    fn should_resign(&self, threshold: f32) -> bool {
        self.root_q() < threshold
    }

    fn play_move(&mut self, mv: Move) -> Result<(), MctsError> {
        let pos = &self.root().position;
        let size = pos.size();
        if let Move::Play(p) = mv {
            if p >= size * size {
                return Err(MctsError::IllegalMove {
                    mv,
                    source: RulesError::OffBoard(p),
                });
            }
        }
        if !pos.is_move_legal(mv) {
            // Re-run through the rules engine to report why.
            let source = match pos.play_move(mv) {
                Err(e) => e,
                Ok(_) => RulesError::GameOver,
            };
            return Err(MctsError::IllegalMove { mv, source });
        }
        let child = self.child_or_insert(self.root, mv.to_index(size))?;
        self.reroot(child);
        Ok(())
    }

    fn describe(&self) -> String {
        let root = self.root();
        let size = root.position.size();
        let mut s = String::new();
        let _ = writeln!(
            s,
            "root: N={} Q={:.4} raw={:.4} nodes={}",
            root.visits,
            root.q(),
            root.raw_value,
            self.arena.len()
        );
        if !root.is_expanded {
            return s;
        }
        let mut order: Vec<usize> = (0..root.legal.len()).filter(|&a| root.legal[a]).collect();
        order.sort_by(|&x, &y| root.n[y].cmp(&root.n[x]).then(x.cmp(&y)));
        for &a in order.iter().take(8) {
            if root.n[a] == 0 {
                break;
            }
            let _ = writeln!(
                s,
                "{:>5}: N={:<5} Q={:+.4} P={:.4}",
                move_to_human(Move::from_index(a, size), size),
                root.n[a],
                root.edge_q(a),
                root.p[a]
            );
        }
        s
    }
}

/// Renormalize evaluator probabilities over legal moves; uniform if they carry no mass.
fn normalize_over_legal(probs: &[f32], legal: &[bool]) -> (Vec<f32>, bool) {
    let mut out = vec![0.0f32; legal.len()];
    let mut sum = 0.0f32;
    for (a, &ok) in legal.iter().enumerate() {
        if ok {
            let p = probs[a].max(0.0);
            out[a] = p;
            sum += p;
        }
    }
    if !(sum.is_finite() && sum > 0.0) {
        return (uniform_over_legal(legal), true);
    }
    for v in &mut out {
        *v /= sum;
    }
    (out, false)
}

fn apply_root_dirichlet_noise(
    p_raw: &[f32],
    legal: &[bool],
    alpha: f32,
    eps: f32,
    rng: &mut dyn RngCore,
) -> Vec<f32> {
    let Ok(gamma) = Gamma::new(alpha as f64, 1.0) else {
        return p_raw.to_vec();
    };

    // Sample gamma(alpha, 1) for each legal action, then normalize -> Dirichlet.
    let mut eta = vec![0.0f64; legal.len()];
    let mut sum = 0.0f64;
    for (i, &ok) in legal.iter().enumerate() {
        if ok {
            let x = gamma.sample(&mut *rng);
            eta[i] = x;
            sum += x;
        }
    }
    if !(sum.is_finite() && sum > 0.0) {
        return p_raw.to_vec();
    }

    // Mix.
    legal
        .iter()
        .enumerate()
        .map(|(i, &ok)| {
            if ok {
                (1.0 - eps) * p_raw[i] + eps * (eta[i] / sum) as f32
            } else {
                0.0
            }
        })
        .collect()
}

/// PUCT child choice on a standalone node (exposed for benches).
pub fn bench_select_action(cfg: &MctsConfig, node: Node) -> usize {
    let mut arena = Arena::new();
    let root = arena.push(node);
    let mut m = Mcts {
        cfg: *cfg,
        arena,
        root,
        children: FxHashMap::default(),
        stats: SearchStats::default(),
    };
    m.select_action(root)
}
