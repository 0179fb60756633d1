//! Node and edge statistics for PUCT.
//!
//! Edge arrays are indexed by action (points then pass) and hold values from the POV of the
//! node's side to move. They are allocated on expansion only; unexpanded children cost a
//! position and a few scalars.

use gz_core::Position;

pub type NodeId = u32;

#[derive(Clone)]
pub struct Node {
    pub position: Position,
    pub is_expanded: bool,
    /// An evaluation for this node is in flight.
    pub pending: bool,

    /// Legality per action, filled on expansion.
    pub legal: Vec<bool>,

    // Stats per action idx.
    pub n: Vec<u32>,
    pub w: Vec<f32>,
    pub p: Vec<f32>,
    pub n_sum: u32,

    // Virtual loss bookkeeping for in-flight leaf evaluations.
    pub vl_n: Vec<u32>,
    pub vl_w: Vec<f32>,
    pub vl_sum: u32,

    /// Completed backups through this node, its own evaluation included.
    pub visits: u32,
    /// Sum of backed-up values, POV of this node's side to move.
    pub value_sum: f32,
    /// Evaluator value at expansion, POV of this node's side to move.
    pub raw_value: f32,
}

impl Node {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            is_expanded: false,
            pending: false,
            legal: Vec::new(),
            n: Vec::new(),
            w: Vec::new(),
            p: Vec::new(),
            n_sum: 0,
            vl_n: Vec::new(),
            vl_w: Vec::new(),
            vl_sum: 0,
            visits: 0,
            value_sum: 0.0,
            raw_value: 0.0,
        }
    }

    pub fn expand(&mut self, priors: Vec<f32>, legal: Vec<bool>, raw_value: f32) {
        let a = priors.len();
        debug_assert_eq!(a, legal.len());
        self.is_expanded = true;
        self.pending = false;
        self.legal = legal;
        self.p = priors;
        self.n = vec![0; a];
        self.w = vec![0.0; a];
        self.vl_n = vec![0; a];
        self.vl_w = vec![0.0; a];
        self.raw_value = raw_value;
    }

    /// Mean value of the node from its own side to move.
    pub fn q(&self) -> f32 {
        if self.visits == 0 {
            0.0
        } else {
            self.value_sum / (self.visits as f32)
        }
    }

    pub fn edge_q(&self, a: usize) -> f32 {
        let n = self.n[a];
        if n == 0 {
            0.0
        } else {
            self.w[a] / (n as f32)
        }
    }

    pub fn q_eff(&self, a: usize, use_virtual_loss: bool) -> f32 {
        if !use_virtual_loss {
            return self.edge_q(a);
        }
        let n = self.n[a].saturating_add(self.vl_n[a]);
        if n == 0 {
            0.0
        } else {
            let w = self.w[a] - self.vl_w[a];
            w / (n as f32)
        }
    }
}
