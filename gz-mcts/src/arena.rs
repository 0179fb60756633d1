//! Node storage for one search tree. Ids are dense indices and stay valid until the tree is
//! re-rooted, which rebuilds the arena.

use crate::node::{Node, NodeId};

#[derive(Default)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId::try_from(self.nodes.len()).unwrap_or(NodeId::MAX);
        debug_assert!(id < NodeId::MAX, "arena exhausted the id space");
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id as usize]
    }

    /// Consume the arena, handing out each node at most once (used when re-rooting).
    pub fn into_slots(self) -> Vec<Option<Node>> {
        self.nodes.into_iter().map(Some).collect()
    }
}
