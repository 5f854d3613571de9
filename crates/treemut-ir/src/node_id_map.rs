//! Stable node identities across clone generations.
//!
//! A [`NodeIdMap`] belongs to one program snapshot. Arena indices change every time a
//! program is cloned; ids do not. Mutations refer to nodes by id only.

use crate::node::NodeIndex;
use crate::program::Program;
use std::collections::HashMap;
use treemut_core::NodeId;

/// Never handed out or mapped, so the watermark always fits in a `u32`
const ID_CEILING: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct NodeIdMap {
    node_to_id: HashMap<NodeIndex, NodeId>,
    id_to_node: HashMap<NodeId, NodeIndex>,
    /// Every id below this watermark has been handed out at some point
    fresh_id: u32,
}

impl Default for NodeIdMap {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeIdMap {
    pub fn new() -> Self {
        Self {
            node_to_id: HashMap::new(),
            id_to_node: HashMap::new(),
            fresh_id: 1,
        }
    }

    /// Assign ids 1, 2, 3, ... to every reachable node in pre-order
    pub fn from_program(program: &Program) -> Self {
        let mut map = Self::new();
        for idx in program.reachable_nodes() {
            let id = map.take_fresh_id();
            map.add(idx, id);
        }
        map
    }

    /// An empty map for the next generation that keeps this allocator's watermark
    pub fn successor(&self) -> Self {
        Self {
            node_to_id: HashMap::new(),
            id_to_node: HashMap::new(),
            fresh_id: self.fresh_id.max(1),
        }
    }

    /// Record `node` as having `id`.
    ///
    /// # Panics
    ///
    /// If `id` is invalid or the allocator ceiling, or either side is already mapped.
    pub fn add(&mut self, node: NodeIndex, id: NodeId) {
        assert!(id.is_valid(), "cannot map {} to the invalid id", node);
        assert!(id.0 < ID_CEILING, "id {} is past the end of the id space", id);
        assert!(
            !self.node_to_id.contains_key(&node),
            "node {} already has id {}",
            node,
            self.node_to_id[&node]
        );
        assert!(
            !self.id_to_node.contains_key(&id),
            "id {} already names node {}",
            id,
            self.id_to_node[&id]
        );
        self.node_to_id.insert(node, id);
        self.id_to_node.insert(id, node);
        if id.0 >= self.fresh_id {
            self.fresh_id = id.0 + 1;
        }
    }

    /// Id of `node`, or [`NodeId::INVALID`] if it has none
    pub fn get_id(&self, node: NodeIndex) -> NodeId {
        self.node_to_id.get(&node).copied().unwrap_or(NodeId::INVALID)
    }

    pub fn get_node(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_to_node.get(&id).copied()
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.id_to_node.contains_key(&id)
    }

    /// Hand out an id that has never been returned by this allocator or its ancestors
    pub fn take_fresh_id(&mut self) -> NodeId {
        assert!(self.fresh_id < ID_CEILING, "node id space exhausted");
        let id = NodeId(self.fresh_id);
        self.fresh_id += 1;
        id
    }

    /// True if `id` is valid, below the ceiling and names no node in this map
    pub fn is_fresh(&self, id: NodeId) -> bool {
        id.is_valid() && id.0 < ID_CEILING && !self.id_to_node.contains_key(&id)
    }

    /// Drop entries whose node fails `keep`. Dropped ids stay retired.
    pub fn retain(&mut self, mut keep: impl FnMut(NodeIndex) -> bool) {
        let id_to_node = &mut self.id_to_node;
        self.node_to_id.retain(|node, id| {
            let kept = keep(*node);
            if !kept {
                id_to_node.remove(id);
            }
            kept
        });
    }

    pub fn len(&self) -> usize {
        self.node_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_to_id.is_empty()
    }

    /// All (id, node) pairs sorted by id
    pub fn entries(&self) -> Vec<(NodeId, NodeIndex)> {
        let mut entries: Vec<_> = self.id_to_node.iter().map(|(id, n)| (*id, *n)).collect();
        entries.sort();
        entries
    }
}
