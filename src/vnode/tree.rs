//! VNode arena - the single owning structure for the rendered tree.
//!
//! Nodes live in a slab indexed by [`NodeId`]; freed indices go to a pool
//! for O(1) reuse. Parent/child links are ids into the slab, so there is no
//! ownership cycle: the arena owns every node, relations are lookups.

use super::node::VNode;

/// Arena index of a live (or freed) VNode slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Slab arena of VNodes.
#[derive(Default)]
pub struct VNodeTree {
    nodes: Vec<Option<VNode>>,
    free: Vec<NodeId>,
    live: usize,
}

impl VNodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a slot for `node`, reusing a freed index when available.
    pub fn alloc(&mut self, node: VNode) -> NodeId {
        self.live += 1;
        if let Some(id) = self.free.pop() {
            self.nodes[id.index()] = Some(node);
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        id
    }

    /// Free a single slot, returning the node. Child links are the caller's
    /// responsibility (see [`Self::collect_subtree`] for transitive removal).
    pub fn free(&mut self, id: NodeId) -> Option<VNode> {
        let slot = self.nodes.get_mut(id.index())?;
        let node = slot.take()?;
        self.live -= 1;
        self.free.push(id);
        // Keep memory bounded when the whole tree is gone.
        if self.live == 0 {
            self.nodes.clear();
            self.free.clear();
        }
        Some(node)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.index())
            .is_some_and(|slot| slot.is_some())
    }

    pub fn get(&self, id: NodeId) -> Option<&VNode> {
        self.nodes.get(id.index())?.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut VNode> {
        self.nodes.get_mut(id.index())?.as_mut()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Distance from the root (root depth is 0). Freed ids report 0.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.get(current).and_then(|n| n.parent()) {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Append `child` to `parent`'s ordered children and set the relation.
    pub fn push_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
    }

    /// Replace `parent`'s child order wholesale (diff reordering).
    pub fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        for &child in &children {
            if let Some(node) = self.get_mut(child) {
                node.parent = Some(parent);
            }
        }
        if let Some(node) = self.get_mut(parent) {
            node.children = children;
        }
    }

    /// Detach `child` from its parent's child list. Returns its previous
    /// position.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Option<usize> {
        let node = self.get_mut(parent)?;
        let position = node.children.iter().position(|&c| c == child)?;
        node.children.remove(position);
        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = None;
        }
        Some(position)
    }

    /// Pre-order listing of `id` and every transitive child.
    pub fn collect_subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.contains(current) {
                continue;
            }
            out.push(current);
            if let Some(node) = self.get(current) {
                // Reverse push keeps pre-order in a LIFO stack.
                for &child in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        out
    }
}

// =============================================================================
// Tests
// =============================================================================
