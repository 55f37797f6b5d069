//! Path indexer - stable structural identity for VNodes.
//!
//! A node's path is its parent's path extended by one segment: the node's
//! ordinal among same-kind siblings, or - for keyed items under a `For`
//! node - the item's declared key. Keyed segments are what keep hook state
//! attached to a list item when the list reorders: the path of an unmoved
//! item never changes just because its index did.
//!
//! Paths are recomputed when sibling structure changes (insert, remove,
//! reorder) and stay untouched for a node that merely re-renders in place.

use super::node::{Key, VNodeKind};
use super::tree::{NodeId, VNodeTree};

/// One path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSeg {
    /// Position among siblings of the same kind.
    Ordinal(VNodeKind, usize),
    /// Declared key of a keyed `For` item.
    Key(Key),
}

impl std::fmt::Display for PathSeg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSeg::Ordinal(kind, n) => write!(f, "{}{}", kind.prefix(), n),
            PathSeg::Key(key) => write!(f, "k:{key}"),
        }
    }
}

/// Compute and assign the path of `id` from its parent's path.
///
/// No-op for nodes with no parent (roots get [`mark_root_path`]).
pub fn mark_path(tree: &mut VNodeTree, id: NodeId) {
    let Some((parent, kind, key)) = tree.get(id).map(|node| {
        (node.parent(), node.kind(), node.key().cloned())
    }) else {
        return;
    };
    let Some(parent) = parent else { return };

    let Some(parent_node) = tree.get(parent) else {
        return;
    };
    let segment = match key {
        Some(key) if parent_node.kind() == VNodeKind::For => PathSeg::Key(key),
        _ => {
            // Ordinal among preceding siblings of the same kind.
            let mut ordinal = 0;
            for &sibling in parent_node.children() {
                if sibling == id {
                    break;
                }
                if tree.get(sibling).is_some_and(|s| s.kind() == kind) {
                    ordinal += 1;
                }
            }
            PathSeg::Ordinal(kind, ordinal)
        }
    };

    let mut path = parent_node.path.clone();
    path.push(segment);
    if let Some(node) = tree.get_mut(id) {
        node.path = path;
    }
}

/// Assign a root node's single-segment path.
pub fn mark_root_path(tree: &mut VNodeTree, id: NodeId, ordinal: usize) {
    let Some(kind) = tree.get(id).map(|n| n.kind()) else {
        return;
    };
    if let Some(node) = tree.get_mut(id) {
        node.path = vec![PathSeg::Ordinal(kind, ordinal)];
    }
}

/// Recompute the paths of `id` and its whole subtree.
///
/// Descendants embed their ancestors' paths, so a changed segment anywhere
/// invalidates everything below it. Subtrees whose root segment came out
/// unchanged are skipped.
pub fn mark_subtree_paths(tree: &mut VNodeTree, id: NodeId) {
    mark_path(tree, id);
    let children: Vec<NodeId> = tree
        .get(id)
        .map(|n| n.children().to_vec())
        .unwrap_or_default();
    for child in children {
        mark_descendant_paths(tree, child);
    }
}

fn mark_descendant_paths(tree: &mut VNodeTree, id: NodeId) {
    let before = tree.get(id).map(|n| n.path.clone());
    mark_path(tree, id);
    let after = tree.get(id).map(|n| n.path.clone());
    // An unchanged non-empty segment means the subtree below is still valid.
    if before == after && before.is_some_and(|p| !p.is_empty()) {
        return;
    }
    let children: Vec<NodeId> = tree
        .get(id)
        .map(|n| n.children().to_vec())
        .unwrap_or_default();
    for child in children {
        mark_descendant_paths(tree, child);
    }
}

/// The path of `id` as stable string segments, usable as a map key.
pub fn path_segments(tree: &VNodeTree, id: NodeId) -> Vec<String> {
    tree.get(id)
        .map(|node| node.path.iter().map(|seg| seg.to_string()).collect())
        .unwrap_or_default()
}

/// The path of `id` joined into a single key string.
pub fn path_key(tree: &VNodeTree, id: NodeId) -> String {
    path_segments(tree, id).join("/")
}

// =============================================================================
// Tests
// =============================================================================
