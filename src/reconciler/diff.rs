//! Diff - matching a render's child description against committed VNodes.
//!
//! Children are matched by (kind, key-or-ordinal): the ordinal is a node's
//! position among same-kind siblings, an explicit key overrides it. Matched
//! nodes are updated in place so their hook slots survive; unmatched old
//! nodes are scheduled for unmount; unmatched new ones are mounted. Matched
//! nodes whose sibling index changed produce `Move` patches - a keyed list
//! reorder never unmounts the moved items.

use rustc_hash::FxHashMap;

use super::commit::{teardown_subtree, PendingPatch};
use super::spec::{ChildSpec, SpecNode};
use crate::error::Error;
use crate::hooks::HookSlot;
use crate::runtime::Runtime;
use crate::value::Value;
use crate::vnode::{
    mark_subtree_paths, path_segments, Key, NodeBody, NodeFlags, NodeId, Phase, VNode, VNodeKind,
};

/// Identity of one child position: explicit key, or ordinal among same-kind
/// siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
    Keyed(VNodeKind, Key),
    Ordinal(VNodeKind, usize),
}

/// Assign slot keys to a sequence of kinds/keys, counting ordinals per kind.
struct SlotKeyer {
    ordinals: FxHashMap<VNodeKind, usize>,
}

impl SlotKeyer {
    fn new() -> Self {
        Self {
            ordinals: FxHashMap::default(),
        }
    }

    fn next(&mut self, kind: VNodeKind, key: Option<&Key>) -> SlotKey {
        if let Some(key) = key {
            return SlotKey::Keyed(kind, key.clone());
        }
        let ordinal = self.ordinals.entry(kind).or_insert(0);
        let slot = SlotKey::Ordinal(kind, *ordinal);
        *ordinal += 1;
        slot
    }
}

// =============================================================================
// Component render
// =============================================================================

/// Re-run the component (or hook boundary) at `id` and reconcile its output
/// against its committed children. No-op for non-renderable kinds.
pub(crate) fn render_node(
    rt: &Runtime,
    id: NodeId,
    patches: &mut Vec<PendingPatch>,
) -> Result<(), Error> {
    let (component, props, was_mounted) = {
        let mut inner = rt.inner.borrow_mut();
        let Some(node) = inner.tree.get_mut(id) else {
            return Ok(());
        };
        let pair = match &node.body {
            NodeBody::Component { component, props } => (component.clone(), props.clone()),
            NodeBody::Hook { render } => (render.clone(), Value::Null),
            _ => return Ok(()),
        };
        let was_mounted = node.phase == Phase::Mounted;
        if was_mounted {
            node.phase = Phase::Updating;
        }
        (pair.0, pair.1, was_mounted)
    };

    let result = rt
        .run_with_hooks(&component, &props, id)
        .and_then(|spec| reconcile_children(rt, id, vec![spec], patches));
    if let Err(error) = result {
        abort_render(rt, id, was_mounted);
        return Err(error);
    }

    {
        let mut inner = rt.inner.borrow_mut();
        if let Some(node) = inner.tree.get_mut(id) {
            node.flags.remove(NodeFlags::DIRTY);
        }
    }
    if was_mounted {
        patches.push(PendingPatch::update(id));
    }
    Ok(())
}

/// Back out of a failed render: the node stays in its committed phase, keeps
/// its dirty mark for the next pass, and the effect bodies its aborted
/// execution registered are discarded (the render never committed).
fn abort_render(rt: &Runtime, id: NodeId, was_mounted: bool) {
    let mut inner = rt.inner.borrow_mut();
    if let Some(node) = inner.tree.get_mut(id) {
        if was_mounted {
            node.phase = Phase::Mounted;
        }
        for slot in node.hooks.iter_mut() {
            if let HookSlot::Effect { body, pending, .. } = slot {
                *pending = false;
                *body = None;
            }
        }
    }
}

// =============================================================================
// Children reconciliation
// =============================================================================

/// Diff `specs` against `parent`'s committed children.
pub(crate) fn reconcile_children(
    rt: &Runtime,
    parent: NodeId,
    specs: Vec<ChildSpec>,
    patches: &mut Vec<PendingPatch>,
) -> Result<(), Error> {
    // Snapshot the committed order and assign identities.
    let old_children: Vec<NodeId> = {
        let inner = rt.inner.borrow();
        inner
            .tree
            .get(parent)
            .map(|n| n.children().to_vec())
            .unwrap_or_default()
    };

    let old_slots: FxHashMap<SlotKey, (NodeId, usize)> = {
        let inner = rt.inner.borrow();
        let mut keyer = SlotKeyer::new();
        old_children
            .iter()
            .enumerate()
            .filter_map(|(index, &id)| {
                let node = inner.tree.get(id)?;
                Some((keyer.next(node.kind(), node.key()), (id, index)))
            })
            .collect()
    };

    let mut keyer = SlotKeyer::new();
    let mut new_children: Vec<NodeId> = Vec::with_capacity(specs.len());
    let mut matched: FxHashMap<NodeId, usize> = FxHashMap::default();

    for spec in specs {
        let slot = keyer.next(spec.kind(), spec.key());
        let outcome = match old_slots.get(&slot) {
            Some(&(existing, old_index)) => {
                matched.insert(existing, old_index);
                new_children.push(existing);
                update_existing(rt, existing, spec, patches)
            }
            None => mount_spec(rt, parent, spec, patches).map(|mounted| {
                new_children.push(mounted);
            }),
        };
        if let Err(error) = outcome {
            // Abort without losing committed children: everything matched or
            // freshly mounted so far stays attached, the unprocessed tail
            // keeps its old order. Nothing is unmounted; the parent keeps its
            // dirty mark and re-diffs on the retry pass.
            let mut inner = rt.inner.borrow_mut();
            let mut merged = new_children;
            for &old in &old_children {
                if inner.tree.contains(old) && !merged.contains(&old) {
                    merged.push(old);
                }
            }
            inner.tree.set_children(parent, merged);
            mark_subtree_paths(&mut inner.tree, parent);
            return Err(error);
        }
    }

    // Unmatched committed children leave the tree.
    for &old in &old_children {
        if !matched.contains_key(&old) {
            schedule_unmount(rt, old, patches);
        }
    }

    // Moves: matched children whose sibling index changed.
    for (new_index, &child) in new_children.iter().enumerate() {
        if let Some(&old_index) = matched.get(&child) {
            if old_index != new_index {
                patches.push(PendingPatch::moved(child, old_index, new_index));
            }
        }
    }

    {
        let mut inner = rt.inner.borrow_mut();
        inner.tree.set_children(parent, new_children);
        mark_subtree_paths(&mut inner.tree, parent);
    }
    Ok(())
}

/// Update a matched node in place from its new description. Hook slots are
/// untouched; component re-render happens only when props changed (hook
/// boundaries re-render unconditionally - their closures capture fresh
/// environment every parent render).
fn update_existing(
    rt: &Runtime,
    id: NodeId,
    spec: ChildSpec,
    patches: &mut Vec<PendingPatch>,
) -> Result<(), Error> {
    match spec.node {
        SpecNode::Component {
            component: new_component,
            props: new_props,
        } => {
            let props_changed = {
                let mut inner = rt.inner.borrow_mut();
                let Some(node) = inner.tree.get_mut(id) else {
                    return Ok(());
                };
                match &mut node.body {
                    NodeBody::Component { component, props } => {
                        *component = new_component;
                        let changed = *props != new_props;
                        if changed {
                            *props = new_props;
                        }
                        changed
                    }
                    _ => return Ok(()),
                }
            };
            if props_changed {
                render_node(rt, id, patches)?;
            }
            Ok(())
        }
        SpecNode::Hook { render: new_render } => {
            {
                let mut inner = rt.inner.borrow_mut();
                if let Some(node) = inner.tree.get_mut(id) {
                    if let NodeBody::Hook { render } = &mut node.body {
                        *render = new_render;
                    }
                }
            }
            render_node(rt, id, patches)
        }
        SpecNode::Expression { value: new_value } => {
            let changed = {
                let mut inner = rt.inner.borrow_mut();
                let Some(node) = inner.tree.get_mut(id) else {
                    return Ok(());
                };
                match &mut node.body {
                    NodeBody::Expression { value } if *value != new_value => {
                        *value = new_value;
                        true
                    }
                    _ => false,
                }
            };
            if changed {
                patches.push(PendingPatch::update(id));
            }
            Ok(())
        }
        SpecNode::Conditional {
            branch: new_branch,
            child,
        } => {
            let branch_changed = {
                let inner = rt.inner.borrow();
                match inner.tree.get(id).map(|n| &n.body) {
                    Some(NodeBody::Conditional { branch }) => *branch != new_branch,
                    _ => return Ok(()),
                }
            };
            if branch_changed {
                // Arms never diff against each other: replace the subtree.
                let old_children = {
                    let inner = rt.inner.borrow();
                    inner
                        .tree
                        .get(id)
                        .map(|n| n.children().to_vec())
                        .unwrap_or_default()
                };
                for old in old_children {
                    schedule_unmount(rt, old, patches);
                }
                {
                    let mut inner = rt.inner.borrow_mut();
                    if let Some(node) = inner.tree.get_mut(id) {
                        node.body = NodeBody::Conditional { branch: new_branch };
                        node.children.clear();
                    }
                }
                let new_children = match child {
                    Some(child_spec) => vec![mount_spec(rt, id, *child_spec, patches)?],
                    None => Vec::new(),
                };
                {
                    let mut inner = rt.inner.borrow_mut();
                    inner.tree.set_children(id, new_children);
                    mark_subtree_paths(&mut inner.tree, id);
                }
                patches.push(PendingPatch::update(id));
                Ok(())
            } else {
                let specs = child.map(|c| vec![*c]).unwrap_or_default();
                reconcile_children(rt, id, specs, patches)
            }
        }
        SpecNode::Context {
            value: new_value,
            children,
        } => {
            let changed = {
                let mut inner = rt.inner.borrow_mut();
                let Some(node) = inner.tree.get_mut(id) else {
                    return Ok(());
                };
                match &mut node.body {
                    NodeBody::Context { value } if *value != new_value => {
                        *value = new_value;
                        true
                    }
                    _ => false,
                }
            };
            if changed {
                patches.push(PendingPatch::update(id));
            }
            reconcile_children(rt, id, children, patches)
        }
        SpecNode::For { items } => reconcile_children(rt, id, items, patches),
        SpecNode::Children { children } => reconcile_children(rt, id, children, patches),
    }
}

// =============================================================================
// Mount
// =============================================================================

/// Materialize a spec as a fresh VNode subtree under `parent`. Emits the
/// node's `Mount` patch before its descendants' (pre-order). A render error
/// anywhere below frees the half-built subtree immediately; its queued mount
/// patches are dropped at commit because the nodes are gone.
fn mount_spec(
    rt: &Runtime,
    parent: NodeId,
    spec: ChildSpec,
    patches: &mut Vec<PendingPatch>,
) -> Result<NodeId, Error> {
    enum Descend {
        Render,
        Children(Vec<ChildSpec>),
        Leaf,
    }

    let ChildSpec { key, node } = spec;
    let (body, descend) = match node {
        SpecNode::Component { component, props } => {
            (NodeBody::Component { component, props }, Descend::Render)
        }
        SpecNode::Hook { render } => (NodeBody::Hook { render }, Descend::Render),
        SpecNode::Expression { value } => (NodeBody::Expression { value }, Descend::Leaf),
        SpecNode::For { items } => (NodeBody::For, Descend::Children(items)),
        SpecNode::Conditional { branch, child } => (
            NodeBody::Conditional { branch },
            Descend::Children(child.map(|c| vec![*c]).unwrap_or_default()),
        ),
        SpecNode::Context { value, children } => {
            (NodeBody::Context { value }, Descend::Children(children))
        }
        SpecNode::Children { children } => (NodeBody::Children, Descend::Children(children)),
    };

    let id = {
        let mut inner = rt.inner.borrow_mut();
        inner.tree.alloc(VNode::new(body, key, Some(parent)))
    };
    patches.push(PendingPatch::mount(id));

    let descended = match descend {
        Descend::Render => render_node(rt, id, patches),
        Descend::Children(children) => reconcile_children(rt, id, children, patches),
        Descend::Leaf => Ok(()),
    };
    if let Err(error) = descended {
        // Never expose a partially mounted subtree.
        teardown_subtree(rt, id);
        return Err(error);
    }
    Ok(id)
}

// =============================================================================
// Unmount scheduling
// =============================================================================

/// Schedule `id`'s subtree for removal: capture its path while still valid,
/// flag every node so the scheduler skips it, and emit the `Unmount` patch.
/// Teardown itself happens when the patch commits.
pub(crate) fn schedule_unmount(rt: &Runtime, id: NodeId, patches: &mut Vec<PendingPatch>) {
    let path = {
        let mut inner = rt.inner.borrow_mut();
        if !inner.tree.contains(id) {
            return;
        }
        let subtree = inner.tree.collect_subtree(id);
        for &member in &subtree {
            if let Some(node) = inner.tree.get_mut(member) {
                node.flags.insert(NodeFlags::PENDING_UNMOUNT);
            }
        }
        path_segments(&inner.tree, id)
    };
    tracing::trace!(path = path.join("/"), "unmount scheduled");
    patches.push(PendingPatch::unmount(id, path));
}
