//! Commit - applying an accumulated patch batch.
//!
//! The diff produces the batch; commit pushes each patch to the host backend
//! in order, finalizes lifecycle phases, tears down unmounted subtrees, and
//! finally runs queued effects. A host failure aborts the remainder of the
//! batch and surfaces [`Error::CommitFailure`] naming the offending path;
//! already-applied patches are not rolled back.

use crate::error::Error;
use crate::hooks::{Cleanup, EffectBody, HookSlot};
use crate::runtime::Runtime;
use crate::vnode::{path_segments, NodeId, Phase};

// =============================================================================
// Patches
// =============================================================================

/// Kind of tree mutation a patch describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp {
    /// A node entered the tree (its subtree's patches follow in pre-order).
    Mount,
    /// A node's payload or rendered output changed in place.
    Update,
    /// A matched node changed position among its siblings.
    Move { from: usize, to: usize },
    /// A node (and transitively its subtree) left the tree.
    Unmount,
}

/// One committed mutation, addressed by structural path.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchRecord {
    pub op: PatchOp,
    pub node: NodeId,
    pub path: Vec<String>,
}

/// Batch entry; unmount paths are captured at schedule time, the rest are
/// resolved at commit when paths are final.
pub(crate) struct PendingPatch {
    pub(crate) op: PatchOp,
    pub(crate) node: NodeId,
    pub(crate) path: Option<Vec<String>>,
}

impl PendingPatch {
    pub(crate) fn mount(node: NodeId) -> Self {
        Self {
            op: PatchOp::Mount,
            node,
            path: None,
        }
    }

    pub(crate) fn update(node: NodeId) -> Self {
        Self {
            op: PatchOp::Update,
            node,
            path: None,
        }
    }

    pub(crate) fn moved(node: NodeId, from: usize, to: usize) -> Self {
        Self {
            op: PatchOp::Move { from, to },
            node,
            path: None,
        }
    }

    pub(crate) fn unmount(node: NodeId, path: Vec<String>) -> Self {
        Self {
            op: PatchOp::Unmount,
            node,
            path: Some(path),
        }
    }
}

// =============================================================================
// Host backend
// =============================================================================

/// The platform seam: commit hands every patch of a batch to the host.
///
/// How a patch becomes a visible change is the host's business; the core
/// only requires that `apply` report failure so the batch can abort.
pub trait HostBackend {
    fn apply(&mut self, patch: &PatchRecord) -> Result<(), String>;
}

/// Host that accepts every patch. The default for headless use and tests.
#[derive(Debug, Default)]
pub struct NullHost;

impl HostBackend for NullHost {
    fn apply(&mut self, _patch: &PatchRecord) -> Result<(), String> {
        Ok(())
    }
}

// =============================================================================
// Commit
// =============================================================================

/// Apply `patches` as one batch, then run queued effects.
pub(crate) fn commit(rt: &Runtime, patches: Vec<PendingPatch>) -> Result<(), Error> {
    if !patches.is_empty() {
        tracing::debug!(patches = patches.len(), "commit batch");
    }

    // The host is taken out for the duration so its `apply` never runs under
    // a runtime borrow.
    let mut host = rt
        .inner
        .borrow_mut()
        .host
        .take()
        .unwrap_or_else(|| Box::new(NullHost));

    let mut failure = None;
    for pending in patches {
        let record = {
            let inner = rt.inner.borrow();
            let path = match pending.path {
                Some(path) => path,
                None => {
                    // Nodes torn down before their patch committed (an aborted
                    // mount) leave stale entries; the host never hears of them.
                    if !inner.tree.contains(pending.node) {
                        continue;
                    }
                    path_segments(&inner.tree, pending.node)
                }
            };
            PatchRecord {
                op: pending.op,
                node: pending.node,
                path,
            }
        };

        if let Err(reason) = host.apply(&record) {
            tracing::warn!(path = record.path.join("/"), %reason, "patch rejected; batch aborted");
            failure = Some(Error::CommitFailure {
                path: record.path.join("/"),
                reason,
            });
            break;
        }

        match record.op {
            PatchOp::Mount | PatchOp::Update => {
                let mut inner = rt.inner.borrow_mut();
                if let Some(node) = inner.tree.get_mut(record.node) {
                    node.phase = Phase::Mounted;
                }
            }
            PatchOp::Unmount => teardown_subtree(rt, record.node),
            PatchOp::Move { .. } => {}
        }
    }

    rt.inner.borrow_mut().host = Some(host);

    if let Some(error) = failure {
        discard_pending_effects(rt);
        return Err(error);
    }
    run_effects(rt);
    Ok(())
}

// =============================================================================
// Unmount teardown
// =============================================================================

/// Tear down `root` and its subtree: effect cleanups in reverse declaration
/// order, then subscription removal and slot release, children before
/// parents. Frees the arena slots.
pub(crate) fn teardown_subtree(rt: &Runtime, root: NodeId) {
    let ids = rt.inner.borrow().tree.collect_subtree(root);

    for &id in ids.iter().rev() {
        let (cleanups, subscriptions) = {
            let mut inner = rt.inner.borrow_mut();
            let Some(node) = inner.tree.get_mut(id) else {
                continue;
            };
            node.phase = Phase::Unmounted;
            let mut cleanups = Vec::new();
            let mut subscriptions = Vec::new();
            for slot in node.hooks.drain(..) {
                match slot {
                    HookSlot::Effect {
                        cleanup: Some(cleanup),
                        ..
                    } => cleanups.push(cleanup),
                    HookSlot::Subscription { listeners, id, .. } => {
                        subscriptions.push((listeners, id));
                    }
                    _ => {}
                }
            }
            (cleanups, subscriptions)
        };

        // Reverse declaration order, outside any borrow (cleanups are user
        // code and may write state).
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }
        for (listeners, listener_id) in subscriptions {
            listeners.remove(listener_id);
        }

        let mut inner = rt.inner.borrow_mut();
        inner.tree.free(id);
        inner.dirty_set.remove(&id);
        inner.deferred_set.remove(&id);
        inner.dirty.retain(|&n| n != id);
        inner.deferred.retain(|&n| n != id);
    }
}

// =============================================================================
// Effects
// =============================================================================

/// Run every queued effect body: components in tree pre-order, bodies in
/// declaration order, each preceded by its previous cleanup.
fn run_effects(rt: &Runtime) {
    let roots = rt.inner.borrow().roots.clone();
    for root in roots {
        let order = rt.inner.borrow().tree.collect_subtree(root);
        for id in order {
            let tasks: Vec<(usize, Option<Cleanup>, EffectBody)> = {
                let mut inner = rt.inner.borrow_mut();
                let Some(node) = inner.tree.get_mut(id) else {
                    continue;
                };
                let mut tasks = Vec::new();
                for (slot_index, slot) in node.hooks.iter_mut().enumerate() {
                    if let HookSlot::Effect {
                        body,
                        cleanup,
                        pending: pending @ true,
                        ..
                    } = slot
                    {
                        *pending = false;
                        if let Some(body) = body.take() {
                            tasks.push((slot_index, cleanup.take(), body));
                        }
                    }
                }
                tasks
            };

            for (slot_index, cleanup, body) in tasks {
                if let Some(cleanup) = cleanup {
                    cleanup();
                }
                let next_cleanup = body();
                let mut inner = rt.inner.borrow_mut();
                if let Some(HookSlot::Effect { cleanup, .. }) = inner
                    .tree
                    .get_mut(id)
                    .and_then(|n| n.hooks.get_mut(slot_index))
                {
                    *cleanup = next_cleanup;
                }
            }
        }
    }
}

/// Drop queued effect bodies after an aborted commit; the caller decides
/// whether to retry, which re-queues them through a fresh render.
fn discard_pending_effects(rt: &Runtime) {
    let roots = rt.inner.borrow().roots.clone();
    let mut inner = rt.inner.borrow_mut();
    for root in roots {
        for id in inner.tree.collect_subtree(root) {
            if let Some(node) = inner.tree.get_mut(id) {
                for slot in node.hooks.iter_mut() {
                    if let HookSlot::Effect { body, pending, .. } = slot {
                        *pending = false;
                        *body = None;
                    }
                }
            }
        }
    }
}
