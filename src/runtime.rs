//! Runtime - ownership of the VNode tree and the reconciliation scheduler.
//!
//! A [`Runtime`] is a cheap-to-clone handle over the single-threaded runtime
//! state: the arena, the dirty queue, the hook frame stack, and the host
//! backend. State setters and store notifications mark VNodes dirty;
//! [`Runtime::flush`] runs one reconciliation pass over the dirty set and
//! commits the resulting patch batch.
//!
//! Scheduling rules:
//! - Marking the same node dirty N times before a pass is idempotent.
//! - A pass is not re-entrant: marks arriving while one is flushing are
//!   deferred to the next pass.
//! - Dirty nodes are processed in ascending tree depth, so an ancestor
//!   re-render that satisfies a descendant's prop-caused dirtiness runs
//!   first; a descendant whose own state changed keeps its place in the
//!   queue until its own render has run.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::error::Error;
use crate::hooks::Frame;
use crate::reconciler::{self, ComponentFn, HostBackend, PendingPatch};
use crate::value::Value;
use crate::vnode::{
    mark_root_path, path_segments, NodeBody, NodeFlags, NodeId, Phase, VNode, VNodeTree,
};

/// Hard stop for [`Runtime::settle`] when an effect keeps scheduling work.
const MAX_SETTLE_PASSES: usize = 1024;

pub(crate) struct RuntimeInner {
    pub(crate) tree: VNodeTree,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) dirty: Vec<NodeId>,
    pub(crate) dirty_set: FxHashSet<NodeId>,
    pub(crate) deferred: Vec<NodeId>,
    pub(crate) deferred_set: FxHashSet<NodeId>,
    pub(crate) flushing: bool,
    pub(crate) host: Option<Box<dyn HostBackend>>,
}

impl RuntimeInner {
    /// Mark a node dirty. Idempotent before a pass; during a pass the mark
    /// is deferred to the next one.
    pub(crate) fn mark_dirty(&mut self, node: NodeId) {
        let Some(vnode) = self.tree.get_mut(node) else {
            return;
        };
        if vnode.flags.contains(NodeFlags::PENDING_UNMOUNT) {
            return;
        }
        vnode.flags.insert(NodeFlags::DIRTY);
        if self.flushing {
            if self.deferred_set.insert(node) {
                tracing::trace!(?node, "dirty mark deferred to next pass");
                self.deferred.push(node);
            }
        } else if self.dirty_set.insert(node) {
            self.dirty.push(node);
        }
    }

    /// Close a flush window: promote deferred marks into the dirty queue.
    fn end_flush_window(&mut self) {
        self.flushing = false;
        let deferred = std::mem::take(&mut self.deferred);
        self.deferred_set.clear();
        for node in deferred {
            if self.tree.contains(node) && self.dirty_set.insert(node) {
                self.dirty.push(node);
            }
        }
    }
}

/// Handle over the runtime state. Clones share everything.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RefCell<RuntimeInner>>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(RuntimeInner {
                tree: VNodeTree::new(),
                roots: Vec::new(),
                frames: Vec::new(),
                dirty: Vec::new(),
                dirty_set: FxHashSet::default(),
                deferred: Vec::new(),
                deferred_set: FxHashSet::default(),
                flushing: false,
                host: None,
            })),
        }
    }

    /// Construct with a host backend that receives every committed patch.
    pub fn with_host(host: Box<dyn HostBackend>) -> Self {
        let rt = Self::new();
        rt.inner.borrow_mut().host = Some(host);
        rt
    }

    pub fn set_host(&self, host: Box<dyn HostBackend>) {
        self.inner.borrow_mut().host = Some(host);
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Mark `node` for re-render in the next pass.
    pub fn mark_dirty(&self, node: NodeId) {
        self.inner.borrow_mut().mark_dirty(node);
    }

    /// True while a pass (render, diff, commit, effects) is executing.
    pub fn is_flushing(&self) -> bool {
        self.inner.borrow().flushing
    }

    /// Test-harness activity flag: anything still scheduled or in flight.
    pub fn has_pending_work(&self) -> bool {
        let inner = self.inner.borrow();
        inner.flushing || !inner.dirty.is_empty() || !inner.deferred.is_empty()
    }

    /// Run one reconciliation pass over the current dirty set.
    ///
    /// Dirty marks triggered from inside the pass (effects, re-entrant
    /// listeners) are queued for the next pass. A render error stops the
    /// pass and re-queues the unprocessed remainder, but the batch built so
    /// far still commits: earlier renders already mutated the tree, so their
    /// patches must reach the host and their scheduled unmounts must tear
    /// down. A commit error surfaces [`Error::CommitFailure`].
    pub fn flush(&self) -> Result<(), Error> {
        let queue = {
            let mut inner = self.inner.borrow_mut();
            if inner.flushing || inner.dirty.is_empty() {
                return Ok(());
            }
            inner.flushing = true;
            let mut queue: Vec<NodeId> = std::mem::take(&mut inner.dirty);
            inner.dirty_set.clear();
            let tree = &inner.tree;
            queue.sort_by_key(|&id| tree.depth(id));
            queue
        };
        tracing::debug!(queued = queue.len(), "reconciliation pass");

        let mut patches: Vec<PendingPatch> = Vec::new();
        let mut render_error = None;
        for (index, &id) in queue.iter().enumerate() {
            let renderable = {
                let inner = self.inner.borrow();
                inner.tree.get(id).is_some_and(|node| {
                    node.flags.contains(NodeFlags::DIRTY)
                        && !node.flags.contains(NodeFlags::PENDING_UNMOUNT)
                })
            };
            if !renderable {
                // Unmounted meanwhile, or already re-rendered by an ancestor.
                continue;
            }
            if let Err(error) = reconciler::render_node(self, id, &mut patches) {
                let mut inner = self.inner.borrow_mut();
                for &remaining in &queue[index..] {
                    if inner.tree.contains(remaining) && inner.dirty_set.insert(remaining) {
                        inner.dirty.push(remaining);
                    }
                }
                render_error = Some(error);
                break;
            }
        }

        // Tree mutations happen eagerly during the diff, so the batch commits
        // even when a later render failed; the failing node kept its dirty
        // mark and renders again next pass.
        let commit_result = reconciler::commit(self, patches);

        self.inner.borrow_mut().end_flush_window();
        match render_error {
            Some(error) => Err(error),
            None => commit_result,
        }
    }

    /// Flush until no work is pending (effects may schedule follow-up
    /// passes). Stops with a warning if the tree never settles.
    pub fn settle(&self) -> Result<(), Error> {
        let mut passes = 0;
        while self.has_pending_work() {
            self.flush()?;
            passes += 1;
            if passes >= MAX_SETTLE_PASSES {
                tracing::warn!(passes, "settle gave up; an effect keeps scheduling updates");
                break;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Mount / unmount
    // =========================================================================

    /// Mount a root component: first render plus commit of the mount batch.
    pub fn mount(&self, component: ComponentFn, props: Value) -> Result<MountHandle, Error> {
        let root = {
            let mut inner = self.inner.borrow_mut();
            let id = inner
                .tree
                .alloc(VNode::new(NodeBody::Component { component, props }, None, None));
            let ordinal = inner.roots.len();
            inner.roots.push(id);
            mark_root_path(&mut inner.tree, id, ordinal);
            inner.flushing = true;
            id
        };

        let mut patches = vec![PendingPatch::mount(root)];
        let result = match reconciler::render_node(self, root, &mut patches) {
            Ok(()) => reconciler::commit(self, patches),
            Err(error) => Err(error),
        };

        self.inner.borrow_mut().end_flush_window();

        if let Err(error) = result {
            // A failed mount never happened: drop the root again.
            self.inner.borrow_mut().roots.retain(|&r| r != root);
            reconciler::teardown_subtree(self, root);
            return Err(error);
        }
        Ok(MountHandle {
            runtime: self.clone(),
            root,
        })
    }

    pub(crate) fn unmount_root(&self, root: NodeId) -> Result<(), Error> {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.tree.contains(root) {
                return Ok(());
            }
            inner.roots.retain(|&r| r != root);
            inner.flushing = true;
        }
        let mut patches = Vec::new();
        reconciler::schedule_unmount(self, root, &mut patches);
        let result = reconciler::commit(self, patches);
        self.inner.borrow_mut().end_flush_window();
        result
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// The nearest ancestor `Context` node's provided value.
    pub fn context_value(&self, node: NodeId) -> Option<Value> {
        let inner = self.inner.borrow();
        let mut current = inner.tree.get(node)?.parent();
        while let Some(id) = current {
            let vnode = inner.tree.get(id)?;
            if let Some(value) = vnode.context_payload() {
                return Some(value.clone());
            }
            current = vnode.parent();
        }
        None
    }

    /// Stable path segments of `node` (empty if it is gone).
    pub fn path_of(&self, node: NodeId) -> Vec<String> {
        path_segments(&self.inner.borrow().tree, node)
    }

    pub fn is_mounted(&self, node: NodeId) -> bool {
        self.inner
            .borrow()
            .tree
            .get(node)
            .is_some_and(|n| n.phase() == Phase::Mounted)
    }

    /// Number of live VNodes.
    pub fn node_count(&self) -> usize {
        self.inner.borrow().tree.len()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`Runtime::mount`] for tearing the root down again.
pub struct MountHandle {
    runtime: Runtime,
    root: NodeId,
}

impl std::fmt::Debug for MountHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountHandle")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl MountHandle {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Unmount the root: effect cleanups, subscription release, node free,
    /// and one `Unmount` patch to the host.
    pub fn unmount(self) -> Result<(), Error> {
        self.runtime.unmount_root(self.root)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime_with_leaf() -> (Runtime, NodeId) {
        let rt = Runtime::new();
        let id = {
            let mut inner = rt.inner.borrow_mut();
            inner
                .tree
                .alloc(VNode::new(NodeBody::Children, None, None))
        };
        (rt, id)
    }

    #[test]
    fn test_dirty_marks_coalesce() {
        let (rt, id) = runtime_with_leaf();

        rt.mark_dirty(id);
        rt.mark_dirty(id);
        rt.mark_dirty(id);

        let inner = rt.inner.borrow();
        assert_eq!(inner.dirty.len(), 1);
        assert!(inner.dirty_set.contains(&id));
    }

    #[test]
    fn test_marks_during_flush_are_deferred() {
        let (rt, id) = runtime_with_leaf();
        rt.inner.borrow_mut().flushing = true;
        rt.mark_dirty(id);
        {
            let inner = rt.inner.borrow();
            assert!(inner.dirty.is_empty());
            assert_eq!(inner.deferred, vec![id]);
        }

        rt.inner.borrow_mut().end_flush_window();
        let inner = rt.inner.borrow();
        assert_eq!(inner.dirty, vec![id]);
        assert!(inner.deferred.is_empty());
    }

    #[test]
    fn test_mark_on_missing_node_is_ignored() {
        let rt = Runtime::new();
        rt.mark_dirty(NodeId(7));
        assert!(!rt.has_pending_work());
    }

    #[test]
    fn test_hook_stage_outside_execution() {
        let rt = Runtime::new();
        assert_eq!(rt.hook_stage(), None);
    }

    #[test]
    fn test_pending_work_flag() {
        let (rt, id) = runtime_with_leaf();
        assert!(!rt.has_pending_work());
        rt.mark_dirty(id);
        assert!(rt.has_pending_work());
    }
}
