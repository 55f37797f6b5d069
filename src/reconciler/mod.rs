//! Reconciler - render descriptions, diffing, and commit.
//!
//! Each pass renders dirty components into throwaway [`ChildSpec`] trees,
//! diffs them against the committed VNodes (matching by kind and key or
//! ordinal), accumulates a patch batch, and commits it through the
//! [`HostBackend`] seam. Effects queued during render run after a
//! successful commit.

mod commit;
mod diff;
mod spec;

pub use commit::{HostBackend, NullHost, PatchOp, PatchRecord};
pub use spec::{component_fn, ChildSpec, ComponentFn};

pub(crate) use commit::{commit, teardown_subtree, PendingPatch};
pub(crate) use diff::{render_node, schedule_unmount};
