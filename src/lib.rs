//! # glint
//!
//! UI rendering runtime core: a persistent VNode tree with a keyed
//! reconciler, a positional hooks runtime, and a listener-based reactive
//! store layer.
//!
//! The crate is host-agnostic. Components are plain functions producing
//! throwaway child descriptions; the runtime diffs each description against
//! the committed tree and hands the resulting patch batch to a
//! [`HostBackend`]. Nothing here draws - a terminal, a test harness, or any
//! other target sits behind that seam.
//!
//! ## Update cycle
//!
//! ```text
//! state write → dirty mark → flush: render dirty components (depth order)
//!             → diff children (kind + key/ordinal) → patch batch
//!             → commit to host → effects
//! ```
//!
//! ## Modules
//!
//! - [`value`] - dynamic value model shared by props, state, and stores
//! - [`vnode`] - the persistent tree: nodes, arena, structural paths
//! - [`hooks`] - positional state primitives (`use_state`, `use_memo`, ...)
//! - [`reactive`] - observable object/set/weak-set stores
//! - [`reconciler`] - child descriptions, diffing, commit
//! - [`runtime`] - scheduler and the public driving surface

pub mod error;
pub mod hooks;
pub mod reactive;
pub mod reconciler;
pub mod runtime;
pub mod value;
pub mod vnode;

pub use error::Error;

pub use value::{RawObject, Value};

pub use vnode::{Key, NodeId, PathSeg, Phase, VNodeKind};

pub use hooks::{Cleanup, HookStage, Setter};

pub use reactive::{
    Change, Listener, ListenerCell, ListenerId, RawSet, RawWeakSet, ReactiveObject, ReactiveSet,
    ReactiveWeakSet,
};

pub use reconciler::{
    component_fn, ChildSpec, ComponentFn, HostBackend, NullHost, PatchOp, PatchRecord,
};

pub use runtime::{MountHandle, Runtime};
