//! Hooks runtime - positional, persistent state for function components.
//!
//! A component is a plain function; what makes its state persistent is the
//! cursor the runtime binds to the owning VNode while the function runs.
//! Every primitive call consumes the next cursor position: a position that
//! already holds a slot is reused ([`HookStage::Update`]), an empty one is
//! allocated ([`HookStage::Init`]).
//!
//! Frames are stacked on the runtime, so re-entrant renders (a component
//! mounting a child component mid-render) each get their own cursor and
//! cannot corrupt each other.
//!
//! The slot count and order per component invocation is a caller contract:
//! the runtime detects a primitive-kind mismatch at a cursor position and
//! fails with `InvalidHookCall`, but it does not otherwise validate slot
//! sequences.

mod primitives;

pub use primitives::Setter;

use std::any::Any;
use std::rc::Rc;

use crate::reactive::{ListenerCell, ListenerId, ReactiveObject};
use crate::value::Value;

/// Whether the current primitive call allocates or reuses its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    /// First render at this cursor position: allocate.
    Init,
    /// The position already holds a slot: reuse.
    Update,
}

/// Teardown callback returned by effects (and by control-flow consumers).
pub type Cleanup = Box<dyn FnOnce()>;

/// Deferred effect body; runs after commit, may return a cleanup.
pub type EffectBody = Box<dyn FnOnce() -> Option<Cleanup>>;

/// One persistent state cell, owned by exactly one VNode and addressed by
/// call order.
pub(crate) enum HookSlot {
    State {
        payload: Rc<dyn Any>,
    },
    Memo {
        deps: Vec<Value>,
        /// `None` only while the initial compute is in flight.
        payload: Option<Rc<dyn Any>>,
    },
    Effect {
        deps: Option<Vec<Value>>,
        body: Option<EffectBody>,
        cleanup: Option<Cleanup>,
        /// Queued to run after the enclosing commit.
        pending: bool,
    },
    Subscription {
        listeners: ListenerCell,
        id: ListenerId,
        /// Present for `use_store` slots; `use_subscribe` leaves it empty.
        store: Option<ReactiveObject>,
    },
}

impl HookSlot {
    pub(crate) fn primitive_name(&self) -> &'static str {
        match self {
            HookSlot::State { .. } => "use_state",
            HookSlot::Memo { .. } => "use_memo",
            HookSlot::Effect { .. } => "use_effect",
            HookSlot::Subscription { .. } => "use_subscribe",
        }
    }
}

/// Execution frame for one `run_with_hooks` invocation.
pub(crate) struct Frame {
    pub(crate) node: crate::vnode::NodeId,
    pub(crate) cursor: usize,
}
