//! VNode - one instantiated node of the rendered tree.
//!
//! A node's `kind` is a closed set; diffing matches nodes by
//! (kind, key-or-ordinal) so the enum stays exhaustively matchable.
//! Nodes are owned by the arena ([`super::tree::VNodeTree`]); the parent
//! field is an id relation, never an owning pointer.

use bitflags::bitflags;

use super::path::PathSeg;
use super::tree::NodeId;
use crate::hooks::HookSlot;
use crate::reconciler::ComponentFn;
use crate::value::Value;

// =============================================================================
// Kind and identity
// =============================================================================

/// Closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VNodeKind {
    Component,
    For,
    Conditional,
    Expression,
    Hook,
    Context,
    Children,
}

impl VNodeKind {
    /// Short prefix used in path segments (`cmp0`, `for1`, ...).
    pub fn prefix(self) -> &'static str {
        match self {
            VNodeKind::Component => "cmp",
            VNodeKind::For => "for",
            VNodeKind::Conditional => "if",
            VNodeKind::Expression => "expr",
            VNodeKind::Hook => "hk",
            VNodeKind::Context => "ctx",
            VNodeKind::Children => "ch",
        }
    }
}

/// Explicit identity of a keyed list item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(std::rc::Rc<str>),
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{i}"),
            Key::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(std::rc::Rc::from(s))
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Render-cycle state machine:
/// `Unmounted -> Mounted -> Updating -> Mounted -> Unmounted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Unmounted,
    Mounted,
    Updating,
}

bitflags! {
    /// Per-node status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// Marked by a state setter or store notification; cleared on
        /// re-render.
        const DIRTY = 1 << 0;
        /// Scheduled for removal in the current pass; skipped by the
        /// scheduler from now on.
        const PENDING_UNMOUNT = 1 << 1;
    }
}

// =============================================================================
// Node body and node
// =============================================================================

/// Kind-specific payload.
#[derive(Clone)]
pub enum NodeBody {
    Component { component: ComponentFn, props: Value },
    /// Anonymous component boundary: its own hook slots, no props.
    Hook { render: ComponentFn },
    For,
    Conditional { branch: usize },
    Expression { value: Value },
    Context { value: Value },
    Children,
}

impl NodeBody {
    pub fn kind(&self) -> VNodeKind {
        match self {
            NodeBody::Component { .. } => VNodeKind::Component,
            NodeBody::Hook { .. } => VNodeKind::Hook,
            NodeBody::For => VNodeKind::For,
            NodeBody::Conditional { .. } => VNodeKind::Conditional,
            NodeBody::Expression { .. } => VNodeKind::Expression,
            NodeBody::Context { .. } => VNodeKind::Context,
            NodeBody::Children => VNodeKind::Children,
        }
    }
}

/// One instantiated node in the runtime tree.
pub struct VNode {
    pub(crate) body: NodeBody,
    pub(crate) key: Option<Key>,
    pub(crate) path: Vec<PathSeg>,
    /// Relation lookup, not ownership - the arena owns nodes.
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Hook slots in call order. Identity of slot positions across renders
    /// is the caller contract that keeps hook state alive.
    pub(crate) hooks: Vec<HookSlot>,
    pub(crate) flags: NodeFlags,
    pub(crate) phase: Phase,
}

impl VNode {
    pub fn new(body: NodeBody, key: Option<Key>, parent: Option<NodeId>) -> Self {
        Self {
            body,
            key,
            path: Vec::new(),
            parent,
            children: Vec::new(),
            hooks: Vec::new(),
            flags: NodeFlags::empty(),
            phase: Phase::Unmounted,
        }
    }

    pub fn kind(&self) -> VNodeKind {
        self.body.kind()
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_dirty(&self) -> bool {
        self.flags.contains(NodeFlags::DIRTY)
    }

    /// The expression payload, for `Expression` nodes.
    pub fn expression_value(&self) -> Option<&Value> {
        match &self.body {
            NodeBody::Expression { value } => Some(value),
            _ => None,
        }
    }

    /// The provided context payload, for `Context` nodes.
    pub fn context_payload(&self) -> Option<&Value> {
        match &self.body {
            NodeBody::Context { value } => Some(value),
            _ => None,
        }
    }

    /// The current props, for `Component` nodes.
    pub fn props(&self) -> Option<&Value> {
        match &self.body {
            NodeBody::Component { props, .. } => Some(props),
            _ => None,
        }
    }
}
