//! Child descriptions - what a component render produces.
//!
//! A [`ChildSpec`] is the lightweight, per-render description of a subtree;
//! the reconciler diffs it against the committed VNodes of the same position
//! and mutates the persistent tree to match. Specs are throwaway values:
//! all persistence (hook slots, paths, phases) lives on the VNodes.

use std::rc::Rc;

use crate::error::Error;
use crate::runtime::Runtime;
use crate::value::Value;
use crate::vnode::{Key, VNodeKind};

/// Component calling convention: `(props, runtime) -> child description`.
///
/// The runtime handle is the execution context hook primitives run against;
/// it is only valid to call them while the component executes under
/// [`Runtime::run_with_hooks`].
pub type ComponentFn = Rc<dyn Fn(&Value, &Runtime) -> Result<ChildSpec, Error>>;

/// Wrap a closure as a [`ComponentFn`].
pub fn component_fn(
    f: impl Fn(&Value, &Runtime) -> Result<ChildSpec, Error> + 'static,
) -> ComponentFn {
    Rc::new(f)
}

/// One described child, optionally keyed (keys matter under `For`).
pub struct ChildSpec {
    pub(crate) key: Option<Key>,
    pub(crate) node: SpecNode,
}

pub(crate) enum SpecNode {
    Component {
        component: ComponentFn,
        props: Value,
    },
    For {
        items: Vec<ChildSpec>,
    },
    Conditional {
        branch: usize,
        child: Option<Box<ChildSpec>>,
    },
    Expression {
        value: Value,
    },
    Hook {
        render: ComponentFn,
    },
    Context {
        value: Value,
        children: Vec<ChildSpec>,
    },
    Children {
        children: Vec<ChildSpec>,
    },
}

impl ChildSpec {
    pub fn kind(&self) -> VNodeKind {
        match &self.node {
            SpecNode::Component { .. } => VNodeKind::Component,
            SpecNode::For { .. } => VNodeKind::For,
            SpecNode::Conditional { .. } => VNodeKind::Conditional,
            SpecNode::Expression { .. } => VNodeKind::Expression,
            SpecNode::Hook { .. } => VNodeKind::Hook,
            SpecNode::Context { .. } => VNodeKind::Context,
            SpecNode::Children { .. } => VNodeKind::Children,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Attach an explicit key (list-item identity under `For`).
    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn component(component: ComponentFn, props: Value) -> Self {
        Self {
            key: None,
            node: SpecNode::Component { component, props },
        }
    }

    pub fn hook(render: ComponentFn) -> Self {
        Self {
            key: None,
            node: SpecNode::Hook { render },
        }
    }

    pub fn expression(value: impl Into<Value>) -> Self {
        Self {
            key: None,
            node: SpecNode::Expression {
                value: value.into(),
            },
        }
    }

    pub fn for_items(items: Vec<ChildSpec>) -> Self {
        Self {
            key: None,
            node: SpecNode::For { items },
        }
    }

    /// A conditional position. `branch` tags which arm rendered; switching
    /// arms replaces the child subtree instead of diffing across arms.
    pub fn conditional(branch: usize, child: Option<ChildSpec>) -> Self {
        Self {
            key: None,
            node: SpecNode::Conditional {
                branch,
                child: child.map(Box::new),
            },
        }
    }

    pub fn context(value: impl Into<Value>, children: Vec<ChildSpec>) -> Self {
        Self {
            key: None,
            node: SpecNode::Context {
                value: value.into(),
                children,
            },
        }
    }

    /// A plain fragment grouping several children.
    pub fn fragment(children: Vec<ChildSpec>) -> Self {
        Self {
            key: None,
            node: SpecNode::Children { children },
        }
    }
}
