//! Hook primitives and the component execution entry point.
//!
//! All primitives live on [`Runtime`]: the runtime handle *is* the execution
//! context threaded through component functions (it arrives as the second
//! component argument), so there is no process-global hook state.

use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use super::{Cleanup, Frame, HookSlot, HookStage};
use crate::error::Error;
use crate::reactive::{Listener, ListenerCell, ReactiveObject};
use crate::reconciler::{ChildSpec, ComponentFn};
use crate::runtime::{Runtime, RuntimeInner};
use crate::value::{RawObject, Value};
use crate::vnode::NodeId;

fn no_frame(primitive: &str) -> Error {
    Error::invalid_hook_call(format!("{primitive} called outside a component execution"))
}

fn slot_mismatch(primitive: &str, found: &HookSlot) -> Error {
    Error::invalid_hook_call(format!(
        "hook order diverged: {primitive} called at a position previously \
         occupied by {}",
        found.primitive_name()
    ))
}

// =============================================================================
// Component execution
// =============================================================================

impl Runtime {
    /// Execute `component` with a fresh hook cursor bound to `node`.
    ///
    /// Every primitive invoked during the call consumes the next cursor
    /// position of `node`'s slot sequence. Frames nest: mounting a child
    /// component mid-render pushes a new frame without touching this one.
    pub fn run_with_hooks(
        &self,
        component: &ComponentFn,
        props: &Value,
        node: NodeId,
    ) -> Result<ChildSpec, Error> {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.tree.contains(node) {
                return Err(Error::invalid_hook_call("render target is not mounted"));
            }
            inner.frames.push(Frame { node, cursor: 0 });
        }
        let result = component(props, self);
        self.inner.borrow_mut().frames.pop();
        result
    }

    /// The stage the *next* primitive call would run in, or `None` when no
    /// component execution is active.
    pub fn hook_stage(&self) -> Option<HookStage> {
        let inner = self.inner.borrow();
        let frame = inner.frames.last()?;
        let slots = inner.tree.get(frame.node)?.hooks.len();
        Some(if frame.cursor < slots {
            HookStage::Update
        } else {
            HookStage::Init
        })
    }
}

// =============================================================================
// State
// =============================================================================

/// Handle for writing a state slot from outside render.
///
/// Writing stores the new payload immediately and marks the owning VNode
/// dirty; the re-render happens in the next reconciliation pass, never
/// inline. Setters on unmounted nodes (or a dropped runtime) are no-ops.
pub struct Setter<T> {
    inner: Weak<RefCell<RuntimeInner>>,
    node: NodeId,
    slot: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            node: self.node,
            slot: self.slot,
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + 'static> Setter<T> {
    /// Replace the stored value.
    pub fn set(&self, value: T) {
        let Some(rc) = self.inner.upgrade() else {
            return;
        };
        let mut inner = rc.borrow_mut();
        let updated = match inner
            .tree
            .get_mut(self.node)
            .and_then(|v| v.hooks.get_mut(self.slot))
        {
            Some(HookSlot::State { payload }) => {
                *payload = Rc::new(value);
                true
            }
            _ => false,
        };
        if updated {
            inner.mark_dirty(self.node);
        }
    }

    /// Replace the stored value computed from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let current: Option<T> = {
            let Some(rc) = self.inner.upgrade() else {
                return;
            };
            let inner = rc.borrow();
            match inner
                .tree
                .get(self.node)
                .and_then(|v| v.hooks.get(self.slot))
            {
                Some(HookSlot::State { payload }) => payload
                    .clone()
                    .downcast::<T>()
                    .ok()
                    .map(|rc| (*rc).clone()),
                _ => None,
            }
        };
        // Borrow released: `f` may itself read or write state.
        if let Some(current) = current {
            self.set(f(&current));
        }
    }
}

impl Runtime {
    /// State cell: returns the current value and a setter.
    ///
    /// `init` seeds the slot on the first render and is ignored afterwards.
    pub fn use_state<T: Clone + 'static>(&self, init: T) -> Result<(T, Setter<T>), Error> {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let frame = inner.frames.last_mut().ok_or_else(|| no_frame("use_state"))?;
        let node = frame.node;
        let cursor = frame.cursor;
        frame.cursor += 1;

        let vnode = inner
            .tree
            .get_mut(node)
            .ok_or_else(|| no_frame("use_state"))?;
        let current = if cursor < vnode.hooks.len() {
            match &vnode.hooks[cursor] {
                HookSlot::State { payload } => payload
                    .clone()
                    .downcast::<T>()
                    .map(|rc| (*rc).clone())
                    .map_err(|_| {
                        Error::invalid_hook_call("state slot type changed between renders")
                    })?,
                other => return Err(slot_mismatch("use_state", other)),
            }
        } else {
            vnode.hooks.push(HookSlot::State {
                payload: Rc::new(init.clone()),
            });
            init
        };

        Ok((
            current,
            Setter {
                inner: Rc::downgrade(&self.inner),
                node,
                slot: cursor,
                _marker: PhantomData,
            },
        ))
    }

    // =========================================================================
    // Memo
    // =========================================================================

    /// Memoized value: `compute` reruns only when `deps` differ from the
    /// previous render (object deps compare by identity).
    pub fn use_memo<T: Clone + 'static>(
        &self,
        deps: Vec<Value>,
        compute: impl FnOnce() -> T,
    ) -> Result<T, Error> {
        enum Plan {
            Cached(Rc<dyn Any>),
            Compute,
        }

        let (node, cursor, plan) = {
            let mut inner = self.inner.borrow_mut();
            let inner = &mut *inner;
            let frame = inner.frames.last_mut().ok_or_else(|| no_frame("use_memo"))?;
            let node = frame.node;
            let cursor = frame.cursor;
            frame.cursor += 1;

            let vnode = inner
                .tree
                .get_mut(node)
                .ok_or_else(|| no_frame("use_memo"))?;
            let plan = if cursor < vnode.hooks.len() {
                match &vnode.hooks[cursor] {
                    HookSlot::Memo {
                        deps: old,
                        payload: Some(payload),
                    } if *old == deps => Plan::Cached(payload.clone()),
                    HookSlot::Memo { .. } => Plan::Compute,
                    other => return Err(slot_mismatch("use_memo", other)),
                }
            } else {
                // Reserve the position before running user code.
                vnode.hooks.push(HookSlot::Memo {
                    deps: deps.clone(),
                    payload: None,
                });
                Plan::Compute
            };
            (node, cursor, plan)
        };

        match plan {
            Plan::Cached(payload) => payload
                .downcast::<T>()
                .map(|rc| (*rc).clone())
                .map_err(|_| Error::invalid_hook_call("memo slot type changed between renders")),
            Plan::Compute => {
                let value = compute();
                let mut inner = self.inner.borrow_mut();
                if let Some(slot) = inner
                    .tree
                    .get_mut(node)
                    .and_then(|v| v.hooks.get_mut(cursor))
                {
                    *slot = HookSlot::Memo {
                        deps,
                        payload: Some(Rc::new(value.clone())),
                    };
                }
                Ok(value)
            }
        }
    }

    // =========================================================================
    // Effect
    // =========================================================================

    /// Effect registration. The body is queued to run after the enclosing
    /// commit when the stage is Init or `deps` differ from the previous
    /// render; `None` deps queue it every render. The returned cleanup runs
    /// before the next body run and at unmount.
    pub fn use_effect(
        &self,
        deps: Option<Vec<Value>>,
        body: impl FnOnce() -> Option<Cleanup> + 'static,
    ) -> Result<(), Error> {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let frame = inner
            .frames
            .last_mut()
            .ok_or_else(|| no_frame("use_effect"))?;
        let node = frame.node;
        let cursor = frame.cursor;
        frame.cursor += 1;

        let vnode = inner
            .tree
            .get_mut(node)
            .ok_or_else(|| no_frame("use_effect"))?;
        if cursor < vnode.hooks.len() {
            match &mut vnode.hooks[cursor] {
                HookSlot::Effect {
                    deps: old,
                    body: slot_body,
                    pending,
                    ..
                } => {
                    let should_run = match (&deps, &*old) {
                        (None, _) => true,
                        (Some(_), None) => true,
                        (Some(new), Some(previous)) => new != previous,
                    };
                    *old = deps;
                    if should_run {
                        *slot_body = Some(Box::new(body));
                        *pending = true;
                    }
                }
                other => return Err(slot_mismatch("use_effect", other)),
            }
        } else {
            vnode.hooks.push(HookSlot::Effect {
                deps,
                body: Some(Box::new(body)),
                cleanup: None,
                pending: true,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Store subscription
    // =========================================================================

    /// Reactive object store owned by this slot. Created once from `init`;
    /// every mutation of the store (or anything nested in it) marks the
    /// owning VNode dirty. The subscription is detached at unmount.
    pub fn use_store(&self, init: impl FnOnce() -> RawObject) -> Result<ReactiveObject, Error> {
        let (node, cursor) = {
            let mut inner = self.inner.borrow_mut();
            let inner = &mut *inner;
            let frame = inner.frames.last_mut().ok_or_else(|| no_frame("use_store"))?;
            let node = frame.node;
            let cursor = frame.cursor;
            frame.cursor += 1;

            let vnode = inner
                .tree
                .get_mut(node)
                .ok_or_else(|| no_frame("use_store"))?;
            if cursor < vnode.hooks.len() {
                return match &vnode.hooks[cursor] {
                    HookSlot::Subscription {
                        store: Some(store), ..
                    } => Ok(store.clone()),
                    other => Err(slot_mismatch("use_store", other)),
                };
            }
            (node, cursor)
        };

        // Init: build the store outside the borrow (init is user code).
        let raw = init();
        let listeners = ListenerCell::new();
        let id = listeners.add(self.dirty_listener(node));
        let store = ReactiveObject::new(raw, listeners.clone(), false);

        let mut inner = self.inner.borrow_mut();
        let vnode = inner
            .tree
            .get_mut(node)
            .ok_or_else(|| no_frame("use_store"))?;
        if vnode.hooks.len() != cursor {
            return Err(Error::invalid_hook_call(
                "hook primitives invoked inside a use_store initializer",
            ));
        }
        vnode.hooks.push(HookSlot::Subscription {
            listeners,
            id,
            store: Some(store.clone()),
        });
        Ok(store)
    }

    /// Subscribe the current component to an externally owned listener cell:
    /// any notification marks the owning VNode dirty. The listener is removed
    /// at unmount.
    pub fn use_subscribe(&self, listeners: &ListenerCell) -> Result<(), Error> {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let frame = inner
            .frames
            .last_mut()
            .ok_or_else(|| no_frame("use_subscribe"))?;
        let node = frame.node;
        let cursor = frame.cursor;
        frame.cursor += 1;

        let dirty_listener = self.dirty_listener(node);

        let vnode = inner
            .tree
            .get_mut(node)
            .ok_or_else(|| no_frame("use_subscribe"))?;
        if cursor < vnode.hooks.len() {
            match &vnode.hooks[cursor] {
                HookSlot::Subscription { .. } => Ok(()),
                other => Err(slot_mismatch("use_subscribe", other)),
            }
        } else {
            let id = listeners.add(dirty_listener);
            vnode.hooks.push(HookSlot::Subscription {
                listeners: listeners.clone(),
                id,
                store: None,
            });
            Ok(())
        }
    }

    /// A listener that marks `node` dirty on every notification.
    fn dirty_listener(&self, node: NodeId) -> Listener {
        let weak = Rc::downgrade(&self.inner);
        Rc::new(move |_change| {
            if let Some(rc) = weak.upgrade() {
                rc.borrow_mut().mark_dirty(node);
            }
        })
    }
}
