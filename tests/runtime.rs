//! End-to-end runtime scenarios: mount, state-driven re-render, keyed list
//! reorder, conditional branch replacement, effects, stores, and commit
//! failure, all observed through a recording host backend.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use glint::{
    component_fn, ChildSpec, Error, HostBackend, PatchOp, PatchRecord, RawObject, Runtime, Setter,
    Value,
};

// =============================================================================
// Test hosts
// =============================================================================

/// Host that records every applied patch.
#[derive(Clone, Default)]
struct RecordingHost {
    records: Rc<RefCell<Vec<PatchRecord>>>,
}

impl HostBackend for RecordingHost {
    fn apply(&mut self, patch: &PatchRecord) -> Result<(), String> {
        self.records.borrow_mut().push(patch.clone());
        Ok(())
    }
}

impl RecordingHost {
    fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// (mounts, updates, moves, unmounts) among records from `start` on.
    fn op_counts(&self, start: usize) -> (usize, usize, usize, usize) {
        let records = self.records.borrow();
        let mut counts = (0, 0, 0, 0);
        for record in records.iter().skip(start) {
            match record.op {
                PatchOp::Mount => counts.0 += 1,
                PatchOp::Update => counts.1 += 1,
                PatchOp::Move { .. } => counts.2 += 1,
                PatchOp::Unmount => counts.3 += 1,
            }
        }
        counts
    }

    fn paths_with_op(&self, op: PatchOp) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .filter(|r| r.op == op)
            .map(|r| r.path.join("/"))
            .collect()
    }
}

/// Host that rejects exactly one path.
struct FailingHost {
    reject: &'static str,
}

impl HostBackend for FailingHost {
    fn apply(&mut self, patch: &PatchRecord) -> Result<(), String> {
        if patch.path.join("/") == self.reject {
            Err("target unavailable".to_string())
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// State batching
// =============================================================================

#[test]
fn test_rapid_state_writes_render_once() {
    let host = RecordingHost::default();
    let rt = Runtime::with_host(Box::new(host.clone()));

    let rendered: Rc<RefCell<Vec<i64>>> = Rc::new(RefCell::new(Vec::new()));
    let setter: Rc<RefCell<Option<Setter<i64>>>> = Rc::new(RefCell::new(None));

    let counter = component_fn({
        let rendered = rendered.clone();
        let setter = setter.clone();
        move |_props, rt| {
            let (count, set) = rt.use_state(0i64)?;
            rendered.borrow_mut().push(count);
            *setter.borrow_mut() = Some(set);
            Ok(ChildSpec::expression(count))
        }
    });

    rt.mount(counter, Value::Null).unwrap();
    assert_eq!(*rendered.borrow(), vec![0]);

    // Three writes before the pass coalesce into one re-render showing 3.
    let set = setter.borrow().clone().unwrap();
    set.update(|c| c + 1);
    set.update(|c| c + 1);
    set.update(|c| c + 1);
    assert!(rt.has_pending_work());

    rt.flush().unwrap();
    assert_eq!(*rendered.borrow(), vec![0, 3]);

    // Both the component and its expression child reported updates.
    let updates = host.paths_with_op(PatchOp::Update);
    assert!(updates.contains(&"cmp0".to_string()));
    assert!(updates.contains(&"cmp0/expr0".to_string()));
}

#[test]
fn test_setter_after_unmount_is_noop() {
    let rt = Runtime::new();
    let setter: Rc<RefCell<Option<Setter<i64>>>> = Rc::new(RefCell::new(None));

    let counter = component_fn({
        let setter = setter.clone();
        move |_props, rt| {
            let (count, set) = rt.use_state(0i64)?;
            *setter.borrow_mut() = Some(set);
            Ok(ChildSpec::expression(count))
        }
    });

    let handle = rt.mount(counter, Value::Null).unwrap();
    handle.unmount().unwrap();
    assert_eq!(rt.node_count(), 0);

    let set = setter.borrow().clone().unwrap();
    set.set(5);
    assert!(!rt.has_pending_work());
}

// =============================================================================
// Keyed list reorder
// =============================================================================

#[test]
fn test_keyed_reorder_moves_instead_of_remounting() {
    let host = RecordingHost::default();
    let rt = Runtime::with_host(Box::new(host.clone()));

    let effect_log: Rc<RefCell<Vec<(String, i64)>>> = Rc::new(RefCell::new(Vec::new()));
    let item_setters: Rc<RefCell<HashMap<String, Setter<i64>>>> =
        Rc::new(RefCell::new(HashMap::new()));

    let item = component_fn({
        let effect_log = effect_log.clone();
        let item_setters = item_setters.clone();
        move |props, rt| {
            let id = props
                .get("id")
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_default();
            let seed = props.get("seed").and_then(|v| v.as_int()).unwrap_or(0);
            let (value, set) = rt.use_state(seed)?;
            item_setters.borrow_mut().insert(id.clone(), set);
            rt.use_effect(None, {
                let effect_log = effect_log.clone();
                let id = id.clone();
                move || {
                    effect_log.borrow_mut().push((id, value));
                    None
                }
            })?;
            Ok(ChildSpec::expression(value))
        }
    });

    let order_setter: Rc<RefCell<Option<Setter<Vec<&'static str>>>>> =
        Rc::new(RefCell::new(None));
    let list = component_fn({
        let item = item.clone();
        let order_setter = order_setter.clone();
        move |_props, rt| {
            let (order, set) = rt.use_state(vec!["a", "b", "c"])?;
            *order_setter.borrow_mut() = Some(set);
            let items = order
                .iter()
                .map(|&id| {
                    let seed = match id {
                        "a" => 1i64,
                        "b" => 2,
                        _ => 3,
                    };
                    ChildSpec::component(
                        item.clone(),
                        Value::object_from([("id", Value::from(id)), ("seed", Value::from(seed))]),
                    )
                    .with_key(id)
                })
                .collect();
            Ok(ChildSpec::for_items(items))
        }
    });

    rt.mount(list, Value::Null).unwrap();
    assert_eq!(
        *effect_log.borrow(),
        vec![("a".into(), 1), ("b".into(), 2), ("c".into(), 3)]
    );

    // Give item "a" distinct local state before the reorder.
    item_setters.borrow().get("a").unwrap().clone().set(10);
    rt.flush().unwrap();
    assert_eq!(effect_log.borrow().last(), Some(&("a".into(), 10)));

    let before = host.len();
    effect_log.borrow_mut().clear();
    order_setter
        .borrow()
        .clone()
        .unwrap()
        .set(vec!["c", "a", "b"]);
    rt.flush().unwrap();

    // Every item changed position: three moves, nothing mounted or torn down.
    let (mounts, _updates, moves, unmounts) = host.op_counts(before);
    assert_eq!(mounts, 0);
    assert_eq!(moves, 3);
    assert_eq!(unmounts, 0);

    // Item state rode along with the key; effects follow the new tree order.
    assert_eq!(
        *effect_log.borrow(),
        vec![("c".into(), 3), ("a".into(), 10), ("b".into(), 2)]
    );
}

#[test]
fn test_keyed_item_path_is_stable() {
    let host = RecordingHost::default();
    let rt = Runtime::with_host(Box::new(host.clone()));

    let list = component_fn(|_props, _rt| {
        Ok(ChildSpec::for_items(vec![
            ChildSpec::expression("first").with_key("a"),
            ChildSpec::expression("second").with_key("b"),
        ]))
    });
    rt.mount(list, Value::Null).unwrap();

    let mounts = host.paths_with_op(PatchOp::Mount);
    assert!(mounts.contains(&"cmp0/for0/k:a".to_string()));
    assert!(mounts.contains(&"cmp0/for0/k:b".to_string()));
}

// =============================================================================
// Conditionals
// =============================================================================

#[test]
fn test_branch_switch_replaces_subtree() {
    let host = RecordingHost::default();
    let rt = Runtime::with_host(Box::new(host.clone()));

    let show_setter: Rc<RefCell<Option<Setter<bool>>>> = Rc::new(RefCell::new(None));
    let view = component_fn({
        let show_setter = show_setter.clone();
        move |_props, rt| {
            let (show, set) = rt.use_state(true)?;
            *show_setter.borrow_mut() = Some(set);
            let (branch, child) = if show {
                (0, ChildSpec::expression("on"))
            } else {
                (1, ChildSpec::expression("off"))
            };
            Ok(ChildSpec::conditional(branch, Some(child)))
        }
    });

    rt.mount(view, Value::Null).unwrap();
    let before = host.len();

    show_setter.borrow().clone().unwrap().set(false);
    rt.flush().unwrap();

    // Arms never diff against each other, even when both are expressions.
    let (mounts, _updates, moves, unmounts) = host.op_counts(before);
    assert_eq!((mounts, moves, unmounts), (1, 0, 1));
    assert_eq!(
        host.paths_with_op(PatchOp::Unmount),
        vec!["cmp0/if0/expr0".to_string()]
    );
}

#[test]
fn test_same_branch_updates_in_place() {
    let host = RecordingHost::default();
    let rt = Runtime::with_host(Box::new(host.clone()));

    let label_setter: Rc<RefCell<Option<Setter<i64>>>> = Rc::new(RefCell::new(None));
    let view = component_fn({
        let label_setter = label_setter.clone();
        move |_props, rt| {
            let (n, set) = rt.use_state(0i64)?;
            *label_setter.borrow_mut() = Some(set);
            Ok(ChildSpec::conditional(0, Some(ChildSpec::expression(n))))
        }
    });

    rt.mount(view, Value::Null).unwrap();
    let before = host.len();

    label_setter.borrow().clone().unwrap().set(1);
    rt.flush().unwrap();

    let (mounts, updates, _moves, unmounts) = host.op_counts(before);
    assert_eq!((mounts, unmounts), (0, 0));
    assert!(updates > 0);
}

// =============================================================================
// Hooks
// =============================================================================

#[test]
fn test_hook_call_outside_component_fails() {
    let rt = Runtime::new();
    assert!(matches!(
        rt.use_state(0i64),
        Err(Error::InvalidHookCall { .. })
    ));
    assert!(matches!(
        rt.use_effect(None, || None),
        Err(Error::InvalidHookCall { .. })
    ));
}

#[test]
fn test_hook_order_divergence_fails() {
    let rt = Runtime::new();
    let flipped = Rc::new(Cell::new(false));

    let view = component_fn({
        let flipped = flipped.clone();
        move |_props, rt| {
            if flipped.get() {
                rt.use_memo(vec![], || 1i64)?;
            } else {
                rt.use_state(0i64)?;
            }
            Ok(ChildSpec::expression(0i64))
        }
    });

    let handle = rt.mount(view, Value::Null).unwrap();

    flipped.set(true);
    rt.mark_dirty(handle.root());
    assert!(matches!(rt.flush(), Err(Error::InvalidHookCall { .. })));
}

#[test]
fn test_memo_recomputes_only_on_dep_change() {
    let rt = Runtime::new();
    let computes = Rc::new(Cell::new(0usize));
    let setters: Rc<RefCell<Option<(Setter<i64>, Setter<i64>)>>> = Rc::new(RefCell::new(None));

    let view = component_fn({
        let computes = computes.clone();
        let setters = setters.clone();
        move |_props, rt| {
            let (trigger, set_trigger) = rt.use_state(0i64)?;
            let (dep, set_dep) = rt.use_state(0i64)?;
            let _ = trigger;
            let doubled = rt.use_memo(vec![Value::Int(dep)], {
                let computes = computes.clone();
                move || {
                    computes.set(computes.get() + 1);
                    dep * 2
                }
            })?;
            *setters.borrow_mut() = Some((set_trigger, set_dep));
            Ok(ChildSpec::expression(doubled))
        }
    });

    rt.mount(view, Value::Null).unwrap();
    assert_eq!(computes.get(), 1);

    let (set_trigger, set_dep) = setters.borrow().clone().unwrap();
    set_trigger.set(1); // unrelated state: cached value reused
    rt.flush().unwrap();
    assert_eq!(computes.get(), 1);

    set_dep.set(7);
    rt.flush().unwrap();
    assert_eq!(computes.get(), 2);
}

// =============================================================================
// Effects
// =============================================================================

#[test]
fn test_effects_run_after_commit_and_clean_up_in_reverse() {
    let events: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

    struct LoggingHost {
        events: Rc<RefCell<Vec<String>>>,
    }
    impl HostBackend for LoggingHost {
        fn apply(&mut self, patch: &PatchRecord) -> Result<(), String> {
            self.events
                .borrow_mut()
                .push(format!("patch:{}", patch.path.join("/")));
            Ok(())
        }
    }

    let rt = Runtime::with_host(Box::new(LoggingHost {
        events: events.clone(),
    }));

    let view = component_fn({
        let events = events.clone();
        move |_props, rt| {
            for name in ["one", "two"] {
                let events = events.clone();
                rt.use_effect(Some(vec![]), move || {
                    events.borrow_mut().push(format!("effect:{name}"));
                    let events = events.clone();
                    Some(Box::new(move || {
                        events.borrow_mut().push(format!("cleanup:{name}"));
                    }) as Box<dyn FnOnce()>)
                })?;
            }
            Ok(ChildSpec::expression("body"))
        }
    });

    let handle = rt.mount(view, Value::Null).unwrap();
    {
        let events = events.borrow();
        let first_effect = events.iter().position(|e| e.starts_with("effect")).unwrap();
        // Every patch of the mount batch precedes the first effect.
        assert!(events[..first_effect].iter().all(|e| e.starts_with("patch")));
        assert_eq!(events[first_effect..], ["effect:one", "effect:two"]);
    }

    handle.unmount().unwrap();
    let events = events.borrow();
    let tail = &events[events.len() - 2..];
    assert_eq!(tail, ["cleanup:two", "cleanup:one"]);
}

#[test]
fn test_effect_driven_updates_settle() {
    let rt = Runtime::new();
    let rendered: Rc<RefCell<Vec<i64>>> = Rc::new(RefCell::new(Vec::new()));

    let view = component_fn({
        let rendered = rendered.clone();
        move |_props, rt| {
            let (count, set) = rt.use_state(0i64)?;
            rendered.borrow_mut().push(count);
            rt.use_effect(Some(vec![Value::Int(count)]), move || {
                if count < 2 {
                    set.set(count + 1);
                }
                None
            })?;
            Ok(ChildSpec::expression(count))
        }
    });

    rt.mount(view, Value::Null).unwrap();
    // The mount-time effect scheduled work for the next pass, not this one.
    assert!(rt.has_pending_work());

    rt.settle().unwrap();
    assert_eq!(*rendered.borrow(), vec![0, 1, 2]);
    assert!(!rt.has_pending_work());
}

// =============================================================================
// Stores
// =============================================================================

#[test]
fn test_store_mutation_triggers_rerender() {
    let rt = Runtime::new();
    let rendered: Rc<RefCell<Vec<i64>>> = Rc::new(RefCell::new(Vec::new()));
    let store_out: Rc<RefCell<Option<glint::ReactiveObject>>> = Rc::new(RefCell::new(None));

    let view = component_fn({
        let rendered = rendered.clone();
        let store_out = store_out.clone();
        move |_props, rt| {
            let store = rt.use_store(|| {
                let raw: RawObject = Rc::new(RefCell::new(BTreeMap::new()));
                raw.borrow_mut().insert("count".into(), Value::Int(0));
                raw
            })?;
            let count = store
                .get("count")
                .and_then(|entry| entry.value().as_int())
                .unwrap_or(0);
            rendered.borrow_mut().push(count);
            *store_out.borrow_mut() = Some(store);
            Ok(ChildSpec::expression(count))
        }
    });

    let handle = rt.mount(view, Value::Null).unwrap();
    assert_eq!(*rendered.borrow(), vec![0]);

    let store = store_out.borrow().clone().unwrap();
    store.set("count", 1i64);
    rt.flush().unwrap();
    assert_eq!(*rendered.borrow(), vec![0, 1]);

    // Object stores report every write, including value-preserving ones.
    store.set("count", 1i64);
    rt.flush().unwrap();
    assert_eq!(*rendered.borrow(), vec![0, 1, 1]);

    // After unmount the subscription is gone: writes stop scheduling work.
    handle.unmount().unwrap();
    store.set("count", 2i64);
    assert!(!rt.has_pending_work());
}

#[test]
fn test_subscribe_to_external_listeners() {
    let rt = Runtime::new();
    let renders = Rc::new(Cell::new(0usize));
    let listeners = glint::ListenerCell::new();

    let view = component_fn({
        let renders = renders.clone();
        let listeners = listeners.clone();
        move |_props, rt| {
            renders.set(renders.get() + 1);
            rt.use_subscribe(&listeners)?;
            Ok(ChildSpec::expression("sub"))
        }
    });

    rt.mount(view, Value::Null).unwrap();
    assert_eq!(renders.get(), 1);

    listeners.notify(&glint::Change::PropertySet {
        key: "external".into(),
        value: Value::Int(1),
    });
    rt.flush().unwrap();
    assert_eq!(renders.get(), 2);
}

// =============================================================================
// Context
// =============================================================================

#[test]
fn test_context_value_reaches_descendants() {
    let host = RecordingHost::default();
    let rt = Runtime::with_host(Box::new(host.clone()));

    let child = component_fn(|_props, _rt| Ok(ChildSpec::expression("leaf")));
    let view = component_fn({
        let child = child.clone();
        move |_props, _rt| {
            Ok(ChildSpec::context(
                "theme-dark",
                vec![ChildSpec::component(child.clone(), Value::Null)],
            ))
        }
    });

    rt.mount(view, Value::Null).unwrap();

    let child_node = host
        .records
        .borrow()
        .iter()
        .find(|r| r.op == PatchOp::Mount && r.path == ["cmp0", "ctx0", "cmp0"])
        .map(|r| r.node)
        .unwrap();
    assert_eq!(rt.context_value(child_node), Some(Value::from("theme-dark")));
}

// =============================================================================
// Render failure mid-pass
// =============================================================================

#[test]
fn test_unmounts_commit_when_a_sibling_render_fails() {
    let host = RecordingHost::default();
    let rt = Runtime::with_host(Box::new(host.clone()));
    let cleanups = Rc::new(Cell::new(0usize));

    let leaf_with_cleanup = component_fn({
        let cleanups = cleanups.clone();
        move |_props, rt| {
            rt.use_effect(Some(vec![]), {
                let cleanups = cleanups.clone();
                move || {
                    Some(Box::new(move || cleanups.set(cleanups.get() + 1)) as Box<dyn FnOnce()>)
                }
            })?;
            Ok(ChildSpec::expression("present"))
        }
    });

    let show_setter: Rc<RefCell<Option<Setter<bool>>>> = Rc::new(RefCell::new(None));
    let shedding = component_fn({
        let leaf = leaf_with_cleanup.clone();
        let show_setter = show_setter.clone();
        move |_props, rt| {
            let (show, set) = rt.use_state(true)?;
            *show_setter.borrow_mut() = Some(set);
            let child = show.then(|| ChildSpec::component(leaf.clone(), Value::Null));
            Ok(ChildSpec::conditional(usize::from(!show), child))
        }
    });

    let failing = Rc::new(Cell::new(false));
    let flaky = component_fn({
        let failing = failing.clone();
        move |_props, _rt| {
            if failing.get() {
                return Err(Error::InvalidHookCall {
                    reason: "render blew up".into(),
                });
            }
            Ok(ChildSpec::expression("fine"))
        }
    });

    rt.mount(shedding, Value::Null).unwrap();
    let flaky_handle = rt.mount(flaky, Value::Null).unwrap();
    let before = rt.node_count();

    // First root drops its child; the second root fails in the same pass.
    show_setter.borrow().clone().unwrap().set(false);
    failing.set(true);
    rt.mark_dirty(flaky_handle.root());
    assert!(matches!(rt.flush(), Err(Error::InvalidHookCall { .. })));

    // The removed child's teardown committed despite the failing sibling:
    // its cleanup ran, its subtree was freed, and the host saw the unmount.
    assert_eq!(cleanups.get(), 1);
    assert_eq!(rt.node_count(), before - 2);
    assert!(host
        .paths_with_op(PatchOp::Unmount)
        .contains(&"cmp0/if0/cmp0".to_string()));

    // The failing root stays scheduled and recovers once its render succeeds.
    failing.set(false);
    rt.settle().unwrap();
    assert!(!rt.has_pending_work());
}

// =============================================================================
// Commit failure
// =============================================================================

#[test]
fn test_rejected_patch_aborts_batch_with_path() {
    let rt = Runtime::with_host(Box::new(FailingHost {
        reject: "cmp0/expr0",
    }));

    let view = component_fn(|_props, _rt| Ok(ChildSpec::expression("unreachable")));
    let error = rt.mount(view, Value::Null).unwrap_err();

    assert_eq!(error.commit_path(), Some("cmp0/expr0"));
    // The failed mount was rolled back entirely.
    assert_eq!(rt.node_count(), 0);
}
