//! Integration Tests for the Kindle Runtime
//!
//! These tests verify that containers, effects, watchers, the scheduler and
//! the renderer work together correctly.

use std::cell::{Cell as StdCell, RefCell};
use std::rc::Rc;

use futures_util::FutureExt;
use serde_json::{json, Value};

use kindle_core::prelude::*;

/// Test that three synchronous writes collapse into one rerun that sees the
/// last value.
#[test]
fn synchronous_writes_coalesce_into_one_rerun() {
    let rt = Runtime::new();
    let state = rt.observe(record([("count", 0.into())]));
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (s, v) = (state.clone(), seen.clone());
    let effect = ReactiveEffect::new(&rt, move || {
        v.borrow_mut().push(s.get_as::<i64>("count").unwrap_or(-1));
    });
    effect.run();

    state.set("count", 1);
    state.set("count", 1);
    state.set("count", 1);
    assert_eq!(rt.pending_jobs(), 1);

    rt.drain_microtasks().unwrap();
    assert_eq!(*seen.borrow(), vec![0, 1]);
    assert_eq!(effect.run_count(), 2);
}

/// Test that a write reruns all and only the effects that read that exact
/// (container, key) pair.
#[test]
fn writes_rerun_exactly_the_readers() {
    let rt = Runtime::new();
    let left = rt.observe(record([("x", 0.into()), ("y", 0.into())]));
    let right = rt.observe(record([("x", 0.into())]));
    let runs = Rc::new(RefCell::new(Vec::new()));

    let mut effects = Vec::new();
    for (name, container, key) in [
        ("left.x", left.clone(), "x"),
        ("left.y", left.clone(), "y"),
        ("right.x", right.clone(), "x"),
    ] {
        let r = runs.clone();
        let effect = ReactiveEffect::new(&rt, move || {
            container.get(key);
            r.borrow_mut().push(name);
        });
        effect.run();
        effects.push(effect);
    }
    runs.borrow_mut().clear();

    left.set("x", 1);
    rt.drain_microtasks().unwrap();
    assert_eq!(*runs.borrow(), vec!["left.x"]);
}

/// Test that a computed value derives once per change, lazily.
#[test]
fn computed_memoizes_until_a_dependency_changes() {
    let rt = Runtime::new();
    let count = rt.cell(2);
    let computes = Rc::new(StdCell::new(0));

    let (c, n) = (count.clone(), computes.clone());
    let squared = rt.derive(move || {
        n.set(n.get() + 1);
        c.value() * c.value()
    });

    for _ in 0..10 {
        assert_eq!(squared.value(), 4);
    }
    assert_eq!(computes.get(), 1);

    count.set_value(3);
    assert_eq!(computes.get(), 1);
    assert_eq!(squared.value(), 9);
    assert_eq!(computes.get(), 2);
}

/// Test that watch reports (new, old) and stays quiet until the first change.
#[test]
fn watch_reports_transitions() {
    let rt = Runtime::new();
    let state = rt.observe(record([("name", "ada".into())]));
    let transitions = Rc::new(RefCell::new(Vec::new()));

    let (s, t) = (state.clone(), transitions.clone());
    let _handle = rt.watch(
        move || s.get_as::<String>("name").unwrap_or_default(),
        move |new, old| t.borrow_mut().push((old, new)),
    );
    assert!(transitions.borrow().is_empty());

    state.set("name", "grace");
    state.set("name", "barbara");
    assert_eq!(
        *transitions.borrow(),
        vec![
            ("ada".to_owned(), "grace".to_owned()),
            ("grace".to_owned(), "barbara".to_owned()),
        ]
    );
}

/// Test that a stopped watcher ignores every later mutation.
#[test]
fn disposed_watchers_stop_reacting() {
    let rt = Runtime::new();
    let count = rt.cell(0);
    let calls = Rc::new(StdCell::new(0));

    let (c, n) = (count.clone(), calls.clone());
    let watcher = rt.watch(move || c.value(), move |_, _| n.set(n.get() + 1));
    let (c, n) = (count.clone(), calls.clone());
    let effect_watcher = rt.watch_effect(move || {
        c.value();
        n.set(n.get() + 1);
    });
    assert_eq!(calls.get(), 1);

    count.set_value(1);
    assert_eq!(calls.get(), 3);

    watcher.stop();
    drop(effect_watcher);
    count.set_value(2);
    assert_eq!(calls.get(), 3);
}

/// Test that stopping an effect does not retract a rerun that was already
/// queued. This pins current behavior; whether it should retract is open.
#[test]
fn stopping_does_not_retract_a_queued_run() {
    let rt = Runtime::new();
    let count = rt.cell(0);
    let runs = Rc::new(StdCell::new(0));

    let (c, r) = (count.clone(), runs.clone());
    let effect = ReactiveEffect::new(&rt, move || {
        c.value();
        r.set(r.get() + 1);
    });
    effect.run();

    count.set_value(1);
    effect.stop();
    rt.drain_microtasks().unwrap();
    assert_eq!(runs.get(), 2);

    // Nothing is queued for later writes.
    count.set_value(2);
    assert_eq!(rt.pending_jobs(), 0);
}

/// Test that next-tick callbacks run in order, after the render flush of the
/// mutation that preceded them.
#[tokio::test]
async fn next_tick_runs_after_the_render_flush() {
    let rt = Runtime::new();
    let count = rt.cell(0);
    let log = Rc::new(RefCell::new(Vec::new()));

    let (c, l) = (count.clone(), log.clone());
    let render = ReactiveEffect::new(&rt, move || {
        l.borrow_mut().push(format!("render {}", c.value()));
    });
    render.run();

    count.set_value(1);
    let l = log.clone();
    let first = rt.next_tick_with(move || l.borrow_mut().push("tick 1".into()));
    let l = log.clone();
    let mut second = rt.next_tick_with(move || l.borrow_mut().push("tick 2".into()));

    assert!((&mut second).now_or_never().is_none());
    rt.drain_microtasks().unwrap();

    assert_eq!(first.await, Ok(()));
    assert_eq!(second.await, Ok(()));
    assert_eq!(*log.borrow(), vec!["render 0", "render 1", "tick 1", "tick 2"]);
}

/// Test that a panicking next-tick callback fails its round, lets the rest of
/// the round run, and leaves the next round unaffected.
#[tokio::test]
async fn failing_tick_rejects_only_its_round() {
    let rt = Runtime::new();
    let ran = Rc::new(StdCell::new(false));

    let failing = rt.next_tick_with(|| panic!("tick failed"));
    let r = ran.clone();
    let sibling = rt.next_tick_with(move || r.set(true));
    rt.drain_microtasks().unwrap();

    let expected = Err(RuntimeError::TickCallbackPanicked {
        message: "tick failed".into(),
    });
    assert_eq!(failing.await, expected);
    assert_eq!(sibling.await, expected);
    assert!(ran.get());

    let next = rt.next_tick();
    assert_eq!(rt.pending_microtasks(), 1);
    rt.drain_microtasks().unwrap();
    assert_eq!(next.await, Ok(()));
}

/// Test that a tick whose runtime is dropped before flushing reports it.
#[tokio::test]
async fn dropped_runtime_abandons_ticks() {
    let rt = Runtime::new();
    let tick = rt.next_tick();
    drop(rt);
    assert_eq!(tick.await, Err(RuntimeError::TickDropped));
}

/// Test that a runaway effect pair is cut off by the configured bound.
#[test]
fn runaway_effects_hit_the_configured_limit() {
    let config = RuntimeConfig::from_json(
        r#"{ "max_microtask_rounds": 16, "warn_on_self_trigger": false }"#,
    )
    .unwrap();
    let rt = Runtime::with_config(config);
    let a = rt.cell(0);
    let b = rt.cell(0);

    let (ra, wb) = (a.clone(), b.clone());
    let forward = ReactiveEffect::new(&rt, move || wb.set_value(ra.value() + 1));
    let (rb, wa) = (b.clone(), a.clone());
    let backward = ReactiveEffect::new(&rt, move || wa.set_value(rb.value() + 1));
    forward.run();
    backward.run();

    assert_eq!(
        rt.drain_microtasks(),
        Err(RuntimeError::MicrotaskLimitExceeded { limit: 16 })
    );
    forward.stop();
    backward.stop();
}

/// A component whose render reads a cell captured at definition time.
struct CountView {
    count: kindle_core::reactive::Cell<i32>,
    shared: Option<Rc<[VNode]>>,
}

impl Component for CountView {
    fn name(&self) -> &str {
        "CountView"
    }

    fn render(&self, _state: &Observed, _props: &Props) -> VNode {
        let count = self.count.value();
        match &self.shared {
            Some(children) => h("p", Props::new().with("data-count", count), children.clone()),
            None => h("p", Props::new(), count.to_string()),
        }
    }
}

fn mount_count_view(shared: Option<Rc<[VNode]>>) -> (Runtime, HostTree, App, kindle_core::reactive::Cell<i32>) {
    let rt = Runtime::new();
    let host = HostTree::new();
    let count = rt.cell(0);
    let view = Rc::new(CountView {
        count: count.clone(),
        shared,
    });
    let mut app = create_app(&rt, &host, view);
    app.mount("body").unwrap();
    (rt, host, app, count)
}

/// Test that changed children replace the host node in place.
#[test]
fn component_update_replaces_node_when_children_change() {
    let (rt, host, app, count) = mount_count_view(None);
    let body = host.root();

    let first = app.root_instance().unwrap().el().unwrap();
    assert_eq!(host.children(body), vec![first]);
    assert_eq!(host.to_html(body), "<body><p>0</p></body>");

    count.set_value(1);
    rt.drain_microtasks().unwrap();

    let second = app.root_instance().unwrap().el().unwrap();
    assert_ne!(first, second);
    assert_eq!(host.children(body), vec![second]);
    assert_eq!(host.to_html(body), "<body><p>1</p></body>");
}

/// Test that identical children keep the host node untouched.
#[test]
fn component_update_keeps_node_when_children_are_identical() {
    let shared: Rc<[VNode]> = vec![text("fixed")].into();
    let (rt, host, app, count) = mount_count_view(Some(shared));
    let body = host.root();
    let first = app.root_instance().unwrap().el().unwrap();

    count.set_value(1);
    rt.drain_microtasks().unwrap();

    let instance = app.root_instance().unwrap();
    assert_eq!(instance.render_count(), 2);
    assert_eq!(instance.el(), Some(first));
    assert_eq!(host.children(body), vec![first]);
    // Props are not re-applied when the patch is skipped.
    assert_eq!(host.attribute(first, "data-count").as_deref(), Some("0"));
}

/// Test a full app: setup state, event handlers, hooks, expose.
#[test]
fn counter_app_end_to_end() {
    let rt = Runtime::new();
    let host = HostTree::new();
    let mount_point = host.create_element("main");
    host.set_attribute(mount_point, "id", "app").unwrap();
    host.append_child(host.root(), mount_point).unwrap();

    let hooks = Rc::new(RefCell::new(Vec::new()));
    let h_log = hooks.clone();
    let counter = define_component(
        "Counter",
        move |props, ctx| {
            let start = props.value("start").cloned().unwrap_or(json!(0));
            let l = h_log.clone();
            ctx.on_mounted(move |host, el| l.borrow_mut().push(format!("mounted <{}>", host.tag(el).unwrap_or_default())))
                .unwrap();
            let l = h_log.clone();
            ctx.on_updated(move |host, el| l.borrow_mut().push(format!("updated {}", host.text_content(el))))
                .unwrap();
            ctx.expose(record([("kind", "counter".into())]));
            record([("count", start)])
        },
        |state, _| {
            let s = state.clone();
            let count = state.get_as::<i64>("count").unwrap_or(0);
            h(
                "button",
                Props::new()
                    .with("class", "counter")
                    .on("onClick", move |_| s.update("count", |v| json!(v.as_i64().unwrap_or(0) + 1))),
                format!("clicked {count}"),
            )
        },
    );

    let mut app = create_app(&rt, &host, counter).with_props(Props::new().with("start", 10));
    assert_eq!(app.mount("#app"), Ok(mount_point));
    assert_eq!(*hooks.borrow(), vec!["mounted <button>"]);

    let button = host.query_selector(".counter").unwrap();
    host.dispatch_event(button, "click", Value::Null).unwrap();
    host.dispatch_event(button, "click", Value::Null).unwrap();
    // Nothing is repainted before the microtask boundary.
    assert_eq!(host.text_content(mount_point), "clicked 10");

    rt.drain_microtasks().unwrap();
    assert_eq!(host.text_content(mount_point), "clicked 12");
    assert_eq!(*hooks.borrow(), vec!["mounted <button>", "updated clicked 12"]);

    let instance = app.root_instance().unwrap();
    assert_eq!(instance.render_count(), 2);
    assert_eq!(instance.exposed(), Some(record([("kind", "counter".into())])));
    assert_eq!(instance.mounted_hook_count(), 1);
    assert_eq!(instance.updated_hook_count(), 1);
}

/// Test that registering hooks outside setup is a loud error.
#[test]
fn hooks_require_an_active_setup() {
    let rt = Runtime::new();
    let err = rt.on_mounted(|_, _| {}).unwrap_err();
    assert_eq!(err, RuntimeError::HookOutsideSetup { hook: "on_mounted" });
    assert!(err.to_string().contains("outside of a component setup"));
}

/// Test that watchers retained by setup live as long as the component.
#[test]
fn setup_can_retain_watchers() {
    let rt = Runtime::new();
    let host = HostTree::new();
    let source = rt.cell(0);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (s, v) = (source.clone(), seen.clone());
    let def = define_component(
        "Watcher",
        move |_, ctx| {
            let (s, v) = (s.clone(), v.clone());
            let handle = ctx
                .runtime()
                .watch(move || s.value(), move |new, _| v.borrow_mut().push(new));
            ctx.retain(handle);
            Default::default()
        },
        |_, _| marker("watcher"),
    );
    let mut app = create_app(&rt, &host, def);
    app.mount("body").unwrap();

    source.set_value(7);
    assert_eq!(*seen.borrow(), vec![7]);
    assert_eq!(host.to_html(host.root()), "<body><!--watcher--></body>");
}
