//! Scheduler behavior: affected-set computation, pessimistic fan-out,
//! per-moment budgets, and lifecycle trigger kinds.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use brio::ast::{BinaryOp, NodeId, NodeKind};
use brio::diagnostics::Position;
use brio::values::{TriggerEvent, Value};
use brio::{EventKind, Runtime, RuntimeEvent, RuntimeOptions};

fn push(runtime: &mut Runtime, kind: NodeKind) -> NodeId {
    runtime
        .arena_mut()
        .push(kind, Position::SYNTHETIC)
        .expect("arena full")
}

fn ident(runtime: &mut Runtime, name: &str) -> NodeId {
    push(
        runtime,
        NodeKind::Ident {
            name: name.to_string(),
        },
    )
}

fn num(runtime: &mut Runtime, text: &str) -> NodeId {
    push(
        runtime,
        NodeKind::LitNumber {
            text: text.to_string(),
        },
    )
}

fn bin(runtime: &mut Runtime, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
    push(runtime, NodeKind::Binary { op, left, right })
}

/// Trigger whose condition reads `watch_expr` and whose action bumps
/// `counter`. The condition is `watch_expr > -1000000`, true for any number.
fn counting_trigger(runtime: &mut Runtime, name: &str, watch_expr: NodeId, counter: &str) {
    let floor = num(runtime, "-1000000");
    let cond = bin(runtime, BinaryOp::Gt, watch_expr, floor);
    let read = ident(runtime, counter);
    let one = num(runtime, "1");
    let bump = bin(runtime, BinaryOp::Add, read, one);
    let target = ident(runtime, counter);
    let action = push(runtime, NodeKind::Assign { target, value: bump });
    let trigger = runtime
        .store_mut()
        .trigger(name, TriggerEvent::DataChanged, cond, action)
        .unwrap();
    runtime.register_trigger(trigger).unwrap();
}

fn number_of(runtime: &Runtime, name: &str) -> f64 {
    let id = runtime.lookup(name).expect("name bound");
    match runtime.store().get(id) {
        Value::Number(value) => *value,
        other => panic!("expected number for {name}, got {}", other.kind_name()),
    }
}

fn next_boundary(runtime: &Runtime, moments: u32) -> Instant {
    Instant::now()
        + runtime.options().moment_duration() * moments
        + Duration::from_millis(50)
}

#[test]
fn triggers_fire_iff_watched_names_intersect_changes() {
    let mut runtime = Runtime::default();
    let zero = runtime.store_mut().number(0.0).unwrap();
    for name in ["x", "y", "x_hits", "y_hits"] {
        runtime.define(name, zero);
    }
    let x = ident(&mut runtime, "x");
    counting_trigger(&mut runtime, "on_x", x, "x_hits");
    let y = ident(&mut runtime, "y");
    counting_trigger(&mut runtime, "on_y", y, "y_hits");

    runtime.start();
    let five = runtime.store_mut().number(5.0).unwrap();
    runtime.assign("x", five).unwrap();
    assert!(runtime.tick_at(next_boundary(&runtime, 1)));

    assert_eq!(number_of(&runtime, "x_hits"), 1.0, "x watcher fires");
    assert_eq!(number_of(&runtime, "y_hits"), 0.0, "y watcher stays quiet");
}

#[test]
fn dynamic_index_writes_fan_out_pessimistically() {
    let mut runtime = Runtime::default();
    let zero = runtime.store_mut().number(0.0).unwrap();
    let one = runtime.store_mut().number(1.0).unwrap();
    let xs = runtime.store_mut().list(vec![zero, zero]).unwrap();
    runtime.define("xs", xs);
    runtime.define("i", one);
    runtime.define("y", zero);
    runtime.define("y_hits", zero);
    let y = ident(&mut runtime, "y");
    counting_trigger(&mut runtime, "on_y", y, "y_hits");

    // Trigger with no watched names at all never fires, even pessimistically.
    let cond = push(&mut runtime, NodeKind::LitBoolean { value: true });
    let action = push(&mut runtime, NodeKind::LitNil);
    let nameless = runtime
        .store_mut()
        .trigger("nameless", TriggerEvent::DataChanged, cond, action)
        .unwrap();
    runtime.register_trigger(nameless).unwrap();

    let log: Arc<Mutex<Vec<RuntimeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    runtime.on_event(Arc::new(move |event| {
        sink.lock().unwrap().push(event.clone());
    }));

    runtime.start();
    // xs[i] = 7 with a non-constant index: no extractable affected name.
    let base = ident(&mut runtime, "xs");
    let index = ident(&mut runtime, "i");
    let target = push(&mut runtime, NodeKind::Index { base, index });
    let seven = num(&mut runtime, "7");
    let write = push(&mut runtime, NodeKind::Assign { target, value: seven });
    runtime.execute(write).unwrap();

    assert!(runtime.tick_at(next_boundary(&runtime, 1)));
    assert_eq!(
        number_of(&runtime, "y_hits"),
        1.0,
        "pessimistic write reaches every watcher"
    );
    let nameless_fired = log
        .lock()
        .unwrap()
        .iter()
        .any(|event| event.kind == EventKind::TriggerFired && event.subject_name == "nameless");
    assert!(!nameless_fired);
}

#[test]
fn constant_index_writes_stay_narrow() {
    let mut runtime = Runtime::default();
    let zero = runtime.store_mut().number(0.0).unwrap();
    let xs = runtime.store_mut().list(vec![zero, zero]).unwrap();
    runtime.define("xs", xs);
    runtime.define("other", zero);
    runtime.define("slot_hits", zero);
    runtime.define("other_hits", zero);

    // Watches the narrow name "xs[0]" via a constant-index read.
    let base = ident(&mut runtime, "xs");
    let index = num(&mut runtime, "0");
    let slot = push(&mut runtime, NodeKind::Index { base, index });
    counting_trigger(&mut runtime, "on_slot", slot, "slot_hits");
    let other = ident(&mut runtime, "other");
    counting_trigger(&mut runtime, "on_other", other, "other_hits");

    runtime.start();
    let base = ident(&mut runtime, "xs");
    let index = num(&mut runtime, "0");
    let target = push(&mut runtime, NodeKind::Index { base, index });
    let seven = num(&mut runtime, "7");
    let write = push(&mut runtime, NodeKind::Assign { target, value: seven });
    runtime.execute(write).unwrap();

    assert!(runtime.tick_at(next_boundary(&runtime, 1)));
    assert_eq!(number_of(&runtime, "slot_hits"), 1.0);
    assert_eq!(number_of(&runtime, "other_hits"), 0.0);
}

#[test]
fn budget_exceedance_defers_the_tail_to_the_next_moment() {
    let mut runtime = Runtime::new(RuntimeOptions {
        moment_budget_ms: Some(0),
        ..RuntimeOptions::default()
    });
    let zero = runtime.store_mut().number(0.0).unwrap();
    for name in ["x", "first_hits", "second_hits"] {
        runtime.define(name, zero);
    }
    let x = ident(&mut runtime, "x");
    counting_trigger(&mut runtime, "first", x, "first_hits");
    let x = ident(&mut runtime, "x");
    counting_trigger(&mut runtime, "second", x, "second_hits");

    let log: Arc<Mutex<Vec<RuntimeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    runtime.on_event(Arc::new(move |event| {
        sink.lock().unwrap().push(event.clone());
    }));

    runtime.start();
    let five = runtime.store_mut().number(5.0).unwrap();
    runtime.assign("x", five).unwrap();

    assert!(runtime.tick_at(next_boundary(&runtime, 1)));
    assert_eq!(number_of(&runtime, "first_hits"), 1.0);
    assert_eq!(number_of(&runtime, "second_hits"), 0.0, "deferred");
    assert!(log
        .lock()
        .unwrap()
        .iter()
        .any(|event| event.kind == EventKind::MomentBudgetExceeded));

    assert!(runtime.tick_at(next_boundary(&runtime, 2)));
    assert_eq!(number_of(&runtime, "second_hits"), 1.0, "owed trigger ran");
}

#[test]
fn run_loop_fires_startup_and_shutdown() {
    let mut runtime = Runtime::new(RuntimeOptions {
        moment_duration_ms: 10,
        poll_interval_ms: 1,
        ..RuntimeOptions::default()
    });
    let zero = runtime.store_mut().number(0.0).unwrap();
    runtime.define("boots", zero);
    runtime.define("halts", zero);

    for (name, event, counter) in [
        ("on_boot", TriggerEvent::Startup, "boots"),
        ("on_halt", TriggerEvent::Shutdown, "halts"),
    ] {
        let cond = push(&mut runtime, NodeKind::LitBoolean { value: true });
        let read = ident(&mut runtime, counter);
        let one = num(&mut runtime, "1");
        let bump = bin(&mut runtime, BinaryOp::Add, read, one);
        let target = ident(&mut runtime, counter);
        let action = push(&mut runtime, NodeKind::Assign { target, value: bump });
        let trigger = runtime
            .store_mut()
            .trigger(name, event, cond, action)
            .unwrap();
        runtime.register_trigger(trigger).unwrap();
    }

    runtime.start();
    runtime.run(Some(Duration::from_millis(60)));

    assert_eq!(number_of(&runtime, "boots"), 1.0, "startup fired once");
    assert_eq!(number_of(&runtime, "halts"), 1.0, "shutdown fired on exit");
}
