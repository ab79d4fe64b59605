//! End-to-end pipeline tests through the public API.

use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use flowbox::{
    CookEngine, Graph, GraphEvent, Mode, NodeState, PortRef, RenderCallbacks, RenderOutcome,
    RenderScheduler, Value, builtin,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// The worked multiply example: two numbers feed a multiply, a value edit
/// recomputes, a disconnect leaves the stale result in place.
#[test]
fn test_multiply_pipeline() {
    init_logging();
    let catalog = builtin::catalog();
    let mut graph = Graph::new();
    let engine = CookEngine::new();
    let root = graph.root();

    let number1 = catalog.create(&mut graph, root, "number").unwrap();
    let number2 = catalog.create(&mut graph, root, "number").unwrap();
    let multiply1 = catalog.create(&mut graph, root, "multiply").unwrap();
    assert_eq!(graph.node(multiply1).unwrap().name(), "multiply1");
    assert_eq!(graph.absolute_path(multiply1).unwrap(), "/root/multiply1");

    graph
        .connect(
            &PortRef::new(multiply1, "v1"),
            &PortRef::new(number1, "result"),
        )
        .unwrap();
    graph
        .connect(
            &PortRef::new(multiply1, "v2"),
            &PortRef::new(number2, "result"),
        )
        .unwrap();

    graph
        .set_port_value(&PortRef::new(number1, "value"), Value::Integer(15))
        .unwrap();
    graph
        .set_port_value(&PortRef::new(number2, "value"), Value::Integer(2))
        .unwrap();
    // Producers seed their outputs only when cooked explicitly.
    engine.cook(&mut graph, number1).unwrap();
    engine.cook(&mut graph, number2).unwrap();
    engine.cook(&mut graph, root).unwrap();
    assert_eq!(
        graph
            .port_value(&PortRef::new(multiply1, "result"))
            .unwrap(),
        Some(Value::Integer(30))
    );

    // Editing an upstream value dirties the chain; recooking recomputes.
    graph
        .set_port_value(&PortRef::new(number1, "value"), Value::Integer(5))
        .unwrap();
    assert_eq!(graph.node(multiply1).unwrap().state(), NodeState::Dirty);
    engine.cook(&mut graph, number1).unwrap();
    engine.cook(&mut graph, root).unwrap();
    assert_eq!(
        graph
            .port_value(&PortRef::new(multiply1, "result"))
            .unwrap(),
        Some(Value::Integer(10))
    );

    // Disconnecting does not dirty: the result keeps its last cooked value
    // while the disconnected input reverts to its default.
    graph
        .disconnect_input(&PortRef::new(multiply1, "v1"))
        .unwrap();
    engine.cook(&mut graph, root).unwrap();
    assert_eq!(
        graph
            .port_value(&PortRef::new(multiply1, "result"))
            .unwrap(),
        Some(Value::Integer(10))
    );
    assert_eq!(
        graph.port_value(&PortRef::new(multiply1, "v1")).unwrap(),
        Some(Value::Integer(0))
    );
}

/// A pipeline inside a nested macro cooks when the root cooks, and a failure
/// deep inside surfaces with the full container chain.
#[test]
fn test_nested_macro_pipeline() {
    init_logging();
    let catalog = builtin::catalog();
    let mut graph = Graph::new();
    let engine = CookEngine::new();
    let root = graph.root();

    let sub = catalog.create(&mut graph, root, "macro").unwrap();
    assert_eq!(graph.node(sub).unwrap().name(), "macro1");
    let upper = catalog.create(&mut graph, sub, "uppercase").unwrap();
    graph
        .set_port_value(&PortRef::new(upper, "value"), Value::String("nested".into()))
        .unwrap();

    engine.cook(&mut graph, root).unwrap();
    assert_eq!(
        graph.port_value(&PortRef::new(upper, "result")).unwrap(),
        Some(Value::String("NESTED".into()))
    );
    assert_eq!(graph.node(sub).unwrap().state(), NodeState::Clean);

    // Resolve the node back from its path.
    assert_eq!(
        graph.node_at_path("/root/macro1/uppercase1"),
        Some(upper)
    );
}

#[test]
fn test_events_observed_through_subscription() {
    init_logging();
    let catalog = builtin::catalog();
    let mut graph = Graph::new();
    let root = graph.root();
    let rx = graph.subscribe();

    let n1 = catalog.create(&mut graph, root, "number").unwrap();
    let neg = catalog.create(&mut graph, root, "negate").unwrap();
    graph
        .connect(&PortRef::new(neg, "value"), &PortRef::new(n1, "result"))
        .unwrap();
    graph.rename(neg, "invert").unwrap();
    graph.remove_child(root, n1).unwrap();

    let events: Vec<GraphEvent> = rx.try_iter().collect();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, GraphEvent::ConnectionAdded { .. }))
    );
    assert!(events.iter().any(
        |e| matches!(e, GraphEvent::ChildRenamed { new_name, .. } if new_name == "invert")
    ));
    // Removing the node first removed its connection.
    let removal_order: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            GraphEvent::ConnectionRemoved { .. } => Some("connection"),
            GraphEvent::ChildRemoved { .. } => Some("child"),
            _ => None,
        })
        .collect();
    assert_eq!(removal_order, ["connection", "child"]);
}

struct CountingCallbacks {
    finished: Mutex<Vec<RenderOutcome>>,
}

impl RenderCallbacks for CountingCallbacks {
    fn on_render_finished(&self, outcome: &RenderOutcome) {
        self.finished.lock().unwrap().push(outcome.clone());
    }
}

/// Drive a shared graph through the scheduler: edits followed by render
/// requests, snapshots observed through the callback.
#[test]
fn test_scheduler_renders_shared_graph() {
    init_logging();
    let catalog = builtin::catalog();
    let mut g = Graph::new();
    let root = g.root();
    let n1 = catalog.create(&mut g, root, "number").unwrap();
    let neg = catalog.create(&mut g, root, "negate").unwrap();
    g.connect(&PortRef::new(neg, "value"), &PortRef::new(n1, "result"))
        .unwrap();
    g.set_port_value(&PortRef::new(n1, "value"), Value::Integer(8))
        .unwrap();
    let engine = CookEngine::new();
    engine.cook(&mut g, n1).unwrap();

    let graph = Arc::new(RwLock::new(g));
    let callbacks = Arc::new(CountingCallbacks {
        finished: Mutex::new(Vec::new()),
    });
    let scheduler = RenderScheduler::new(Arc::clone(&graph), engine, callbacks.clone());

    scheduler.request_render();
    assert!(wait_until(Duration::from_secs(2), || {
        callbacks.finished.lock().unwrap().len() == 1
    }));
    {
        let finished = callbacks.finished.lock().unwrap();
        let snapshots = finished[0].as_ref().unwrap();
        let negated = snapshots
            .iter()
            .find(|s| s.node == "/root/negate1" && s.port == "result")
            .unwrap();
        assert_eq!(negated.value, Some(Value::Integer(-8)));
    }

    // Requests are safe from other threads; all of them eventually settle
    // into completed passes.
    thread::scope(|s| {
        for _ in 0..4 {
            let scheduler = &scheduler;
            s.spawn(move || scheduler.request_render());
        }
    });
    assert!(wait_until(Duration::from_secs(2), || {
        let finished = callbacks.finished.lock().unwrap();
        !finished.is_empty() && finished.iter().all(|o| o.is_ok())
    }));
}

/// Mode changes move a node in and out of the implicit cooking set.
#[test]
fn test_mode_change_affects_cooking() {
    init_logging();
    let catalog = builtin::catalog();
    let mut graph = Graph::new();
    let engine = CookEngine::new();
    let root = graph.root();
    let number = catalog.create(&mut graph, root, "number").unwrap();
    graph
        .set_port_value(&PortRef::new(number, "value"), Value::Integer(9))
        .unwrap();

    // As a producer, cooking the root leaves the output untouched.
    engine.cook(&mut graph, root).unwrap();
    assert_eq!(
        graph.port_value(&PortRef::new(number, "result")).unwrap(),
        Some(Value::Integer(0))
    );

    graph.set_mode(number, Mode::Consumer).unwrap();
    graph
        .set_port_value(&PortRef::new(number, "value"), Value::Integer(9))
        .unwrap();
    engine.cook(&mut graph, root).unwrap();
    assert_eq!(
        graph.port_value(&PortRef::new(number, "result")).unwrap(),
        Some(Value::Integer(9))
    );
}
