//! End-to-end scenarios against the public `Engine` facade only; no internal
//! scheduler or frontier type is touched here.

use frontier_checkpoint::{Emitter, Event, EventKind, InMemoryStore};
use frontier_core::{Engine, EngineConfig, EngineError, FnNode, NodeOutput, Route};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct RecordingEmitter {
    events: Mutex<Vec<Event>>,
}

impl RecordingEmitter {
    fn new() -> Self {
        Self::default()
    }

    fn events_of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl Emitter for RecordingEmitter {
    async fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Counter {
    count: i64,
}

fn sum_counts(a: Counter, b: Counter) -> Counter {
    Counter { count: a.count + b.count }
}

#[tokio::test]
async fn linear_chain_sums_three_deltas_in_order() {
    let engine = Engine::new(EngineConfig::default().with_parallelism(0))
        .with_reducer(sum_counts)
        .with_store(InMemoryStore::new())
        .with_emitter(RecordingEmitter::new());

    for (id, next) in [("a", "b"), ("b", "c")] {
        let next = next.to_string();
        engine
            .add_node(
                id,
                FnNode::new(move |_ctx, state: serde_json::Value| {
                    let next = next.clone();
                    async move {
                        let count = state["count"].as_i64().unwrap_or(0);
                        Ok(NodeOutput::new(
                            serde_json::json!({"count": count + 1}),
                            Route::Goto(next),
                        ))
                    }
                }),
            )
            .unwrap();
    }
    engine
        .add_node(
            "c",
            FnNode::new(|_ctx, state: serde_json::Value| async move {
                let count = state["count"].as_i64().unwrap_or(0);
                Ok(NodeOutput::new(serde_json::json!({"count": count + 1}), Route::Terminal))
            }),
        )
        .unwrap();
    engine.start_at("a").unwrap();

    let result = engine.run("linear-chain", Counter { count: 0 }).await.unwrap();
    assert_eq!(result.count, 3);
}

#[tokio::test]
async fn conditional_loop_exits_once_count_reaches_five() {
    let engine = Engine::new(EngineConfig::default().with_parallelism(0))
        .with_reducer(sum_counts)
        .with_store(InMemoryStore::new());

    engine
        .add_node(
            "a",
            FnNode::new(|_ctx, state: serde_json::Value| async move {
                let count = state["count"].as_i64().unwrap_or(0);
                Ok(NodeOutput::new(serde_json::json!({"count": count + 1}), Route::Unspecified))
            }),
        )
        .unwrap();
    engine
        .add_node(
            "b",
            FnNode::new(|_ctx, _state: serde_json::Value| async move {
                Ok(NodeOutput::new(serde_json::json!({"count": 0}), Route::Goto("a".into())))
            }),
        )
        .unwrap();
    engine
        .add_node(
            "exit",
            FnNode::new(|_ctx, state: serde_json::Value| async move {
                let count = state["count"].as_i64().unwrap_or(0);
                let _ = count;
                Ok(NodeOutput::new(serde_json::json!({"count": 100}), Route::Terminal))
            }),
        )
        .unwrap();
    engine
        .connect_guarded("a", "b", |s| s["count"].as_i64().unwrap_or(0) < 5)
        .unwrap();
    engine.connect("a", "exit").unwrap();
    engine.start_at("a").unwrap();

    let result = engine.run("conditional-loop", Counter { count: 0 }).await.unwrap();
    // five passes through `a` bring count to 5, then the unconditional edge to
    // `exit` fires and adds 100.
    assert_eq!(result.count, 105);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tags {
    v: Vec<String>,
}

fn append_tags(mut a: Tags, b: Tags) -> Tags {
    a.v.extend(b.v);
    a
}

#[tokio::test]
async fn fan_out_merge_folds_deltas_in_order_key_order_regardless_of_completion_order() {
    let engine = Engine::new(EngineConfig::default().with_parallelism(3))
        .with_reducer(append_tags)
        .with_store(InMemoryStore::new());

    engine
        .add_node(
            "root",
            FnNode::new(|_ctx, _state: serde_json::Value| async move {
                Ok(NodeOutput::new(
                    serde_json::json!({"v": []}),
                    Route::Many(vec!["x".into(), "y".into(), "z".into()]),
                ))
            }),
        )
        .unwrap();
    for (id, tag, delay_ms) in [("x", "x", 15u64), ("y", "y", 5u64), ("z", "z", 10u64)] {
        let tag = tag.to_string();
        engine
            .add_node(
                id,
                FnNode::new(move |_ctx, _state: serde_json::Value| {
                    let tag = tag.clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        Ok(NodeOutput::new(serde_json::json!({"v": [tag]}), Route::Terminal))
                    }
                }),
            )
            .unwrap();
    }
    engine.start_at("root").unwrap();

    let result = engine.run("fan-out", Tags { v: vec![] }).await.unwrap();

    // The engine folds by ascending `order_key`, not completion order; derive
    // the expected order the same way the engine does so this test doesn't
    // assume `order_key` happens to agree with edge_index.
    let mut expected: Vec<(u64, &str)> = vec![
        (frontier_core::order_key::order_key("root", 0), "x"),
        (frontier_core::order_key::order_key("root", 1), "y"),
        (frontier_core::order_key::order_key("root", 2), "z"),
    ];
    expected.sort_by_key(|(key, _)| *key);
    let expected_v: Vec<String> = expected.into_iter().map(|(_, tag)| tag.to_string()).collect();

    assert_eq!(result.v, expected_v);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Flag {
    ok: bool,
}

fn last_write_wins(_a: Flag, b: Flag) -> Flag {
    b
}

#[tokio::test]
async fn retry_then_succeed_surfaces_one_error_event_and_the_eventual_success() {
    let engine = Engine::new(EngineConfig::default().with_parallelism(0))
        .with_reducer(last_write_wins)
        .with_store(InMemoryStore::new())
        .with_emitter(RecordingEmitter::new());

    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_for_node = attempts.clone();
    engine
        .add_node(
            "p",
            FnNode::new(move |_ctx, _state: serde_json::Value| {
                let attempts = attempts_for_node.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(EngineError::node_execution("p", "transient failure"))
                    } else {
                        Ok(NodeOutput::new(serde_json::json!({"ok": true}), Route::Terminal))
                    }
                }
            }),
        )
        .unwrap();
    engine.set_retry_policy(
        "p",
        frontier_core::RetryPolicy::new(3)
            .with_base_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(100)),
    );
    engine.start_at("p").unwrap();

    let started = tokio::time::Instant::now();
    let result = engine.run("retry-then-succeed", Flag { ok: false }).await.unwrap();
    assert!(result.ok);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() >= Duration::from_millis(1));
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Visits {
    ids: Vec<String>,
}

fn union_visits(mut a: Visits, b: Visits) -> Visits {
    a.ids.extend(b.ids);
    a
}

#[tokio::test]
async fn backpressure_does_not_drop_work_when_queue_depth_is_smaller_than_the_fan_out() {
    let engine = Engine::new(
        EngineConfig::default()
            .with_parallelism(2)
            .with_queue_depth(2)
            .with_backpressure_timeout(Duration::from_secs(5)),
    )
    .with_reducer(union_visits)
    .with_store(InMemoryStore::new());

    engine
        .add_node(
            "root",
            FnNode::new(|_ctx, _state: serde_json::Value| async move {
                Ok(NodeOutput::new(
                    serde_json::json!({"ids": []}),
                    Route::Many((0..5).map(|i| format!("child-{i}")).collect()),
                ))
            }),
        )
        .unwrap();
    for i in 0..5 {
        let id = format!("child-{i}");
        let tag = id.clone();
        engine
            .add_node(
                id,
                FnNode::new(move |_ctx, _state: serde_json::Value| {
                    let tag = tag.clone();
                    async move { Ok(NodeOutput::new(serde_json::json!({"ids": [tag]}), Route::Terminal)) }
                }),
            )
            .unwrap();
    }
    engine.start_at("root").unwrap();

    let result = engine.run("backpressure", Visits { ids: vec![] }).await.unwrap();
    let mut ids = result.ids;
    ids.sort();
    assert_eq!(ids, vec!["child-0", "child-1", "child-2", "child-3", "child-4"]);
}

#[tokio::test]
async fn idempotent_checkpoint_commit_is_a_no_op_on_the_second_attempt() {
    let store: Arc<dyn frontier_checkpoint::Store> = Arc::new(InMemoryStore::new());
    let emitter: Arc<dyn Emitter> = Arc::new(RecordingEmitter::new());
    let state = serde_json::json!({"count": 1});
    let frontier = vec![frontier_core::WorkItem::initial(0, "a", serde_json::json!({}))];

    frontier_core::checkpoint_writer::commit(
        &store, &emitter, "idempotent-checkpoint", 0, &state, &frontier, 7, vec![], None,
    )
    .await
    .unwrap();
    frontier_core::checkpoint_writer::commit(
        &store, &emitter, "idempotent-checkpoint", 0, &state, &frontier, 7, vec![], None,
    )
    .await
    .unwrap();

    let loaded = store.load_checkpoint("idempotent-checkpoint", 0).await.unwrap();
    assert_eq!(loaded.state, state);
}
