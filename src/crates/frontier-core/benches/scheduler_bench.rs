use criterion::{black_box, criterion_group, criterion_main, Criterion};
use frontier_core::cancellation::CancellationToken;
use frontier_core::frontier::Frontier;
use frontier_core::work_item::WorkItem;
use std::time::Duration;

fn item(node_id: &str, order_key: u64) -> WorkItem {
    WorkItem {
        step_id: 0,
        order_key,
        node_id: node_id.to_string(),
        state_snapshot: serde_json::json!({}),
        attempt: 0,
        parent_node_id: "__start__".to_string(),
        edge_index: 0,
    }
}

fn enqueue_dequeue_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("frontier enqueue/dequeue, 256 items", |b| {
        b.to_async(&runtime).iter(|| async {
            let frontier = Frontier::new(1024);
            let token = CancellationToken::new();
            for i in 0..256u64 {
                frontier
                    .enqueue(&token, black_box(item("n", i)), Duration::from_secs(1))
                    .await
                    .unwrap();
            }
            for _ in 0..256u64 {
                black_box(frontier.dequeue(&token).await.unwrap());
            }
        });
    });
}

fn order_key_benchmark(c: &mut Criterion) {
    c.bench_function("order_key derivation", |b| {
        b.iter(|| frontier_core::order_key::order_key(black_box("parent-node"), black_box(3)));
    });
}

criterion_group!(benches, enqueue_dequeue_benchmark, order_key_benchmark);
criterion_main!(benches);
