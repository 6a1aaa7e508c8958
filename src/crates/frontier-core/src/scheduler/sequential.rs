//! The sequential execution path for `parallelism == 0` (§4.5).
//!
//! Reuses [`Frontier`] purely as an ordered pending-work structure — capacity
//! is unbounded and nothing here ever blocks on it — so that a `Many`
//! fan-out inside a sequential run still visits successors in ascending
//! `order_key` order, matching the order the concurrent path's collector
//! would fold them in. Unlike the concurrent path, the reducer is applied
//! immediately after each dispatch rather than deferred to a collector
//! (§4.4 step 2).

use super::{invoke_node, RunContext};
use crate::cancellation::CancellationToken;
use crate::checkpoint_writer;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::frontier::Frontier;
use crate::routing::resolve_route;
use crate::work_item::WorkItem;
use frontier_checkpoint::{Event, EventKind};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use std::time::Duration;

pub(crate) async fn run(
    run: &RunContext,
    token: &CancellationToken,
    config: &EngineConfig,
    initial_item: WorkItem,
) -> Result<Value> {
    let frontier = Frontier::new(usize::MAX);
    let mut state = initial_item.state_snapshot.clone();
    let mut next_step_id = initial_item.step_id + 1;
    // Counts actual dispatches in dequeue order, independent of the work
    // item's creation-time `step_id` — a `Many` fan-out assigns `step_id` in
    // list order, which can diverge from `order_key` dequeue order, so
    // gating `max_steps` or a checkpoint's `step_id` on `item.step_id` would
    // let dispatch order and the reported step silently disagree.
    let mut dispatch_count: u64 = 0;
    frontier.enqueue(token, initial_item, Duration::ZERO).await?;

    loop {
        if token.is_cancelled() {
            return Err(cancelled_error(token));
        }

        let mut item = match frontier.try_dequeue() {
            Some(item) => item,
            None => {
                let frontier_snapshot = frontier.snapshot_items();
                let recorded_ios = run.recorded_ios_snapshot();
                tracing::info!(run_id = %run.run_id, step_id = dispatch_count + 1, "committing final checkpoint");
                checkpoint_writer::commit(
                    &run.store,
                    &run.emitter,
                    &run.run_id,
                    dispatch_count + 1,
                    &state,
                    &frontier_snapshot,
                    run.base_seed,
                    recorded_ios,
                    Some("final".to_string()),
                )
                .await?;
                return Ok(state);
            }
        };
        dispatch_count += 1;

        if config.max_steps != 0 && dispatch_count > config.max_steps {
            return Err(EngineError::MaxStepsExceeded(config.max_steps));
        }

        loop {
            tracing::debug!(node_id = %item.node_id, step_id = item.step_id, attempt = item.attempt, "dispatching node");

            run.emitter
                .emit(Event::new(
                    &run.run_id,
                    EventKind::NodeStart,
                    serde_json::json!({"node_id": item.node_id, "step_id": item.step_id, "attempt": item.attempt}),
                ))
                .await;

            match invoke_node(run, token, config.default_node_timeout, &item).await {
                Ok(output) => {
                    run.emitter
                        .emit(Event::new(
                            &run.run_id,
                            EventKind::NodeEnd,
                            serde_json::json!({"node_id": item.node_id, "step_id": item.step_id}),
                        ))
                        .await;

                    state = (run.reducer)(state, output.delta);
                    run.store
                        .save_step(&run.run_id, item.step_id, &item.node_id, &state)
                        .await?;

                    let successors =
                        resolve_route(&item.node_id, &output.route, &run.edges, &state, &run.known_nodes)?;
                    tracing::debug!(
                        node_id = %item.node_id,
                        successors = ?successors.iter().map(|s| s.node_id.clone()).collect::<Vec<_>>(),
                        "routing decision"
                    );
                    run.emitter
                        .emit(Event::new(
                            &run.run_id,
                            EventKind::RoutingDecision,
                            serde_json::json!({
                                "node_id": item.node_id,
                                "successors": successors.iter().map(|s| s.node_id.clone()).collect::<Vec<_>>(),
                            }),
                        ))
                        .await;

                    for successor in successors {
                        let snapshot = crate::state::snapshot(&state)?;
                        let child =
                            item.successor(next_step_id, successor.node_id, successor.edge_index, snapshot);
                        next_step_id += 1;
                        frontier.enqueue(token, child, Duration::ZERO).await?;
                    }

                    if config.checkpoint_interval_steps != 0
                        && dispatch_count % config.checkpoint_interval_steps == 0
                    {
                        let frontier_snapshot = frontier.snapshot_items();
                        let recorded_ios = run.recorded_ios_snapshot();
                        tracing::info!(run_id = %run.run_id, step_id = dispatch_count, "committing interleaved checkpoint");
                        checkpoint_writer::commit(
                            &run.store,
                            &run.emitter,
                            &run.run_id,
                            dispatch_count,
                            &state,
                            &frontier_snapshot,
                            run.base_seed,
                            recorded_ios,
                            None,
                        )
                        .await?;
                    }
                    break;
                }
                Err(err) => {
                    let policy = run.retry_policy_for(&item.node_id);
                    if policy.should_retry(item.attempt, &err) {
                        tracing::warn!(node_id = %item.node_id, attempt = item.attempt, error = %err, "retrying after error");
                        run.emitter
                            .emit(Event::new(
                                &run.run_id,
                                EventKind::Error,
                                serde_json::json!({
                                    "node_id": item.node_id,
                                    "attempt": item.attempt,
                                    "message": err.to_string(),
                                }),
                            ))
                            .await;
                        let mut rng = StdRng::seed_from_u64(run.base_seed ^ item.order_key);
                        let delay = policy.backoff_delay(item.attempt, &mut rng);
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = token.cancelled() => return Err(cancelled_error(token)),
                        }
                        item = item.retry();
                        continue;
                    }

                    if policy.retryable(&err) {
                        tracing::error!(node_id = %item.node_id, attempts = item.attempt + 1, "exhausted retry attempts");
                        return Err(EngineError::MaxAttemptsExceeded {
                            node: item.node_id.clone(),
                            attempts: item.attempt + 1,
                            source: Box::new(err),
                        });
                    }
                    tracing::error!(node_id = %item.node_id, error = %err, "node failed without retry");
                    return Err(err);
                }
            }
        }
    }
}

fn cancelled_error(token: &CancellationToken) -> EngineError {
    EngineError::Cancelled(token.reason().unwrap_or_else(|| "run cancelled".into()))
}
