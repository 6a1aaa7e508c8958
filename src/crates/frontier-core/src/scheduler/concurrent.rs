//! The concurrent execution path for `parallelism >= 1` (§4.5): a fixed-size
//! worker pool draining a shared [`Frontier`], with a deterministic collector
//! folding deltas after every worker exits.
//!
//! Each branch threads forward its own locally-reduced state (folding its
//! delta into the snapshot it was dispatched with) purely to give routing
//! predicates and successor nodes a coherent view to act on; the
//! order-independent *authoritative* final state is always the collector's
//! post-hoc fold of every `(order_key, delta)` pair over the true initial
//! state, never the threaded-through local views. The two agree whenever the
//! reducer honors its purity contract (§3 invariant 5).
//!
//! The collector also owns checkpoint commits: it folds a running,
//! best-effort snapshot over the deltas received so far (re-sorted by
//! `order_key` each time, same as the final fold) and commits it every
//! `checkpoint_interval_steps` deliveries, then commits the true final state
//! once every worker has exited.

use super::{invoke_node, RunContext};
use crate::cancellation::CancellationToken;
use crate::checkpoint_writer;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::frontier::Frontier;
use crate::routing::resolve_route;
use crate::work_item::WorkItem;
use frontier_checkpoint::{Event, EventKind};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) async fn run(
    run: Arc<RunContext>,
    token: &CancellationToken,
    config: &EngineConfig,
    initial_item: WorkItem,
) -> Result<Value> {
    let initial_state = initial_item.state_snapshot.clone();
    let frontier = Arc::new(Frontier::new(config.queue_depth));
    let inflight = Arc::new(AtomicUsize::new(0));
    let step_counter = Arc::new(AtomicU64::new(0));
    let next_step_id = Arc::new(AtomicU64::new(initial_item.step_id + 1));
    let completion_detected = Arc::new(AtomicBool::new(false));
    let first_error: Arc<Mutex<Option<EngineError>>> = Arc::new(Mutex::new(None));
    let worker_count = config.parallelism.max(1);
    let (delta_tx, mut delta_rx) = mpsc::channel::<(u64, Value)>(2 * worker_count);

    frontier
        .enqueue(token, initial_item, config.backpressure_timeout)
        .await?;

    let mut handles = FuturesUnordered::new();
    for _ in 0..worker_count {
        let worker = Worker {
            run: run.clone(),
            frontier: frontier.clone(),
            token: token.clone(),
            inflight: inflight.clone(),
            step_counter: step_counter.clone(),
            next_step_id: next_step_id.clone(),
            completion_detected: completion_detected.clone(),
            first_error: first_error.clone(),
            delta_tx: delta_tx.clone(),
            config: config.clone(),
        };
        handles.push(tokio::spawn(worker.run_loop()));
    }
    drop(delta_tx);

    let mut deltas: Vec<(u64, Value)> = Vec::new();
    let mut received_count: u64 = 0;
    let mut checkpoint_error: Option<EngineError> = None;
    while let Some(entry) = delta_rx.recv().await {
        deltas.push(entry);
        received_count += 1;

        if config.checkpoint_interval_steps != 0 && received_count % config.checkpoint_interval_steps == 0 {
            let mut running = deltas.clone();
            running.sort_by_key(|(order_key, _)| *order_key);
            let mut running_state = initial_state.clone();
            for (_, delta) in running {
                running_state = (run.reducer)(running_state, delta);
            }
            let frontier_snapshot = frontier.snapshot_items();
            let recorded_ios = run.recorded_ios_snapshot();
            tracing::info!(run_id = %run.run_id, step_id = received_count, "committing interleaved checkpoint");
            if let Err(err) = checkpoint_writer::commit(
                &run.store,
                &run.emitter,
                &run.run_id,
                received_count,
                &running_state,
                &frontier_snapshot,
                run.base_seed,
                recorded_ios,
                None,
            )
            .await
            {
                tracing::error!(run_id = %run.run_id, error = %err, "interleaved checkpoint commit failed, aborting run");
                checkpoint_error = Some(err);
                token.cancel("checkpoint commit failed");
                break;
            }
        }
    }

    while handles.next().await.is_some() {}

    if let Some(err) = checkpoint_error {
        return Err(err);
    }
    if let Some(err) = first_error.lock().take() {
        return Err(err);
    }

    deltas.sort_by_key(|(order_key, _)| *order_key);
    let frontier_snapshot = frontier.snapshot_items();
    let recorded_ios = run.recorded_ios_snapshot();
    let mut state = initial_state;
    for (_, delta) in deltas {
        state = (run.reducer)(state, delta);
    }

    tracing::info!(run_id = %run.run_id, step_id = received_count + 1, "committing final checkpoint");
    checkpoint_writer::commit(
        &run.store,
        &run.emitter,
        &run.run_id,
        received_count + 1,
        &state,
        &frontier_snapshot,
        run.base_seed,
        recorded_ios,
        Some("final".to_string()),
    )
    .await?;

    Ok(state)
}

struct Worker {
    run: Arc<RunContext>,
    frontier: Arc<Frontier>,
    token: CancellationToken,
    inflight: Arc<AtomicUsize>,
    step_counter: Arc<AtomicU64>,
    next_step_id: Arc<AtomicU64>,
    completion_detected: Arc<AtomicBool>,
    first_error: Arc<Mutex<Option<EngineError>>>,
    delta_tx: mpsc::Sender<(u64, Value)>,
    config: EngineConfig,
}

impl Worker {
    async fn run_loop(self) {
        loop {
            let item = match self.frontier.dequeue(&self.token).await {
                Ok(item) => item,
                Err(_) => {
                    self.maybe_signal_completion();
                    return;
                }
            };

            self.inflight.fetch_add(1, Ordering::SeqCst);

            if self.config.max_steps != 0 {
                let dispatched = self.step_counter.fetch_add(1, Ordering::SeqCst) + 1;
                if dispatched > self.config.max_steps {
                    self.fail(EngineError::MaxStepsExceeded(self.config.max_steps));
                    self.inflight.fetch_sub(1, Ordering::SeqCst);
                    self.maybe_signal_completion();
                    return;
                }
            }

            self.emit_start(&item).await;
            self.dispatch(item).await;

            self.inflight.fetch_sub(1, Ordering::SeqCst);
            if self.maybe_signal_completion() || self.token.is_cancelled() {
                return;
            }
        }
    }

    async fn dispatch(&self, item: WorkItem) {
        tracing::debug!(node_id = %item.node_id, step_id = item.step_id, attempt = item.attempt, "dispatching node");
        match invoke_node(&self.run, &self.token, self.config.default_node_timeout, &item).await {
            Ok(output) => self.on_success(item, output).await,
            Err(err) => self.on_failure(item, err).await,
        }
    }

    async fn on_success(&self, item: WorkItem, output: crate::node::NodeOutput) {
        self.run
            .emitter
            .emit(Event::new(
                &self.run.run_id,
                EventKind::NodeEnd,
                serde_json::json!({"node_id": item.node_id, "step_id": item.step_id}),
            ))
            .await;

        if self.delta_tx.send((item.order_key, output.delta.clone())).await.is_err() {
            return;
        }

        let local_state = (self.run.reducer)(item.state_snapshot.clone(), output.delta);
        let successors = match resolve_route(
            &item.node_id,
            &output.route,
            &self.run.edges,
            &local_state,
            &self.run.known_nodes,
        ) {
            Ok(successors) => successors,
            Err(err) => {
                self.fail(err);
                return;
            }
        };

        tracing::debug!(
            node_id = %item.node_id,
            successors = ?successors.iter().map(|s| s.node_id.clone()).collect::<Vec<_>>(),
            "routing decision"
        );
        self.run
            .emitter
            .emit(Event::new(
                &self.run.run_id,
                EventKind::RoutingDecision,
                serde_json::json!({
                    "node_id": item.node_id,
                    "successors": successors.iter().map(|s| s.node_id.clone()).collect::<Vec<_>>(),
                }),
            ))
            .await;

        for successor in successors {
            let snapshot = match crate::state::snapshot(&local_state) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    self.fail(err);
                    return;
                }
            };
            let next_id = self.next_step_id.fetch_add(1, Ordering::SeqCst);
            let child = item.successor(next_id, successor.node_id, successor.edge_index, snapshot);
            if let Err(err) = self
                .frontier
                .enqueue(&self.token, child, self.config.backpressure_timeout)
                .await
            {
                self.fail(err);
                return;
            }
        }
    }

    async fn on_failure(&self, item: WorkItem, err: EngineError) {
        let policy = self.run.retry_policy_for(&item.node_id);
        if policy.should_retry(item.attempt, &err) {
            tracing::warn!(node_id = %item.node_id, attempt = item.attempt, error = %err, "retrying after error");
            self.run
                .emitter
                .emit(Event::new(
                    &self.run.run_id,
                    EventKind::Error,
                    serde_json::json!({
                        "node_id": item.node_id,
                        "attempt": item.attempt,
                        "message": err.to_string(),
                    }),
                ))
                .await;

            let mut rng = StdRng::seed_from_u64(self.run.base_seed ^ item.order_key);
            let delay = policy.backoff_delay(item.attempt, &mut rng);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.token.cancelled() => return,
            }
            if self.token.is_cancelled() {
                return;
            }
            let retried = item.retry();
            if let Err(err) = self
                .frontier
                .enqueue(&self.token, retried, self.config.backpressure_timeout)
                .await
            {
                self.fail(err);
            }
            return;
        }

        let final_err = if policy.retryable(&err) {
            tracing::error!(node_id = %item.node_id, attempts = item.attempt + 1, "exhausted retry attempts");
            EngineError::MaxAttemptsExceeded {
                node: item.node_id.clone(),
                attempts: item.attempt + 1,
                source: Box::new(err),
            }
        } else {
            tracing::error!(node_id = %item.node_id, error = %err, "node failed without retry");
            err
        };
        self.fail(final_err);
    }

    async fn emit_start(&self, item: &WorkItem) {
        self.run
            .emitter
            .emit(Event::new(
                &self.run.run_id,
                EventKind::NodeStart,
                serde_json::json!({"node_id": item.node_id, "step_id": item.step_id, "attempt": item.attempt}),
            ))
            .await;
    }

    fn fail(&self, err: EngineError) {
        let mut slot = self.first_error.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
        drop(slot);
        self.token.cancel("worker failed");
    }

    /// Attempt to claim the single completion transition; cancels the shared
    /// token on success so blocked peers unblock and exit. Returns whether
    /// this call claimed it.
    fn maybe_signal_completion(&self) -> bool {
        if self.frontier.size() == 0 && self.inflight.load(Ordering::SeqCst) == 0 {
            if !self.completion_detected.swap(true, Ordering::SeqCst) {
                self.token.cancel("run complete");
                return true;
            }
        }
        false
    }
}
