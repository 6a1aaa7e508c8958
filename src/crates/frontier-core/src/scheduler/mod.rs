//! The scheduler core (§4.5): shared machinery between the sequential and
//! concurrent execution paths. Each path owns its own loop — they differ
//! enough in shape (single loop vs. worker pool plus collector) that forcing
//! one code path to serve both would obscure more than it'd save — but both
//! dispatch through [`invoke_node`] and share [`RunContext`].

pub mod concurrent;
pub mod sequential;

use crate::cancellation::CancellationToken;
use crate::context::InvocationContext;
use crate::error::{EngineError, Result};
use crate::node::{Node, NodeOutput};
use crate::replay::{self, ReplayHarness};
use crate::retry::RetryPolicy;
use crate::routing::Edge;
use frontier_checkpoint::{Emitter, RecordedIo, Store};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Everything both execution paths need, bundled so neither signature grows
/// a dozen parameters.
pub(crate) struct RunContext {
    pub nodes: HashMap<String, Arc<dyn Node>>,
    pub edges: Vec<Edge>,
    pub known_nodes: HashSet<String>,
    pub retry_policies: HashMap<String, RetryPolicy>,
    pub default_retry: RetryPolicy,
    pub store: Arc<dyn Store>,
    pub emitter: Arc<dyn Emitter>,
    pub reducer: Arc<dyn Fn(Value, Value) -> Value + Send + Sync>,
    pub run_id: String,
    pub base_seed: u64,
    pub replay: Option<ReplayHarness>,
    recorded_ios: Mutex<Vec<RecordedIo>>,
}

impl RunContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nodes: HashMap<String, Arc<dyn Node>>,
        edges: Vec<Edge>,
        known_nodes: HashSet<String>,
        retry_policies: HashMap<String, RetryPolicy>,
        default_retry: RetryPolicy,
        store: Arc<dyn Store>,
        emitter: Arc<dyn Emitter>,
        reducer: Arc<dyn Fn(Value, Value) -> Value + Send + Sync>,
        run_id: String,
        base_seed: u64,
        replay: Option<ReplayHarness>,
    ) -> Self {
        Self {
            nodes,
            edges,
            known_nodes,
            retry_policies,
            default_retry,
            store,
            emitter,
            reducer,
            run_id,
            base_seed,
            replay,
            recorded_ios: Mutex::new(Vec::new()),
        }
    }

    pub fn retry_policy_for(&self, node_id: &str) -> &RetryPolicy {
        self.retry_policies.get(node_id).unwrap_or(&self.default_retry)
    }

    /// Clone the recorded I/O accumulated so far without clearing it — a
    /// checkpoint commit needs the cumulative list up to that point, and
    /// a later commit in the same run needs everything again, not just the
    /// tail since the last commit.
    pub fn recorded_ios_snapshot(&self) -> Vec<RecordedIo> {
        self.recorded_ios.lock().clone()
    }

    fn push_recorded_io(&self, io: RecordedIo) {
        self.recorded_ios.lock().push(io);
    }
}

/// Invoke the node named by `work_item`, honoring replay mode, per-node or
/// default timeouts, and recording the response when the node is declared
/// recordable and this is a live (non-replay) execution.
pub(crate) async fn invoke_node(
    run: &RunContext,
    token: &CancellationToken,
    default_node_timeout: std::time::Duration,
    work_item: &crate::work_item::WorkItem,
) -> Result<NodeOutput> {
    let node = run
        .nodes
        .get(&work_item.node_id)
        .ok_or_else(|| EngineError::NodeNotFound(work_item.node_id.clone()))?;

    tracing::trace!(
        node_id = %work_item.node_id,
        step_id = work_item.step_id,
        attempt = work_item.attempt,
        "invoking node"
    );

    let side_effects = node.side_effect_policy();

    if let Some(harness) = &run.replay {
        if side_effects.recordable {
            tracing::debug!(node_id = %work_item.node_id, attempt = work_item.attempt, "resolving from replay harness");
            return harness.resolve(&work_item.node_id, work_item.attempt, &work_item.state_snapshot);
        }
    }

    let recorded_ios: Arc<[RecordedIo]> = match &run.replay {
        Some(harness) => harness.recorded_ios(),
        None => Arc::from(Vec::new()),
    };

    let invocation_ctx = InvocationContext::new(
        run.run_id.clone(),
        work_item.step_id,
        work_item.node_id.clone(),
        work_item.order_key,
        work_item.attempt,
        run.base_seed,
        token.clone(),
        recorded_ios,
    );

    let timeout = node.policy().timeout.unwrap_or(default_node_timeout);
    let invoked = tokio::time::timeout(timeout, node.invoke(&invocation_ctx, work_item.state_snapshot.clone()))
        .await
        .map_err(|_| {
            tracing::warn!(node_id = %work_item.node_id, ?timeout, "node invocation timed out");
            EngineError::Timeout { node: work_item.node_id.clone(), duration: timeout }
        })?;
    let output = invoked.map_err(|err| {
        tracing::debug!(node_id = %work_item.node_id, error = %err, "node invocation returned an error");
        err
    })?;

    if side_effects.recordable && run.replay.is_none() {
        let io = replay::record_output(
            &work_item.node_id,
            work_item.attempt,
            &work_item.state_snapshot,
            &output,
        )?;
        run.push_recorded_io(io);
    }

    Ok(output)
}
