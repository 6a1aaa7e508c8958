//! The engine facade (§4.9): owns the graph, the reducer, the store, the
//! emitter, and configuration, and dispatches a run to the sequential or
//! concurrent path.

use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::node::Node;
use crate::replay::ReplayHarness;
use crate::retry::RetryPolicy;
use crate::routing::Edge;
use crate::scheduler::{self, RunContext};
use crate::state::State;
use crate::work_item::WorkItem;
use frontier_checkpoint::{Emitter, NoopEmitter, Store};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

/// The public entry point: register nodes and edges, configure a reducer,
/// store, and emitter, then call [`Engine::run`].
///
/// Safe for concurrent `run` calls on distinct run ids; graph mutation
/// (`add_node`, `connect`, `start_at`) is serialized by a readers-writer lock
/// and may race with an in-flight `run` only in the sense that the run reads
/// a consistent snapshot taken at its own start, never a torn one.
pub struct Engine<S> {
    nodes: RwLock<HashMap<String, Arc<dyn Node>>>,
    edges: RwLock<Vec<Edge>>,
    start: RwLock<Option<String>>,
    retry_policies: RwLock<HashMap<String, RetryPolicy>>,
    default_retry: RetryPolicy,
    reducer: RwLock<Option<Arc<dyn Fn(serde_json::Value, serde_json::Value) -> serde_json::Value + Send + Sync>>>,
    store: RwLock<Option<Arc<dyn Store>>>,
    emitter: Arc<dyn Emitter>,
    config: EngineConfig,
    _marker: PhantomData<fn() -> S>,
}

impl<S: State> Default for Engine<S> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<S: State> Engine<S> {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            edges: RwLock::new(Vec::new()),
            start: RwLock::new(None),
            retry_policies: RwLock::new(HashMap::new()),
            default_retry: RetryPolicy::default(),
            reducer: RwLock::new(None),
            store: RwLock::new(None),
            emitter: Arc::new(NoopEmitter),
            config,
            _marker: PhantomData,
        }
    }

    /// Register a node under `id`. Rejects an empty id or a duplicate
    /// registration.
    pub fn add_node(&self, id: impl Into<String>, node: impl Node + 'static) -> Result<()> {
        let id = id.into();
        if id.is_empty() {
            return Err(EngineError::InvalidNode("node id must not be empty".into()));
        }
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&id) {
            return Err(EngineError::DuplicateNode(id));
        }
        nodes.insert(id, Arc::new(node));
        Ok(())
    }

    /// Attach a per-node retry policy, overriding the engine-wide default for
    /// that node only.
    pub fn set_retry_policy(&self, node_id: impl Into<String>, policy: RetryPolicy) {
        self.retry_policies.write().insert(node_id.into(), policy);
    }

    /// Designate the entry node. Rejects an id that hasn't been registered.
    pub fn start_at(&self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        if !self.nodes.read().contains_key(&id) {
            return Err(EngineError::NodeNotFound(id));
        }
        *self.start.write() = Some(id);
        Ok(())
    }

    /// Declare an unconditional edge. Accepts endpoints that don't exist yet
    /// (lazy validation) so construction order is unconstrained; rejects
    /// empty endpoint names.
    pub fn connect(&self, from: impl Into<String>, to: impl Into<String>) -> Result<()> {
        self.connect_edge(Edge::unconditional(from, to))
    }

    /// Declare a predicate-guarded edge, evaluated in declaration order
    /// against the state after the reducer folds the completed node's delta.
    pub fn connect_guarded(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        predicate: impl Fn(&serde_json::Value) -> bool + Send + Sync + 'static,
    ) -> Result<()> {
        self.connect_edge(Edge::guarded(from, to, predicate))
    }

    fn connect_edge(&self, edge: Edge) -> Result<()> {
        if edge.from.is_empty() || edge.to.is_empty() {
            return Err(EngineError::InvalidEdge("edge endpoints must not be empty".into()));
        }
        self.edges.write().push(edge);
        Ok(())
    }

    /// Set the reducer merging a node's delta into the accumulated state.
    pub fn with_reducer<F>(self, reducer: F) -> Self
    where
        F: Fn(S, S) -> S + Send + Sync + 'static,
    {
        let wrapped = move |accumulated: serde_json::Value, delta: serde_json::Value| -> serde_json::Value {
            let accumulated: S = serde_json::from_value(accumulated)
                .expect("accumulated state must deserialize to the engine's state type");
            let delta: S = serde_json::from_value(delta)
                .expect("delta state must deserialize to the engine's state type");
            serde_json::to_value(reducer(accumulated, delta))
                .expect("reduced state must serialize to canonical form")
        };
        *self.reducer.write() = Some(Arc::new(wrapped));
        self
    }

    /// Set the durable store.
    pub fn with_store(self, store: impl Store + 'static) -> Self {
        *self.store.write() = Some(Arc::new(store));
        self
    }

    /// Set the observability sink. Defaults to [`NoopEmitter`].
    pub fn with_emitter(mut self, emitter: impl Emitter + 'static) -> Self {
        self.emitter = Arc::new(emitter);
        self
    }

    /// Execute the graph from `initial` under `run_id`, returning the final
    /// accumulated state.
    pub async fn run(&self, run_id: impl Into<String>, initial: S) -> Result<S> {
        let run_id = run_id.into();
        let reducer = self
            .reducer
            .read()
            .clone()
            .ok_or(EngineError::MissingReducer)?;
        let store = self.store.read().clone().ok_or(EngineError::MissingStore)?;
        let start = self.start.read().clone().ok_or(EngineError::NoStartNode)?;

        let nodes = self.nodes.read().clone();
        let edges = self.edges.read().clone();
        let known_nodes: HashSet<String> = nodes.keys().cloned().collect();
        let retry_policies = self.retry_policies.read().clone();

        let base_seed = crate::order_key::order_key(&run_id, 0);
        let initial_value = serde_json::to_value(&initial)?;

        let replay = if self.config.replay_mode {
            let (_, latest_step) = store.load_latest(&run_id).await?;
            let checkpoint = store.load_checkpoint(&run_id, latest_step).await?;
            Some(ReplayHarness::from_checkpoint(&checkpoint, self.config.strict_replay))
        } else {
            None
        };
        let base_seed = replay.as_ref().map(|h| h.base_seed()).unwrap_or(base_seed);

        let token = CancellationToken::new();
        if !self.config.run_wall_clock_budget.is_zero() {
            let deadline_token = token.clone();
            let budget = self.config.run_wall_clock_budget;
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(budget) => {
                        deadline_token.cancel("run wall clock budget exceeded");
                    }
                    _ = deadline_token.cancelled() => {}
                }
            });
        }

        let initial_item = WorkItem::initial(0, start, initial_value);

        let run_id_for_log = run_id.clone();
        tracing::info!(
            run_id = %run_id_for_log,
            sequential = self.config.is_sequential(),
            parallelism = self.config.parallelism,
            "starting run"
        );

        let final_value = if self.config.is_sequential() {
            let run_ctx = RunContext::new(
                nodes,
                edges,
                known_nodes,
                retry_policies,
                self.default_retry.clone(),
                store,
                self.emitter.clone(),
                reducer,
                run_id,
                base_seed,
                replay,
            );
            scheduler::sequential::run(&run_ctx, &token, &self.config, initial_item).await?
        } else {
            let run_ctx = Arc::new(RunContext::new(
                nodes,
                edges,
                known_nodes,
                retry_policies,
                self.default_retry.clone(),
                store,
                self.emitter.clone(),
                reducer,
                run_id,
                base_seed,
                replay,
            ));
            scheduler::concurrent::run(run_ctx, &token, &self.config, initial_item).await?
        };

        tracing::info!(run_id = %run_id_for_log, "run finished");
        Ok(serde_json::from_value(final_value)?)
    }
}
