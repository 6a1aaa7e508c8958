//! # frontier-core
//!
//! The execution core of a checkpointed, concurrent workflow engine: nodes
//! (pure computation plus a routing decision) are composed into a directed
//! graph and run against an evolving, user-defined state. The core is the
//! intersection of three concerns:
//!
//! - a **concurrent scheduler** that dispatches ready work with bounded
//!   parallelism, backpressure, and deterministic ordering ([`frontier`],
//!   [`scheduler`]);
//! - a **routing and state composition pipeline** that merges partial
//!   updates through a user reducer and selects successors via explicit
//!   routes or predicate-guarded edges ([`routing`], [`state`]);
//! - a **durable checkpointing and replay subsystem**, provided by
//!   [`frontier_checkpoint`] and driven here by [`checkpoint_writer`] and
//!   [`replay`], that commits execution atomically and can reconstruct a run
//!   from recorded inputs and a seeded RNG.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use frontier_core::{Engine, EngineConfig, FnNode, NodeOutput, Route};
//! use frontier_checkpoint::InMemoryStore;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Counter { count: i64 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), frontier_core::EngineError> {
//!     let engine = Engine::new(EngineConfig::default())
//!         .with_reducer(|acc: Counter, delta: Counter| Counter { count: acc.count + delta.count })
//!         .with_store(InMemoryStore::new());
//!
//!     engine.add_node("inc", FnNode::new(|_ctx, state: serde_json::Value| async move {
//!         let count = state["count"].as_i64().unwrap_or(0);
//!         Ok(NodeOutput::new(serde_json::json!({"count": count + 1}), Route::Terminal))
//!     }))?;
//!     engine.start_at("inc")?;
//!
//!     let result = engine.run("run-1", Counter { count: 0 }).await?;
//!     println!("{}", result.count);
//!     Ok(())
//! }
//! ```
//!
//! ## Module organization
//!
//! Dependency order, leaves first:
//! - [`order_key`] — deterministic priority derivation
//! - [`frontier`] — the bounded priority queue
//! - [`state`] — the reducer contract and canonical snapshotting
//! - [`routing`] — route and predicate-guarded edge resolution
//! - [`retry`] — per-node retry policy and full-jitter backoff
//! - [`checkpoint_writer`] — idempotent checkpoint commit protocol
//! - [`scheduler`] — the sequential and concurrent execution paths
//! - [`replay`] — recorded-I/O substitution for replay-mode runs
//! - [`engine`] — the public facade, [`Engine`]
//!
//! Supporting types: [`work_item`] (the unit the scheduler dispatches),
//! [`cancellation`] (the cooperative cancellation primitive), [`context`]
//! (the per-invocation context passed to every node), [`node`] (the `Node`
//! capability contract), [`config`] ([`EngineConfig`]), [`error`]
//! ([`EngineError`]).

pub mod cancellation;
pub mod checkpoint_writer;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod frontier;
pub mod node;
pub mod order_key;
pub mod replay;
pub mod retry;
pub mod routing;
pub mod scheduler;
pub mod state;
pub mod work_item;

pub use cancellation::CancellationToken;
pub use config::EngineConfig;
pub use context::InvocationContext;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use frontier::{Frontier, FrontierMetrics};
pub use node::{FnNode, Node, NodeOutput, NodePolicy, SideEffectPolicy};
pub use replay::ReplayHarness;
pub use retry::RetryPolicy;
pub use routing::{Edge, Route, Successor};
pub use state::{Reducer, State};
pub use work_item::{WorkItem, WorkItemState};
