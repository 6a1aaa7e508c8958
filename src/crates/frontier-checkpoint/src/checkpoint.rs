//! The checkpoint data model: a durable, atomically-committed snapshot of a
//! run's progress.
//!
//! A checkpoint is the unit the [`crate::store::Store`] persists and the unit
//! the replay harness (`frontier_core::replay`) reconstructs a run from. Its
//! shape is fixed by the engine, not by backend choice — a Postgres-backed
//! store and the bundled [`crate::memory::InMemoryStore`] both move the same
//! [`Checkpoint`] value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the frontier as captured at commit time.
///
/// Mirrors the fields of `frontier_core::work_item::WorkItem` that matter for
/// resuming a run, without `frontier-checkpoint` depending on `frontier-core`
/// (the dependency points the other way).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub order_key: u64,
    pub node_id: String,
    pub parent_node_id: String,
    pub edge_index: u32,
    pub attempt: u32,
    /// Canonical-form state snapshot the work item would resume with.
    pub state_snapshot: serde_json::Value,
}

/// One recorded external effect, written the first time a `recordable` node
/// runs and consulted on replay in place of a live invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedIo {
    pub node_id: String,
    pub attempt: u32,
    /// Hash of the request the node made; compared on strict replay.
    pub request_hash: String,
    /// The exact response bytes returned to the node on first execution.
    pub response_bytes: Vec<u8>,
}

/// A durable, atomic snapshot of one run at one step.
///
/// The `idempotency_key` is computed by
/// [`crate::idempotency::compute_idempotency_key`] over
/// `(run_id, step_id, frontier, state)` and is the sole basis on which the
/// store accepts or rejects a commit (see invariants 2 and 3 in the data
/// model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: String,
    pub step_id: u64,
    /// Canonical-form accumulated state at this step.
    pub state: serde_json::Value,
    pub frontier: Vec<FrontierEntry>,
    /// Base seed the work-item-scoped RNGs for this run were derived from.
    pub rng_seed: u64,
    pub recorded_ios: Vec<RecordedIo>,
    pub idempotency_key: String,
    pub timestamp: DateTime<Utc>,
    pub label: Option<String>,
}

impl Checkpoint {
    /// Number of entries the frontier held at commit time; reported in the
    /// `checkpoint_saved` event.
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }
}
