//! Error types for the execution core.
//!
//! `EngineError` is the sole error currency: every fallible operation in this
//! crate returns `Result<T> = std::result::Result<T, EngineError>`, and
//! `Engine::run` returns exactly this type to its caller.
//!
//! # Error hierarchy
//!
//! ```text
//! EngineError
//! ├── Configuration errors   — MissingReducer, MissingStore, NoStartNode, DuplicateNode
//! ├── Transient node errors  — surfaced only as MaxAttemptsExceeded after retry exhaustion
//! ├── Execution errors       — NoRoute, NodeNotFound, MaxStepsExceeded, NodeExecution
//! └── Infrastructure errors  — Store, Serialization, BackpressureTimeout, ReplayMismatch
//! ```
//!
//! Idempotency violations are the one exception to "errors propagate": the
//! checkpoint writer (`crate::checkpoint_writer`) catches
//! [`frontier_checkpoint::CheckpointError::IdempotencyViolation`] and treats
//! it as a successful commit rather than converting it into an
//! `EngineError`.

use thiserror::Error;

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Every error the engine can surface, per the external interface contract.
#[derive(Error, Debug)]
pub enum EngineError {
    /// `run` was called on a facade with no reducer configured.
    #[error("no reducer configured")]
    MissingReducer,

    /// `run` was called on a facade with no store configured.
    #[error("no store configured")]
    MissingStore,

    /// `run` was called before `start_at` designated an entry node.
    #[error("no start node configured")]
    NoStartNode,

    /// An edge, `Goto`, or `Many` route named a node that was never registered.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// `add_node` was called twice with the same id.
    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    /// `add_node` was called with an empty id or a nil node.
    #[error("invalid node registration: {0}")]
    InvalidNode(String),

    /// `connect` was called with an empty `from` or `to` endpoint.
    #[error("invalid edge: {0}")]
    InvalidEdge(String),

    /// `Unspecified` routing found no matching outgoing edge.
    #[error("no route from node {0}")]
    NoRoute(String),

    /// The step dispatch count exceeded `max_steps`.
    #[error("max steps ({0}) exceeded")]
    MaxStepsExceeded(u64),

    /// A node's retry policy exhausted `max_attempts` without success.
    #[error("node {node} exhausted {attempts} attempts, last error: {source}")]
    MaxAttemptsExceeded {
        node: String,
        attempts: u32,
        #[source]
        source: Box<EngineError>,
    },

    /// A node invocation returned a non-retryable error.
    #[error("node {node} failed: {message}")]
    NodeExecution { node: String, message: String },

    /// `frontier.enqueue` blocked longer than `backpressure_timeout`.
    #[error("backpressure timeout after {0:?}")]
    BackpressureTimeout(std::time::Duration),

    /// The scheduler detected it could make no further progress (empty
    /// frontier with inflight work stuck, or a similar stall) without this
    /// being a clean completion.
    #[error("no progress: {0}")]
    NoProgress(String),

    /// Strict replay compared a live request hash against the recorded one
    /// and they differed.
    #[error("replay mismatch for node {node} attempt {attempt}")]
    ReplayMismatch { node: String, attempt: u32 },

    /// A replay-mode run needed a recorded response that wasn't captured.
    #[error("no recorded response for node {node} attempt {attempt}")]
    MissingRecordedIo { node: String, attempt: u32 },

    /// A fan-out or snapshot operation failed to round-trip state through
    /// its canonical serialization.
    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The configured store rejected a read or write. Idempotency violations
    /// are handled separately and never reach this variant.
    #[error("store error: {0}")]
    Store(#[from] frontier_checkpoint::CheckpointError),

    /// A checkpoint commit failed for a reason other than an idempotency
    /// violation.
    #[error("checkpoint save failed: {0}")]
    CheckpointSaveFailed(String),

    /// The run's caller cancelled it, or the run's wall-clock budget elapsed.
    #[error("run cancelled: {0}")]
    Cancelled(String),

    /// A node invocation exceeded its per-node or default timeout.
    #[error("node {node} timed out after {duration:?}")]
    Timeout {
        node: String,
        duration: std::time::Duration,
    },
}

impl EngineError {
    /// Build a [`EngineError::NodeExecution`] from a node id and any
    /// `Display`-able error.
    pub fn node_execution(node: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::NodeExecution {
            node: node.into(),
            message: error.to_string(),
        }
    }
}
