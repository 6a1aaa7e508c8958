//! Error types for the checkpoint store.

use thiserror::Error;

/// Result type for checkpoint store operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors surfaced by a [`crate::store::Store`] implementation.
///
/// `frontier-core` treats [`CheckpointError::IdempotencyViolation`] specially: a
/// violation observed while committing a checkpoint is absorbed as success rather
/// than propagated, per the commit protocol's idempotency contract.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No checkpoint or step exists for the requested key.
    #[error("not found: {0}")]
    NotFound(String),

    /// A second commit attempt used an idempotency key distinct from an
    /// already-committed checkpoint for the same `(run_id, step_id)`.
    #[error("idempotency violation for key {0}")]
    IdempotencyViolation(String),

    /// Canonical (de)serialization of state or checkpoint payloads failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store rejected a read or write.
    #[error("store error: {0}")]
    Storage(String),

    /// A checkpoint or step payload failed structural validation.
    #[error("invalid checkpoint: {0}")]
    Invalid(String),

    /// I/O failure from a store backed by the filesystem or network.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckpointError {
    /// Build a [`CheckpointError::Storage`] from anything `Display`-able.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Build a [`CheckpointError::NotFound`] for a `(run_id, step_id)` pair.
    pub fn not_found_step(run_id: &str, step_id: u64) -> Self {
        Self::NotFound(format!("run {run_id} step {step_id}"))
    }
}
