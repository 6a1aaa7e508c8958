//! The `Store` capability contract (spec §6): the single persistence seam the
//! engine consumes. Concrete backends — relational, object storage, whatever
//! a deployment needs — are external collaborators that implement this
//! trait; this crate ships only [`crate::memory::InMemoryStore`] as a
//! reference implementation and test double.

use crate::checkpoint::Checkpoint;
use crate::error::{CheckpointError, Result};
use crate::event::Event;
use async_trait::async_trait;
use serde_json::Value;

/// Durable persistence the engine requires to make progress survive a crash.
///
/// Implementations must be safe under concurrent access from multiple
/// workers (`Send + Sync`). `save_checkpoint` must be atomic with respect to
/// idempotency-key uniqueness: two concurrent callers committing the same
/// key must not both observe success via two distinct writes.
#[async_trait]
pub trait Store: Send + Sync {
    /// Durably append or upsert per-step state, keyed by `(run_id, step_id)`.
    async fn save_step(
        &self,
        run_id: &str,
        step_id: u64,
        node_id: &str,
        state: &Value,
    ) -> Result<()>;

    /// Load the most recently saved `(state, step_id)` for a run.
    ///
    /// Returns [`CheckpointError::NotFound`] if the run has no saved steps.
    async fn load_latest(&self, run_id: &str) -> Result<(Value, u64)>;

    /// Commit a checkpoint.
    ///
    /// Returns [`CheckpointError::IdempotencyViolation`] if a checkpoint with
    /// the same idempotency key already exists for a *different* identity —
    /// the checkpoint writer treats that as a successful no-op, not a
    /// failure. Committing the same key twice with identical content is
    /// itself a no-op success, never an error.
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Load the checkpoint committed for a specific `(run_id, step_id)`.
    ///
    /// Returns [`CheckpointError::NotFound`] if none exists.
    async fn load_checkpoint(&self, run_id: &str, step_id: u64) -> Result<Checkpoint>;

    /// True if `key` was previously committed successfully.
    async fn check_idempotency(&self, key: &str) -> Result<bool>;

    /// Drain up to `limit` not-yet-emitted outbox events, oldest first.
    async fn pending_events(&self, limit: usize) -> Result<Vec<Event>>;

    /// Mark the given event ids as emitted so they are not redelivered.
    ///
    /// Marking is at-least-once: a crash between delivery and this call may
    /// cause an event to be redelivered, never dropped.
    async fn mark_events_emitted(&self, ids: &[String]) -> Result<()>;

    /// Append an event to the outbox for later delivery via
    /// [`Store::pending_events`].
    async fn enqueue_event(&self, event: Event) -> Result<()>;
}

/// Sink for observability events (spec §6 "Emitter capability", optional).
///
/// An emitter must not block execution; implementations that need to block
/// (e.g. network I/O) should buffer internally. The engine tolerates
/// slowness but does not guarantee cross-item event ordering.
#[async_trait]
pub trait Emitter: Send + Sync {
    async fn emit(&self, event: Event);
}

/// An emitter that discards every event; the default when no emitter is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmitter;

#[async_trait]
impl Emitter for NoopEmitter {
    async fn emit(&self, _event: Event) {}
}

/// An emitter that forwards every event through `tracing` at a level chosen
/// by its kind (errors and save failures at `warn!`/`error!`, everything
/// else at `debug!`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEmitter;

#[async_trait]
impl Emitter for TracingEmitter {
    async fn emit(&self, event: Event) {
        use crate::event::EventKind::*;
        match event.kind {
            Error | CheckpointSaveFailed => {
                tracing::warn!(run_id = %event.run_id, kind = ?event.kind, payload = %event.payload, "workflow event");
            }
            _ => {
                tracing::debug!(run_id = %event.run_id, kind = ?event.kind, payload = %event.payload, "workflow event");
            }
        }
    }
}
