//! Observability event shapes shared between the `Emitter` capability and the
//! store's transactional outbox.
//!
//! The engine emits the same seven event kinds whether they're delivered
//! in-process through an [`Emitter`](crate::store) or persisted to a store's
//! outbox for at-least-once delivery to an out-of-process consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The seven event kinds the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NodeStart,
    NodeEnd,
    RoutingDecision,
    Error,
    CheckpointSaved,
    CheckpointSaveFailed,
    Resume,
}

/// A single observability event.
///
/// `payload` carries kind-specific metadata (e.g. delta summary for
/// `NodeEnd`, chosen successors for `RoutingDecision`, idempotency key and
/// frontier size for `CheckpointSaved`). The engine does not guarantee
/// ordering of events across distinct work items; within one work item,
/// events appear in source order (see the concurrency model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub run_id: String,
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(run_id: impl Into<String>, kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            kind,
            payload,
            created_at: Utc::now(),
        }
    }
}
