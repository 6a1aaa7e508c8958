//! An in-memory [`Store`] implementation.
//!
//! `InMemoryStore` is the crate's own integration-test backend and a
//! reference for anyone implementing [`Store`] against a durable backend. It
//! is thread-safe (`Arc<RwLock<..>>` guarded maps) but not persistent: data
//! is lost on process exit.
//!
//! Avoid this for: production deployments, long-running workflows, or
//! anything needing survival across restarts. Use it for: tests, demos, and
//! short-lived single-process runs.

use crate::checkpoint::Checkpoint;
use crate::error::{CheckpointError, Result};
use crate::event::Event;
use crate::store::Store;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::VecDeque;

#[derive(Default)]
struct Inner {
    /// `run_id -> step_id -> (node_id, state)`, the most recent write wins per step.
    steps: HashMap<String, HashMap<u64, (String, Value)>>,
    /// `run_id -> step_id -> checkpoint`.
    checkpoints: HashMap<String, HashMap<u64, Checkpoint>>,
    /// Committed idempotency keys, independent of which run/step produced them.
    idempotency_index: HashMap<String, ()>,
    /// FIFO outbox of events awaiting delivery.
    outbox: VecDeque<Event>,
}

/// Thread-safe, process-local [`Store`].
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard all state; useful between test cases that share one instance.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.steps.clear();
        inner.checkpoints.clear();
        inner.idempotency_index.clear();
        inner.outbox.clear();
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save_step(
        &self,
        run_id: &str,
        step_id: u64,
        node_id: &str,
        state: &Value,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        inner
            .steps
            .entry(run_id.to_string())
            .or_default()
            .insert(step_id, (node_id.to_string(), state.clone()));
        Ok(())
    }

    async fn load_latest(&self, run_id: &str) -> Result<(Value, u64)> {
        let inner = self.inner.read();
        let steps = inner
            .steps
            .get(run_id)
            .ok_or_else(|| CheckpointError::NotFound(run_id.to_string()))?;
        let (step_id, (_, state)) = steps
            .iter()
            .max_by_key(|(step_id, _)| **step_id)
            .ok_or_else(|| CheckpointError::NotFound(run_id.to_string()))?;
        Ok((state.clone(), *step_id))
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut inner = self.inner.write();

        if inner
            .idempotency_index
            .contains_key(&checkpoint.idempotency_key)
        {
            let already_this_one = inner
                .checkpoints
                .get(&checkpoint.run_id)
                .and_then(|by_step| by_step.get(&checkpoint.step_id))
                .map(|existing| existing.idempotency_key == checkpoint.idempotency_key)
                .unwrap_or(false);
            return if already_this_one {
                Ok(())
            } else {
                Err(CheckpointError::IdempotencyViolation(
                    checkpoint.idempotency_key.clone(),
                ))
            };
        }

        inner
            .idempotency_index
            .insert(checkpoint.idempotency_key.clone(), ());
        inner
            .checkpoints
            .entry(checkpoint.run_id.clone())
            .or_default()
            .insert(checkpoint.step_id, checkpoint.clone());
        Ok(())
    }

    async fn load_checkpoint(&self, run_id: &str, step_id: u64) -> Result<Checkpoint> {
        let inner = self.inner.read();
        inner
            .checkpoints
            .get(run_id)
            .and_then(|by_step| by_step.get(&step_id))
            .cloned()
            .ok_or_else(|| CheckpointError::not_found_step(run_id, step_id))
    }

    async fn check_idempotency(&self, key: &str) -> Result<bool> {
        Ok(self.inner.read().idempotency_index.contains_key(key))
    }

    async fn pending_events(&self, limit: usize) -> Result<Vec<Event>> {
        let inner = self.inner.read();
        Ok(inner.outbox.iter().take(limit).cloned().collect())
    }

    async fn mark_events_emitted(&self, ids: &[String]) -> Result<()> {
        let mut inner = self.inner.write();
        inner.outbox.retain(|event| !ids.contains(&event.id));
        Ok(())
    }

    async fn enqueue_event(&self, event: Event) -> Result<()> {
        self.inner.write().outbox.push_back(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn sample_checkpoint(run_id: &str, step_id: u64, key: &str) -> Checkpoint {
        Checkpoint {
            run_id: run_id.to_string(),
            step_id,
            state: serde_json::json!({"count": step_id}),
            frontier: vec![],
            rng_seed: 1,
            recorded_ios: vec![],
            idempotency_key: key.to_string(),
            timestamp: chrono::Utc::now(),
            label: None,
        }
    }

    #[tokio::test]
    async fn save_and_load_latest_step() {
        let store = InMemoryStore::new();
        store
            .save_step("run-1", 0, "a", &serde_json::json!({"count": 0}))
            .await
            .unwrap();
        store
            .save_step("run-1", 1, "b", &serde_json::json!({"count": 1}))
            .await
            .unwrap();

        let (state, step_id) = store.load_latest("run-1").await.unwrap();
        assert_eq!(step_id, 1);
        assert_eq!(state["count"], 1);
    }

    #[tokio::test]
    async fn load_latest_missing_run_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.load_latest("missing").await.unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_checkpoint_commit_is_a_no_op_success() {
        let store = InMemoryStore::new();
        let cp = sample_checkpoint("run-1", 0, "sha256:aaa");
        store.save_checkpoint(&cp).await.unwrap();
        store.save_checkpoint(&cp).await.unwrap();

        let loaded = store.load_checkpoint("run-1", 0).await.unwrap();
        assert_eq!(loaded, cp);
        assert!(store.check_idempotency("sha256:aaa").await.unwrap());
    }

    #[tokio::test]
    async fn conflicting_key_at_same_step_is_a_violation() {
        let store = InMemoryStore::new();
        let cp_a = sample_checkpoint("run-1", 0, "sha256:aaa");
        let mut cp_b = sample_checkpoint("run-1", 0, "sha256:bbb");
        cp_b.state = serde_json::json!({"count": 99});

        store.save_checkpoint(&cp_a).await.unwrap();
        let err = store.save_checkpoint(&cp_b).await.unwrap_err();
        assert!(matches!(err, CheckpointError::IdempotencyViolation(_)));
    }

    #[tokio::test]
    async fn outbox_round_trips_and_drains() {
        let store = InMemoryStore::new();
        let event = Event::new("run-1", EventKind::NodeEnd, serde_json::json!({"node": "a"}));
        let id = event.id.clone();
        store.enqueue_event(event).await.unwrap();

        let pending = store.pending_events(10).await.unwrap();
        assert_eq!(pending.len(), 1);

        store.mark_events_emitted(&[id]).await.unwrap();
        let pending = store.pending_events(10).await.unwrap();
        assert!(pending.is_empty());
    }
}
