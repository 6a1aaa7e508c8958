//! The checkpoint commit protocol (§4.7).
//!
//! 1. Compute the idempotency key over `(run_id, step_id, frontier, state)`.
//! 2. Query the store's idempotency index; a hit means the commit already
//!    occurred — success, no write.
//! 3. Otherwise attempt the atomic store write. A
//!    [`CheckpointError::IdempotencyViolation`] on that write means a peer
//!    committed the same key first — also treated as success.
//! 4. On success, emit a `checkpoint_saved` event carrying the key, frontier
//!    size, recorded-I/O count, and label.

use crate::error::{EngineError, Result};
use crate::work_item::WorkItem;
use frontier_checkpoint::{
    compute_idempotency_key, CheckpointError, Checkpoint, Emitter, Event, EventKind,
    FrontierEntry, OrderedItem, RecordedIo, Store,
};
use serde_json::Value;
use std::sync::Arc;

/// Commit a checkpoint for `run_id` at `step_id`, absorbing idempotent
/// re-commits as success per the protocol above.
pub async fn commit(
    store: &Arc<dyn Store>,
    emitter: &Arc<dyn Emitter>,
    run_id: &str,
    step_id: u64,
    state: &Value,
    frontier: &[WorkItem],
    rng_seed: u64,
    recorded_ios: Vec<RecordedIo>,
    label: Option<String>,
) -> Result<()> {
    let state_bytes = frontier_checkpoint::serializer::to_canonical_bytes(state)?;
    let ordered: Vec<OrderedItem<'_>> = frontier
        .iter()
        .map(|item| OrderedItem { node_id: &item.node_id, order_key: item.order_key })
        .collect();
    let key = compute_idempotency_key(run_id, step_id, &ordered, &state_bytes);

    if store.check_idempotency(&key).await? {
        tracing::debug!(run_id, step_id, idempotency_key = %key, "checkpoint already committed, skipping write");
        return Ok(());
    }

    let checkpoint = Checkpoint {
        run_id: run_id.to_string(),
        step_id,
        state: state.clone(),
        frontier: frontier.iter().map(to_frontier_entry).collect(),
        rng_seed,
        recorded_ios,
        idempotency_key: key.clone(),
        timestamp: chrono::Utc::now(),
        label: label.clone(),
    };

    let frontier_size = checkpoint.frontier_size();
    let recorded_io_count = checkpoint.recorded_ios.len();

    match store.save_checkpoint(&checkpoint).await {
        Ok(()) => {
            tracing::info!(run_id, step_id, idempotency_key = %key, frontier_size, "checkpoint committed");
        }
        Err(CheckpointError::IdempotencyViolation(_)) => {
            tracing::debug!(run_id, step_id, idempotency_key = %key, "checkpoint write raced a peer, absorbing as success");
        }
        Err(other) => {
            tracing::error!(run_id, step_id, error = %other, "checkpoint save failed");
            return Err(EngineError::CheckpointSaveFailed(other.to_string()));
        }
    }

    emitter
        .emit(Event::new(
            run_id,
            EventKind::CheckpointSaved,
            serde_json::json!({
                "idempotency_key": key,
                "frontier_size": frontier_size,
                "recorded_io_count": recorded_io_count,
                "label": label,
            }),
        ))
        .await;

    Ok(())
}

fn to_frontier_entry(item: &WorkItem) -> FrontierEntry {
    FrontierEntry {
        order_key: item.order_key,
        node_id: item.node_id.clone(),
        parent_node_id: item.parent_node_id.clone(),
        edge_index: item.edge_index,
        attempt: item.attempt,
        state_snapshot: item.state_snapshot.clone(),
    }
}
