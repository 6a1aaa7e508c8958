//! The replay harness (§4.8): reconstructs a run from its latest committed
//! checkpoint instead of issuing live side effects for recordable nodes.
//!
//! `request_hash` stands in for "the request a node made" in a spec that
//! otherwise leaves the shape of a node's external call unspecified: here it
//! is the hash of `(node_id, attempt, input state)`, which is everything the
//! engine itself knows about an invocation before the node runs. A node's own
//! `invoke` is free to ignore it; `strict_replay` only compares what the
//! engine can compute on both sides.

use crate::error::{EngineError, Result};
use crate::node::NodeOutput;
use crate::routing::Route;
use frontier_checkpoint::{Checkpoint, RecordedIo};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Hash of everything the engine knows about an invocation before the node
/// runs, used to detect divergence between the recording and replay runs.
pub fn request_hash(node_id: &str, attempt: u32, state: &Value) -> Result<String> {
    let state_bytes = frontier_checkpoint::serializer::to_canonical_bytes(state)?;
    let mut hasher = Sha256::new();
    hasher.update(node_id.as_bytes());
    hasher.update(attempt.to_be_bytes());
    hasher.update(&state_bytes);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    Ok(format!("sha256:{hex}"))
}

/// The recordable portion of a node's result: everything needed to replay the
/// invocation without re-running it.
#[derive(Serialize, Deserialize)]
struct RecordedOutput {
    delta: Value,
    route: Route,
}

/// Build the [`RecordedIo`] entry for a recordable node's first execution.
pub fn record_output(
    node_id: &str,
    attempt: u32,
    input_state: &Value,
    output: &NodeOutput,
) -> Result<RecordedIo> {
    let recorded = RecordedOutput { delta: output.delta.clone(), route: output.route.clone() };
    let response_bytes = serde_json::to_vec(&recorded)?;
    Ok(RecordedIo {
        node_id: node_id.to_string(),
        attempt,
        request_hash: request_hash(node_id, attempt, input_state)?,
        response_bytes,
    })
}

fn decode_output(io: &RecordedIo) -> Result<NodeOutput> {
    let recorded: RecordedOutput = serde_json::from_slice(&io.response_bytes)?;
    Ok(NodeOutput::new(recorded.delta, recorded.route))
}

/// Drives a replay-mode run: answers "what did this node return last time"
/// instead of invoking it live, for every node declared recordable.
pub struct ReplayHarness {
    recorded_ios: Arc<[RecordedIo]>,
    base_seed: u64,
    strict_replay: bool,
}

impl ReplayHarness {
    /// Build a harness from the latest committed checkpoint for a run.
    pub fn from_checkpoint(checkpoint: &Checkpoint, strict_replay: bool) -> Self {
        Self {
            recorded_ios: Arc::from(checkpoint.recorded_ios.clone()),
            base_seed: checkpoint.rng_seed,
            strict_replay,
        }
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    pub fn recorded_ios(&self) -> Arc<[RecordedIo]> {
        self.recorded_ios.clone()
    }

    /// Resolve a recordable node's invocation at `(node_id, attempt)` against
    /// the recorded list, optionally verifying the request hash still
    /// matches what was recorded.
    pub fn resolve(&self, node_id: &str, attempt: u32, input_state: &Value) -> Result<NodeOutput> {
        let io = self
            .recorded_ios
            .iter()
            .find(|io| io.node_id == node_id && io.attempt == attempt)
            .ok_or_else(|| EngineError::MissingRecordedIo {
                node: node_id.to_string(),
                attempt,
            })?;

        if self.strict_replay {
            let live_hash = request_hash(node_id, attempt, input_state)?;
            if live_hash != io.request_hash {
                return Err(EngineError::ReplayMismatch {
                    node: node_id.to_string(),
                    attempt,
                });
            }
        }

        decode_output(io)
    }
}
