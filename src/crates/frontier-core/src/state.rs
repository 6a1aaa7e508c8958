//! The reducer contract and canonical-form state snapshotting (§4.3).
//!
//! The engine is generic over a state type `S`; it never matches on `S`'s
//! shape, only serializes and deserializes it. Canonical serialization (not
//! structural reflection) is the sole means of copying and hashing state, so
//! unexported or private fields behave correctly as long as `Serialize`
//! covers them.

use frontier_checkpoint::{CheckpointError, Result as CheckpointResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Bound every state type the engine operates on must satisfy.
pub trait State: Serialize + DeserializeOwned + Send + Sync + 'static {}
impl<T: Serialize + DeserializeOwned + Send + Sync + 'static> State for T {}

/// A pure function merging a delta into a prior state (§4.3, invariant 5).
///
/// The engine does not defend against a reducer that is impure or
/// nondeterministic; its guarantees (byte-equal reruns, order-independent
/// fan-out merges) hold only if the reducer honors this contract.
pub trait Reducer<S: State>: Send + Sync {
    fn reduce(&self, accumulated: S, delta: S) -> S;
}

impl<S, F> Reducer<S> for F
where
    S: State,
    F: Fn(S, S) -> S + Send + Sync,
{
    fn reduce(&self, accumulated: S, delta: S) -> S {
        self(accumulated, delta)
    }
}

/// Serialize `state` to its canonical byte form — the sole basis for the
/// idempotency key and for deep-copy snapshots.
pub fn canonical_bytes<S: State>(state: &S) -> CheckpointResult<Vec<u8>> {
    frontier_checkpoint::serializer::to_canonical_bytes(state)
}

/// Produce an independently-owned snapshot of `state` by round-tripping it
/// through JSON. Every fan-out branch gets one of these; none of them alias.
pub fn snapshot<S: State>(state: &S) -> CheckpointResult<S> {
    frontier_checkpoint::serializer::snapshot(state)
}

/// Convert a typed state value to its canonical [`serde_json::Value`] form,
/// used when building checkpoints and work items generically over `S`.
pub fn to_value<S: State>(state: &S) -> CheckpointResult<Value> {
    serde_json::to_value(state).map_err(CheckpointError::from)
}

/// Convert a canonical [`serde_json::Value`] back into a typed state value.
pub fn from_value<S: State>(value: Value) -> CheckpointResult<S> {
    serde_json::from_value(value).map_err(CheckpointError::from)
}
