//! Canonical serialization for state snapshots and checkpoint payloads.
//!
//! The engine never reinterprets `S`'s fields; every copy and every hash input
//! passes through this module's canonical byte form. Round-tripping a value
//! through [`to_canonical_bytes`]/[`from_canonical_bytes`] is how fan-out
//! branches get independent snapshots (see `frontier_core::state`).

use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Serialize `value` to its canonical byte form.
///
/// `serde_json`'s default map representation preserves insertion order only
/// when the `preserve_order` feature is enabled; without it, object keys are
/// emitted in the order the `Serialize` impl visits its fields, which is
/// stable for a fixed Rust type across processes. That stability — not
/// structural reflection — is what makes the idempotency key and snapshot
/// round-trip deterministic.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Deserialize a value previously produced by [`to_canonical_bytes`].
pub fn from_canonical_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Deep-copy `value` by round-tripping it through the canonical byte form.
///
/// This is the engine's sole means of giving a fan-out branch an
/// independently owned state snapshot; it never clones through `Clone` (the
/// engine doesn't require `S: Clone`, only `S: Serialize + DeserializeOwned`).
pub fn snapshot<T: Serialize + DeserializeOwned>(value: &T) -> Result<T> {
    from_canonical_bytes(&to_canonical_bytes(value)?)
}
