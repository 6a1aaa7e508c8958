//! Idempotency key computation for checkpoint commits.
//!
//! `"sha256:" + hex(H)` where
//! `H = SHA-256(run_id ‖ be64(step_id) ‖ Σ(node_id ‖ be64(order_key)) for items
//! sorted by order_key ‖ canonical_bytes(state))`.
//!
//! Sorting by `order_key` before hashing is what makes the key independent of
//! arrival order at the collector: two runs that complete the same work items
//! in different wall-clock order still produce byte-identical keys.

use sha2::{Digest, Sha256};

/// One `(node_id, order_key)` pair contributing to a commit's identity.
///
/// Callers pass the frontier-at-commit-time entries reduced to this shape;
/// [`compute_idempotency_key`] sorts them internally so callers don't need to
/// pre-sort.
#[derive(Debug, Clone, Copy)]
pub struct OrderedItem<'a> {
    pub node_id: &'a str,
    pub order_key: u64,
}

/// Compute the idempotency key for a checkpoint commit.
///
/// `state_bytes` must already be the canonical byte form produced by
/// [`crate::serializer::to_canonical_bytes`].
pub fn compute_idempotency_key(
    run_id: &str,
    step_id: u64,
    items: &[OrderedItem<'_>],
    state_bytes: &[u8],
) -> String {
    let mut sorted: Vec<&OrderedItem<'_>> = items.iter().collect();
    sorted.sort_by_key(|item| item.order_key);

    let mut hasher = Sha256::new();
    hasher.update(run_id.as_bytes());
    hasher.update(step_id.to_be_bytes());
    for item in sorted {
        hasher.update(item.node_id.as_bytes());
        hasher.update(item.order_key.to_be_bytes());
    }
    hasher.update(state_bytes);

    format!("sha256:{}", hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
