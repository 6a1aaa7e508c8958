//! Deterministic priority derivation for work items.
//!
//! `order_key(parent, edge_index) := be64(first_8_bytes(SHA-256(parent ‖
//! be32(edge_index))))`. Two work items created by the same `(parent,
//! edge_index)` pair — across processes, across retries, across replay —
//! always get the same key, which is what lets the collector fold deltas in
//! an order independent of completion order (§4.5, §8).

use sha2::{Digest, Sha256};

/// Sentinel parent for the initial work item seeded by `Engine::run`.
pub const START: &str = "__start__";

/// Derive the 64-bit order key for a successor created from `parent` at
/// `edge_index`.
pub fn order_key(parent_node_id: &str, edge_index: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(parent_node_id.as_bytes());
    hasher.update(edge_index.to_be_bytes());
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[..8].try_into().expect("sha256 digest is 32 bytes"))
}

/// Tie-break key for two work items whose `order_key` collided.
///
/// Implementations must apply this consistently; it is never used for
/// anything but breaking an exact `order_key` tie, so it does not need to be
/// cheap to compute for every comparison.
pub fn tie_break_key(node_id: &str, parent_node_id: &str, edge_index: u32) -> (String, String, u32) {
    (node_id.to_string(), parent_node_id.to_string(), edge_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_same_key() {
        assert_eq!(order_key("a", 0), order_key("a", 0));
    }

    #[test]
    fn different_edge_index_changes_key() {
        assert_ne!(order_key("a", 0), order_key("a", 1));
    }

    #[test]
    fn different_parent_changes_key() {
        assert_ne!(order_key("a", 0), order_key("b", 0));
    }

    #[test]
    fn start_sentinel_is_stable() {
        let first = order_key(START, 0);
        let second = order_key(START, 0);
        assert_eq!(first, second);
    }

    #[test]
    fn tie_break_orders_lexicographically_by_node_then_parent_then_index() {
        let a = tie_break_key("n1", "p1", 0);
        let b = tie_break_key("n2", "p1", 0);
        assert!(a < b);
    }
}
