//! Property test for the idempotency-key invariant: the key is independent of
//! the arrival order of `(node_id, order_key)` pairs and changes whenever the
//! `(run_id, step_id, state)` identity changes.

use frontier_checkpoint::{compute_idempotency_key, OrderedItem};
use proptest::prelude::*;

proptest! {
    #[test]
    fn key_is_independent_of_item_arrival_order(
        run_id in "[a-z]{1,8}",
        step_id in 0u64..1000,
        mut order_keys in prop::collection::vec(0u64..1000, 1..16),
        state in "[a-z0-9]{0,32}",
    ) {
        let node_ids: Vec<String> = order_keys.iter().map(|k| format!("node-{k}")).collect();
        let items: Vec<OrderedItem<'_>> = node_ids
            .iter()
            .zip(order_keys.iter())
            .map(|(node_id, &order_key)| OrderedItem { node_id, order_key })
            .collect();
        let state_bytes = state.as_bytes();

        let forward = compute_idempotency_key(&run_id, step_id, &items, state_bytes);

        let mut reversed_node_ids = node_ids.clone();
        order_keys.reverse();
        reversed_node_ids.reverse();
        let reversed_items: Vec<OrderedItem<'_>> = reversed_node_ids
            .iter()
            .zip(order_keys.iter())
            .map(|(node_id, &order_key)| OrderedItem { node_id, order_key })
            .collect();
        let reversed = compute_idempotency_key(&run_id, step_id, &reversed_items, state_bytes);

        prop_assert_eq!(forward, reversed);
    }

    #[test]
    fn key_changes_when_state_bytes_change(
        run_id in "[a-z]{1,8}",
        step_id in 0u64..1000,
        a in "[a-z0-9]{1,16}",
        b in "[a-z0-9]{1,16}",
    ) {
        prop_assume!(a != b);
        let items = [OrderedItem { node_id: "n", order_key: 1 }];
        let key_a = compute_idempotency_key(&run_id, step_id, &items, a.as_bytes());
        let key_b = compute_idempotency_key(&run_id, step_id, &items, b.as_bytes());
        prop_assert_ne!(key_a, key_b);
    }
}
