//! The work item: the unit the frontier queues and a worker dispatches.

use serde_json::Value;

/// State machine a work item moves through (§4.9).
///
/// Only `Succeeded`, `Failed`, and `Cancelled` are terminal; `Retrying`
/// always transitions back to `Enqueued` with `attempt` incremented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItemState {
    Enqueued,
    Running,
    Succeeded,
    Retrying,
    Failed,
    Cancelled,
}

/// A unit of dispatched execution.
///
/// `order_key` is preserved across retries — only `attempt` and `state`
/// change — which is what keeps the final collector merge deterministic
/// regardless of which worker happens to process a retry.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub step_id: u64,
    pub order_key: u64,
    pub node_id: String,
    pub state_snapshot: Value,
    pub attempt: u32,
    pub parent_node_id: String,
    pub edge_index: u32,
}

impl WorkItem {
    /// Build the initial work item seeded by `Engine::run`, using the
    /// `"__start__"` sentinel parent and edge index 0 (§4.1).
    pub fn initial(step_id: u64, node_id: impl Into<String>, state_snapshot: Value) -> Self {
        let node_id = node_id.into();
        let order_key = crate::order_key::order_key(crate::order_key::START, 0);
        Self {
            step_id,
            order_key,
            node_id,
            state_snapshot,
            attempt: 0,
            parent_node_id: crate::order_key::START.to_string(),
            edge_index: 0,
        }
    }

    /// Build a successor work item for routing to `node_id` from this item's
    /// completed node at `edge_index` within the chosen route.
    pub fn successor(
        &self,
        step_id: u64,
        node_id: impl Into<String>,
        edge_index: u32,
        state_snapshot: Value,
    ) -> Self {
        let parent_node_id = self.node_id.clone();
        let order_key = crate::order_key::order_key(&parent_node_id, edge_index);
        Self {
            step_id,
            order_key,
            node_id: node_id.into(),
            state_snapshot,
            attempt: 0,
            parent_node_id,
            edge_index,
        }
    }

    /// Build the retry work item for this item after a failed attempt:
    /// identical `order_key`, `step_id`, and `state_snapshot`, `attempt + 1`.
    pub fn retry(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_uses_start_sentinel() {
        let item = WorkItem::initial(0, "a", serde_json::json!({}));
        assert_eq!(item.parent_node_id, "__start__");
        assert_eq!(item.edge_index, 0);
        assert_eq!(item.attempt, 0);
    }

    #[test]
    fn retry_preserves_order_key_and_bumps_attempt() {
        let item = WorkItem::initial(0, "a", serde_json::json!({"x": 1}));
        let retried = item.retry();
        assert_eq!(retried.order_key, item.order_key);
        assert_eq!(retried.step_id, item.step_id);
        assert_eq!(retried.attempt, 1);
        assert_eq!(retried.state_snapshot, item.state_snapshot);
    }

    #[test]
    fn successor_derives_order_key_from_parent_and_edge_index() {
        let item = WorkItem::initial(0, "a", serde_json::json!({}));
        let child = item.successor(1, "b", 2, serde_json::json!({}));
        assert_eq!(child.parent_node_id, "a");
        assert_eq!(
            child.order_key,
            crate::order_key::order_key("a", 2)
        );
    }
}
