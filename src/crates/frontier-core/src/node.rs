//! The Node capability contract (§6): the single seam user code implements.

use crate::context::InvocationContext;
use crate::error::Result;
use crate::routing::Route;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// The result of one node invocation.
pub struct NodeOutput {
    /// Partial state update; folded into the accumulated state by the
    /// engine's reducer.
    pub delta: Value,
    pub route: Route,
}

impl NodeOutput {
    pub fn new(delta: Value, route: Route) -> Self {
        Self { delta, route }
    }

    /// A successful invocation with no delta, delegating to edge evaluation.
    pub fn empty() -> Self {
        Self { delta: Value::Null, route: Route::Unspecified }
    }
}

/// Optional per-node execution policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodePolicy {
    pub timeout: Option<Duration>,
}

/// Optional per-node side-effect declaration (§4.8).
#[derive(Debug, Clone, Copy, Default)]
pub struct SideEffectPolicy {
    pub recordable: bool,
}

/// A graph node: a pure computation step plus a routing decision.
///
/// `invoke` receives the canonical-form state (not the typed `S`) so the
/// engine can store nodes in a single `HashMap<String, Arc<dyn Node>>`
/// without being generic over every node's own state slice.
#[async_trait]
pub trait Node: Send + Sync {
    async fn invoke(&self, ctx: &InvocationContext, state: Value) -> Result<NodeOutput>;

    fn policy(&self) -> NodePolicy {
        NodePolicy::default()
    }

    fn side_effect_policy(&self) -> SideEffectPolicy {
        SideEffectPolicy::default()
    }
}

/// Adapts a plain async closure into a [`Node`], for the common case of a
/// node with no custom policy or recording behavior.
pub struct FnNode<F> {
    f: F,
}

impl<F> FnNode<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Node for FnNode<F>
where
    F: Fn(InvocationContext, Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<NodeOutput>> + Send,
{
    async fn invoke(&self, ctx: &InvocationContext, state: Value) -> Result<NodeOutput> {
        (self.f)(ctx.clone(), state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use std::sync::Arc;

    fn ctx() -> InvocationContext {
        InvocationContext::new(
            "run-1", 0, "a", 1, 0, 0, CancellationToken::new(), Arc::from(vec![]),
        )
    }

    #[tokio::test]
    async fn fn_node_adapts_a_closure() {
        let node = FnNode::new(|_ctx, state: Value| async move {
            Ok(NodeOutput::new(
                serde_json::json!({"count": state["count"].as_i64().unwrap_or(0) + 1}),
                Route::Terminal,
            ))
        });
        let output = node.invoke(&ctx(), serde_json::json!({"count": 1})).await.unwrap();
        assert_eq!(output.delta["count"], 2);
        assert!(matches!(output.route, Route::Terminal));
    }

    #[test]
    fn default_policy_has_no_timeout_and_is_not_recordable() {
        let node = FnNode::new(|_ctx, _state: Value| async { Ok(NodeOutput::empty()) });
        assert!(node.policy().timeout.is_none());
        assert!(!node.side_effect_policy().recordable);
    }
}
