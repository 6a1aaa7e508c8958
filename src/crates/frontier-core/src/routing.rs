//! Routing: resolving a completed node's result into zero or more successor
//! work items (§4.4).

use crate::error::{EngineError, Result};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A predicate guarding an edge; evaluated against the canonical-form state
/// produced after the reducer folds in the completed node's delta.
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// An edge in the graph: `from -> to`, taken unconditionally unless
/// `predicate` is set.
#[derive(Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub predicate: Option<Predicate>,
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Edge {
    pub fn unconditional(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), to: to.into(), predicate: None }
    }

    pub fn guarded(
        from: impl Into<String>,
        to: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self { from: from.into(), to: to.into(), predicate: Some(Arc::new(predicate)) }
    }

    fn matches(&self, state: &Value) -> bool {
        match &self.predicate {
            None => true,
            Some(p) => p(state),
        }
    }
}

/// A node's routing decision (§3 "Route").
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub enum Route {
    /// Emit no successor; the run terminates along this path.
    Terminal,
    /// One successor, unconditionally, at `edge_index = 0`.
    Goto(String),
    /// One successor per id, `edge_index` equal to position in the list.
    Many(Vec<String>),
    /// Delegate to declared edges from the completed node.
    Unspecified,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Terminal => write!(f, "Terminal"),
            Route::Goto(id) => write!(f, "Goto({id})"),
            Route::Many(ids) => write!(f, "Many({ids:?})"),
            Route::Unspecified => write!(f, "Unspecified"),
        }
    }
}

/// A resolved successor: the target node id and the `edge_index` to derive
/// its order key from.
#[derive(Debug, Clone)]
pub struct Successor {
    pub node_id: String,
    pub edge_index: u32,
}

/// Resolve `route` for a node that just completed, given its declared
/// outgoing edges (in declaration order) and the state after the reducer
/// folded in its delta.
///
/// Known node ids are validated by the caller (the engine facade) when
/// `Goto`/`Many` name a node; this function returns [`EngineError::NodeNotFound`]
/// only for `Unspecified` routing through an edge (edges are allowed to name
/// unknown nodes at construction time per §4.9, but routing to one at
/// runtime is the failure point).
pub fn resolve_route(
    completed_node: &str,
    route: &Route,
    edges: &[Edge],
    state_after_reduce: &Value,
    known_nodes: &std::collections::HashSet<String>,
) -> Result<Vec<Successor>> {
    match route {
        Route::Terminal => Ok(vec![]),
        Route::Goto(id) => {
            if !known_nodes.contains(id) {
                return Err(EngineError::NodeNotFound(id.clone()));
            }
            Ok(vec![Successor { node_id: id.clone(), edge_index: 0 }])
        }
        Route::Many(ids) => {
            for id in ids {
                if !known_nodes.contains(id) {
                    return Err(EngineError::NodeNotFound(id.clone()));
                }
            }
            Ok(ids
                .iter()
                .enumerate()
                .map(|(edge_index, id)| Successor {
                    node_id: id.clone(),
                    edge_index: edge_index as u32,
                })
                .collect())
        }
        Route::Unspecified => {
            for (edge_index, edge) in edges
                .iter()
                .filter(|e| e.from == completed_node)
                .enumerate()
            {
                if edge.matches(state_after_reduce) {
                    if !known_nodes.contains(&edge.to) {
                        return Err(EngineError::NodeNotFound(edge.to.clone()));
                    }
                    return Ok(vec![Successor {
                        node_id: edge.to.clone(),
                        edge_index: edge_index as u32,
                    }]);
                }
            }
            Err(EngineError::NoRoute(completed_node.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn known(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn terminal_emits_no_successors() {
        let result = resolve_route("a", &Route::Terminal, &[], &Value::Null, &known(&[])).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn goto_emits_one_successor_at_edge_index_zero() {
        let result = resolve_route("a", &Route::Goto("b".into()), &[], &Value::Null, &known(&["b"])).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].node_id, "b");
        assert_eq!(result[0].edge_index, 0);
    }

    #[test]
    fn goto_unknown_node_fails() {
        let err = resolve_route("a", &Route::Goto("missing".into()), &[], &Value::Null, &known(&[])).unwrap_err();
        assert!(matches!(err, EngineError::NodeNotFound(_)));
    }

    #[test]
    fn many_assigns_edge_index_by_position() {
        let route = Route::Many(vec!["x".into(), "y".into(), "z".into()]);
        let result = resolve_route("root", &route, &[], &Value::Null, &known(&["x", "y", "z"])).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[1].node_id, "y");
        assert_eq!(result[1].edge_index, 1);
    }

    #[test]
    fn unspecified_selects_first_matching_edge_in_declaration_order() {
        let edges = vec![
            Edge::guarded("a", "low", |s| s["count"].as_i64().unwrap_or(0) < 5),
            Edge::unconditional("a", "high"),
        ];
        let state = serde_json::json!({"count": 2});
        let result = resolve_route("a", &Route::Unspecified, &edges, &state, &known(&["low", "high"])).unwrap();
        assert_eq!(result[0].node_id, "low");
    }

    #[test]
    fn unspecified_falls_through_to_later_edge_when_predicate_fails() {
        let edges = vec![
            Edge::guarded("a", "low", |s| s["count"].as_i64().unwrap_or(0) < 5),
            Edge::unconditional("a", "high"),
        ];
        let state = serde_json::json!({"count": 9});
        let result = resolve_route("a", &Route::Unspecified, &edges, &state, &known(&["low", "high"])).unwrap();
        assert_eq!(result[0].node_id, "high");
    }

    #[test]
    fn unspecified_with_no_matching_edge_fails_with_no_route() {
        let edges = vec![Edge::guarded("a", "low", |s| s["count"].as_i64().unwrap_or(0) < 5)];
        let state = serde_json::json!({"count": 9});
        let err = resolve_route("a", &Route::Unspecified, &edges, &state, &known(&["low"])).unwrap_err();
        assert!(matches!(err, EngineError::NoRoute(_)));
    }
}
