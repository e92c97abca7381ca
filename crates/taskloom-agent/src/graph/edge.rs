use serde::{Deserialize, Serialize};

use taskloom_core::types::{EdgeLabel, NodeId};

/// A directed edge between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Source node id.
    pub from: NodeId,
    /// Target node id.
    pub to: NodeId,
    /// Action carried by the edge.
    #[serde(default)]
    pub label: EdgeLabel,
}

impl Edge {
    /// Create an edge with the default label.
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self::labeled(from, to, EdgeLabel::Default)
    }

    /// Create an edge with an explicit label.
    pub fn labeled(from: impl Into<NodeId>, to: impl Into<NodeId>, label: EdgeLabel) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label,
        }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} -> {}] ({})", self.from, self.to, self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_builders() {
        let e = Edge::new(1, 2);
        assert_eq!(e.from, NodeId(1));
        assert_eq!(e.to, NodeId(2));
        assert_eq!(e.label, EdgeLabel::Default);

        let e = Edge::labeled(2, 1, EdgeLabel::Reject);
        assert_eq!(e.label, EdgeLabel::Reject);
        assert_eq!(e.to_string(), "[2 -> 1] (reject)");
    }

    #[test]
    fn test_label_defaults_when_missing() {
        let e: Edge = serde_json::from_str(r#"{"from": 1, "to": 2}"#).unwrap();
        assert_eq!(e.label, EdgeLabel::Default);
    }
}
