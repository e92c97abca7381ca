//! Task graphs and their execution.
//!
//! A `TaskGraph` is a DAG of `Node`s joined by labeled `Edge`s. Each node
//! carries a task and declared input/output modalities; once curated it also
//! carries a `Capability` (the bound agent). The `GraphExecutor` visits nodes
//! one at a time in a fixed order, feeding each node the outputs its
//! predecessors recorded in flow memory and recording its own output for
//! every successor.

pub mod dag;
pub mod description;
pub mod edge;
pub mod executor;
pub mod handoff;
pub mod node;

pub use dag::TaskGraph;
pub use description::{AgentDescription, EdgeDescription, GraphDescription};
pub use edge::Edge;
pub use executor::{ExecutionResult, ExecutionStrategy, GraphExecutor, NodeResult, RunScope};
pub use handoff::Handoff;
pub use node::{Capability, Node};

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use taskloom_core::types::{EdgeLabel, Modality, NodeId};

    pub fn text_node(id: u64) -> Node {
        Node::new(id, format!("task {}", id))
    }

    pub fn node_with(id: u64, inputs: &[Modality], outputs: &[Modality]) -> Node {
        text_node(id)
            .with_inputs(inputs.iter().copied())
            .with_outputs(outputs.iter().copied())
    }

    /// Nodes `ids` with `edges` added in the given order (default label).
    pub fn graph(ids: &[u64], edges: &[(u64, u64)]) -> TaskGraph {
        let mut g = TaskGraph::new();
        for &id in ids {
            g.add_node(text_node(id)).unwrap();
        }
        for &(from, to) in edges {
            g.add_edge(NodeId(from), NodeId(to), EdgeLabel::Default).unwrap();
        }
        g
    }
}
