use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::debug;

use taskloom_core::config::ModalityRule;
use taskloom_core::error::GraphError;
use taskloom_core::types::{format_modalities, EdgeLabel, ModalitySet, NodeId};

use super::edge::Edge;
use super::node::Node;

/// Node ids and labeled edges in insertion order. Two graphs with equal
/// topology have run the same curators over the same structure.
pub(crate) type Topology = (Vec<NodeId>, Vec<Edge>);

/// A typed DAG of task nodes.
///
/// Nodes and edges keep their insertion order, which pins down every
/// ordering the executor depends on: ready-node tie breaks in
/// `topological_order` and the order of `predecessors`/`successors`.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    edges: Vec<Edge>,
    modality_rule: ModalityRule,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rule `validate` applies to modalities.
    pub fn with_modality_rule(mut self, rule: ModalityRule) -> Self {
        self.modality_rule = rule;
        self
    }

    pub fn modality_rule(&self) -> ModalityRule {
        self.modality_rule
    }

    /// Add a node. Ids must be unique.
    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.index.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        self.index.insert(node.id, self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Add an edge. At most one edge may join an ordered pair of nodes.
    ///
    /// Endpoints are not checked here; `validate` reports unknown ones.
    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: EdgeLabel,
    ) -> Result<(), GraphError> {
        if self.edges.iter().any(|e| e.from == from && e.to == to) {
            return Err(GraphError::DuplicateEdge { from, to });
        }
        self.edges.push(Edge { from, to, label });
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Mutable access for curators. Changing a node's id is a topology
    /// change and is rejected by the curator pipeline.
    pub fn nodes_mut(&mut self) -> std::slice::IterMut<'_, Node> {
        self.nodes.iter_mut()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct predecessors of `id`, in edge insertion order.
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|e| e.to == id)
            .map(|e| e.from)
            .collect()
    }

    /// Direct successors of `id`, in edge insertion order.
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|e| e.from == id)
            .map(|e| e.to)
            .collect()
    }

    pub(crate) fn topology(&self) -> Topology {
        (
            self.nodes.iter().map(|n| n.id).collect(),
            self.edges.clone(),
        )
    }

    /// Check structure, modalities and acyclicity, failing on the first
    /// violation.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.validate_edges()?;
        self.validate_modalities()?;
        self.topological_order()?;
        debug!(
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            "Task graph validated"
        );
        Ok(())
    }

    fn validate_edges(&self) -> Result<(), GraphError> {
        for edge in &self.edges {
            for node in [edge.from, edge.to] {
                if !self.contains(node) {
                    return Err(GraphError::InvalidNode {
                        node,
                        from: edge.from,
                        to: edge.to,
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_modalities(&self) -> Result<(), GraphError> {
        for node in &self.nodes {
            let preds = self.predecessors(node.id);
            if preds.is_empty() {
                continue;
            }

            let outputs: ModalitySet = preds
                .iter()
                .filter_map(|p| self.node(*p))
                .flat_map(|p| p.output_modalities.iter().copied())
                .collect();
            let inputs = &node.input_modalities;

            let compatible = match self.modality_rule {
                ModalityRule::Subset => outputs.is_subset(inputs),
                ModalityRule::Covering => inputs.is_subset(&outputs),
                ModalityRule::Exact => outputs == *inputs,
            };
            if !compatible {
                return Err(GraphError::ModalityMismatch {
                    node: node.id,
                    inputs: format_modalities(inputs),
                    outputs: format_modalities(&outputs),
                });
            }
        }
        Ok(())
    }

    /// Kahn's algorithm. Among ready nodes the earliest inserted goes first,
    /// so the order is deterministic. Fails with `Cycle` instead of
    /// returning a partial order.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, GraphError> {
        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut out: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            if let (Some(&from), Some(&to)) = (self.index.get(&edge.from), self.index.get(&edge.to))
            {
                in_degree[to] += 1;
                out[from].push(to);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(i)) = ready.pop() {
            order.push(self.nodes[i].id);
            for &next in &out[i] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() < self.nodes.len() {
            let placed: HashSet<NodeId> = order.iter().copied().collect();
            let stuck = self
                .nodes
                .iter()
                .map(|n| n.id)
                .filter(|id| !placed.contains(id))
                .collect();
            return Err(GraphError::Cycle(stuck));
        }
        Ok(order)
    }
}
