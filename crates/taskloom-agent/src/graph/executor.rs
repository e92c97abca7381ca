use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use taskloom_core::error::{Result, TaskloomError};
use taskloom_core::event::EventBus;
use taskloom_core::filemap::FileMap;
use taskloom_core::types::{EdgeLabel, Message, NodeId, RunEvent, RunId, RunState};
use taskloom_memory::FlowMemory;

use super::dag::TaskGraph;
use super::handoff::Handoff;
use super::node::Node;

/// How the executor orders nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// Visit nodes in `TaskGraph::topological_order`.
    #[default]
    Sequential,
    /// Visit nodes in the given order, which must name every node once.
    Chain(Vec<NodeId>),
}

/// Per-run state shared by every node of one execution.
#[derive(Clone)]
pub struct RunScope {
    pub run_id: RunId,
    pub memory: FlowMemory,
    pub files: Arc<FileMap>,
    pub cancel: CancellationToken,
}

impl RunScope {
    pub fn new(memory: FlowMemory, files: Arc<FileMap>) -> Self {
        Self {
            run_id: RunId::new(),
            memory,
            files,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Result of executing a single node.
#[derive(Debug, Clone)]
pub struct NodeResult {
    /// Which node was executed.
    pub node_id: NodeId,
    /// The agent's output message.
    pub output: Message,
    /// Execution time in milliseconds.
    pub elapsed_ms: u64,
}

/// Result of executing an entire graph.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Output of the last terminal node visited.
    pub final_output: Message,
    /// Per-node results in execution order.
    pub node_results: Vec<NodeResult>,
    /// Total execution time in milliseconds.
    pub total_elapsed_ms: u64,
}

/// Drives a curated task graph to completion.
///
/// Nodes run strictly one at a time. Before a node runs, each predecessor's
/// handoff is read from flow memory and turned into observations; after it
/// runs, its handoff is written once per successor. The first error aborts
/// the run and is returned as is.
pub struct GraphExecutor {
    strategy: ExecutionStrategy,
    event_bus: Arc<EventBus>,
}

impl GraphExecutor {
    pub fn new(strategy: ExecutionStrategy, event_bus: Arc<EventBus>) -> Self {
        Self {
            strategy,
            event_bus,
        }
    }

    pub fn strategy(&self) -> &ExecutionStrategy {
        &self.strategy
    }

    /// The node order this executor would use for `graph`.
    pub fn order(&self, graph: &TaskGraph) -> Result<Vec<NodeId>> {
        match &self.strategy {
            ExecutionStrategy::Sequential => Ok(graph.topological_order()?),
            ExecutionStrategy::Chain(chain) => {
                check_chain(graph, chain)?;
                Ok(chain.clone())
            }
        }
    }

    /// Execute the graph within `scope`.
    pub async fn run(&self, graph: &TaskGraph, scope: &RunScope) -> Result<ExecutionResult> {
        let run_id = scope.run_id.clone();
        self.publish_state(&run_id, RunState::Ready);

        let result = self.run_inner(graph, scope).await;
        match &result {
            Ok(res) => {
                info!(
                    run_id = %run_id,
                    nodes = res.node_results.len(),
                    elapsed_ms = res.total_elapsed_ms,
                    "Graph run complete"
                );
                self.publish_state(&run_id, RunState::Completed);
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Graph run failed");
                self.event_bus.publish(RunEvent::RunError {
                    run_id: run_id.clone(),
                    error: e.to_string(),
                });
                self.publish_state(&run_id, RunState::Failed);
            }
        }
        result
    }

    async fn run_inner(&self, graph: &TaskGraph, scope: &RunScope) -> Result<ExecutionResult> {
        if graph.is_empty() {
            return Err(TaskloomError::EmptyGraph);
        }
        let order = self.order(graph)?;

        let start = Instant::now();
        self.publish_state(&scope.run_id, RunState::Running);
        info!(run_id = %scope.run_id, nodes = order.len(), "Graph run started");

        let mut final_output = None;
        let mut node_results = Vec::with_capacity(order.len());

        for id in order {
            if scope.cancel.is_cancelled() {
                return Err(TaskloomError::Cancelled);
            }
            let node = graph
                .node(id)
                .ok_or_else(|| TaskloomError::InvalidChain(format!("unknown node {}", id)))?;

            let result = self.run_node(graph, node, scope).await?;
            if graph.successors(id).is_empty() {
                final_output = Some(result.output.clone());
            }
            node_results.push(result);
        }

        Ok(ExecutionResult {
            final_output: final_output.ok_or(TaskloomError::EmptyGraph)?,
            node_results,
            total_elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn run_node(&self, graph: &TaskGraph, node: &Node, scope: &RunScope) -> Result<NodeResult> {
        let capability = node
            .capability
            .as_ref()
            .ok_or(TaskloomError::UncuratedNode(node.id))?;

        let mut observations = Vec::new();
        for pred in graph.predecessors(node.id) {
            let data = scope
                .memory
                .get_data(pred, node.id, EdgeLabel::Default)
                .await?
                .ok_or(TaskloomError::MissingHandoff {
                    caller: pred,
                    callee: node.id,
                })?;
            observations.extend(Handoff::from_data(data)?.into_observations());
        }

        info!(
            node_id = %node.id,
            node_name = %node.name,
            observations = observations.len(),
            "Executing graph node"
        );
        self.event_bus.publish(RunEvent::NodeStarted {
            run_id: scope.run_id.clone(),
            node_id: node.id,
        });

        let node_start = Instant::now();
        let goal = Message::user(node.task.clone());
        let result = tokio::select! {
            result = capability.agent.run(goal, observations, scope.files.clone()) => result,
            _ = scope.cancel.cancelled() => Err(TaskloomError::Cancelled),
        };
        let output = result.map_err(|e| {
            error!(node_id = %node.id, error = %e, "Graph node failed");
            e
        })?;
        let elapsed_ms = node_start.elapsed().as_millis() as u64;

        for succ in graph.successors(node.id) {
            let data = Handoff::new(node.task.clone(), output.clone()).into_data()?;
            scope
                .memory
                .add_entry(node.id, succ, EdgeLabel::Default, data)
                .await?;
        }

        debug!(node_id = %node.id, elapsed_ms, "Node execution complete");
        self.event_bus.publish(RunEvent::NodeCompleted {
            run_id: scope.run_id.clone(),
            node_id: node.id,
            elapsed_ms,
        });

        Ok(NodeResult {
            node_id: node.id,
            output,
            elapsed_ms,
        })
    }

    fn publish_state(&self, run_id: &RunId, state: RunState) {
        self.event_bus.publish(RunEvent::StateChanged {
            run_id: run_id.clone(),
            state,
        });
    }
}

fn check_chain(graph: &TaskGraph, chain: &[NodeId]) -> Result<()> {
    let mut seen = HashSet::new();
    for id in chain {
        if !graph.contains(*id) {
            return Err(TaskloomError::InvalidChain(format!(
                "node {} is not in the graph",
                id
            )));
        }
        if !seen.insert(*id) {
            return Err(TaskloomError::InvalidChain(format!(
                "node {} appears more than once",
                id
            )));
        }
    }
    if seen.len() != graph.len() {
        let missing: Vec<String> = graph
            .nodes()
            .iter()
            .filter(|n| !seen.contains(&n.id))
            .map(|n| n.id.to_string())
            .collect();
        return Err(TaskloomError::InvalidChain(format!(
            "missing nodes {}",
            missing.join(", ")
        )));
    }
    Ok(())
}
