//! Task-graph orchestration.
//!
//! `Taskloom` ties the pieces together: it validates and curates a task
//! graph, opens fresh flow memory and a file map for the run, and drives the
//! graph with the configured execution strategy. A graph can also be planned
//! from a free-form request first.

pub mod logging;

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

pub use taskloom_agent::{
    AgentContext, AgentRuntime, Capability, CuratorPipeline, Edge, ExecutionResult,
    ExecutionStrategy, GraphDescription, GraphExecutor, ModelPool, Node, NodeResult, Planner,
    RunScope, TaskGraph,
};
pub use taskloom_core::config::{AppConfig, StrategyKind};
pub use taskloom_core::error::{Result, TaskloomError};
pub use taskloom_core::event::EventBus;
pub use taskloom_core::filemap::FileMap;
pub use taskloom_core::types::{EdgeLabel, File, Message, NodeId, RunEvent, RunId};
pub use taskloom_memory::FlowMemory;
pub use taskloom_tools::ToolRegistry;

/// Everything a finished run leaves behind.
pub struct RunOutput {
    pub run_id: RunId,
    /// Output of the last terminal node visited.
    pub final_output: Message,
    pub node_results: Vec<NodeResult>,
    pub total_elapsed_ms: u64,
    /// The run's flow memory, for inspecting handoffs.
    pub memory: FlowMemory,
    /// The run's file map, holding every file registered during the run.
    pub files: Arc<FileMap>,
}

impl std::fmt::Debug for RunOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOutput")
            .field("run_id", &self.run_id)
            .field("final_output", &self.final_output)
            .field("node_results", &self.node_results)
            .field("total_elapsed_ms", &self.total_elapsed_ms)
            .field("files", &self.files)
            .finish_non_exhaustive()
    }
}

/// Engine facade. Holds the configuration and the agent context shared by
/// every run it starts.
pub struct Taskloom {
    config: AppConfig,
    ctx: Arc<AgentContext>,
}

impl Taskloom {
    pub fn new(config: AppConfig, models: ModelPool, tools: ToolRegistry) -> Self {
        let ctx = AgentContext::new(config.agent.clone(), models, tools);
        Self {
            config,
            ctx: Arc::new(ctx),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.ctx.event_bus.clone()
    }

    /// Engine-wide shutdown token. Cancelling it aborts every run in flight
    /// and every run started afterwards. Use `run_token` to abort one run.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    /// A fresh token for a single run, for `run_with_cancel`. It is a child
    /// of the shutdown token.
    pub fn run_token(&self) -> CancellationToken {
        self.ctx.cancel.child_token()
    }

    /// Validate `graph` under the configured modality rule and run the
    /// standard curator pipeline over it.
    pub fn curate(&self, graph: TaskGraph) -> Result<TaskGraph> {
        let graph = graph.with_modality_rule(self.config.curator.modality_rule);
        graph.validate()?;
        CuratorPipeline::standard(self.ctx.clone(), &self.config.curator).run(graph)
    }

    /// Load a JSON or YAML graph description and validate it under the
    /// configured modality rule.
    pub fn load_graph(&self, path: impl AsRef<Path>) -> Result<TaskGraph> {
        TaskGraph::load(path.as_ref(), self.config.curator.modality_rule)
    }

    /// Curate and execute `graph` with an empty file map.
    pub async fn run(&self, graph: TaskGraph) -> Result<RunOutput> {
        self.execute(graph, Arc::new(FileMap::new()), self.run_token()).await
    }

    /// Curate and execute `graph`, sharing `files` with every node.
    pub async fn run_with_files(&self, graph: TaskGraph, files: Arc<FileMap>) -> Result<RunOutput> {
        self.execute(graph, files, self.run_token()).await
    }

    /// Curate and execute `graph`, aborting with `Cancelled` once `cancel`
    /// fires. Other runs of this engine are unaffected.
    pub async fn run_with_cancel(
        &self,
        graph: TaskGraph,
        cancel: CancellationToken,
    ) -> Result<RunOutput> {
        self.execute(graph, Arc::new(FileMap::new()), cancel).await
    }

    async fn execute(
        &self,
        graph: TaskGraph,
        files: Arc<FileMap>,
        cancel: CancellationToken,
    ) -> Result<RunOutput> {
        let graph = self.curate(graph)?;
        let strategy = self.strategy(&graph)?;

        let run_id = RunId::new();
        let storage = taskloom_memory::open_storage(&self.config.memory, &run_id)?;
        let scope = RunScope {
            run_id: run_id.clone(),
            memory: FlowMemory::new(storage),
            files,
            cancel,
        };

        info!(run_id = %run_id, nodes = graph.len(), strategy = ?strategy, "Starting run");
        let executor = GraphExecutor::new(strategy, self.ctx.event_bus.clone());
        let result = executor.run(&graph, &scope).await?;

        Ok(RunOutput {
            run_id,
            final_output: result.final_output,
            node_results: result.node_results,
            total_elapsed_ms: result.total_elapsed_ms,
            memory: scope.memory,
            files: scope.files,
        })
    }

    /// Ask the planner model for a graph that addresses `request`.
    pub async fn plan(&self, request: &str) -> Result<TaskGraph> {
        let key = self
            .config
            .planner
            .model
            .as_ref()
            .or(self.config.curator.default_model.as_ref())
            .ok_or_else(|| TaskloomError::ModelNotFound("no planner model configured".into()))?;
        let model = self.ctx.models.get(key)?;
        Planner::new(model, self.config.planner.clone())
            .with_modality_rule(self.config.curator.modality_rule)
            .plan(request)
            .await
    }

    /// Plan a graph for `request`, then run it.
    pub async fn plan_and_run(&self, request: &str) -> Result<RunOutput> {
        let graph = self.plan(request).await?;
        self.run(graph).await
    }

    fn strategy(&self, graph: &TaskGraph) -> Result<ExecutionStrategy> {
        match self.config.executor.strategy {
            StrategyKind::Sequential => Ok(ExecutionStrategy::Sequential),
            StrategyKind::Chain => Ok(ExecutionStrategy::Chain(graph.topological_order()?)),
        }
    }
}
