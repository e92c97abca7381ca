pub mod agent_loop;
pub mod context;
pub mod curator;
pub mod files;
pub mod graph;
pub mod planner;
pub mod pool;

pub use agent_loop::AgentRuntime;
pub use context::ContextBuilder;
pub use curator::{CapabilityCurator, Curator, CuratorPipeline, ModelCurator, ToolCurator};
pub use graph::{
    Capability, Edge, ExecutionResult, ExecutionStrategy, GraphDescription, GraphExecutor,
    Handoff, Node, NodeResult, RunScope, TaskGraph,
};
pub use planner::Planner;
pub use pool::{AgentContext, ModelPool};
