//! Curators bind executable capabilities to graph nodes.
//!
//! A curator takes a graph and returns it with node attributes filled in.
//! It may change anything about a node except its id, and it must leave the
//! edges alone. `CuratorPipeline` runs curators in order and enforces both
//! rules, then checks that every node ended up with a matching capability.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use taskloom_core::config::CuratorConfig;
use taskloom_core::error::{Result, TaskloomError};

use crate::agent_loop::AgentRuntime;
use crate::graph::{Capability, Node, TaskGraph};
use crate::pool::{AgentContext, ModelPool};

pub trait Curator: Send + Sync {
    fn name(&self) -> &str;

    /// Return `graph` with curated node attributes. Topology must not change.
    fn curate(&self, graph: TaskGraph) -> Result<TaskGraph>;
}

/// Fills in a missing model key from the configured default and rejects keys
/// the model pool does not know.
pub struct ModelCurator {
    default_model: Option<String>,
    known: HashSet<String>,
}

impl ModelCurator {
    pub fn new(default_model: Option<String>, models: &ModelPool) -> Self {
        Self {
            default_model,
            known: models.keys().into_iter().map(String::from).collect(),
        }
    }
}

impl Curator for ModelCurator {
    fn name(&self) -> &str {
        "model"
    }

    fn curate(&self, mut graph: TaskGraph) -> Result<TaskGraph> {
        for node in graph.nodes_mut() {
            let key = match node.model.take().or_else(|| self.default_model.clone()) {
                Some(key) => key,
                None => {
                    return Err(TaskloomError::ModelNotFound(format!(
                        "node {} requests no model and no default is configured",
                        node.id
                    )))
                }
            };
            if !self.known.contains(&key) {
                return Err(TaskloomError::ModelNotFound(key));
            }
            node.model = Some(key);
        }
        Ok(graph)
    }
}

/// Deduplicates each node's tool list (first occurrence wins), gives nodes
/// that request none the configured defaults, and rejects unknown names.
pub struct ToolCurator {
    default_tools: Vec<String>,
    known: HashSet<String>,
}

impl ToolCurator {
    pub fn new(default_tools: Vec<String>, known: impl IntoIterator<Item = String>) -> Self {
        Self {
            default_tools,
            known: known.into_iter().collect(),
        }
    }
}

impl Curator for ToolCurator {
    fn name(&self) -> &str {
        "tool"
    }

    fn curate(&self, mut graph: TaskGraph) -> Result<TaskGraph> {
        for node in graph.nodes_mut() {
            let requested = if node.tools.is_empty() {
                self.default_tools.clone()
            } else {
                std::mem::take(&mut node.tools)
            };

            let mut seen = HashSet::new();
            let mut tools = Vec::with_capacity(requested.len());
            for name in requested {
                if !self.known.contains(&name) {
                    return Err(TaskloomError::ToolNotFound(name));
                }
                if seen.insert(name.clone()) {
                    tools.push(name);
                }
            }
            node.tools = tools;
        }
        Ok(graph)
    }
}

/// Builds an `AgentRuntime` for every node and binds it as the node's
/// capability. A node whose existing capability already matches its model,
/// tools, profile and modalities keeps it.
pub struct CapabilityCurator {
    ctx: Arc<AgentContext>,
}

impl CapabilityCurator {
    pub fn new(ctx: Arc<AgentContext>) -> Self {
        Self { ctx }
    }

    fn profile_for(&self, node: &Node) -> String {
        node.profile
            .clone()
            .unwrap_or_else(|| self.ctx.config.default_profile.clone())
    }

    fn is_bound(&self, node: &Node, model: &str, profile: &str) -> bool {
        node.capability.as_ref().is_some_and(|cap| {
            cap.model == model
                && cap.tools == node.tools
                && cap.profile == profile
                && cap.modalities_match(node)
        })
    }
}

impl Curator for CapabilityCurator {
    fn name(&self) -> &str {
        "capability"
    }

    fn curate(&self, mut graph: TaskGraph) -> Result<TaskGraph> {
        for node in graph.nodes_mut() {
            let model = node
                .model
                .clone()
                .ok_or_else(|| TaskloomError::ModelNotFound(format!("no model bound to node {}", node.id)))?;
            let profile = self.profile_for(node);

            if self.is_bound(node, &model, &profile) {
                debug!(node_id = %node.id, "Capability already bound");
                continue;
            }

            let runtime =
                AgentRuntime::from_context(&self.ctx, node.id, &model, &node.tools, &profile)?;
            let capability = Capability::new(model, Arc::new(runtime))
                .with_tools(node.tools.clone())
                .with_profile(profile)
                .for_node(node);
            debug!(node_id = %node.id, model = %capability.model, tools = ?capability.tools, "Bound capability");
            node.capability = Some(capability);
        }
        Ok(graph)
    }
}

/// Ordered curator stages with contract checks between them.
#[derive(Default)]
pub struct CuratorPipeline {
    stages: Vec<Box<dyn Curator>>,
}

impl CuratorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, curator: impl Curator + 'static) -> Self {
        self.stages.push(Box::new(curator));
        self
    }

    /// Model, then tool, then capability curation.
    pub fn standard(ctx: Arc<AgentContext>, config: &CuratorConfig) -> Self {
        let known_tools: Vec<String> = ctx.tools.list().into_iter().map(String::from).collect();
        Self::new()
            .with_stage(ModelCurator::new(config.default_model.clone(), &ctx.models))
            .with_stage(ToolCurator::new(config.default_tools.clone(), known_tools))
            .with_stage(CapabilityCurator::new(ctx))
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage, then require each node to carry a capability whose
    /// declared modalities equal the node's.
    pub fn run(&self, mut graph: TaskGraph) -> Result<TaskGraph> {
        for stage in &self.stages {
            let before = graph.topology();
            graph = stage.curate(graph)?;
            if graph.topology() != before {
                return Err(TaskloomError::TopologyChanged {
                    curator: stage.name().to_string(),
                });
            }
            debug!(curator = stage.name(), "Curator stage complete");
        }

        for node in graph.nodes() {
            let capability = node
                .capability
                .as_ref()
                .ok_or(TaskloomError::UncuratedNode(node.id))?;
            if !capability.modalities_match(node) {
                return Err(TaskloomError::CapabilityMismatch(node.id));
            }
        }

        info!(nodes = graph.len(), stages = self.stages.len(), "Graph curated");
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::graph;
    use taskloom_core::config::AgentConfig;
    use taskloom_core::traits::Agent;
    use taskloom_core::types::{EdgeLabel, Modality, NodeId};
    use taskloom_test_utils::{EchoTool, FileCountTool, MockModel, RecordingAgent};
    use taskloom_tools::ToolRegistry;

    fn context() -> Arc<AgentContext> {
        let models = ModelPool::new()
            .with("mock", MockModel::reply("ok"))
            .with("other", MockModel::reply("other"));
        let mut tools = ToolRegistry::new();
        tools.register(EchoTool);
        tools.register(FileCountTool);
        Arc::new(AgentContext::new(AgentConfig::default(), models, tools))
    }

    fn config() -> CuratorConfig {
        CuratorConfig {
            default_model: Some("mock".into()),
            ..Default::default()
        }
    }

    fn same_agent(a: &Arc<dyn Agent>, b: &Arc<dyn Agent>) -> bool {
        Arc::as_ptr(a) as *const u8 == Arc::as_ptr(b) as *const u8
    }

    #[test]
    fn test_standard_pipeline_binds_every_node() {
        let ctx = context();
        let mut g = graph(&[1, 2], &[(1, 2)]);
        for node in g.nodes_mut() {
            if node.id == NodeId(2) {
                node.model = Some("other".into());
                node.tools = vec!["echo".into(), "file_count".into(), "echo".into()];
            }
        }

        let pipeline = CuratorPipeline::standard(ctx, &config());
        assert_eq!(pipeline.stage_names(), vec!["model", "tool", "capability"]);
        let curated = pipeline.run(g).unwrap();

        let first = curated.node(NodeId(1)).unwrap();
        assert_eq!(first.model.as_deref(), Some("mock"));
        let cap = first.capability.as_ref().unwrap();
        assert_eq!(cap.profile, "You are a helpful assistant.");
        assert!(cap.tools.is_empty());

        let second = curated.node(NodeId(2)).unwrap();
        assert_eq!(second.tools, vec!["echo", "file_count"]);
        assert_eq!(second.capability.as_ref().unwrap().model, "other");
    }

    #[test]
    fn test_curation_is_idempotent() {
        let ctx = context();
        let pipeline = CuratorPipeline::standard(ctx, &config());
        let once = pipeline.run(graph(&[1, 2], &[(1, 2)])).unwrap();
        let agents: Vec<Arc<dyn Agent>> = once
            .nodes()
            .iter()
            .map(|n| n.capability.as_ref().unwrap().agent.clone())
            .collect();

        let twice = pipeline.run(once).unwrap();
        for (node, agent) in twice.nodes().iter().zip(&agents) {
            assert!(same_agent(&node.capability.as_ref().unwrap().agent, agent));
        }
    }

    #[test]
    fn test_rebinds_when_request_changes() {
        let ctx = context();
        let pipeline = CuratorPipeline::standard(ctx, &config());
        let mut g = pipeline.run(graph(&[1], &[])).unwrap();
        let before = g.nodes()[0].capability.as_ref().unwrap().agent.clone();

        for node in g.nodes_mut() {
            node.profile = Some("You are terse.".into());
        }
        let g = pipeline.run(g).unwrap();
        let cap = g.nodes()[0].capability.as_ref().unwrap();
        assert_eq!(cap.profile, "You are terse.");
        assert!(!same_agent(&cap.agent, &before));
    }

    #[test]
    fn test_unknown_model_and_tool() {
        let ctx = context();
        let pipeline = CuratorPipeline::standard(ctx.clone(), &config());

        let mut g = graph(&[1], &[]);
        g.nodes_mut().for_each(|n| n.model = Some("gpt-9".into()));
        assert!(matches!(pipeline.run(g), Err(TaskloomError::ModelNotFound(k)) if k == "gpt-9"));

        let mut g = graph(&[1], &[]);
        g.nodes_mut().for_each(|n| n.tools = vec!["shell".into()]);
        assert!(matches!(pipeline.run(g), Err(TaskloomError::ToolNotFound(t)) if t == "shell"));

        let no_default = CuratorPipeline::standard(ctx, &CuratorConfig::default());
        assert!(matches!(
            no_default.run(graph(&[1], &[])),
            Err(TaskloomError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_default_tools_for_nodes_requesting_none() {
        let curator = ToolCurator::new(vec!["echo".into()], vec!["echo".to_string()]);
        let g = curator.curate(graph(&[1], &[])).unwrap();
        assert_eq!(g.nodes()[0].tools, vec!["echo"]);
    }

    struct Rewirer;

    impl Curator for Rewirer {
        fn name(&self) -> &str {
            "rewirer"
        }

        fn curate(&self, mut graph: TaskGraph) -> Result<TaskGraph> {
            graph.add_edge(NodeId(2), NodeId(1), EdgeLabel::Reject)?;
            Ok(graph)
        }
    }

    struct Renumber;

    impl Curator for Renumber {
        fn name(&self) -> &str {
            "renumber"
        }

        fn curate(&self, mut graph: TaskGraph) -> Result<TaskGraph> {
            graph.nodes_mut().for_each(|n| n.id = NodeId(n.id.0 + 100));
            Ok(graph)
        }
    }

    #[test]
    fn test_topology_changes_rejected() {
        for pipeline in [
            CuratorPipeline::new().with_stage(Rewirer),
            CuratorPipeline::new().with_stage(Renumber),
        ] {
            let err = pipeline.run(graph(&[1, 2], &[(1, 2)])).unwrap_err();
            assert!(matches!(err, TaskloomError::TopologyChanged { .. }));
        }
    }

    struct ImageBinder;

    impl Curator for ImageBinder {
        fn name(&self) -> &str {
            "image"
        }

        fn curate(&self, mut graph: TaskGraph) -> Result<TaskGraph> {
            for node in graph.nodes_mut() {
                let cap = Capability::new("mock", RecordingAgent::new("ok"))
                    .with_modalities([Modality::Image], [Modality::Text]);
                node.capability = Some(cap);
            }
            Ok(graph)
        }
    }

    #[test]
    fn test_final_checks() {
        let err = CuratorPipeline::new().run(graph(&[1], &[])).unwrap_err();
        assert!(matches!(err, TaskloomError::UncuratedNode(NodeId(1))));

        let err = CuratorPipeline::new()
            .with_stage(ImageBinder)
            .run(graph(&[1], &[]))
            .unwrap_err();
        assert!(matches!(err, TaskloomError::CapabilityMismatch(NodeId(1))));
    }
}
