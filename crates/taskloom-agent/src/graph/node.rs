use std::sync::Arc;

use serde::{Deserialize, Serialize};

use taskloom_core::traits::Agent;
use taskloom_core::types::{format_modalities, Modality, ModalitySet, NodeId};

/// The executable binding of a node: which model and tools it runs with,
/// and the agent instance that does the work.
#[derive(Clone)]
pub struct Capability {
    /// Model key in the model pool.
    pub model: String,
    /// Tool names, deduplicated.
    pub tools: Vec<String>,
    /// System text the agent runs with.
    pub profile: String,
    pub input_modalities: ModalitySet,
    pub output_modalities: ModalitySet,
    /// The bound agent.
    pub agent: Arc<dyn Agent>,
}

impl Capability {
    /// Create a text-only capability around an agent.
    pub fn new(model: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        Self {
            model: model.into(),
            tools: vec![],
            profile: String::new(),
            input_modalities: text_only(),
            output_modalities: text_only(),
            agent,
        }
    }

    /// Set the tools this capability exposes.
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the system profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Declare the same modalities as `node`.
    pub fn for_node(mut self, node: &Node) -> Self {
        self.input_modalities = node.input_modalities.clone();
        self.output_modalities = node.output_modalities.clone();
        self
    }

    /// Declare modalities explicitly.
    pub fn with_modalities(
        mut self,
        inputs: impl IntoIterator<Item = Modality>,
        outputs: impl IntoIterator<Item = Modality>,
    ) -> Self {
        self.input_modalities = inputs.into_iter().collect();
        self.output_modalities = outputs.into_iter().collect();
        self
    }

    /// Whether the declared modalities equal the node's.
    pub fn modalities_match(&self, node: &Node) -> bool {
        self.input_modalities == node.input_modalities
            && self.output_modalities == node.output_modalities
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("model", &self.model)
            .field("tools", &self.tools)
            .field("input_modalities", &format_modalities(&self.input_modalities))
            .field("output_modalities", &format_modalities(&self.output_modalities))
            .finish_non_exhaustive()
    }
}

/// A unit of work in a task graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node.
    pub id: NodeId,
    /// Human-readable name.
    pub name: String,
    /// Instruction text; becomes the agent's goal.
    pub task: String,
    /// System text for the agent. Falls back to the configured default.
    #[serde(default)]
    pub profile: Option<String>,
    /// Requested model key. Curators fill this in when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// Requested tool names.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "text_only")]
    pub input_modalities: ModalitySet,
    #[serde(default = "text_only")]
    pub output_modalities: ModalitySet,
    /// Bound by the curator pipeline.
    #[serde(skip)]
    pub capability: Option<Capability>,
}

pub(crate) fn text_only() -> ModalitySet {
    [Modality::Text].into_iter().collect()
}

impl Node {
    /// Create a text-in, text-out node.
    pub fn new(id: impl Into<NodeId>, task: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            id,
            name: format!("Node{}", id),
            task: task.into(),
            profile: None,
            model: None,
            tools: vec![],
            input_modalities: text_only(),
            output_modalities: text_only(),
            capability: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = Modality>) -> Self {
        self.input_modalities = inputs.into_iter().collect();
        self
    }

    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = Modality>) -> Self {
        self.output_modalities = outputs.into_iter().collect();
        self
    }

    /// Bind a capability directly, bypassing curation.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }
}
