use std::path::Path;

use serde::{Deserialize, Serialize};

use taskloom_core::config::ModalityRule;
use taskloom_core::error::{Result, TaskloomError};
use taskloom_core::types::{EdgeLabel, Modality, NodeId};

use super::dag::TaskGraph;
use super::node::Node;

/// Graph description, as produced by a planner or written by hand. The same
/// shape is accepted as JSON or YAML:
///
/// ```json
/// {
///   "agents": [
///     {"id": 1, "name": "Researcher", "task": "Find sources", "model": "gpt", "tools": []},
///     {"id": 2, "name": "Writer", "task": "Write the report", "input": ["text"], "output": ["text", "file"]}
///   ],
///   "edges": [[1, 2], [2, 1, "reject"]]
/// }
/// ```
///
/// ```yaml
/// agents:
///   - {id: 1, name: Researcher, task: Find sources, model: gpt}
///   - {id: 2, name: Writer, task: Write the report, output: [text, file]}
/// edges:
///   - [1, 2]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDescription {
    pub agents: Vec<AgentDescription>,
    #[serde(default)]
    pub edges: Vec<EdgeDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescription {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(alias = "prompt")]
    pub task: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "text_only")]
    pub input: Vec<Modality>,
    #[serde(default = "text_only")]
    pub output: Vec<Modality>,
}

fn text_only() -> Vec<Modality> {
    vec![Modality::Text]
}

/// `[from, to]` or `[from, to, label]`; a null label means `default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeDescription {
    Labeled(u64, u64, Option<EdgeLabel>),
    Plain(u64, u64),
}

impl EdgeDescription {
    fn parts(&self) -> (NodeId, NodeId, EdgeLabel) {
        match *self {
            Self::Labeled(from, to, label) => (NodeId(from), NodeId(to), label.unwrap_or_default()),
            Self::Plain(from, to) => (NodeId(from), NodeId(to), EdgeLabel::Default),
        }
    }
}

impl GraphDescription {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| TaskloomError::Yaml(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| TaskloomError::Yaml(e.to_string()))
    }

    /// Read a description file. `.yaml` and `.yml` files are parsed as YAML,
    /// anything else as JSON.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Build the described graph without validating it.
    pub fn into_graph(self) -> Result<TaskGraph> {
        let mut graph = TaskGraph::new();
        for agent in self.agents {
            let mut node = Node::new(agent.id, agent.task)
                .with_tools(agent.tools)
                .with_inputs(agent.input)
                .with_outputs(agent.output);
            if let Some(name) = agent.name {
                node = node.with_name(name);
            }
            node.profile = agent.profile;
            node.model = agent.model;
            graph.add_node(node)?;
        }
        for edge in &self.edges {
            let (from, to, label) = edge.parts();
            graph.add_edge(from, to, label)?;
        }
        Ok(graph)
    }

    /// Build the described graph and validate it under `rule`.
    pub fn into_validated_graph(self, rule: ModalityRule) -> Result<TaskGraph> {
        let graph = self.into_graph()?.with_modality_rule(rule);
        graph.validate()?;
        Ok(graph)
    }
}

impl TaskGraph {
    /// Parse a JSON description and validate it under `rule`.
    pub fn from_description(json: &str, rule: ModalityRule) -> Result<Self> {
        GraphDescription::from_json(json)?.into_validated_graph(rule)
    }

    /// Load a JSON or YAML description file and validate it under `rule`.
    pub fn load(path: &Path, rule: ModalityRule) -> Result<Self> {
        GraphDescription::from_path(path)?.into_validated_graph(rule)
    }
}
