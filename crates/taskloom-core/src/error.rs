use thiserror::Error;

use crate::types::{EdgeLabel, NodeId};

/// Structural and modality violations found while validating a task graph.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("Node {node} in edge [{from} -> {to}] not found in graph")]
    InvalidNode { node: NodeId, from: NodeId, to: NodeId },

    #[error("Input modalities of node {node} ({inputs}) are incompatible with its predecessors' outputs ({outputs})")]
    ModalityMismatch {
        node: NodeId,
        inputs: String,
        outputs: String,
    },

    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    #[error("Duplicate edge: [{from} -> {to}]")]
    DuplicateEdge { from: NodeId, to: NodeId },

    #[error("Graph contains a cycle through nodes {0:?}")]
    Cycle(Vec<NodeId>),
}

/// Failures resolving files through a `FileMap`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid file uri: {0}")]
    InvalidUri(String),

    #[error("Malformed file placeholder: {0}")]
    MalformedPlaceholder(String),
}

#[derive(Debug, Error)]
pub enum TaskloomError {
    // Graph errors
    #[error("Graph validation failed: {0}")]
    Graph(#[from] GraphError),

    // File errors
    #[error("File map error: {0}")]
    File(#[from] FileError),

    // Model errors
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model request failed: {0}")]
    Model(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("Tool input validation failed: {0}")]
    ToolValidation(String),

    // Agent errors
    #[error("Agent exceeded max iterations ({0})")]
    MaxIterationsExceeded(usize),

    #[error("Run cancelled")]
    Cancelled,

    // Curator errors
    #[error("Curator '{curator}' changed the graph topology")]
    TopologyChanged { curator: String },

    #[error("Node {0} has no bound capability")]
    UncuratedNode(NodeId),

    #[error("Capability bound to node {0} declares modalities different from the node")]
    CapabilityMismatch(NodeId),

    // Executor errors
    #[error("Invalid execution chain: {0}")]
    InvalidChain(String),

    #[error("Missing handoff from node {caller} to node {callee}")]
    MissingHandoff { caller: NodeId, callee: NodeId },

    #[error("Graph has no nodes to execute")]
    EmptyGraph,

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Flow memory entry already exists: ({caller}, {callee}, {label})")]
    DuplicateEntry {
        caller: NodeId,
        callee: NodeId,
        label: EdgeLabel,
    },

    // Orchestration errors
    #[error("Graph generation failed after {attempts} attempts: {message}")]
    Orchestration { attempts: u32, message: String },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(String),
}

pub type Result<T> = std::result::Result<T, TaskloomError>;
