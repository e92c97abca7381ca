use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::filemap::FileMap;
use crate::types::*;

/// Model client: one chat completion per call.
///
/// Concrete HTTP providers live outside this workspace; anything that can turn
/// a message list plus tool definitions into an assistant message qualifies.
pub trait ModelClient: Send + Sync + 'static {
    /// Send the conversation and receive the model's next message.
    fn chat(
        &self,
        messages: Vec<Message>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<Message>>;
}

/// A tool a model can call.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used in model tool calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with given input and context. Returns the textual result.
    fn execute(&self, input: serde_json::Value, ctx: ToolContext) -> BoxFuture<'_, Result<String>>;

    /// Timeout in seconds for this tool.
    fn timeout_secs(&self) -> u64 {
        30
    }

    /// Whether this tool needs the run's `FileMap`.
    fn needs_files(&self) -> bool {
        false
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Backend for the append-only per-edge handoff store.
pub trait FlowStorage: Send + Sync + 'static {
    /// Append an entry. Fails with `DuplicateEntry` if the key already exists.
    fn add_entry(&self, entry: FlowEntry) -> BoxFuture<'_, Result<()>>;

    /// Exact `(caller, callee, label)` lookup.
    fn get_entry(
        &self,
        caller: NodeId,
        callee: NodeId,
        label: EdgeLabel,
    ) -> BoxFuture<'_, Result<Option<FlowEntry>>>;

    /// Entries written by `caller`, in write order.
    fn entries_by_caller(&self, caller: NodeId) -> BoxFuture<'_, Result<Vec<FlowEntry>>>;

    /// Entries addressed to `callee`, in write order.
    fn entries_by_callee(&self, callee: NodeId) -> BoxFuture<'_, Result<Vec<FlowEntry>>>;
}

/// An executable capability bound to a graph node.
pub trait Agent: Send + Sync + 'static {
    /// Work towards `goal` given predecessor `observations`, resolving file
    /// references through the run's `files`.
    fn run(
        &self,
        goal: Message,
        observations: Vec<Message>,
        files: Arc<FileMap>,
    ) -> BoxFuture<'_, Result<Message>>;
}
