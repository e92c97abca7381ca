use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filemap::FileMap;

/// Identifier of a node in a task graph.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Unique identifier of one graph execution.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of data a node consumes or produces.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Video,
    Audio,
    File,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
        };
        f.write_str(s)
    }
}

pub type ModalitySet = BTreeSet<Modality>;

/// Render a modality set as `{text, image}` for error messages and logs.
pub fn format_modalities(set: &ModalitySet) -> String {
    let inner = set
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", inner)
}

/// Action carried by an edge.
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeLabel {
    #[default]
    Default,
    Reject,
    Approve,
}

impl EdgeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Reject => "reject",
            Self::Approve => "approve",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "reject" => Some(Self::Reject),
            "approve" => Some(Self::Approve),
            _ => None,
        }
    }
}

impl std::fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A file passed between nodes, tools and models.
///
/// `name` doubles as the identifier inside a `FileMap`. Binary payloads stay in
/// `content` and never enter model context directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct File {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl File {
    /// Create a file with inline content; the mime type is guessed from the extension.
    pub fn from_bytes(name: impl Into<String>, content: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = guess_mime(&name);
        Self {
            name,
            mime_type,
            uri: None,
            content: Some(content),
            metadata: None,
        }
    }

    /// Create an unnamed file of a given mime type, named `file.<subtype>`.
    pub fn from_mime(mime_type: impl Into<String>, content: Vec<u8>) -> Self {
        let mime_type = mime_type.into();
        let ext = mime_type.rsplit('/').next().unwrap_or("bin").to_string();
        Self {
            name: format!("file.{}", ext),
            mime_type: Some(mime_type),
            uri: None,
            content: Some(content),
            metadata: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// One-line description used when logging messages.
    pub fn describe(&self) -> String {
        let mut info = format!(
            "name={}, mime_type={}",
            self.name,
            self.mime_type.as_deref().unwrap_or("unknown")
        );
        if let Some(ref uri) = self.uri {
            info.push_str(&format!(", uri={}", uri));
        }
        if let Some(ref content) = self.content {
            info.push_str(&format!(", content_size={}", content.len()));
        }
        info
    }
}

fn guess_mime(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|_| mime_guess::from_path(name).first())
        .map(|m| m.essence_str().to_string())
}

/// A structured request, emitted by a model, to invoke a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            name: name.into(),
            arguments,
        }
    }
}

/// Output of an executed tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub name: String,
    pub content: String,
}

/// A single content block in a message. Exactly one payload per part.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Text(String),
    FileData(File),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Text(text) => format!("[Text] {}", text),
            Self::FileData(file) => format!("[File] {}", file.describe()),
            Self::ToolCall(call) => format!("[ToolCall] name={}, arguments={}", call.name, call.arguments),
            Self::ToolResult(result) => {
                format!("[ToolResult] name={}, content={}", result.name, result.content)
            }
        }
    }
}

/// A message exchanged between agents, tools and models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Message {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Part::text(text)])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![Part::text(text)])
    }

    /// Extract all text content from this message.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// All tool calls requested in this message.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::ToolCall(_)))
    }

    pub fn files(&self) -> Vec<&File> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::FileData(file) => Some(file),
                _ => None,
            })
            .collect()
    }

    pub fn describe(&self) -> String {
        let mut out = format!(
            "Message(role={}, parts={})",
            self.role.as_str(),
            self.parts.len()
        );
        for part in &self.parts {
            out.push_str("\n  - ");
            out.push_str(&part.describe());
        }
        out
    }
}

/// Tool definition for sending to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Context passed to tools during execution.
#[derive(Clone)]
pub struct ToolContext {
    pub node_id: NodeId,
    /// The run's file map, present only for tools that declare `needs_files()`.
    pub files: Option<Arc<FileMap>>,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("node_id", &self.node_id)
            .field("files", &self.files.as_ref().map(|m| m.len()))
            .finish()
    }
}

/// Payload stored on a flow-memory entry.
pub type EntryData = serde_json::Map<String, serde_json::Value>;

/// One immutable record of data handed from `caller` to `callee` along an edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowEntry {
    pub caller: NodeId,
    pub callee: NodeId,
    pub label: EdgeLabel,
    pub data: EntryData,
    pub timestamp: DateTime<Utc>,
}

/// Execution lifecycle of a graph run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Ready,
    Running,
    Completed,
    Failed,
}

/// Events broadcast while a run progresses.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Run state transition.
    StateChanged { run_id: RunId, state: RunState },
    /// A node started executing.
    NodeStarted { run_id: RunId, node_id: NodeId },
    /// A node finished executing.
    NodeCompleted {
        run_id: RunId,
        node_id: NodeId,
        elapsed_ms: u64,
    },
    /// Agent loop iteration finished.
    IterationComplete { node_id: NodeId, iteration: usize },
    /// Tool execution started.
    ToolStart {
        node_id: NodeId,
        name: String,
        arguments: serde_json::Value,
    },
    /// Tool execution completed.
    ToolEnd { node_id: NodeId, name: String },
    /// Run failed with an error.
    RunError { run_id: RunId, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_wire_shape_has_one_field() {
        let part = Part::text("hello");
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json, serde_json::json!({"text": "hello"}));

        let call = Part::ToolCall(ToolCall {
            id: Some("c1".into()),
            name: "search".into(),
            arguments: serde_json::json!({"q": "rust"}),
        });
        let json = serde_json::to_value(&call).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj.contains_key("tool_call"));
    }

    #[test]
    fn test_message_wire_shape() {
        let msg = Message::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "user", "parts": [{"text": "hi"}]})
        );
        let parsed: Message = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_message_text_and_tool_calls() {
        let msg = Message::new(
            Role::Assistant,
            vec![
                Part::text("a"),
                Part::ToolCall(ToolCall::new("t", serde_json::json!({}))),
                Part::text("b"),
            ],
        );
        assert_eq!(msg.text(), "ab");
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls()[0].name, "t");
        assert!(!Message::assistant("done").has_tool_calls());
    }

    #[test]
    fn test_file_mime_guess() {
        let file = File::from_bytes("photo.png", vec![1, 2, 3]);
        assert_eq!(file.mime_type.as_deref(), Some("image/png"));

        let file = File::from_bytes("README", vec![]);
        assert_eq!(file.mime_type, None);

        let file = File::from_mime("image/jpeg", vec![]);
        assert_eq!(file.name, "file.jpeg");
    }

    #[test]
    fn test_edge_label_roundtrip() {
        assert_eq!(EdgeLabel::default(), EdgeLabel::Default);
        for label in [EdgeLabel::Default, EdgeLabel::Reject, EdgeLabel::Approve] {
            assert_eq!(EdgeLabel::parse(label.as_str()), Some(label));
        }
        assert_eq!(EdgeLabel::parse("other"), None);
    }

    #[test]
    fn test_format_modalities() {
        let set: ModalitySet = [Modality::Image, Modality::Text].into_iter().collect();
        assert_eq!(format_modalities(&set), "{text, image}");
    }
}
