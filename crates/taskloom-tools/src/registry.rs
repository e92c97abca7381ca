use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use taskloom_core::error::{Result, TaskloomError};
use taskloom_core::traits::Tool;
use taskloom_core::types::{ToolContext, ToolDefinition};

/// Registry of available tools.
///
/// Tools are registered explicitly; there is no discovery. Definitions are
/// returned sorted by name so model requests are reproducible.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    timeout_override: Option<u64>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout_override: None,
        }
    }

    /// Apply one timeout to every tool instead of each tool's own.
    pub fn with_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        self.timeout_override = timeout_secs;
        self
    }

    /// Register a tool.
    pub fn register(&mut self, tool: impl Tool) {
        self.register_arc(Arc::new(tool));
    }

    /// Register an already shared tool.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get tool definitions for sending to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// A registry holding only `names`. Fails on the first unknown name.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut tools = HashMap::new();
        for name in names {
            let name = name.as_ref();
            let tool = self
                .get(name)
                .ok_or_else(|| TaskloomError::ToolNotFound(name.to_string()))?;
            tools.insert(name.to_string(), tool);
        }
        Ok(Self {
            tools,
            timeout_override: self.timeout_override,
        })
    }

    /// Execute a tool by name.
    ///
    /// The run's file map is withheld from tools that do not declare
    /// `needs_files()`.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        mut ctx: ToolContext,
    ) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| TaskloomError::ToolNotFound(name.to_string()))?;

        if !tool.needs_files() {
            ctx.files = None;
        }

        let timeout_secs = self.timeout_override.unwrap_or_else(|| tool.timeout_secs());
        let timeout = Duration::from_secs(timeout_secs);
        debug!(tool = %name, node_id = %ctx.node_id, timeout_secs, "Executing tool");

        match tokio::time::timeout(timeout, tool.execute(input, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(TaskloomError::ToolTimeout {
                tool: name.to_string(),
                timeout_secs,
            }),
        }
    }

    /// Create a registry with all built-in tools registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        // ── File map (3) ────────────────────────────────────────
        registry.register(crate::builtin::file_info::FileInfoTool);
        registry.register(crate::builtin::file_list::FileListTool);
        registry.register(crate::builtin::text_file_write::TextFileWriteTool);

        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
