use futures::future::BoxFuture;

use taskloom_core::error::{Result, TaskloomError};
use taskloom_core::traits::Tool;
use taskloom_core::types::ToolContext;

/// Returns its `text` argument.
pub struct EchoTool;

impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }

    fn execute(&self, input: serde_json::Value, ctx: ToolContext) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            // Echo never asked for files, so the registry must not hand them over.
            assert!(ctx.files.is_none());
            Ok(input["text"].as_str().unwrap_or_default().to_string())
        })
    }
}

/// Sleeps far longer than any test timeout.
pub struct SlowTool;

impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "Never finishes in time"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    fn timeout_secs(&self) -> u64 {
        1
    }

    fn execute(&self, _input: serde_json::Value, _ctx: ToolContext) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok("late".to_string())
        })
    }
}

/// Always fails.
pub struct FailingTool;

impl Tool for FailingTool {
    fn name(&self) -> &str {
        "fail"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    fn execute(&self, _input: serde_json::Value, _ctx: ToolContext) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            Err(TaskloomError::ToolExecution {
                tool: "fail".to_string(),
                message: "boom".to_string(),
            })
        })
    }
}

/// Reports how many files the run's file map holds.
pub struct FileCountTool;

impl Tool for FileCountTool {
    fn name(&self) -> &str {
        "file_count"
    }

    fn description(&self) -> &str {
        "Count shared files"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    fn needs_files(&self) -> bool {
        true
    }

    fn execute(&self, _input: serde_json::Value, ctx: ToolContext) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let count = ctx.files.map(|f| f.len()).unwrap_or_default();
            Ok(count.to_string())
        })
    }
}
