use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use taskloom_core::error::{Result, TaskloomError};
use taskloom_core::traits::Tool;
use taskloom_core::types::{File, ToolContext};

pub struct TextFileWriteTool;

#[derive(Deserialize)]
struct TextFileWriteInput {
    name: String,
    content: String,
}

impl Tool for TextFileWriteTool {
    fn name(&self) -> &str {
        "text_file_write"
    }

    fn description(&self) -> &str {
        "Create a text file shared with later steps of this task. Returns the file's placeholder; include it verbatim in your answer to hand the file on."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "File name including extension, e.g. report.md"
                },
                "content": {
                    "type": "string",
                    "description": "The text content of the file"
                }
            },
            "required": ["name", "content"]
        })
    }

    fn needs_files(&self) -> bool {
        true
    }

    fn execute(&self, input: serde_json::Value, ctx: ToolContext) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let params: TextFileWriteInput = serde_json::from_value(input)
                .map_err(|e| TaskloomError::ToolValidation(e.to_string()))?;
            if params.name.trim().is_empty() {
                return Err(TaskloomError::ToolValidation("name must not be empty".into()));
            }
            let files = ctx.files.ok_or_else(|| TaskloomError::ToolExecution {
                tool: "text_file_write".to_string(),
                message: "no file map available".to_string(),
            })?;

            let mut file = File::from_bytes(params.name, params.content.into_bytes());
            if file.mime_type.is_none() {
                file = file.with_mime_type("text/plain");
            }
            let placeholder = files.wrap(file);
            debug!(node_id = %ctx.node_id, placeholder = %placeholder, "Text file created");
            Ok(placeholder)
        })
    }
}
