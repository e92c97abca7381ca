use futures::future::BoxFuture;

use taskloom_core::error::{Result, TaskloomError};
use taskloom_core::filemap::FileMap;
use taskloom_core::traits::Tool;
use taskloom_core::types::ToolContext;

pub struct FileListTool;

impl Tool for FileListTool {
    fn name(&self) -> &str {
        "file_list"
    }

    fn description(&self) -> &str {
        "List every file shared in this task as <file>...</file> placeholders, one per line."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    fn needs_files(&self) -> bool {
        true
    }

    fn execute(&self, _input: serde_json::Value, ctx: ToolContext) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let files = ctx.files.ok_or_else(|| TaskloomError::ToolExecution {
                tool: "file_list".to_string(),
                message: "no file map available".to_string(),
            })?;

            let listed: Vec<String> = files
                .files()
                .iter()
                .map(|f| {
                    format!(
                        "{} ({})",
                        FileMap::to_placeholder(&FileMap::to_uri(&f.name)),
                        f.mime_type.as_deref().unwrap_or("unknown")
                    )
                })
                .collect();

            if listed.is_empty() {
                Ok("No files.".to_string())
            } else {
                Ok(listed.join("\n"))
            }
        })
    }
}
