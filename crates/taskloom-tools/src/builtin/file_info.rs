use futures::future::BoxFuture;
use serde::Deserialize;

use taskloom_core::error::{Result, TaskloomError};
use taskloom_core::filemap::FileMap;
use taskloom_core::traits::Tool;
use taskloom_core::types::{File, ToolContext};

pub struct FileInfoTool;

#[derive(Deserialize)]
struct FileInfoInput {
    /// Placeholder tag, `filemap://` uri or bare file name.
    file: String,
}

impl Tool for FileInfoTool {
    fn name(&self) -> &str {
        "file_info"
    }

    fn description(&self) -> &str {
        "Describe a file shared in this task: name, mime type, size and metadata. Accepts a <file>...</file> placeholder, a filemap:// uri or a file name."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file": {
                    "type": "string",
                    "description": "The file reference, e.g. <file>filemap://photo.png</file>"
                }
            },
            "required": ["file"]
        })
    }

    fn needs_files(&self) -> bool {
        true
    }

    fn execute(&self, input: serde_json::Value, ctx: ToolContext) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let params: FileInfoInput = serde_json::from_value(input)
                .map_err(|e| TaskloomError::ToolValidation(e.to_string()))?;
            let files = ctx.files.ok_or_else(|| TaskloomError::ToolExecution {
                tool: "file_info".to_string(),
                message: "no file map available".to_string(),
            })?;

            let file = resolve(&files, &params.file)?;
            let mut info = serde_json::json!({
                "name": file.name,
                "uri": FileMap::to_uri(&file.name),
                "mime_type": file.mime_type,
                "size": file.content.as_ref().map(|c| c.len()),
            });
            if let Some(meta) = file.metadata {
                info["metadata"] = serde_json::Value::Object(meta);
            }
            Ok(serde_json::to_string_pretty(&info)?)
        })
    }
}

/// Resolve any of the accepted reference forms to a registered file.
fn resolve(files: &FileMap, reference: &str) -> Result<File> {
    let reference = reference.trim();
    let file = if reference.starts_with("<file>") {
        files.unwrap(reference)?
    } else if FileMap::is_filemap_uri(reference) {
        files.get_by_uri(reference)?
    } else {
        files.get_by_name(reference)?
    };
    Ok(file)
}
