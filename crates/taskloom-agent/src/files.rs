//! Conversion between file parts and placeholder text at the model boundary.
//!
//! Models only ever see `<file>filemap://name</file>` tags; the agent turns
//! outgoing file parts into tags and incoming tags back into file parts.

use taskloom_core::error::Result;
use taskloom_core::filemap::FileMap;
use taskloom_core::types::{File, Message, Part};

/// Replace every file part with a placeholder text part, registering the
/// file in `files` unless an identical file is already held under its name.
pub fn to_placeholders(message: &Message, files: &FileMap) -> Message {
    let parts = message
        .parts
        .iter()
        .map(|part| match part {
            Part::FileData(file) => Part::Text(placeholder_for(file, files)),
            other => other.clone(),
        })
        .collect();
    Message::new(message.role, parts)
}

fn placeholder_for(file: &File, files: &FileMap) -> String {
    match files.get_by_name(&file.name) {
        Ok(held) if held == *file => FileMap::to_placeholder(&FileMap::to_uri(&file.name)),
        _ => files.wrap(file.clone()),
    }
}

/// Split text parts that embed placeholder tags into text and file parts.
/// A tag naming a file the map does not hold is an error.
pub fn from_placeholders(message: Message, files: &FileMap) -> Result<Message> {
    let mut parts = Vec::with_capacity(message.parts.len());
    for part in message.parts {
        match part {
            Part::Text(text) if text.contains("<file>") => {
                parts.extend(files.split_placeholders(&text)?);
            }
            other => parts.push(other),
        }
    }
    Ok(Message::new(message.role, parts))
}
