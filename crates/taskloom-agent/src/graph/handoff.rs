use serde::{Deserialize, Serialize};

use taskloom_core::error::Result;
use taskloom_core::types::{EntryData, Message};

/// What a node hands each of its successors: the task it was given and the
/// message it produced. Stored in flow memory as the entry's data map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    pub caller_user_prompt: String,
    pub caller_output_message: Message,
}

impl Handoff {
    pub fn new(task: impl Into<String>, output: Message) -> Self {
        Self {
            caller_user_prompt: task.into(),
            caller_output_message: output,
        }
    }

    pub fn into_data(self) -> Result<EntryData> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            // A struct always serializes to an object.
            _ => Ok(EntryData::new()),
        }
    }

    pub fn from_data(data: EntryData) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(data))?)
    }

    /// The pair the successor observes: the caller's task as a user
    /// message, then the caller's output.
    pub fn into_observations(self) -> [Message; 2] {
        [
            Message::user(self.caller_user_prompt),
            self.caller_output_message,
        ]
    }
}
