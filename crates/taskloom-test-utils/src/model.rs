use std::collections::VecDeque;
use std::sync::Mutex;

use futures::future::BoxFuture;

use taskloom_core::error::{Result, TaskloomError};
use taskloom_core::traits::ModelClient;
use taskloom_core::types::{Message, Part, Role, ToolCall, ToolDefinition};

enum Behavior {
    Scripted(Mutex<VecDeque<Message>>),
    Reply(String),
    Echo,
    AlwaysToolCall {
        name: String,
        arguments: serde_json::Value,
    },
}

/// Model client with canned behavior that records every request.
pub struct MockModel {
    behavior: Behavior,
    calls: Mutex<Vec<Vec<Message>>>,
    tool_names: Mutex<Vec<Vec<String>>>,
}

impl MockModel {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
            tool_names: Mutex::new(Vec::new()),
        }
    }

    /// Replies with the given messages in order, then fails.
    pub fn scripted(responses: Vec<Message>) -> Self {
        Self::with_behavior(Behavior::Scripted(Mutex::new(responses.into())))
    }

    /// Always replies with the same text.
    pub fn reply(text: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Reply(text.into()))
    }

    /// Replies with the text of every non-system message joined by ` | `.
    pub fn echo() -> Self {
        Self::with_behavior(Behavior::Echo)
    }

    /// Requests the same tool call on every turn and never finishes.
    pub fn always_tool_call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self::with_behavior(Behavior::AlwaysToolCall {
            name: name.into(),
            arguments,
        })
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Tool names offered on each request.
    pub fn offered_tools(&self) -> Vec<Vec<String>> {
        self.tool_names.lock().unwrap().clone()
    }
}

impl ModelClient for MockModel {
    fn chat(
        &self,
        messages: Vec<Message>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<Message>> {
        let names: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();
        Box::pin(async move {
            self.tool_names.lock().unwrap().push(names);
            let reply = match &self.behavior {
                Behavior::Scripted(script) => script
                    .lock()
                    .unwrap()
                    .pop_front()
                    .ok_or_else(|| TaskloomError::Model("mock script exhausted".into())),
                Behavior::Reply(text) => Ok(Message::assistant(text.clone())),
                Behavior::Echo => {
                    let joined = messages
                        .iter()
                        .filter(|m| m.role != Role::System)
                        .map(|m| m.text())
                        .collect::<Vec<_>>()
                        .join(" | ");
                    Ok(Message::assistant(joined))
                }
                Behavior::AlwaysToolCall { name, arguments } => Ok(Message::new(
                    Role::Assistant,
                    vec![Part::ToolCall(ToolCall::new(
                        name.clone(),
                        arguments.clone(),
                    ))],
                )),
            };
            self.calls.lock().unwrap().push(messages);
            reply
        })
    }
}
