use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use taskloom_core::error::{Result, TaskloomError};
use taskloom_core::filemap::FileMap;
use taskloom_core::traits::Agent;
use taskloom_core::types::Message;

/// Agent that answers with a fixed reply and records what it was given.
pub struct RecordingAgent {
    reply: String,
    calls: Mutex<Vec<(Message, Vec<Message>)>>,
}

impl RecordingAgent {
    pub fn new(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// `(goal, observations)` of every invocation.
    pub fn calls(&self) -> Vec<(Message, Vec<Message>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Agent for RecordingAgent {
    fn run(
        &self,
        goal: Message,
        observations: Vec<Message>,
        _files: Arc<FileMap>,
    ) -> BoxFuture<'_, Result<Message>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push((goal, observations));
            Ok(Message::assistant(self.reply.clone()))
        })
    }
}

/// Agent that always fails with a model error.
pub struct FailingAgent;

impl Agent for FailingAgent {
    fn run(
        &self,
        _goal: Message,
        _observations: Vec<Message>,
        _files: Arc<FileMap>,
    ) -> BoxFuture<'_, Result<Message>> {
        Box::pin(async move { Err(TaskloomError::Model("agent failed".into())) })
    }
}
