use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use taskloom_core::config::AgentConfig;
use taskloom_core::error::{Result, TaskloomError};
use taskloom_core::event::EventBus;
use taskloom_core::traits::ModelClient;
use taskloom_tools::ToolRegistry;

/// Model clients addressable by key. Populated explicitly by the caller.
#[derive(Clone, Default)]
pub struct ModelPool {
    clients: HashMap<String, Arc<dyn ModelClient>>,
}

impl ModelPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of `register`.
    pub fn with(mut self, key: impl Into<String>, client: impl ModelClient) -> Self {
        self.register(key, Arc::new(client));
        self
    }

    /// Register a client, replacing any previous one under the same key.
    pub fn register(&mut self, key: impl Into<String>, client: Arc<dyn ModelClient>) {
        self.clients.insert(key.into(), client);
    }

    pub fn get(&self, key: &str) -> Result<Arc<dyn ModelClient>> {
        self.clients
            .get(key)
            .cloned()
            .ok_or_else(|| TaskloomError::ModelNotFound(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.clients.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.clients.keys().map(|k| k.as_str()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Everything a curator needs to build agents, constructed once per
/// `Taskloom` and passed down explicitly.
pub struct AgentContext {
    pub config: AgentConfig,
    pub models: ModelPool,
    pub tools: ToolRegistry,
    pub event_bus: Arc<EventBus>,
    pub cancel: CancellationToken,
}

impl AgentContext {
    pub fn new(config: AgentConfig, models: ModelPool, tools: ToolRegistry) -> Self {
        let tools = tools.with_timeout(config.tool_timeout_secs);
        Self {
            config,
            models,
            tools,
            event_bus: Arc::new(EventBus::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
