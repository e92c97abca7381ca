use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use taskloom_core::error::{Result, TaskloomError};
use taskloom_core::event::EventBus;
use taskloom_core::filemap::FileMap;
use taskloom_core::traits::{Agent, ModelClient};
use taskloom_core::types::*;
use taskloom_tools::ToolRegistry;

use crate::context;
use crate::files::{from_placeholders, to_placeholders};
use crate::pool::AgentContext;

/// The LLM agent bound to a graph node: a bounded act loop with tools.
///
/// Each iteration sends the conversation to the model. A reply without tool
/// calls ends the run; otherwise every call is executed in order and the
/// results are appended as one `tool` message before the next iteration.
pub struct AgentRuntime {
    node_id: NodeId,
    model: Arc<dyn ModelClient>,
    tools: ToolRegistry,
    system: Message,
    max_iterations: usize,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
}

impl AgentRuntime {
    pub fn new(
        node_id: NodeId,
        model: Arc<dyn ModelClient>,
        tools: ToolRegistry,
        profile: &str,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            node_id,
            model,
            tools,
            system: context::build_node_context(profile),
            max_iterations: 10,
            event_bus,
            cancel: CancellationToken::new(),
        }
    }

    /// Build the runtime for a node from the shared agent context: resolves
    /// the model key and narrows the registry to `tool_names`.
    pub fn from_context(
        ctx: &AgentContext,
        node_id: NodeId,
        model_key: &str,
        tool_names: &[String],
        profile: &str,
    ) -> Result<Self> {
        let model = ctx.models.get(model_key)?;
        let tools = ctx.tools.subset(tool_names)?;
        Ok(
            Self::new(node_id, model, tools, profile, ctx.event_bus.clone())
                .with_max_iterations(ctx.config.max_iterations)
                .with_cancel(ctx.cancel.clone()),
        )
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get a cancellation token for this runtime.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn run_loop(
        &self,
        goal: Message,
        observations: Vec<Message>,
        files: Arc<FileMap>,
    ) -> Result<Message> {
        let mut messages = Vec::with_capacity(observations.len() + 2);
        messages.push(self.system.clone());
        messages.extend(observations.iter().map(|m| to_placeholders(m, &files)));
        messages.push(to_placeholders(&goal, &files));

        let tool_defs = self.tools.definitions();
        let tool_ctx = ToolContext {
            node_id: self.node_id,
            files: Some(files.clone()),
        };

        for iteration in 0..self.max_iterations {
            if self.cancel.is_cancelled() {
                return Err(TaskloomError::Cancelled);
            }

            debug!(node_id = %self.node_id, iteration, "Starting agent iteration");

            let response = tokio::select! {
                result = self.model.chat(messages.clone(), &tool_defs) => result?,
                _ = self.cancel.cancelled() => return Err(TaskloomError::Cancelled),
            };

            self.event_bus.publish(RunEvent::IterationComplete {
                node_id: self.node_id,
                iteration,
            });

            if !response.has_tool_calls() {
                let output = from_placeholders(response, &files)?;
                info!(
                    node_id = %self.node_id,
                    iterations = iteration + 1,
                    "Agent run complete"
                );
                return Ok(output);
            }

            let mut results = Vec::new();
            for call in response.tool_calls() {
                self.event_bus.publish(RunEvent::ToolStart {
                    node_id: self.node_id,
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });

                let content = self
                    .tools
                    .execute(&call.name, call.arguments.clone(), tool_ctx.clone())
                    .await
                    .map_err(|e| {
                        error!(node_id = %self.node_id, tool = %call.name, error = %e, "Tool execution failed");
                        e
                    })?;

                self.event_bus.publish(RunEvent::ToolEnd {
                    node_id: self.node_id,
                    name: call.name.clone(),
                });
                results.push(Part::ToolResult(ToolResult {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    content,
                }));
            }

            messages.push(response);
            messages.push(Message::new(Role::Tool, results));
        }

        warn!(
            node_id = %self.node_id,
            max_iterations = self.max_iterations,
            "Agent hit iteration limit"
        );
        Err(TaskloomError::MaxIterationsExceeded(self.max_iterations))
    }
}

impl Agent for AgentRuntime {
    fn run(
        &self,
        goal: Message,
        observations: Vec<Message>,
        files: Arc<FileMap>,
    ) -> BoxFuture<'_, Result<Message>> {
        Box::pin(self.run_loop(goal, observations, files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskloom_test_utils::{EchoTool, FailingTool, FileCountTool, MockModel, SlowTool};

    fn runtime(model: Arc<MockModel>, tools: ToolRegistry) -> AgentRuntime {
        AgentRuntime::new(
            NodeId(1),
            model,
            tools,
            "You are a tester.",
            Arc::new(EventBus::default()),
        )
        .with_max_iterations(3)
    }

    fn echo_tools() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(EchoTool);
        tools
    }

    fn tool_call_message(calls: &[(&str, serde_json::Value)]) -> Message {
        Message::new(
            Role::Assistant,
            calls
                .iter()
                .map(|(name, args)| Part::ToolCall(ToolCall::new(*name, args.clone())))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_iterations_are_bounded() {
        let model = Arc::new(MockModel::always_tool_call("echo", json!({"text": "again"})));
        let agent = runtime(model.clone(), echo_tools());

        let err = agent
            .run(Message::user("loop"), vec![], Arc::new(FileMap::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskloomError::MaxIterationsExceeded(3)));
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_context_order_and_tool_message() {
        let model = Arc::new(MockModel::scripted(vec![
            tool_call_message(&[("echo", json!({"text": "a"})), ("echo", json!({"text": "b"}))]),
            Message::assistant("done"),
        ]));
        let agent = runtime(model.clone(), echo_tools());

        let output = agent
            .run(
                Message::user("goal"),
                vec![Message::user("prior task"), Message::assistant("prior output")],
                Arc::new(FileMap::new()),
            )
            .await
            .unwrap();
        assert_eq!(output.text(), "done");

        let calls = model.calls();
        let first = &calls[0];
        let roles: Vec<Role> = first.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(first[0].parts.len(), 2);
        assert_eq!(first[3].text(), "goal");

        let second = &calls[1];
        assert_eq!(second.len(), 6);
        let tool_msg = second.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        let contents: Vec<&str> = tool_msg
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolResult(r) => Some(r.content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(contents, vec!["a", "b"]);
        assert_eq!(model.offered_tools()[0], vec!["echo"]);
    }

    #[tokio::test]
    async fn test_files_cross_the_model_boundary_as_placeholders() {
        let model = Arc::new(MockModel::echo());
        let agent = runtime(model.clone(), ToolRegistry::new());
        let files = Arc::new(FileMap::new());

        let observation = Message::new(
            Role::Assistant,
            vec![
                Part::text("see "),
                Part::FileData(File::from_bytes("chart.png", vec![7, 7])),
            ],
        );
        let output = agent
            .run(Message::user("describe"), vec![observation], files.clone())
            .await
            .unwrap();

        let sent = &model.calls()[0];
        assert_eq!(sent[1].text(), "see <file>filemap://chart.png</file>");
        assert!(sent.iter().all(|m| m.files().is_empty()));

        let returned = output.files();
        assert_eq!(returned.len(), 1);
        assert_eq!(returned[0].name, "chart.png");
        assert_eq!(returned[0].content.as_deref(), Some(&[7u8, 7][..]));
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_file_tools_see_the_run_files() {
        let model = Arc::new(MockModel::scripted(vec![
            tool_call_message(&[("file_count", json!({}))]),
            Message::assistant("ok"),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(FileCountTool);
        let agent = runtime(model.clone(), tools);

        let files = Arc::new(FileMap::new());
        files.add(File::from_bytes("a.txt", b"a".to_vec()));
        files.add(File::from_bytes("b.txt", b"b".to_vec()));
        agent.run(Message::user("count"), vec![], files).await.unwrap();

        let tool_msg = model.calls()[1].last().cloned().unwrap();
        assert!(matches!(&tool_msg.parts[0], Part::ToolResult(r) if r.content == "2"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_fatal() {
        let model = Arc::new(MockModel::always_tool_call("missing", json!({})));
        let agent = runtime(model.clone(), echo_tools());
        let err = agent
            .run(Message::user("x"), vec![], Arc::new(FileMap::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskloomError::ToolNotFound(name) if name == "missing"));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_failure_is_fatal() {
        let model = Arc::new(MockModel::always_tool_call("fail", json!({})));
        let mut tools = ToolRegistry::new();
        tools.register(FailingTool);
        let err = runtime(model, tools)
            .run(Message::user("x"), vec![], Arc::new(FileMap::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskloomError::ToolExecution { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_timeout() {
        let model = Arc::new(MockModel::always_tool_call("slow", json!({})));
        let mut tools = ToolRegistry::new();
        tools.register(SlowTool);
        let err = runtime(model, tools)
            .run(Message::user("x"), vec![], Arc::new(FileMap::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskloomError::ToolTimeout { timeout_secs: 1, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_iteration() {
        let model = Arc::new(MockModel::reply("never"));
        let agent = runtime(model.clone(), ToolRegistry::new());
        agent.cancel_token().cancel();
        let err = agent
            .run(Message::user("x"), vec![], Arc::new(FileMap::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskloomError::Cancelled));
        assert_eq!(model.call_count(), 0);
    }
}
