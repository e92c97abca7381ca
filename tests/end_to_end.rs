use std::sync::Arc;

use serde_json::json;

use taskloom::{
    EdgeLabel, Message, ModelPool, Node, NodeId, RunEvent, StrategyKind, TaskGraph, Taskloom,
    TaskloomError, ToolRegistry,
};
use taskloom_core::config::StorageBackend;
use taskloom_core::types::{Modality, Part, Role, RunState, ToolCall};
use taskloom_test_utils::{message_texts, test_config, MockModel, SlowTool};

fn two_node_graph() -> TaskGraph {
    let mut graph = TaskGraph::new();
    graph
        .add_node(Node::new(1, "Find sources").with_name("Researcher"))
        .unwrap();
    graph
        .add_node(Node::new(2, "Write report").with_name("Writer"))
        .unwrap();
    graph
        .add_edge(NodeId(1), NodeId(2), EdgeLabel::Default)
        .unwrap();
    graph
}

#[tokio::test]
async fn test_two_node_handoff() {
    let first = Arc::new(MockModel::reply("R1"));
    let second = Arc::new(MockModel::reply("R2"));
    let mut models = ModelPool::new();
    models.register("first", first.clone());
    models.register("second", second.clone());

    let mut graph = TaskGraph::new();
    graph
        .add_node(Node::new(1, "Find sources").with_model("first"))
        .unwrap();
    graph
        .add_node(Node::new(2, "Write report").with_model("second"))
        .unwrap();
    graph
        .add_edge(NodeId(1), NodeId(2), EdgeLabel::Default)
        .unwrap();

    let engine = Taskloom::new(test_config(), models, ToolRegistry::new());
    let output = engine.run(graph).await.unwrap();

    let data = output
        .memory
        .get_data(NodeId(1), NodeId(2), EdgeLabel::Default)
        .await
        .unwrap()
        .expect("handoff recorded");
    assert_eq!(data["caller_user_prompt"], "Find sources");
    assert_eq!(
        data["caller_output_message"],
        json!({"role": "assistant", "parts": [{"text": "R1"}]})
    );

    assert_eq!(output.final_output.text(), "R2");
    assert_eq!(output.node_results.len(), 2);

    // Writer saw [system, researcher task, researcher output, own task].
    let seen = &second.calls()[0];
    assert_eq!(seen[0].role, Role::System);
    assert_eq!(
        message_texts(&seen[1..]),
        vec!["Find sources", "R1", "Write report"]
    );
    assert_eq!(first.call_count(), 1);
}

#[tokio::test]
async fn test_plan_and_run() {
    let plan = r#"{"agents": [{"id": 1, "task": "Find sources"}, {"id": 2, "task": "Write report"}], "edges": [[1, 2]]}"#;
    let models = ModelPool::new()
        .with("planner", MockModel::reply(plan))
        .with("mock", MockModel::echo());

    let mut config = test_config();
    config.planner.model = Some("planner".into());
    let engine = Taskloom::new(config, models, ToolRegistry::new());

    let output = engine.plan_and_run("Write a report on Rust").await.unwrap();
    assert_eq!(
        output.final_output.text(),
        "Find sources | Find sources | Write report"
    );
}

#[tokio::test]
async fn test_run_graph_loaded_from_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.yaml");
    std::fs::write(
        &path,
        r#"
agents:
  - id: 1
    name: Researcher
    task: Find sources
  - id: 2
    name: Writer
    task: Write report
edges:
  - [1, 2]
"#,
    )
    .unwrap();

    let models = ModelPool::new().with("mock", MockModel::echo());
    let engine = Taskloom::new(test_config(), models, ToolRegistry::new());
    let graph = engine.load_graph(&path).unwrap();
    assert_eq!(graph.node(NodeId(2)).unwrap().name, "Writer");

    let output = engine.run(graph).await.unwrap();
    assert_eq!(
        output.final_output.text(),
        "Find sources | Find sources | Write report"
    );
}

#[tokio::test]
async fn test_files_written_by_tools_reach_the_output() {
    let model = MockModel::scripted(vec![
        Message::new(
            Role::Assistant,
            vec![Part::ToolCall(ToolCall::new(
                "text_file_write",
                json!({"name": "notes.txt", "content": "hello"}),
            ))],
        ),
        Message::assistant("Saved <file>filemap://notes.txt</file>"),
    ]);
    let models = ModelPool::new().with("mock", model);

    let mut graph = TaskGraph::new();
    graph
        .add_node(Node::new(1, "Write notes").with_tools(vec!["text_file_write".into()]))
        .unwrap();

    let engine = Taskloom::new(test_config(), models, ToolRegistry::with_builtins());
    let output = engine.run(graph).await.unwrap();

    let files = output.final_output.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "notes.txt");
    assert_eq!(files[0].content.as_deref(), Some(&b"hello"[..]));
    assert!(output.files.contains("notes.txt"));
}

#[tokio::test]
async fn test_run_events() {
    let models = ModelPool::new().with("mock", MockModel::reply("ok"));
    let engine = Taskloom::new(test_config(), models, ToolRegistry::new());
    let mut rx = engine.event_bus().subscribe();

    engine.run(two_node_graph()).await.unwrap();

    let mut states = Vec::new();
    let mut started = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            RunEvent::StateChanged { state, .. } => states.push(state),
            RunEvent::NodeStarted { node_id, .. } => started.push(node_id),
            _ => {}
        }
    }
    assert_eq!(
        states,
        vec![RunState::Ready, RunState::Running, RunState::Completed]
    );
    assert_eq!(started, vec![NodeId(1), NodeId(2)]);
}

#[tokio::test]
async fn test_sqlite_chain_runs_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.memory.backend = StorageBackend::Sqlite;
    config.memory.path = dir.path().join("flow.db").display().to_string();
    config.executor.strategy = StrategyKind::Chain;

    let models = ModelPool::new().with("mock", MockModel::reply("done"));
    let engine = Taskloom::new(config, models, ToolRegistry::new());

    let first = engine.run(two_node_graph()).await.unwrap();
    let second = engine.run(two_node_graph()).await.unwrap();
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(second.final_output.text(), "done");
    assert!(dir.path().join("flow.db").exists());
}

#[tokio::test]
async fn test_invalid_graph_is_rejected_before_running() {
    let model = Arc::new(MockModel::reply("never"));
    let mut models = ModelPool::new();
    models.register("mock", model.clone());

    let mut graph = TaskGraph::new();
    graph
        .add_node(Node::new(1, "Draw").with_outputs([Modality::Image]))
        .unwrap();
    graph.add_node(Node::new(2, "Describe")).unwrap();
    graph
        .add_edge(NodeId(1), NodeId(2), EdgeLabel::Default)
        .unwrap();

    let engine = Taskloom::new(test_config(), models, ToolRegistry::new());
    let err = engine.run(graph).await.unwrap_err();
    assert!(matches!(err, TaskloomError::Graph(_)));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_cancelling_one_run_leaves_others_running() {
    let models = ModelPool::new()
        .with("stuck", MockModel::always_tool_call("slow", json!({})))
        .with("mock", MockModel::reply("fine"));
    let mut tools = ToolRegistry::new();
    tools.register(SlowTool);

    let mut config = test_config();
    config.agent.tool_timeout_secs = Some(600);
    let engine = Taskloom::new(config, models, tools);

    let mut stuck = TaskGraph::new();
    stuck
        .add_node(
            Node::new(1, "Wait forever")
                .with_model("stuck")
                .with_tools(vec!["slow".into()]),
        )
        .unwrap();

    let token = engine.run_token();
    let mut rx = engine.event_bus().subscribe();
    let cancel_on_tool_start = async {
        while let Ok(event) = rx.recv().await {
            if matches!(event, RunEvent::ToolStart { .. }) {
                token.cancel();
                break;
            }
        }
    };

    let (cancelled, other, _) = tokio::join!(
        engine.run_with_cancel(stuck, token.clone()),
        engine.run(two_node_graph()),
        cancel_on_tool_start,
    );
    assert!(matches!(cancelled, Err(TaskloomError::Cancelled)));
    assert_eq!(other.unwrap().final_output.text(), "fine");

    // The engine is still usable after a run was cancelled.
    let later = engine.run(two_node_graph()).await.unwrap();
    assert_eq!(later.final_output.text(), "fine");
}

#[tokio::test]
async fn test_shutdown_stops_every_run() {
    let model = Arc::new(MockModel::reply("never"));
    let mut models = ModelPool::new();
    models.register("mock", model.clone());

    let engine = Taskloom::new(test_config(), models, ToolRegistry::new());
    engine.shutdown_token().cancel();

    let err = engine.run(two_node_graph()).await.unwrap_err();
    assert!(matches!(err, TaskloomError::Cancelled));
    assert!(engine.run_token().is_cancelled());
    assert_eq!(model.call_count(), 0);
}
