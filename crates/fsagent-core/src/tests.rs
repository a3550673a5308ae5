/// Tests for the agent loop and runner.
///
/// Uses ScriptedMockProvider so every scenario is deterministic and
/// requires no network access.
#[cfg(test)]
mod agent_tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    use fsagent_config::AgentConfig;
    use fsagent_model::{MessageContent, ModelProvider, ResponseEvent, Role, ScriptedMockProvider};
    use fsagent_tools::{Tool, ToolCall, ToolOutput, ToolRegistry};

    use crate::{Agent, AgentEvent, InMemorySessionService, Runner, Session};

    // ── Helpers ───────────────────────────────────────────────────────────────

    struct ListDirTool;

    #[async_trait]
    impl Tool for ListDirTool {
        fn name(&self) -> &str { "list_directory" }
        fn description(&self) -> &str { "List a directory" }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object", "properties": { "path": { "type": "string" } } })
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            let path = call.args["path"].as_str().unwrap_or(".");
            ToolOutput::ok(&call.id, format!("[FILE] {path}/a.txt"))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut reg = ToolRegistry::new();
        reg.register(ListDirTool);
        Arc::new(reg)
    }

    fn agent_with(model: Arc<ScriptedMockProvider>, config: AgentConfig) -> Agent {
        Agent::new(&config, model as Arc<dyn ModelProvider>, registry())
    }

    fn session() -> Session {
        Session::new("app", "user", HashMap::new())
    }

    fn tool_call(index: u32, id: &str, name: &str, args: &str) -> ResponseEvent {
        ResponseEvent::ToolCall {
            index,
            id: id.into(),
            name: name.into(),
            arguments: args.into(),
        }
    }

    /// Drain the channel into a Vec once the sender side is dropped.
    async fn collect(mut rx: mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        events
    }

    // ── Text turns ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn text_turn_emits_delta_complete_and_turn_complete() {
        let model = Arc::new(ScriptedMockProvider::always_text("hello from agent"));
        let agent = agent_with(model, AgentConfig::default());
        let mut s = session();
        let (tx, rx) = mpsc::channel(64);

        agent.run_turn(&mut s, "hi", tx).await.unwrap();
        let events = collect(rx).await;

        assert!(events.iter().any(|e| matches!(e, AgentEvent::TextDelta(t) if t == "hello from agent")));
        assert!(events.iter().any(|e| matches!(e, AgentEvent::TextComplete(t) if t == "hello from agent")));
        assert!(events.iter().any(|e| matches!(e, AgentEvent::TokenUsage { input: 5, output: 5 })));
        assert!(matches!(events.last(), Some(AgentEvent::TurnComplete)));
    }

    #[tokio::test]
    async fn system_message_injected_only_on_first_turn() {
        let model = Arc::new(ScriptedMockProvider::new(vec![
            vec![ResponseEvent::TextDelta("one".into()), ResponseEvent::Done],
            vec![ResponseEvent::TextDelta("two".into()), ResponseEvent::Done],
        ]));
        let agent = agent_with(model, AgentConfig::default());
        let mut s = session();

        let (tx, _rx) = mpsc::channel(64);
        agent.run_turn(&mut s, "first", tx).await.unwrap();
        let (tx, _rx) = mpsc::channel(64);
        agent.run_turn(&mut s, "second", tx).await.unwrap();

        let systems = s.messages.iter().filter(|m| m.role == Role::System).count();
        assert_eq!(systems, 1);
        assert_eq!(s.messages[0].as_text(), Some(AgentConfig::default().instruction.as_str()));
        // system, user, assistant, user, assistant
        assert_eq!(s.messages.len(), 5);
    }

    // ── Tool calls ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn tool_call_is_executed_and_result_sent_back() {
        let model = Arc::new(ScriptedMockProvider::tool_then_text(
            "call_0_list_directory",
            "list_directory",
            r#"{"path":"/work"}"#,
            "There is one file.",
        ));
        let agent = agent_with(Arc::clone(&model), AgentConfig::default());
        let mut s = session();
        let (tx, rx) = mpsc::channel(64);

        agent.run_turn(&mut s, "what files are there?", tx).await.unwrap();
        let events = collect(rx).await;

        assert!(events.iter().any(|e| matches!(
            e,
            AgentEvent::ToolCallStarted(tc) if tc.name == "list_directory" && tc.args["path"] == "/work"
        )));
        let finished = events.iter().find_map(|e| match e {
            AgentEvent::ToolCallFinished { output, is_error, .. } => Some((output.clone(), *is_error)),
            _ => None,
        });
        assert_eq!(finished, Some(("[FILE] /work/a.txt".to_string(), false)));
        assert_eq!(model.call_count(), 2);

        // The second request carried the tool result.
        let last = model.last_request.lock().unwrap().clone().unwrap();
        let result = last.messages.iter().find_map(|m| match &m.content {
            MessageContent::ToolResult { tool_call_id, content } => Some((tool_call_id.clone(), content.clone())),
            _ => None,
        });
        assert_eq!(
            result,
            Some(("call_0_list_directory".to_string(), "[FILE] /work/a.txt".to_string()))
        );
        assert!(!last.tools.is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_model_not_fatal() {
        let model = Arc::new(ScriptedMockProvider::tool_then_text("c1", "delete_everything", "{}", "Sorry."));
        let agent = agent_with(Arc::clone(&model), AgentConfig::default());
        let mut s = session();
        let (tx, rx) = mpsc::channel(64);

        agent.run_turn(&mut s, "go", tx).await.unwrap();
        let events = collect(rx).await;

        assert!(events.iter().any(|e| matches!(
            e,
            AgentEvent::ToolCallFinished { is_error: true, output, .. } if output.contains("unknown tool")
        )));
        assert!(matches!(events.last(), Some(AgentEvent::TurnComplete)));
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn parallel_calls_keep_index_order_and_get_ids() {
        let model = Arc::new(ScriptedMockProvider::new(vec![
            vec![
                tool_call(1, "", "list_directory", r#"{"path":"b"}"#),
                tool_call(0, "first", "list_directory", r#"{"path":"a"}"#),
                ResponseEvent::Done,
            ],
            vec![ResponseEvent::TextDelta("done".into()), ResponseEvent::Done],
        ]));
        let agent = agent_with(model, AgentConfig::default());
        let mut s = session();
        let (tx, rx) = mpsc::channel(64);

        agent.run_turn(&mut s, "list both", tx).await.unwrap();
        let started: Vec<ToolCall> = collect(rx)
            .await
            .into_iter()
            .filter_map(|e| match e {
                AgentEvent::ToolCallStarted(tc) => Some(tc),
                _ => None,
            })
            .collect();

        assert_eq!(started.len(), 2);
        assert_eq!(started[0].id, "first");
        assert_eq!(started[0].args["path"], "a");
        assert_eq!(started[1].id, "tc_synthetic_1");
        assert_eq!(started[1].args["path"], "b");
    }

    #[tokio::test]
    async fn split_argument_deltas_are_joined() {
        let model = Arc::new(ScriptedMockProvider::new(vec![
            vec![
                tool_call(0, "c", "list_directory", r#"{"pa"#),
                tool_call(0, "", "", r#"th":"x"}"#),
                ResponseEvent::Done,
            ],
            vec![ResponseEvent::TextDelta("ok".into()), ResponseEvent::Done],
        ]));
        let agent = agent_with(model, AgentConfig::default());
        let mut s = session();
        let (tx, rx) = mpsc::channel(64);

        agent.run_turn(&mut s, "go", tx).await.unwrap();
        let events = collect(rx).await;
        assert!(events.iter().any(|e| matches!(
            e,
            AgentEvent::ToolCallStarted(tc) if tc.args == json!({ "path": "x" })
        )));
    }

    // ── Round budget ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn exhausted_budget_ends_with_tool_free_summary_turn() {
        let looping = || vec![tool_call(0, "c", "list_directory", "{}"), ResponseEvent::Done];
        let model = Arc::new(ScriptedMockProvider::new(vec![
            looping(),
            looping(),
            vec![ResponseEvent::TextDelta("summary".into()), ResponseEvent::Done],
        ]));
        let config = AgentConfig { max_tool_rounds: 2, ..AgentConfig::default() };
        let agent = agent_with(Arc::clone(&model), config);
        let mut s = session();
        let (tx, rx) = mpsc::channel(64);

        agent.run_turn(&mut s, "loop forever", tx).await.unwrap();
        let events = collect(rx).await;

        assert_eq!(model.call_count(), 3);
        let last = model.last_request.lock().unwrap().clone().unwrap();
        assert!(last.tools.is_empty(), "summary turn must not offer tools");
        assert!(events.iter().any(|e| matches!(e, AgentEvent::TextComplete(t) if t == "summary")));
        assert!(matches!(events.last(), Some(AgentEvent::TurnComplete)));
    }

    // ── Failures ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn model_error_aborts_turn() {
        let model = Arc::new(ScriptedMockProvider::new(vec![vec![
            ResponseEvent::Error("quota exceeded".into()),
        ]]));
        let agent = agent_with(model, AgentConfig::default());
        let mut s = session();
        let (tx, rx) = mpsc::channel(64);

        let err = agent.run_turn(&mut s, "hi", tx).await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        let events = collect(rx).await;
        assert!(events.iter().any(|e| matches!(e, AgentEvent::Error(_))));
        assert!(!events.iter().any(|e| matches!(e, AgentEvent::TurnComplete)));
    }

    // ── Runner ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn runner_stores_history_back_into_service() {
        let model = Arc::new(ScriptedMockProvider::always_text("hi there"));
        let agent = Arc::new(agent_with(model, AgentConfig::default()));
        let service = Arc::new(InMemorySessionService::new());
        let runner = Runner::new("app", agent, Arc::clone(&service));
        let s = service.create_session("app", "user", HashMap::new());

        let (tx, _rx) = mpsc::channel(64);
        runner.run("user", &s.id, "hello", tx).await.unwrap();

        let stored = service.get_session("app", "user", &s.id).unwrap();
        assert_eq!(stored.messages.len(), 3);
        assert_eq!(stored.messages[2].as_text(), Some("hi there"));
    }

    #[tokio::test]
    async fn runner_rejects_unknown_session() {
        let model = Arc::new(ScriptedMockProvider::always_text("x"));
        let agent = Arc::new(agent_with(Arc::clone(&model), AgentConfig::default()));
        let runner = Runner::new("app", agent, Arc::new(InMemorySessionService::new()));

        let (tx, _rx) = mpsc::channel(64);
        let err = runner.run("user", "nope", "hello", tx).await.unwrap_err();
        assert!(err.to_string().contains("session not found"));
        assert_eq!(model.call_count(), 0);
    }
}
