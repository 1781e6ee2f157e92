use std::sync::Arc;

use anyhow::anyhow;
use serde_json::json;
use tempfile::TempDir;
use tollgate::EngineError;
use tollgate::agent::{CallOutcome, ConversationEngine, Message, Role, StopReason};
use tollgate::tools::ToolCall;

use crate::support::{ScriptedModel, answer, engine_context, test_config, tool_request};

fn workspace_with_notes(dir: &TempDir) {
    let ws = dir.path().join("ws");
    std::fs::create_dir_all(&ws).unwrap();
    std::fs::write(ws.join("notes.txt"), "alpha").unwrap();
}

#[tokio::test]
async fn chained_tool_rounds_end_with_a_final_answer() {
    let dir = TempDir::new().unwrap();
    workspace_with_notes(&dir);
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(tool_request("c1", "list_directory", json!({}))),
        Ok(tool_request("c2", "read_file", json!({"path": "notes.txt"}))),
        Ok(answer("notes.txt says alpha")),
    ]));
    let ctx = Arc::new(engine_context(&test_config(dir.path()), Arc::clone(&model)));
    let mut engine = ConversationEngine::new(ctx, "loop");

    let outcome = engine.run_iteration("summarize my files").await.unwrap();
    let report = outcome.report().unwrap();

    assert_eq!(report.rounds, 3);
    assert_eq!(report.stop_reason, StopReason::Completed);
    let rounds: Vec<usize> = report.tool_calls.iter().map(|r| r.round).collect();
    assert_eq!(rounds, [1, 2]);
    assert!(report
        .tool_calls
        .iter()
        .all(|r| r.outcome == CallOutcome::Executed && r.result.is_success()));
    assert_eq!(model.invocations(), 3);
}

#[tokio::test]
async fn every_round_sees_all_tool_schemas() {
    let dir = TempDir::new().unwrap();
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(tool_request("c1", "list_directory", json!({}))),
        Ok(answer("empty")),
    ]));
    let ctx = Arc::new(engine_context(&test_config(dir.path()), Arc::clone(&model)));
    ConversationEngine::new(ctx, "schemas")
        .run_iteration("what is here?")
        .await
        .unwrap();

    let seen = model.seen_tools();
    assert_eq!(seen.len(), 2);
    for tools in &seen {
        for name in ["read_file", "write_file", "list_directory", "shell_execute", "git_status"] {
            assert!(tools.iter().any(|t| t == name), "{name} missing");
        }
    }
}

#[tokio::test]
async fn tool_replies_follow_call_order_within_a_round() {
    let dir = TempDir::new().unwrap();
    workspace_with_notes(&dir);
    let calls = vec![
        ToolCall::new("first", "list_directory", serde_json::Map::new()),
        ToolCall::new("second", "git_log", serde_json::Map::new()),
    ];
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(Message::assistant_with_tools("", calls)),
        Ok(answer("done")),
    ]));
    let ctx = Arc::new(engine_context(&test_config(dir.path()), Arc::clone(&model)));
    let mut engine = ConversationEngine::new(ctx, "order");
    engine.run_iteration("look around").await.unwrap();

    let ids: Vec<&str> = engine
        .history()
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    assert_eq!(ids, ["first", "second"]);

    // Both replies precede the second model call
    let second_request = &model.seen_messages()[1];
    assert_eq!(
        second_request.iter().filter(|m| m.role == Role::Tool).count(),
        2
    );
}

#[tokio::test]
async fn unknown_tool_becomes_an_error_reply_not_a_failure() {
    let dir = TempDir::new().unwrap();
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(tool_request("c1", "teleport", json!({"to": "mars"}))),
        Ok(answer("I cannot do that")),
    ]));
    let ctx = Arc::new(engine_context(&test_config(dir.path()), model));
    let mut engine = ConversationEngine::new(ctx, "unknown");

    let outcome = engine.run_iteration("go to mars").await.unwrap();
    let record = &outcome.report().unwrap().tool_calls[0];
    assert_eq!(record.result.error_message(), Some("Unknown tool: teleport"));
    assert_eq!(outcome.report().unwrap().final_text, "I cannot do that");
}

#[tokio::test]
async fn round_cap_stops_a_model_that_never_answers() {
    let dir = TempDir::new().unwrap();
    workspace_with_notes(&dir);
    let mut config = test_config(dir.path());
    config.engine.max_tool_rounds = 2;
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(tool_request("c1", "list_directory", json!({}))),
        Ok(tool_request("c2", "list_directory", json!({}))),
        Ok(tool_request("c3", "list_directory", json!({}))),
    ]));
    let ctx = Arc::new(engine_context(&config, Arc::clone(&model)));
    let mut engine = ConversationEngine::new(ctx, "capped");

    let outcome = engine.run_iteration("keep going").await.unwrap();
    let report = outcome.report().unwrap();
    assert_eq!(report.stop_reason, StopReason::MaxRounds);
    assert_eq!(report.rounds, 2);
    assert_eq!(
        report.final_text,
        "Stopped after 2 tool rounds without a final answer."
    );
    assert_eq!(model.invocations(), 2);

    let last = engine.history().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, report.final_text);
}

#[tokio::test]
async fn model_failure_rolls_back_the_whole_turn() {
    let dir = TempDir::new().unwrap();
    workspace_with_notes(&dir);
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(tool_request("c1", "read_file", json!({"path": "notes.txt"}))),
        Err(anyhow!("upstream timed out")),
    ]));
    let ctx = Arc::new(engine_context(&test_config(dir.path()), Arc::clone(&model)));
    let mut engine = ConversationEngine::new(ctx, "rollback");
    let before = engine.history().to_vec();

    let error = engine.run_iteration("read my notes").await.unwrap_err();
    assert!(matches!(error, EngineError::Model(_)));
    assert!(error.to_string().contains("upstream timed out"));
    assert_eq!(engine.history(), before.as_slice());

    // The engine stays usable after the failure
    model.push(Ok(answer("recovered")));
    let outcome = engine.run_iteration("try again").await.unwrap();
    assert_eq!(outcome.report().unwrap().final_text, "recovered");
}

#[tokio::test]
async fn rejected_input_never_reaches_the_model() {
    let dir = TempDir::new().unwrap();
    let model = Arc::new(ScriptedModel::default());
    let ctx = Arc::new(engine_context(&test_config(dir.path()), Arc::clone(&model)));
    let mut engine = ConversationEngine::new(ctx, "input");

    let error = engine.run_iteration("   ").await.unwrap_err();
    assert!(matches!(error, EngineError::Validation(_)));
    assert_eq!(model.invocations(), 0);
    assert_eq!(engine.history().len(), 1);
}
