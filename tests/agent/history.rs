use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use tollgate::Config;
use tollgate::agent::{
    ConversationEngine, ConversationStore, EngineContext, JsonFileStore, Role,
};

use crate::support::{ScriptedModel, answer, engine_context, test_config, tool_request};

fn file_backed(config: &Config, model: Arc<ScriptedModel>) -> Arc<EngineContext> {
    let store = Arc::new(JsonFileStore::new(config.sessions_path()));
    Arc::new(EngineContext::from_config(config, model, store, None).unwrap())
}

#[tokio::test]
async fn long_conversations_are_trimmed_in_batches() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.engine.max_pairs = 2;
    let model = Arc::new(ScriptedModel::new(
        (0..5).map(|i| Ok(answer(&format!("a{i}")))).collect(),
    ));
    let ctx = Arc::new(engine_context(&config, Arc::clone(&model)));
    let mut engine = ConversationEngine::new(ctx, "trim");

    let mut lengths = Vec::new();
    for i in 0..5 {
        engine.run_iteration(&format!("q{i}")).await.unwrap();
        lengths.push(engine.history().len());
    }

    // Target is 5 messages; trimming starts once the history passes 7
    assert_eq!(lengths, [3, 5, 7, 5, 7]);
    assert_eq!(engine.history()[0].role, Role::System);
    assert_eq!(engine.history().last().unwrap().content, "a4");

    let last_request = model.seen_messages().pop().unwrap();
    assert_eq!(last_request[0].role, Role::System);
    assert!(last_request.iter().all(|m| m.content != "q0"));
}

#[tokio::test]
async fn trimming_never_leaves_an_orphaned_tool_reply() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("ws")).unwrap();
    let mut config = test_config(dir.path());
    config.engine.max_pairs = 1;
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(tool_request("c1", "list_directory", json!({}))),
        Ok(answer("listed")),
        Ok(answer("plain")),
    ]));
    let ctx = Arc::new(engine_context(&config, model));
    let mut engine = ConversationEngine::new(ctx, "orphans");

    engine.run_iteration("list").await.unwrap();
    engine.run_iteration("again").await.unwrap();

    let history = engine.history();
    for (i, message) in history.iter().enumerate() {
        if message.role == Role::Tool {
            let id = message.tool_call_id.as_deref().unwrap();
            assert!(
                history[..i]
                    .iter()
                    .any(|m| m.tool_calls.iter().any(|c| c.id == id)),
                "tool reply {id} has no originating call"
            );
        }
    }
}

#[tokio::test]
async fn sessions_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let first = file_backed(&config, Arc::new(ScriptedModel::new(vec![Ok(answer("hi"))])));
    let mut engine = ConversationEngine::open(first, "persisted").await.unwrap();
    engine.run_iteration("hello").await.unwrap();
    let saved = engine.history().to_vec();
    assert!(dir.path().join("sessions/persisted.json").is_file());

    let model = Arc::new(ScriptedModel::new(vec![Ok(answer("welcome back"))]));
    let second = file_backed(&config, Arc::clone(&model));
    let mut reopened = ConversationEngine::open(second, "persisted").await.unwrap();
    assert_eq!(reopened.history(), saved.as_slice());

    reopened.run_iteration("remember me?").await.unwrap();
    let request = &model.seen_messages()[0];
    assert!(request.iter().any(|m| m.content == "hello"));
    assert!(request.iter().any(|m| m.content == "hi"));
}

#[tokio::test]
async fn unknown_session_opens_fresh() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let ctx = file_backed(&config, Arc::new(ScriptedModel::default()));

    let engine = ConversationEngine::open(ctx, "brand-new").await.unwrap();
    assert_eq!(engine.session_id(), "brand-new");
    assert_eq!(engine.history().len(), 1);
    assert_eq!(engine.history()[0].role, Role::System);
    assert_eq!(engine.history()[0].content, config.engine.system_prompt);
}

#[tokio::test]
async fn suspended_turn_is_not_persisted() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(answer("first")),
        Ok(tool_request(
            "c1",
            "write_file",
            json!({"path": "a.txt", "content": "x"}),
        )),
    ]));
    let ctx = file_backed(&config, model);
    let mut engine = ConversationEngine::open(Arc::clone(&ctx), "pending").await.unwrap();
    engine.run_iteration("one").await.unwrap();
    let completed = engine.history().to_vec();

    let outcome = engine.run_iteration("write it").await.unwrap();
    assert!(outcome.pending_token().is_some());

    let stored = ctx.store.load("pending").await.unwrap().unwrap();
    assert_eq!(stored, completed);
}
