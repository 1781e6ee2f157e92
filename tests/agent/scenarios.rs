use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use tollgate::agent::{CallOutcome, ConversationEngine, Role};
use tollgate::security::{ApprovalManager, ApprovalPolicy, Disposition, ShellCommandValidator};
use tollgate::security::defaults::default_read_only_tools;

use crate::support::{ScriptedModel, answer, engine_context, test_config, tool_request};

#[tokio::test]
async fn safe_shell_command_under_ask_runs_without_confirmation() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(tool_request("c1", "shell_execute", json!({"command": "git status"}))),
        Ok(answer("checked")),
    ]));
    let ctx = Arc::new(engine_context(&config, model));
    assert_eq!(ctx.approvals.get_policy("shell_execute"), ApprovalPolicy::Ask);

    let mut engine = ConversationEngine::new(ctx, "scenario-a");
    let outcome = engine.run_iteration("what changed?").await.unwrap();

    // No broker is configured, so a confirmation would have suspended
    let report = outcome.report().expect("iteration should complete");
    assert_eq!(report.tool_calls.len(), 1);
    assert_eq!(report.tool_calls[0].outcome, CallOutcome::Executed);
    assert_eq!(report.final_text, "checked");
}

#[tokio::test]
async fn destructive_shell_command_is_blocked_under_every_policy() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    for policy in ApprovalPolicy::ALL {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(tool_request("c1", "shell_execute", json!({"command": "rm -rf /"}))),
            Ok(answer("could not")),
        ]));
        let ctx = Arc::new(engine_context(&config, model));
        ctx.approvals
            .set_policy("shell_execute", policy.as_ref())
            .unwrap();

        let mut engine = ConversationEngine::new(ctx, "scenario-b");
        let outcome = engine.run_iteration("clean up everything").await.unwrap();
        let report = outcome.report().expect("blocked calls never suspend");
        assert_eq!(report.tool_calls[0].outcome, CallOutcome::Blocked, "{policy}");
        assert!(!report.tool_calls[0].result.is_success());
    }
    assert!(dir.path().join("ws").is_dir());
}

#[test]
fn destructive_shell_disposition_ignores_llm_guess() {
    let approvals = ApprovalManager::default();
    let args = json!({"command": "rm -rf /"});
    let args = args.as_object().unwrap();
    for policy in ApprovalPolicy::ALL {
        approvals.set_policy("shell_execute", policy.as_ref()).unwrap();
        for guess in [None, Some(false), Some(true)] {
            assert!(matches!(
                approvals.disposition("shell_execute", args, guess),
                Disposition::Block { .. }
            ));
        }
    }
}

#[tokio::test]
async fn read_file_adds_tool_reply_and_raw_content_turn() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(dir.path().join("ws")).unwrap();
    std::fs::write(dir.path().join("ws").join("notes.txt"), "buy milk\ncall bob").unwrap();

    let model = Arc::new(ScriptedModel::new(vec![
        Ok(tool_request("c1", "read_file", json!({"path": "notes.txt"}))),
        Ok(answer("You need to buy milk and call Bob.")),
    ]));
    let mut engine = ConversationEngine::new(Arc::new(engine_context(&config, model)), "scenario-c");
    let before = engine.history().len();

    engine.run_iteration("what is in notes.txt?").await.unwrap();

    let added = &engine.history()[before..];
    let roles: Vec<Role> = added.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [Role::User, Role::Assistant, Role::Tool, Role::User, Role::Assistant]
    );
    assert_eq!(added[1].tool_calls[0].name, "read_file");
    assert_eq!(added[2].tool_call_id.as_deref(), Some("c1"));
    assert_eq!(added[3].content, "buy milk\ncall bob");
    assert_eq!(added[4].content, "You need to buy milk and call Bob.");
}

#[test]
fn wildcard_rule_from_file_overrides_category_default() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("approvals.json");
    std::fs::write(&path, r#"{"approvals": {"mcp_*": "never"}}"#).unwrap();

    let approvals = ApprovalManager::load(
        &path,
        ShellCommandValidator::default(),
        default_read_only_tools(),
    );
    assert_eq!(approvals.get_policy("mcp_db_query"), ApprovalPolicy::Never);
    assert_eq!(approvals.get_policy("read_file"), ApprovalPolicy::Always);
    assert_eq!(approvals.get_policy("mcp_db_query").to_string(), "never");
}
