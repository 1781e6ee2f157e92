use std::path::Path;

use serde_json::{Value, json};
use tempfile::TempDir;
use tollgate::security::defaults::default_read_only_tools;
use tollgate::security::{ApprovalManager, ApprovalPolicy, ShellCommandValidator};

fn load(path: &Path) -> ApprovalManager {
    ApprovalManager::load(
        path,
        ShellCommandValidator::default(),
        default_read_only_tools(),
    )
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn first_load_writes_the_default_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/approvals.json");
    load(&path);

    let saved = read_json(&path);
    assert_eq!(saved["version"], "1.0");
    assert_eq!(saved["approvals"]["shell_execute"], "ask");
    assert_eq!(saved["approvals"]["write_file"], "ask");
    assert_eq!(saved["defaults"]["builtin"], "always");
    assert_eq!(saved["defaults"]["mcp"], "ask");
}

#[test]
fn set_policy_keeps_unrelated_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("approvals.json");
    std::fs::write(
        &path,
        json!({
            "approvals": {"git_log": "never"},
            "owner": "ops-team",
            "notes": ["reviewed"]
        })
        .to_string(),
    )
    .unwrap();

    let approvals = load(&path);
    approvals.set_policy("web_search", "auto_conservative").unwrap();

    let saved = read_json(&path);
    assert_eq!(saved["owner"], "ops-team");
    assert_eq!(saved["notes"], json!(["reviewed"]));
    assert_eq!(saved["approvals"]["git_log"], "never");
    assert_eq!(saved["approvals"]["web_search"], "auto_conservative");
}

#[test]
fn invalid_entries_are_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("approvals.json");
    std::fs::write(
        &path,
        r#"{"approvals": {"read_file": "sometimes", "git_diff": "never", "list_directory": 3}}"#,
    )
    .unwrap();

    let approvals = load(&path);
    assert_eq!(approvals.get_policy("git_diff"), ApprovalPolicy::Never);
    assert_eq!(approvals.get_policy("read_file"), ApprovalPolicy::Always);
    assert_eq!(approvals.rules().len(), 1);
}

#[test]
fn exact_rules_beat_wildcards_and_specific_wildcards_beat_broad_ones() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("approvals.json");
    let approvals = load(&path);
    approvals.set_policy("mcp_*", "never").unwrap();
    approvals.set_policy("mcp_github_*", "ask").unwrap();
    approvals.set_policy("mcp_github_read", "always").unwrap();

    assert_eq!(approvals.get_policy("mcp_slack_post"), ApprovalPolicy::Never);
    assert_eq!(approvals.get_policy("mcp_github_push"), ApprovalPolicy::Ask);
    assert_eq!(approvals.get_policy("mcp_github_read"), ApprovalPolicy::Always);

    let reloaded = load(&path);
    assert_eq!(reloaded.rules(), approvals.rules());
}

#[test]
fn unmatched_tools_fall_back_by_category() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("approvals.json");
    std::fs::write(
        &path,
        r#"{"approvals": {}, "defaults": {"builtin": "never", "mcp": null, "global": "always"}}"#,
    )
    .unwrap();

    let approvals = load(&path);
    assert_eq!(approvals.get_policy("read_file"), ApprovalPolicy::Never);
    assert_eq!(approvals.get_policy("mcp_jira"), ApprovalPolicy::Always);
}
