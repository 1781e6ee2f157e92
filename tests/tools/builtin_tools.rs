use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;
use tollgate::Config;
use tollgate::tools::{
    KnowledgeBase, KnowledgeHit, ToolArgs, ToolRegistry, default_registry, execution_context,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.security.workspace_dir = dir.path().join("ws").to_string_lossy().into_owned();
    config
}

fn builtin(config: &Config, knowledge: Option<Arc<dyn KnowledgeBase>>) -> ToolRegistry {
    let ctx = Arc::new(execution_context(config).unwrap());
    default_registry(config, ctx, knowledge).unwrap()
}

fn args(value: Value) -> ToolArgs {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("test args must be an object"),
    }
}

#[tokio::test]
async fn files_written_by_one_tool_are_visible_to_the_others() {
    let dir = TempDir::new().unwrap();
    let registry = builtin(&config_in(&dir), None);

    let written = registry
        .execute(
            "write_file",
            args(json!({"path": "docs/todo.md", "content": "- ship it\n"})),
        )
        .await;
    assert!(written.is_success(), "{written:?}");

    let read = registry
        .execute("read_file", args(json!({"path": "docs/todo.md"})))
        .await;
    assert_eq!(read.get("content"), Some(&json!("- ship it\n")));

    let listing = registry
        .execute("list_directory", args(json!({"path": "docs"})))
        .await;
    let entries = listing.get("entries").and_then(Value::as_array).unwrap();
    assert!(entries.iter().any(|e| e["name"] == "todo.md"));
}

#[tokio::test]
async fn file_tools_refuse_to_leave_the_workspace() {
    let dir = TempDir::new().unwrap();
    let registry = builtin(&config_in(&dir), None);

    let escaped = registry
        .execute("write_file", args(json!({"path": "../outside.txt", "content": "x"})))
        .await;
    assert!(!escaped.is_success());
    assert!(!dir.path().join("outside.txt").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn shell_runs_inside_the_workspace() {
    let dir = TempDir::new().unwrap();
    let registry = builtin(&config_in(&dir), None);
    std::fs::write(dir.path().join("ws").join("marker.txt"), "").unwrap();

    let result = registry
        .execute("shell_execute", args(json!({"command": "ls"})))
        .await;
    assert!(result.is_success(), "{result:?}");
    assert!(result.get("stdout").and_then(Value::as_str).unwrap().contains("marker.txt"));
    assert_eq!(result.get("exit_code"), Some(&json!(0)));

    let blocked = registry
        .execute("shell_execute", args(json!({"command": "rm marker.txt"})))
        .await;
    assert!(blocked.error_message().unwrap().starts_with("blocked:"));
    assert!(dir.path().join("ws").join("marker.txt").exists());
}

#[tokio::test]
async fn web_search_uses_the_configured_endpoint_and_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Heading": "Rust",
            "AbstractText": "A systems programming language.",
            "AbstractURL": "https://www.rust-lang.org",
            "RelatedTopics": []
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.search.endpoint = format!("{}/search", server.uri());
    config.rate_limit.web_search_max_calls = 1;
    let registry = builtin(&config, None);

    let found = registry
        .execute("web_search", args(json!({"query": "rust"})))
        .await;
    assert_eq!(found.get("count"), Some(&json!(1)));
    assert_eq!(found.get("results").unwrap()[0]["title"], "Rust");

    let limited = registry
        .execute("web_search", args(json!({"query": "rust"})))
        .await;
    assert!(limited.error_message().unwrap().contains("rate limit"));
    assert!(limited.get("retry_after_secs").is_some());
}

struct Glossary;

#[async_trait]
impl KnowledgeBase for Glossary {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<KnowledgeHit>> {
        Ok((0..limit)
            .map(|i| KnowledgeHit {
                id: format!("doc-{i}"),
                content: format!("{query} passage {i}"),
                score: 1.0 / (i as f64 + 1.0),
                source: None,
            })
            .collect())
    }
}

#[tokio::test]
async fn knowledge_search_uses_the_configured_default_limit() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.search.knowledge_limit = 2;
    let registry = builtin(&config, Some(Arc::new(Glossary)));

    let hits = registry
        .execute("knowledge_search", args(json!({"query": "approval"})))
        .await;
    assert_eq!(hits.get("count"), Some(&json!(2)));
    assert_eq!(hits.get("results").unwrap()[0]["content"], "approval passage 0");

    let more = registry
        .execute("knowledge_search", args(json!({"query": "approval", "limit": 4})))
        .await;
    assert_eq!(more.get("count"), Some(&json!(4)));
}
