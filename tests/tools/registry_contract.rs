use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;
use tollgate::security::{PathSandbox, ShellCommandValidator};
use tollgate::tools::{ExecutionContext, ToolArgs, ToolCall, ToolRegistry, ToolResult};

fn registry(dir: &TempDir) -> ToolRegistry {
    let ctx = ExecutionContext::new(
        PathSandbox::new(dir.path()).unwrap(),
        ShellCommandValidator::default(),
    );
    let mut registry = ToolRegistry::new(Arc::new(ctx));
    registry.register_fn(
        "add",
        "Add two integers",
        Some(json!({
            "type": "object",
            "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
            "required": ["a", "b"]
        })),
        |args: ToolArgs| async move {
            let a = args.get("a").and_then(Value::as_i64).unwrap_or_default();
            let b = args.get("b").and_then(Value::as_i64).unwrap_or_default();
            anyhow::Ok(ToolResult::from_value(json!({"sum": a + b})))
        },
    );
    registry
}

#[tokio::test]
async fn openai_shape_with_string_arguments() {
    let dir = TempDir::new().unwrap();
    let reply = registry(&dir)
        .execute_tool_call(json!({
            "id": "call_7",
            "type": "function",
            "function": {"name": "add", "arguments": "{\"a\": 2, \"b\": 3}"}
        }))
        .await;

    assert_eq!(reply["tool_call_id"], "call_7");
    assert_eq!(reply["function_name"], "add");
    assert_eq!(reply["result"]["sum"], 5);
}

#[tokio::test]
async fn canonical_shape_and_parsed_calls_agree() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);

    let raw = registry
        .execute_tool_call(json!({"id": "c1", "name": "add", "args": {"a": 1, "b": 1}}))
        .await;
    let Value::Object(args) = json!({"a": 1, "b": 1}) else {
        unreachable!()
    };
    let parsed = registry.execute_tool_call(ToolCall::new("c1", "add", args)).await;
    assert_eq!(raw, parsed);
}

#[tokio::test]
async fn malformed_calls_come_back_as_unknown_errors() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);

    let bad_json = registry
        .execute_tool_call(json!({
            "id": "c9",
            "function": {"name": "add", "arguments": "{not json"}
        }))
        .await;
    assert_eq!(bad_json["tool_call_id"], "c9");
    assert_eq!(bad_json["function_name"], "unknown");
    assert!(bad_json["result"]["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid JSON arguments"));

    let no_name = registry.execute_tool_call(json!({"id": "c10"})).await;
    assert_eq!(no_name["function_name"], "unknown");
    assert!(no_name["result"]["error"].is_string());
}

#[tokio::test]
async fn unknown_tool_is_an_error_result() {
    let dir = TempDir::new().unwrap();
    let reply = registry(&dir)
        .execute_tool_call(json!({"id": "c1", "name": "missing"}))
        .await;
    assert_eq!(reply["function_name"], "missing");
    assert_eq!(reply["result"]["error"], "Unknown tool: missing");
}

#[tokio::test]
async fn definitions_are_independent_copies() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);

    let mut first = registry.get_definitions();
    first[0].description.push_str(" (edited)");
    first[0].parameters["required"] = json!([]);

    let second = registry.get_definitions();
    assert_eq!(second[0].description, "Add two integers");
    assert_eq!(second[0].parameters["required"], json!(["a", "b"]));

    let schema = second[0].to_function_schema();
    assert_eq!(schema["type"], "function");
    assert_eq!(schema["function"]["name"], "add");
}

#[tokio::test]
async fn repeated_calls_give_identical_results() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);
    let call = json!({"id": "c1", "name": "add", "arguments": {"a": 20, "b": 22}});

    let first = registry.execute_tool_call(call.clone()).await;
    let second = registry.execute_tool_call(call).await;
    assert_eq!(first, second);
    assert_eq!(registry.tool_names(), ["add"]);
}

#[tokio::test]
async fn panicking_executor_is_contained() {
    let dir = TempDir::new().unwrap();
    let mut registry = registry(&dir);
    registry.register_fn("boom", "always panics", None, |_args| async {
        if true {
            panic!("kaboom");
        }
        anyhow::Ok(ToolResult::default())
    });

    let reply = registry
        .execute_tool_call(json!({"id": "c1", "name": "boom"}))
        .await;
    assert_eq!(reply["result"]["error"], "Tool 'boom' panicked: kaboom");

    let after = registry
        .execute_tool_call(json!({"id": "c2", "name": "add", "arguments": {"a": 1, "b": 2}}))
        .await;
    assert_eq!(after["result"]["sum"], 3);
}
