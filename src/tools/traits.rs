use crate::security::{PathSandbox, ShellCommandValidator};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

/// Arguments passed to a tool executor.
pub type ToolArgs = Map<String, Value>;

/// Result of a tool execution: a JSON object. A result is a failure exactly
/// when it carries an `error` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolResult(Map<String, Value>);

impl ToolResult {
    pub fn ok(payload: Map<String, Value>) -> Self {
        Self(payload)
    }

    /// Wrap an arbitrary JSON value. Non-object values land under `result`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                Self(map)
            }
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("error".to_string(), Value::String(message.into()));
        Self(map)
    }

    pub fn is_success(&self) -> bool {
        !self.0.contains_key("error")
    }

    pub fn error_message(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Compact JSON rendering used for conversation messages.
    pub fn to_json_string(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

/// Description of a tool for the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    /// OpenAI-style function declaration.
    pub fn to_function_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Shared environment handed to every executor.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub sandbox: PathSandbox,
    pub command_validator: ShellCommandValidator,
}

impl ExecutionContext {
    pub fn new(sandbox: PathSandbox, command_validator: ShellCommandValidator) -> Self {
        Self {
            sandbox,
            command_validator,
        }
    }

    pub fn workspace_dir(&self) -> &Path {
        self.sandbox.root()
    }

    /// Workspace-relative rendering of a resolved path, for tool output.
    pub fn display_path(&self, resolved: &Path) -> String {
        resolved
            .strip_prefix(self.sandbox.root())
            .map_or_else(
                |_| resolved.display().to_string(),
                |rel| {
                    if rel.as_os_str().is_empty() {
                        ".".to_string()
                    } else {
                        rel.display().to_string()
                    }
                },
            )
    }
}

/// Core tool trait: implement for any capability
pub trait Tool: Send + Sync {
    /// Tool name (used in LLM function calling)
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with given arguments
    fn execute<'a>(
        &'a self,
        args: ToolArgs,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ToolResult>> + Send + 'a>>;

    /// Get the full spec for LLM registration
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Fetch a required string argument.
pub fn required_str<'a>(args: &'a ToolArgs, key: &str) -> anyhow::Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("Missing '{key}' parameter"))
}

pub fn optional_str<'a>(args: &'a ToolArgs, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// Truncate `text` to at most `max_bytes` on a char boundary. Returns whether
/// anything was cut.
pub fn truncate_on_char_boundary(text: &mut String, max_bytes: usize) -> bool {
    if text.len() <= max_bytes {
        return false;
    }
    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    true
}
