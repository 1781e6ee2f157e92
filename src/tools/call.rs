use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// One tool invocation requested by the model, in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    /// The model's own judgement that the call is risky.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_hint: Option<bool>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
            risk_hint: None,
        }
    }

    #[must_use]
    pub fn with_risk_hint(mut self, risky: bool) -> Self {
        self.risk_hint = Some(risky);
        self
    }

    /// Parse any accepted wire shape into a canonical call.
    pub fn from_value(value: Value) -> Result<Self, ToolCallError> {
        let raw: RawToolCall = serde_json::from_value(value)
            .map_err(|e| ToolCallError::Malformed(e.to_string()))?;
        Self::try_from(raw)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolCallError {
    #[error("Invalid JSON arguments: {0}")]
    InvalidArguments(String),

    #[error("Malformed tool call: {0}")]
    Malformed(String),
}

/// Wire shapes a tool call may arrive in.
///
/// - OpenAI style: `{"id", "type": "function", "function": {"name", "arguments"}}`
/// - canonical: `{"id", "name", "arguments" | "args" | "input"}`
///
/// Arguments are either a JSON object or a JSON-encoded string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawToolCall {
    Function {
        #[serde(default)]
        id: String,
        function: RawFunction,
        #[serde(default)]
        risk_hint: Option<bool>,
    },
    Canonical {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default, alias = "args", alias = "input")]
        arguments: Option<Value>,
        #[serde(default)]
        risk_hint: Option<bool>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

impl TryFrom<RawToolCall> for ToolCall {
    type Error = ToolCallError;

    fn try_from(raw: RawToolCall) -> Result<Self, Self::Error> {
        let (id, name, arguments, risk_hint) = match raw {
            RawToolCall::Function {
                id,
                function,
                risk_hint,
            } => (id, function.name, function.arguments, risk_hint),
            RawToolCall::Canonical {
                id,
                name,
                arguments,
                risk_hint,
            } => (id, name, arguments, risk_hint),
        };

        if name.trim().is_empty() {
            return Err(ToolCallError::Malformed("missing function name".to_string()));
        }

        Ok(Self {
            id,
            name,
            args: parse_arguments(arguments)?,
            risk_hint,
        })
    }
}

fn parse_arguments(raw: Option<Value>) -> Result<Map<String, Value>, ToolCallError> {
    match raw {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(Value::String(encoded)) => {
            if encoded.trim().is_empty() {
                return Ok(Map::new());
            }
            match serde_json::from_str::<Value>(&encoded) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(other) => Err(ToolCallError::InvalidArguments(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                ))),
                Err(e) => Err(ToolCallError::InvalidArguments(e.to_string())),
            }
        }
        Some(other) => Err(ToolCallError::InvalidArguments(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Input accepted by `ToolRegistry::execute_tool_call`.
#[derive(Debug, Clone)]
pub enum ToolCallInput {
    Parsed(ToolCall),
    Raw(Value),
}

impl From<ToolCall> for ToolCallInput {
    fn from(call: ToolCall) -> Self {
        Self::Parsed(call)
    }
}

impl From<Value> for ToolCallInput {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}
