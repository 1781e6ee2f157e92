use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;

/// Upper bound on the argument summary shown to a human approver.
const MAX_SUMMARY_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub tool_name: String,
    pub args_summary: String,
    pub reason: String,
}

impl ApprovalRequest {
    pub fn new(tool_name: &str, args: &Map<String, Value>, reason: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            args_summary: summarize_args(tool_name, args),
            reason: reason.into(),
        }
    }
}

/// A human's answer to an [`ApprovalRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalDecision {
    /// Execute, and keep allowing the same call for the rest of the session.
    Allow,
    /// Execute this call only.
    AllowOnce,
    Deny,
}

impl ApprovalDecision {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Allow | Self::AllowOnce)
    }
}

/// In-process source of human approval decisions.
pub trait ApprovalBroker: Send + Sync {
    fn request_approval<'a>(
        &'a self,
        request: &'a ApprovalRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ApprovalDecision>> + Send + 'a>>;
}

/// Denies every request. Useful for unattended runs.
pub struct AutoDenyBroker;

impl ApprovalBroker for AutoDenyBroker {
    fn request_approval<'a>(
        &'a self,
        request: &'a ApprovalRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ApprovalDecision>> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!(tool = %request.tool_name, "approval auto-denied");
            Ok(ApprovalDecision::Deny)
        })
    }
}

/// Short human-readable rendering of a call's arguments.
#[must_use]
pub fn summarize_args(tool_name: &str, args: &Map<String, Value>) -> String {
    let str_arg = |key: &str| args.get(key).and_then(Value::as_str);
    let raw = match tool_name {
        "shell_execute" => str_arg("command").unwrap_or("(unknown)").to_string(),
        "write_file" => {
            let path = str_arg("path").unwrap_or("?");
            let len = str_arg("content").map_or(0, str::len);
            format!("write {len} bytes to {path}")
        }
        "read_file" | "list_directory" => str_arg("path").unwrap_or(".").to_string(),
        _ => serde_json::to_string(args).unwrap_or_default(),
    };

    if raw.chars().count() > MAX_SUMMARY_CHARS {
        let truncated: String = raw.chars().take(MAX_SUMMARY_CHARS).collect();
        format!("{truncated}…")
    } else {
        raw
    }
}
