use super::traits::{ExecutionContext, ToolArgs, ToolResult, truncate_on_char_boundary};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiddlewareDecision {
    Continue,
    Block(String),
}

/// Hooks run around every executor invocation.
#[async_trait]
pub trait ToolMiddleware: Send + Sync + std::fmt::Debug {
    async fn before_execute(
        &self,
        tool_name: &str,
        args: &ToolArgs,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<MiddlewareDecision>;

    async fn after_execute(&self, tool_name: &str, result: &mut ToolResult, ctx: &ExecutionContext);
}

#[derive(Debug)]
pub struct AuditMiddleware;

#[async_trait]
impl ToolMiddleware for AuditMiddleware {
    async fn before_execute(
        &self,
        tool_name: &str,
        args: &ToolArgs,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<MiddlewareDecision> {
        tracing::info!(
            tool = tool_name,
            arg_keys = ?args.keys().collect::<Vec<_>>(),
            workspace = %ctx.workspace_dir().display(),
            "tool execution started"
        );
        Ok(MiddlewareDecision::Continue)
    }

    async fn after_execute(
        &self,
        tool_name: &str,
        result: &mut ToolResult,
        _ctx: &ExecutionContext,
    ) {
        tracing::info!(
            tool = tool_name,
            success = result.is_success(),
            error = result.error_message().unwrap_or(""),
            "tool execution finished"
        );
    }
}

/// Caps every top-level string field of a result.
#[derive(Debug)]
pub struct OutputSizeLimitMiddleware {
    max_bytes: usize,
    max_lines: usize,
}

pub const MAX_TOOL_OUTPUT_BYTES: usize = 262_144; // 256KB
pub const MAX_TOOL_OUTPUT_LINES: usize = 4_000;

impl Default for OutputSizeLimitMiddleware {
    fn default() -> Self {
        Self::new(MAX_TOOL_OUTPUT_BYTES, MAX_TOOL_OUTPUT_LINES)
    }
}

impl OutputSizeLimitMiddleware {
    pub fn new(max_bytes: usize, max_lines: usize) -> Self {
        Self {
            max_bytes,
            max_lines,
        }
    }

    fn limit(&self, text: &mut String) -> bool {
        let original_bytes = text.len();
        let original_lines = text.lines().count();
        let mut truncated = false;

        if original_lines > self.max_lines {
            let kept: Vec<&str> = text.lines().take(self.max_lines).collect();
            *text = kept.join("\n");
            truncated = true;
        }
        truncated |= truncate_on_char_boundary(text, self.max_bytes);

        if truncated {
            text.push_str(&format!(
                "\n... [output truncated: {original_bytes} bytes/{original_lines} lines \u{2192} {} bytes/{} lines max]",
                self.max_bytes, self.max_lines
            ));
        }
        truncated
    }
}

#[async_trait]
impl ToolMiddleware for OutputSizeLimitMiddleware {
    async fn before_execute(
        &self,
        _tool_name: &str,
        _args: &ToolArgs,
        _ctx: &ExecutionContext,
    ) -> anyhow::Result<MiddlewareDecision> {
        Ok(MiddlewareDecision::Continue)
    }

    async fn after_execute(
        &self,
        tool_name: &str,
        result: &mut ToolResult,
        _ctx: &ExecutionContext,
    ) {
        for (field, value) in result.as_map_mut().iter_mut() {
            if let Value::String(text) = value
                && self.limit(text)
            {
                tracing::warn!(tool = tool_name, field = %field, "tool output truncated");
            }
        }
    }
}

pub fn default_middleware_chain() -> Vec<Arc<dyn ToolMiddleware>> {
    vec![
        Arc::new(AuditMiddleware),
        Arc::new(OutputSizeLimitMiddleware::default()),
    ]
}
