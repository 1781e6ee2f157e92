use super::call::{ToolCall, ToolCallError, ToolCallInput};
use super::middleware::{MiddlewareDecision, ToolMiddleware, default_middleware_chain};
use super::traits::{ExecutionContext, Tool, ToolArgs, ToolResult, ToolSpec};
use futures_util::FutureExt;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

/// Central registry for tool instances and middleware pipeline.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    middleware: Vec<Arc<dyn ToolMiddleware>>,
    ctx: Arc<ExecutionContext>,
}

impl ToolRegistry {
    pub fn new(ctx: Arc<ExecutionContext>) -> Self {
        Self::with_middleware(ctx, default_middleware_chain())
    }

    pub fn with_middleware(
        ctx: Arc<ExecutionContext>,
        middleware: Vec<Arc<dyn ToolMiddleware>>,
    ) -> Self {
        Self {
            tools: HashMap::new(),
            middleware,
            ctx,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let tool: Arc<dyn Tool> = Arc::from(tool);
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::debug!(tool = %name, "tool re-registered; previous executor replaced");
        }
    }

    /// Register an async closure as a tool. A missing schema defaults to an
    /// empty object schema.
    pub fn register_fn<F, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Option<Value>,
        executor: F,
    ) where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ToolResult>> + Send + 'static,
    {
        self.register(Box::new(FnTool {
            name: name.into(),
            description: description.into(),
            schema: schema.unwrap_or_else(|| json!({"type": "object", "properties": {}})),
            executor,
        }));
    }

    /// Remove a tool by name. Returns whether it was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Return sorted list of registered tool names.
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Owned specs for all registered tools, sorted by name.
    pub fn get_definitions(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|tool| tool.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Execute a tool through the middleware pipeline. Never fails: unknown
    /// tools, executor errors and executor panics all become `{"error": ..}`.
    pub async fn execute(&self, name: &str, args: ToolArgs) -> ToolResult {
        let Some(tool) = self.tools.get(name).cloned() else {
            tracing::warn!(tool = name, "unknown tool requested");
            return ToolResult::error(format!("Unknown tool: {name}"));
        };
        let ctx = self.ctx.as_ref();

        for middleware in &self.middleware {
            match middleware.before_execute(name, &args, ctx).await {
                Ok(MiddlewareDecision::Continue) => {}
                Ok(MiddlewareDecision::Block(reason)) => return ToolResult::error(reason),
                Err(e) => return ToolResult::error(format!("{e:#}")),
            }
        }

        let outcome = AssertUnwindSafe(async { tool.execute(args, ctx).await })
            .catch_unwind()
            .await;
        let mut result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(tool = name, error = %format!("{e:#}"), "tool execution failed");
                ToolResult::error(format!("{e:#}"))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(tool = name, panic = %message, "tool executor panicked");
                ToolResult::error(format!("Tool '{name}' panicked: {message}"))
            }
        };

        for middleware in &self.middleware {
            middleware.after_execute(name, &mut result, ctx).await;
        }

        result
    }

    /// Execute a call given in any accepted shape. Returns
    /// `{"tool_call_id", "function_name", "result"}`.
    pub async fn execute_tool_call(&self, call: impl Into<ToolCallInput>) -> Value {
        let call = match call.into() {
            ToolCallInput::Parsed(call) => call,
            ToolCallInput::Raw(value) => {
                let id = value
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                match ToolCall::from_value(value) {
                    Ok(call) => call,
                    Err(error) => {
                        tracing::warn!(%error, "rejected malformed tool call");
                        let message = match error {
                            ToolCallError::InvalidArguments(_) => error.to_string(),
                            ToolCallError::Malformed(detail) => {
                                format!("Invalid JSON arguments: {detail}")
                            }
                        };
                        return json!({
                            "tool_call_id": id,
                            "function_name": "unknown",
                            "result": ToolResult::error(message),
                        });
                    }
                }
            }
        };

        let result = self.execute(&call.name, call.args).await;
        json!({
            "tool_call_id": call.id,
            "function_name": call.name,
            "result": result,
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

struct FnTool<F> {
    name: String,
    description: String,
    schema: Value,
    executor: F,
}

impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ToolResult>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    fn execute<'a>(
        &'a self,
        args: ToolArgs,
        _ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ToolResult>> + Send + 'a>> {
        Box::pin((self.executor)(args))
    }
}
