use super::{
    ExecutionContext, GitDiffTool, GitLogTool, GitStatusTool, HttpClient, KnowledgeBase,
    KnowledgeSearchTool, ListDirectoryTool, ReadFileTool, ShellTool, Tool, ToolRegistry,
    WebSearchTool, WriteFileTool,
};
use crate::config::Config;
use crate::security::{PathSandbox, RateLimiter, ShellCommandValidator};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

/// Build the sandbox and command validator every tool executes against.
/// The workspace directory is created if it does not exist yet.
pub fn execution_context(config: &Config) -> anyhow::Result<ExecutionContext> {
    let workspace = config.workspace_path();
    std::fs::create_dir_all(&workspace).with_context(|| {
        format!("Failed to create workspace directory {}", workspace.display())
    })?;
    let sandbox =
        PathSandbox::new(&workspace)?.with_max_file_size(config.security.max_file_size);
    Ok(ExecutionContext::new(sandbox, command_validator(config)))
}

pub fn command_validator(config: &Config) -> ShellCommandValidator {
    ShellCommandValidator::new(
        config.security.allowed_commands.clone(),
        config.security.blocked_commands.clone(),
    )
}

/// Builtin tools that need nothing beyond config.
pub fn default_tools(config: &Config) -> anyhow::Result<Vec<Box<dyn Tool>>> {
    let http = HttpClient::new(
        Duration::from_secs(config.http.timeout_secs),
        config.http.max_attempts,
        config.http.backoff_ms,
    )?;
    let search_limiter = Arc::new(RateLimiter::new(
        "web_search",
        config.rate_limit.web_search_max_calls,
        Duration::from_secs(config.rate_limit.web_search_period_secs),
    ));

    Ok(vec![
        Box::new(ReadFileTool),
        Box::new(WriteFileTool),
        Box::new(ListDirectoryTool),
        Box::new(ShellTool::new(config.shell.timeout_secs)),
        Box::new(GitStatusTool),
        Box::new(GitLogTool),
        Box::new(GitDiffTool),
        Box::new(WebSearchTool::new(
            http,
            config.search.endpoint.clone(),
            config.search.max_results,
            search_limiter,
        )),
    ])
}

/// Create the default tool registry.
///
/// `knowledge_search` is only registered when a knowledge base is supplied.
pub fn default_registry(
    config: &Config,
    ctx: Arc<ExecutionContext>,
    knowledge: Option<Arc<dyn KnowledgeBase>>,
) -> anyhow::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new(ctx);
    for tool in default_tools(config)? {
        registry.register(tool);
    }
    if let Some(knowledge) = knowledge {
        registry.register(Box::new(KnowledgeSearchTool::new(
            knowledge,
            config.search.knowledge_limit,
        )));
    }
    tracing::debug!(tools = ?registry.tool_names(), "tool registry ready");
    Ok(registry)
}
