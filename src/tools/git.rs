use super::shell::scrub_environment;
use super::traits::{
    ExecutionContext, Tool, ToolArgs, ToolResult, optional_str, truncate_on_char_boundary,
};
use serde_json::{Value, json};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

const GIT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_GIT_OUTPUT_BYTES: usize = 524_288;
const DEFAULT_LOG_COUNT: u64 = 10;
const MAX_LOG_COUNT: u64 = 100;

/// Run `git` with a fixed argument vector (no shell) in the workspace.
async fn run_git(ctx: &ExecutionContext, args: &[String]) -> anyhow::Result<ToolResult> {
    let mut cmd = tokio::process::Command::new("git");
    // Pager and interactive prompts would hang the call
    cmd.arg("--no-pager").args(args);
    scrub_environment(&mut cmd, ctx.workspace_dir())?;
    cmd.env("GIT_TERMINAL_PROMPT", "0");

    let output = match tokio::time::timeout(GIT_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Ok(ToolResult::error(format!("Failed to run git: {e}"))),
        Err(_) => {
            return Ok(ToolResult::error(format!(
                "git timed out after {}s",
                GIT_TIMEOUT.as_secs()
            )));
        }
    };

    let mut stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if truncate_on_char_boundary(&mut stdout, MAX_GIT_OUTPUT_BYTES) {
        stdout.push_str("\n... [git output truncated]");
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Ok(ToolResult::error(format!("git failed: {}", stderr.trim())));
    }
    Ok(ToolResult::from_value(json!({ "output": stdout })))
}

/// Validate an optional path argument and turn it into a pathspec.
fn pathspec(ctx: &ExecutionContext, args: &ToolArgs) -> Result<Option<String>, ToolResult> {
    let Some(path) = optional_str(args, "path").filter(|p| !p.trim().is_empty()) else {
        return Ok(None);
    };
    ctx.sandbox
        .validate(path)
        .map(|resolved| Some(ctx.display_path(&resolved)))
        .map_err(|e| ToolResult::error(e.to_string()))
}

pub struct GitStatusTool;

impl Tool for GitStatusTool {
    fn name(&self) -> &str {
        "git_status"
    }

    fn description(&self) -> &str {
        "Show the working tree status of the workspace repository"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn execute<'a>(
        &'a self,
        _args: ToolArgs,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ToolResult>> + Send + 'a>> {
        Box::pin(async move {
            run_git(ctx, &["status".into(), "--short".into(), "--branch".into()]).await
        })
    }
}

pub struct GitLogTool;

impl Tool for GitLogTool {
    fn name(&self) -> &str {
        "git_log"
    }

    fn description(&self) -> &str {
        "Show recent commits of the workspace repository"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "max_count": {
                    "type": "integer",
                    "description": "Number of commits to show (1-100, default 10)"
                },
                "path": {
                    "type": "string",
                    "description": "Limit history to this path"
                }
            }
        })
    }

    fn execute<'a>(
        &'a self,
        args: ToolArgs,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ToolResult>> + Send + 'a>> {
        Box::pin(async move {
            let count = args
                .get("max_count")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_LOG_COUNT)
                .clamp(1, MAX_LOG_COUNT);

            let mut git_args = vec![
                "log".to_string(),
                format!("--max-count={count}"),
                "--date=short".to_string(),
                "--pretty=format:%h %ad %an %s".to_string(),
            ];
            match pathspec(ctx, &args) {
                Ok(Some(path)) => git_args.extend(["--".to_string(), path]),
                Ok(None) => {}
                Err(error) => return Ok(error),
            }
            run_git(ctx, &git_args).await
        })
    }
}

pub struct GitDiffTool;

impl Tool for GitDiffTool {
    fn name(&self) -> &str {
        "git_diff"
    }

    fn description(&self) -> &str {
        "Show uncommitted changes in the workspace repository"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "staged": {
                    "type": "boolean",
                    "description": "Show staged changes instead of unstaged ones"
                },
                "path": {
                    "type": "string",
                    "description": "Limit the diff to this path"
                }
            }
        })
    }

    fn execute<'a>(
        &'a self,
        args: ToolArgs,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ToolResult>> + Send + 'a>> {
        Box::pin(async move {
            let mut git_args = vec!["diff".to_string(), "--no-color".to_string()];
            if args.get("staged").and_then(Value::as_bool).unwrap_or(false) {
                git_args.push("--cached".to_string());
            }
            match pathspec(ctx, &args) {
                Ok(Some(path)) => git_args.extend(["--".to_string(), path]),
                Ok(None) => {}
                Err(error) => return Ok(error),
            }
            run_git(ctx, &git_args).await
        })
    }
}
