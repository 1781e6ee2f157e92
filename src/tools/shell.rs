use super::traits::{
    ExecutionContext, Tool, ToolArgs, ToolResult, required_str, truncate_on_char_boundary,
};
use serde_json::{Value, json};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

/// Shell timeouts are clamped into this range (seconds).
pub const MIN_SHELL_TIMEOUT_SECS: u64 = 30;
pub const MAX_SHELL_TIMEOUT_SECS: u64 = 300;
/// Maximum output size in bytes (1 MB).
const MAX_OUTPUT_BYTES: usize = 1_048_576;
/// Environment variables safe to pass to shell commands.
/// Only functional variables are included -- never API keys or secrets.
pub(crate) const SAFE_ENV_VARS: &[&str] = &[
    "PATH", "HOME", "TERM", "LANG", "LC_ALL", "LC_CTYPE", "USER", "SHELL",
];
/// Workspace-local temp directory handed to child processes.
const CONTROLLED_TMP_DIR: &str = ".tollgate-tmp";

pub fn clamp_timeout(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(MIN_SHELL_TIMEOUT_SECS, MAX_SHELL_TIMEOUT_SECS))
}

/// Shell command execution inside the workspace.
pub struct ShellTool {
    default_timeout: Duration,
}

impl ShellTool {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            default_timeout: clamp_timeout(timeout_secs),
        }
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new(60)
    }
}

impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell_execute"
    }

    fn description(&self) -> &str {
        "Execute a single shell command in the workspace directory. Pipes, redirection, \
         chaining and substitution are rejected."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Timeout in seconds (clamped to 30..=300)"
                }
            },
            "required": ["command"]
        })
    }

    fn execute<'a>(
        &'a self,
        args: ToolArgs,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ToolResult>> + Send + 'a>> {
        Box::pin(async move {
            let command = required_str(&args, "command")?;

            // Approval happens upstream; the validator still has the last word.
            match ctx.command_validator.validate(command) {
                Err(e) => return Ok(ToolResult::error(format!("blocked: {e}"))),
                Ok(verdict) if verdict.is_blocked() => {
                    return Ok(ToolResult::error(format!("blocked: {}", verdict.reason)));
                }
                Ok(_) => {}
            }

            let timeout = args
                .get("timeout_secs")
                .and_then(Value::as_u64)
                .map_or(self.default_timeout, clamp_timeout);

            let mut cmd = tokio::process::Command::new("sh");
            cmd.arg("-c").arg(command);
            scrub_environment(&mut cmd, ctx.workspace_dir())?;

            let result = tokio::time::timeout(timeout, cmd.output()).await;

            match result {
                Ok(Ok(output)) => {
                    let mut stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                    let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();

                    if truncate_on_char_boundary(&mut stdout, MAX_OUTPUT_BYTES) {
                        stdout.push_str("\n... [output truncated at 1MB]");
                    }
                    if truncate_on_char_boundary(&mut stderr, MAX_OUTPUT_BYTES) {
                        stderr.push_str("\n... [stderr truncated at 1MB]");
                    }

                    let mut result = ToolResult::from_value(json!({
                        "command": command,
                        "stdout": stdout,
                        "stderr": stderr,
                        "exit_code": output.status.code(),
                    }));
                    if !output.status.success() {
                        let status = output
                            .status
                            .code()
                            .map_or_else(|| "signal".to_string(), |code| code.to_string());
                        result
                            .as_map_mut()
                            .insert("error".into(), json!(format!("Command exited with status {status}")));
                    }
                    Ok(result)
                }
                Ok(Err(e)) => Ok(ToolResult::error(format!("Failed to execute command: {e}"))),
                Err(_) => Ok(ToolResult::error(format!(
                    "Command timed out after {}s and was killed",
                    timeout.as_secs()
                ))),
            }
        })
    }
}

/// Clear the environment to prevent leaking API keys and other secrets,
/// re-add only safe variables, pin the working directory and TMPDIR.
pub(crate) fn scrub_environment(
    cmd: &mut tokio::process::Command,
    workspace_dir: &Path,
) -> anyhow::Result<()> {
    cmd.current_dir(workspace_dir).env_clear().kill_on_drop(true);

    for var in SAFE_ENV_VARS {
        if let Ok(val) = std::env::var(var) {
            cmd.env(var, val);
        }
    }

    let controlled_tmp = workspace_dir.join(CONTROLLED_TMP_DIR);
    if !controlled_tmp.exists() {
        std::fs::create_dir_all(&controlled_tmp)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&controlled_tmp, std::fs::Permissions::from_mode(0o700))?;
        }
    }
    cmd.env("TMPDIR", &controlled_tmp);
    Ok(())
}
