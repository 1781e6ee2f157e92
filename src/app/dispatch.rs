use crate::cli::{CheckCommands, Cli, Commands, PolicyCommands};
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use tollgate::Config;
use tollgate::security::{
    ApprovalBroker, ApprovalManager, ApprovalRequest, CliApprovalBroker, Disposition,
    InputSanitizer,
};
use tollgate::tools::{self, ToolResult};

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    let broker = CliApprovalBroker::default_timeout();
    let output = run(cli.command, &config, &broker).await?;
    println!("{output}");
    Ok(())
}

/// Execute one command and return what should be printed.
pub async fn run(command: Commands, config: &Config, broker: &dyn ApprovalBroker) -> Result<String> {
    match command {
        Commands::Policy { policy_command } => handle_policy(policy_command, config),
        Commands::Check { check_command } => handle_check(check_command, config),
        Commands::Tools => list_tools(config),
        Commands::Exec { tool, args } => exec_tool(config, broker, &tool, &args).await,
    }
}

fn approval_manager(config: &Config) -> ApprovalManager {
    ApprovalManager::load(
        config.approvals_path(),
        tools::command_validator(config),
        config.security.read_only_tools.clone(),
    )
}

fn handle_policy(command: PolicyCommands, config: &Config) -> Result<String> {
    let approvals = approval_manager(config);
    match command {
        PolicyCommands::List => {
            let mut out = String::from("Rules:\n");
            let rules = approvals.rules();
            if rules.is_empty() {
                out.push_str("  (none)\n");
            }
            for (pattern, policy) in rules {
                let _ = writeln!(out, "  {pattern:<28} {policy}");
            }
            let defaults = approvals.defaults();
            let category = |policy: Option<_>| {
                policy.map_or_else(|| format!("(global) {}", defaults.global), |p| format!("{p}"))
            };
            out.push_str("Defaults:\n");
            let _ = writeln!(out, "  {:<28} {}", "builtin", category(defaults.builtin));
            let _ = writeln!(out, "  {:<28} {}", "mcp", category(defaults.mcp));
            let _ = write!(out, "  {:<28} {}", "global", defaults.global);
            Ok(out)
        }
        PolicyCommands::Get { tool } => Ok(format!("{tool}: {}", approvals.get_policy(&tool))),
        PolicyCommands::Set { pattern, policy } => {
            approvals.set_policy(&pattern, &policy)?;
            Ok(format!(
                "{}: {}",
                pattern.trim(),
                approvals.get_policy(pattern.trim())
            ))
        }
        PolicyCommands::Remove { pattern } => {
            if approvals.remove_policy(&pattern)? {
                Ok(format!("Removed rule '{}'", pattern.trim()))
            } else {
                Ok(format!("No rule for '{}'", pattern.trim()))
            }
        }
    }
}

fn handle_check(command: CheckCommands, config: &Config) -> Result<String> {
    let output = match command {
        CheckCommands::Command { command } => {
            match tools::command_validator(config).validate(&command) {
                Ok(verdict) => format!(
                    "{}: {}{}",
                    verdict.classification,
                    verdict.reason,
                    if verdict.requires_approval {
                        " (requires approval)"
                    } else {
                        ""
                    }
                ),
                Err(e) => format!("rejected: {e}"),
            }
        }
        CheckCommands::Path { path, read } => {
            let ctx = tools::execution_context(config)?;
            let checked = if read {
                ctx.sandbox.validate_read(&path)
            } else {
                ctx.sandbox.validate(&path)
            };
            match checked {
                Ok(resolved) => format!("ok: {}", resolved.display()),
                Err(e) => format!("rejected: {e}"),
            }
        }
        CheckCommands::Input { text } => {
            match InputSanitizer::new(config.security.max_input_length).sanitize(&text) {
                Ok(clean) => format!("ok: {clean}"),
                Err(e) => format!("rejected: {e}"),
            }
        }
    };
    Ok(output)
}

fn list_tools(config: &Config) -> Result<String> {
    let ctx = Arc::new(tools::execution_context(config)?);
    let registry = tools::default_registry(config, ctx, None)?;
    let lines: Vec<String> = registry
        .get_definitions()
        .into_iter()
        .map(|spec| format!("{:<16} {}", spec.name, spec.description))
        .collect();
    Ok(lines.join("\n"))
}

async fn exec_tool(
    config: &Config,
    broker: &dyn ApprovalBroker,
    tool: &str,
    raw_args: &str,
) -> Result<String> {
    let Value::Object(args) =
        serde_json::from_str::<Value>(raw_args).context("--args must be valid JSON")?
    else {
        bail!("--args must be a JSON object");
    };

    let ctx = Arc::new(tools::execution_context(config)?);
    let registry = tools::default_registry(config, ctx, None)?;
    let approvals = approval_manager(config);

    let result = match approvals.disposition(tool, &args, None) {
        Disposition::Execute => registry.execute(tool, args).await,
        Disposition::Block { reason } => ToolResult::error(format!("blocked: {reason}")),
        Disposition::Confirm { reason } => {
            let request = ApprovalRequest::new(tool, &args, reason);
            let decision = broker.request_approval(&request).await?;
            tracing::info!(tool, %decision, "approval decision");
            if decision.is_granted() {
                registry.execute(tool, args).await
            } else {
                ToolResult::error(format!("Tool call '{tool}' was denied by the user"))
            }
        }
    };

    serde_json::to_string_pretty(&result).context("failed to render tool result")
}
