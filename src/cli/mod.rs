use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `tollgate` - policy-gated tool execution for tool-calling agents.
#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(version)]
#[command(about = "Policy-gated tool execution for tool-calling agents.", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of ~/.tollgate/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect and edit approval policies
    Policy {
        #[command(subcommand)]
        policy_command: PolicyCommands,
    },

    /// Run a security validator against a value without executing anything
    Check {
        #[command(subcommand)]
        check_command: CheckCommands,
    },

    /// List registered tools
    Tools,

    /// Execute one tool call through the approval gate
    Exec {
        /// Tool name
        tool: String,

        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

/// Approval policy subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum PolicyCommands {
    /// Show configured rules and category defaults
    List,
    /// Show the effective policy for a tool name
    Get {
        /// Tool name
        tool: String,
    },
    /// Set the policy for a tool name or wildcard pattern
    Set {
        /// Tool name or wildcard pattern (e.g. `mcp_github_*`)
        pattern: String,
        /// always, never, ask, auto_conservative or auto_permissive
        policy: String,
    },
    /// Remove a rule
    Remove {
        /// Tool name or wildcard pattern
        pattern: String,
    },
}

/// Validator subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CheckCommands {
    /// Classify a shell command
    Command {
        /// The command line, quoted as one argument
        command: String,
    },
    /// Resolve a path against the workspace sandbox
    Path {
        path: String,
        /// Apply the read checks (size limit, binary content)
        #[arg(long)]
        read: bool,
    },
    /// Sanitize free-form input
    Input { text: String },
}
