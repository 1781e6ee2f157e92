use crate::security::defaults::{
    default_allowed_commands, default_blocked_commands, default_read_only_tools,
};
use crate::security::path::DEFAULT_MAX_FILE_SIZE;
use crate::security::sanitizer::DEFAULT_MAX_INPUT_LENGTH;
use crate::tools::web::DEFAULT_SEARCH_ENDPOINT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub shell: ShellConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

// ── Security ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Sandbox root for every file, shell and git tool. `~` is expanded.
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: String,

    /// Approval rules file (JSON). `~` is expanded.
    #[serde(default = "default_approvals_path")]
    pub approvals_path: String,

    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,

    #[serde(default = "default_blocked_commands")]
    pub blocked_commands: Vec<String>,

    /// Tools whose calls count as intrinsically safe for approval decisions
    #[serde(default = "default_read_only_tools")]
    pub read_only_tools: Vec<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,
}

fn default_workspace_dir() -> String {
    "~/.tollgate/workspace".into()
}

fn default_approvals_path() -> String {
    "~/.tollgate/approvals.json".into()
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_max_input_length() -> usize {
    DEFAULT_MAX_INPUT_LENGTH
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            workspace_dir: default_workspace_dir(),
            approvals_path: default_approvals_path(),
            allowed_commands: default_allowed_commands(),
            blocked_commands: default_blocked_commands(),
            read_only_tools: default_read_only_tools(),
            max_file_size: default_max_file_size(),
            max_input_length: default_max_input_length(),
        }
    }
}

// ── Engine ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Model round-trips allowed per iteration before the loop is cut off
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Conversation turns (user + assistant pairs) kept after trimming
    #[serde(default = "default_max_pairs")]
    pub max_pairs: usize,

    /// Tools whose payload is echoed verbatim as an extra user message
    #[serde(default = "default_raw_content_tools")]
    pub raw_content_tools: Vec<String>,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Where `JsonFileStore` keeps sessions. `~` is expanded.
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: String,
}

fn default_max_tool_rounds() -> usize {
    8
}

fn default_max_pairs() -> usize {
    20
}

fn default_raw_content_tools() -> Vec<String> {
    vec!["read_file".into()]
}

fn default_system_prompt() -> String {
    "You are a careful assistant working inside a sandboxed workspace. \
     Use the available tools when they help, and explain what you did."
        .into()
}

fn default_sessions_dir() -> String {
    "~/.tollgate/sessions".into()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            max_pairs: default_max_pairs(),
            raw_content_tools: default_raw_content_tools(),
            system_prompt: default_system_prompt(),
            sessions_dir: default_sessions_dir(),
        }
    }
}

// ── Shell ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Default command timeout; clamped to 30..=300 seconds at use
    #[serde(default = "default_shell_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_shell_timeout_secs() -> u64 {
    60
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_shell_timeout_secs(),
        }
    }
}

// ── HTTP ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_http_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubles per attempt
    #[serde(default = "default_http_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_http_max_attempts() -> u32 {
    3
}

fn default_http_backoff_ms() -> u64 {
    500
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
            max_attempts: default_http_max_attempts(),
            backoff_ms: default_http_backoff_ms(),
        }
    }
}

// ── Search ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_search_max_results")]
    pub max_results: usize,

    #[serde(default = "default_knowledge_limit")]
    pub knowledge_limit: usize,
}

fn default_search_endpoint() -> String {
    DEFAULT_SEARCH_ENDPOINT.into()
}

fn default_search_max_results() -> usize {
    5
}

fn default_knowledge_limit() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            max_results: default_search_max_results(),
            knowledge_limit: default_knowledge_limit(),
        }
    }
}

// ── Rate limits ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Iterations allowed per window; 0 disables the iteration limiter
    #[serde(default)]
    pub iterations_max_calls: usize,

    #[serde(default = "default_period_secs")]
    pub iterations_period_secs: u64,

    #[serde(default = "default_web_search_max_calls")]
    pub web_search_max_calls: usize,

    #[serde(default = "default_period_secs")]
    pub web_search_period_secs: u64,
}

fn default_period_secs() -> u64 {
    60
}

fn default_web_search_max_calls() -> usize {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            iterations_max_calls: 0,
            iterations_period_secs: default_period_secs(),
            web_search_max_calls: default_web_search_max_calls(),
            web_search_period_secs: default_period_secs(),
        }
    }
}
