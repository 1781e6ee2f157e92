use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `tollgate`.
///
/// Each subsystem defines its own error enum. Library callers can match on
/// these to decide recovery strategy; tool executors and config loading use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum Error {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Security / validation ───────────────────────────────────────────
    #[error("security: {0}")]
    Security(#[from] SecurityError),

    // ── Approval policy ─────────────────────────────────────────────────
    #[error("policy: {0}")]
    Policy(#[from] PolicyError),

    // ── Conversation engine ─────────────────────────────────────────────
    #[error("engine: {0}")]
    Engine(#[from] EngineError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Security / validation errors ───────────────────────────────────────────

/// Hard-stop verdicts from the deterministic validators.
///
/// Every variant except `RateLimited` and `Io` is a validation failure: the
/// requested action is never attempted.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("command contains dangerous shell operator '{pattern}'")]
    DangerousPattern { pattern: String },

    #[error("command is empty")]
    EmptyCommand,

    #[error("path traversal rejected: {path}")]
    PathTraversal { path: String },

    #[error("path escapes sandbox root: {path}")]
    OutsideSandbox { path: String },

    #[error("not a regular file: {}", path.display())]
    NotAFile { path: PathBuf },

    #[error("file too large: {size} bytes (limit: {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("binary content rejected: {}", path.display())]
    BinaryContent { path: PathBuf },

    #[error("input is empty")]
    EmptyInput,

    #[error("input too long: {length} characters (limit: {limit})")]
    InputTooLong { length: usize, limit: usize },

    #[error("input rejected: matches suspicious pattern ({pattern})")]
    SuspiciousInput { pattern: &'static str },

    #[error("rate limit exceeded for '{resource}': retry in {:.1}s", retry_after.as_secs_f64())]
    RateLimited {
        resource: String,
        retry_after: Duration,
    },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SecurityError {
    /// Wait-time hint for rate-limit failures.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

// ─── Approval policy errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("unknown approval policy '{0}' (expected one of: always, never, ask, auto_conservative, auto_permissive)")]
    UnknownPolicy(String),

    #[error("rule pattern must not be empty")]
    EmptyPattern,

    #[error("invalid wildcard pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("failed to persist approval config {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

// ─── Engine errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("input rejected: {0}")]
    Validation(SecurityError),

    #[error("{0}")]
    RateLimited(SecurityError),

    #[error("model invocation failed: {0:#}")]
    Model(#[source] anyhow::Error),

    #[error("failed to persist conversation: {0:#}")]
    Persistence(#[source] anyhow::Error),

    #[error("an approval decision is pending (token {token})")]
    ApprovalPending { token: String },

    #[error("no pending approval matches token {token}")]
    UnknownApprovalToken { token: String },
}

impl From<SecurityError> for EngineError {
    fn from(error: SecurityError) -> Self {
        match error {
            SecurityError::RateLimited { .. } => Self::RateLimited(error),
            other => Self::Validation(other),
        }
    }
}
