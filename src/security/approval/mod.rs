pub mod broker;
pub mod cli;
pub mod policy;
pub mod store;

pub use broker::{ApprovalBroker, ApprovalDecision, ApprovalRequest, AutoDenyBroker, summarize_args};
pub use cli::CliApprovalBroker;
pub use policy::{ApprovalPolicy, ApprovalRule, ApprovalRules, CategoryDefaults, requires_confirmation};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::error::PolicyError;
use crate::security::command::{CommandClass, ShellCommandValidator};
use crate::security::defaults::default_read_only_tools;

/// Tool name whose calls are classified by [`ShellCommandValidator`].
pub const SHELL_TOOL: &str = "shell_execute";

/// What the engine should do with one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Execute,
    Block { reason: String },
    Confirm { reason: String },
}

/// Resolves approval policies for tool calls and owns the rule set.
#[derive(Debug)]
pub struct ApprovalManager {
    rules: Mutex<ApprovalRules>,
    path: Option<PathBuf>,
    validator: ShellCommandValidator,
    read_only_tools: HashSet<String>,
}

impl Default for ApprovalManager {
    fn default() -> Self {
        Self::new(
            ApprovalRules::default(),
            ShellCommandValidator::default(),
            default_read_only_tools(),
        )
    }
}

impl ApprovalManager {
    /// In-memory manager; rule changes are not persisted.
    pub fn new(
        rules: ApprovalRules,
        validator: ShellCommandValidator,
        read_only_tools: Vec<String>,
    ) -> Self {
        Self {
            rules: Mutex::new(rules),
            path: None,
            validator,
            read_only_tools: read_only_tools.into_iter().collect(),
        }
    }

    /// Load rules from `path`. A missing file is initialized with defaults;
    /// an unreadable or malformed one is logged and defaults are used.
    pub fn load(
        path: impl Into<PathBuf>,
        validator: ShellCommandValidator,
        read_only_tools: Vec<String>,
    ) -> Self {
        let path = path.into();
        let rules = match store::read_rules(&path) {
            Ok(Some(rules)) => rules,
            Ok(None) => {
                let rules = ApprovalRules::default();
                if let Err(error) = store::write_rules(&path, &rules) {
                    tracing::warn!(
                        path = %path.display(),
                        error = %format!("{error:#}"),
                        "failed to initialize approvals file"
                    );
                }
                rules
            }
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %format!("{error:#}"),
                    "failed to load approvals; using defaults"
                );
                ApprovalRules::default()
            }
        };

        Self {
            path: Some(path),
            ..Self::new(rules, validator, read_only_tools)
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn validator(&self) -> &ShellCommandValidator {
        &self.validator
    }

    /// Effective policy for `tool`.
    pub fn get_policy(&self, tool: &str) -> ApprovalPolicy {
        self.rules
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .resolve(tool)
    }

    /// Static view of the policy for one call. For `shell_execute` under
    /// `Ask`, the command verdict settles it: blocked commands resolve to
    /// `Never` and safe ones to `Always`. Adaptive policies resolve to `Ask`.
    pub fn check_approval(&self, tool: &str, args: &Map<String, Value>) -> ApprovalPolicy {
        let policy = self.get_policy(tool);
        match policy {
            ApprovalPolicy::Ask if tool == SHELL_TOOL => {
                match self.validator.validate(shell_command(args)) {
                    Err(_) => ApprovalPolicy::Never,
                    Ok(verdict) => match verdict.classification {
                        CommandClass::Blocked => ApprovalPolicy::Never,
                        CommandClass::Safe => ApprovalPolicy::Always,
                        CommandClass::Unknown => ApprovalPolicy::Ask,
                    },
                }
            }
            ApprovalPolicy::AutoConservative | ApprovalPolicy::AutoPermissive => {
                ApprovalPolicy::Ask
            }
            other => other,
        }
    }

    /// Whether the call is intrinsically safe: a `Safe` shell command, or a
    /// tool from the read-only set.
    pub fn baseline(&self, tool: &str, args: &Map<String, Value>) -> bool {
        if tool == SHELL_TOOL {
            return self
                .validator
                .validate(shell_command(args))
                .is_ok_and(|verdict| verdict.is_safe());
        }
        self.read_only_tools.contains(tool)
    }

    /// Final gate for one tool call. Shell commands are validated first and
    /// dangerous or blocked ones are refused under every policy.
    pub fn disposition(
        &self,
        tool: &str,
        args: &Map<String, Value>,
        llm_guess: Option<bool>,
    ) -> Disposition {
        let mut detail = None;
        if tool == SHELL_TOOL {
            match self.validator.validate(shell_command(args)) {
                Err(error) => {
                    return Disposition::Block {
                        reason: error.to_string(),
                    };
                }
                Ok(verdict) if verdict.is_blocked() => {
                    return Disposition::Block {
                        reason: verdict.reason,
                    };
                }
                Ok(verdict) => detail = Some(verdict.reason),
            }
        }

        let policy = self.get_policy(tool);
        if policy == ApprovalPolicy::Never {
            return Disposition::Block {
                reason: format!("tool '{tool}' is disabled by approval policy"),
            };
        }

        let baseline = self.baseline(tool, args);
        let llm_guess = llm_guess.unwrap_or(false);
        if requires_confirmation(policy, baseline, llm_guess) {
            let mut reason = format!("policy '{policy}' requires confirmation for '{tool}'");
            if llm_guess {
                reason.push_str(" (flagged risky by the model)");
            }
            if let Some(detail) = detail {
                reason.push_str(": ");
                reason.push_str(&detail);
            }
            return Disposition::Confirm { reason };
        }
        Disposition::Execute
    }

    /// Set the policy for an exact tool name or wildcard pattern. The rule
    /// set is persisted before the in-memory copy changes.
    pub fn set_policy(&self, tool: &str, policy: &str) -> Result<(), PolicyError> {
        let policy = ApprovalPolicy::parse(policy)?;
        let rule = ApprovalRule::new(tool, policy)?;

        let mut rules = self
            .rules
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut next = rules.clone();
        next.upsert(rule);
        self.persist(&next)?;
        *rules = next;

        tracing::info!(pattern = tool.trim(), %policy, "approval policy updated");
        Ok(())
    }

    /// Remove a rule. Returns whether a rule was removed.
    pub fn remove_policy(&self, tool: &str) -> Result<bool, PolicyError> {
        let mut rules = self
            .rules
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut next = rules.clone();
        if !next.remove(tool) {
            return Ok(false);
        }
        self.persist(&next)?;
        *rules = next;

        tracing::info!(pattern = tool.trim(), "approval policy removed");
        Ok(true)
    }

    /// Snapshot of the configured rules in resolution order.
    pub fn rules(&self) -> Vec<(String, ApprovalPolicy)> {
        self.rules
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .rules()
            .iter()
            .map(|rule| (rule.pattern().to_string(), rule.policy()))
            .collect()
    }

    pub fn defaults(&self) -> CategoryDefaults {
        self.rules
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .defaults
    }

    fn persist(&self, rules: &ApprovalRules) -> Result<(), PolicyError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        store::write_rules(path, rules).map_err(|source| PolicyError::Persist {
            path: path.clone(),
            source,
        })
    }
}

/// Key under which an `Allow` decision is remembered for a session.
/// Shell grants are per command; other tools are granted wholesale.
pub fn grant_key(tool: &str, args: &Map<String, Value>) -> String {
    if tool == SHELL_TOOL {
        format!("{tool}:{}", shell_command(args).trim())
    } else {
        tool.to_string()
    }
}

fn shell_command(args: &Map<String, Value>) -> &str {
    args.get("command").and_then(Value::as_str).unwrap_or("")
}
