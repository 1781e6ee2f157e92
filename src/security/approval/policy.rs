use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// How a tool call is gated.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum ApprovalPolicy {
    /// Execute without asking.
    Always,
    /// Never execute.
    Never,
    /// Ask unless the call is intrinsically safe.
    Ask,
    /// Ask when the call is not intrinsically safe or the model flags it risky.
    AutoConservative,
    /// Ask only when the model flags the call risky.
    AutoPermissive,
}

impl ApprovalPolicy {
    pub const ALL: [Self; 5] = [
        Self::Always,
        Self::Never,
        Self::Ask,
        Self::AutoConservative,
        Self::AutoPermissive,
    ];

    /// Parse a user-supplied policy name.
    pub fn parse(value: &str) -> Result<Self, PolicyError> {
        Self::from_str(value.trim()).map_err(|_| PolicyError::UnknownPolicy(value.to_string()))
    }

    pub fn is_adaptive(self) -> bool {
        matches!(self, Self::AutoConservative | Self::AutoPermissive)
    }
}

/// Whether a call under `policy` needs a human decision.
///
/// `baseline` is the deterministic "intrinsically safe" judgement and
/// `llm_guess` the model's own risk flag.
#[must_use]
pub fn requires_confirmation(policy: ApprovalPolicy, baseline: bool, llm_guess: bool) -> bool {
    match policy {
        ApprovalPolicy::Always => false,
        ApprovalPolicy::Never => true,
        ApprovalPolicy::Ask => !baseline,
        ApprovalPolicy::AutoConservative => !baseline || llm_guess,
        ApprovalPolicy::AutoPermissive => llm_guess,
    }
}

/// One `pattern → policy` entry. Patterns containing `*`, `?` or `[` are
/// glob wildcards; anything else matches a tool name exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRule {
    pattern: String,
    policy: ApprovalPolicy,
    matcher: Option<glob::Pattern>,
}

impl ApprovalRule {
    pub fn new(pattern: &str, policy: ApprovalPolicy) -> Result<Self, PolicyError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(PolicyError::EmptyPattern);
        }
        let matcher = if is_wildcard(pattern) {
            Some(
                glob::Pattern::new(pattern).map_err(|e| PolicyError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.msg.to_string(),
                })?,
            )
        } else {
            None
        };
        Ok(Self {
            pattern: pattern.to_string(),
            policy,
            matcher,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn policy(&self) -> ApprovalPolicy {
        self.policy
    }

    pub fn is_wildcard(&self) -> bool {
        self.matcher.is_some()
    }

    /// Count of literal (non-wildcard) characters; higher is more specific.
    fn specificity(&self) -> usize {
        self.pattern
            .chars()
            .filter(|c| !matches!(c, '*' | '?' | '[' | ']'))
            .count()
    }
}

fn is_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Category fallbacks. A missing category default defers to `global`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builtin: Option<ApprovalPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp: Option<ApprovalPolicy>,
    pub global: ApprovalPolicy,
}

impl Default for CategoryDefaults {
    fn default() -> Self {
        Self {
            builtin: Some(ApprovalPolicy::Always),
            mcp: Some(ApprovalPolicy::Ask),
            global: ApprovalPolicy::Ask,
        }
    }
}

/// Ordered rule set plus category defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRules {
    rules: Vec<ApprovalRule>,
    pub defaults: CategoryDefaults,
}

impl Default for ApprovalRules {
    /// Builtin tools run freely except the two with side effects.
    fn default() -> Self {
        Self {
            rules: vec![
                ApprovalRule {
                    pattern: "shell_execute".to_string(),
                    policy: ApprovalPolicy::Ask,
                    matcher: None,
                },
                ApprovalRule {
                    pattern: "write_file".to_string(),
                    policy: ApprovalPolicy::Ask,
                    matcher: None,
                },
            ],
            defaults: CategoryDefaults::default(),
        }
    }
}

impl ApprovalRules {
    pub fn empty(defaults: CategoryDefaults) -> Self {
        Self {
            rules: Vec::new(),
            defaults,
        }
    }

    pub fn rules(&self) -> &[ApprovalRule] {
        &self.rules
    }

    /// Insert or replace a rule. Replacing keeps the rule's original position.
    pub fn upsert(&mut self, rule: ApprovalRule) {
        if let Some(existing) = self.rules.iter_mut().find(|r| r.pattern == rule.pattern) {
            *existing = rule;
        } else {
            self.rules.push(rule);
        }
    }

    pub fn remove(&mut self, pattern: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.pattern != pattern.trim());
        self.rules.len() != before
    }

    /// Resolve the effective policy: exact rule, then the most specific
    /// matching wildcard (earliest wins ties), then the category default,
    /// then the global default.
    pub fn resolve(&self, tool: &str) -> ApprovalPolicy {
        if let Some(rule) = self
            .rules
            .iter()
            .find(|r| !r.is_wildcard() && r.pattern == tool)
        {
            return rule.policy;
        }

        let mut best: Option<&ApprovalRule> = None;
        for rule in &self.rules {
            let Some(matcher) = &rule.matcher else {
                continue;
            };
            if matcher.matches(tool)
                && best.is_none_or(|current| rule.specificity() > current.specificity())
            {
                best = Some(rule);
            }
        }
        if let Some(rule) = best {
            return rule.policy;
        }

        let category = if tool.starts_with("mcp_") {
            self.defaults.mcp
        } else {
            self.defaults.builtin
        };
        category.unwrap_or(self.defaults.global)
    }
}
