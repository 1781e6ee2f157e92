//! JSON persistence for approval rules.
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "approvals": { "shell_execute": "ask", "mcp_*": "never" },
//!   "defaults": { "builtin": "always", "mcp": "ask", "global": "ask" }
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use super::policy::{ApprovalPolicy, ApprovalRule, ApprovalRules, CategoryDefaults};

pub const APPROVALS_FILE_VERSION: &str = "1.0";

/// Read rules from `path`. Returns `Ok(None)` when the file does not exist.
///
/// Entries with unknown policy names or invalid patterns are skipped with a
/// warning rather than failing the whole file.
pub fn read_rules(path: &Path) -> Result<Option<ApprovalRules>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(error)
                .with_context(|| format!("failed to read approvals file '{}'", path.display()));
        }
    };
    if content.trim().is_empty() {
        return Ok(Some(ApprovalRules::default()));
    }

    let root: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse approvals file '{}'", path.display()))?;
    let Value::Object(root) = root else {
        anyhow::bail!(
            "approvals file '{}' must contain a JSON object",
            path.display()
        );
    };

    Ok(Some(rules_from_object(&root, path)))
}

fn rules_from_object(root: &Map<String, Value>, path: &Path) -> ApprovalRules {
    let defaults = match root.get("defaults") {
        Some(value) => serde_json::from_value::<CategoryDefaults>(value.clone()).unwrap_or_else(
            |error| {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "invalid approval defaults; using built-in defaults"
                );
                CategoryDefaults::default()
            },
        ),
        None => CategoryDefaults::default(),
    };

    let mut rules = ApprovalRules::empty(defaults);
    let Some(approvals) = root.get("approvals").and_then(Value::as_object) else {
        return rules;
    };

    for (pattern, value) in approvals {
        let parsed = value
            .as_str()
            .ok_or_else(|| crate::error::PolicyError::UnknownPolicy(value.to_string()))
            .and_then(ApprovalPolicy::parse)
            .and_then(|policy| ApprovalRule::new(pattern, policy));
        match parsed {
            Ok(rule) => rules.upsert(rule),
            Err(error) => tracing::warn!(
                path = %path.display(),
                pattern = %pattern,
                %error,
                "skipping invalid approval rule"
            ),
        }
    }
    rules
}

/// Write `rules` to `path`, keeping any other top-level keys already present
/// in the file. The file is replaced atomically and restricted to the owner.
pub fn write_rules(path: &Path, rules: &ApprovalRules) -> Result<()> {
    let mut root = fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<Value>(&content).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default();

    let approvals: Map<String, Value> = rules
        .rules()
        .iter()
        .map(|rule| {
            (
                rule.pattern().to_string(),
                Value::String(rule.policy().to_string()),
            )
        })
        .collect();

    root.insert(
        "version".to_string(),
        Value::String(APPROVALS_FILE_VERSION.to_string()),
    );
    root.insert("approvals".to_string(), Value::Object(approvals));
    root.insert(
        "defaults".to_string(),
        serde_json::to_value(rules.defaults).context("failed to serialize approval defaults")?,
    );

    let content = serde_json::to_string_pretty(&Value::Object(root))
        .context("failed to serialize approvals")?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create approvals parent directory '{}'",
                parent.display()
            )
        })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, content)
        .with_context(|| format!("failed to write approvals file '{}'", tmp_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to set permissions on '{}'", tmp_path.display()))?;
    }

    fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to replace approvals file '{}'", path.display()))?;
    Ok(())
}
