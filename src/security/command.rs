use crate::error::SecurityError;
use serde::{Deserialize, Serialize};

use super::defaults::{default_allowed_commands, default_blocked_commands};

/// Shell operators that chain, redirect, or hide execution. Longer operators
/// come first so the reported pattern is the most precise one.
const DANGEROUS_PATTERNS: &[&str] = &[
    "&&", "||", ">>", "$(", "${", ";", "|", ">", "<", "`", "&", "\n", "\r",
];

/// Git options that inject configuration or relocate the repository. Any
/// config key can run code (`alias.x=!cmd`, `core.hooksPath`, ...), so these
/// are refused outright instead of filtered by key.
const GIT_BLOCKED_OPTIONS: &[&str] = &[
    "--config",
    "--config-env",
    "--exec-path",
    "--git-dir",
    "--work-tree",
];

/// Global git options that consume the following word as their value.
const GIT_OPTIONS_WITH_VALUE: &[&str] = &["-C", "--namespace", "--super-prefix"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CommandClass {
    Safe,
    Blocked,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandVerdict {
    pub classification: CommandClass,
    pub reason: String,
    pub requires_approval: bool,
}

impl CommandVerdict {
    fn safe(reason: impl Into<String>) -> Self {
        Self {
            classification: CommandClass::Safe,
            reason: reason.into(),
            requires_approval: false,
        }
    }

    fn blocked(reason: impl Into<String>) -> Self {
        Self {
            classification: CommandClass::Blocked,
            reason: reason.into(),
            requires_approval: true,
        }
    }

    fn unknown(reason: impl Into<String>) -> Self {
        Self {
            classification: CommandClass::Unknown,
            reason: reason.into(),
            requires_approval: true,
        }
    }

    pub fn is_safe(&self) -> bool {
        self.classification == CommandClass::Safe
    }

    pub fn is_blocked(&self) -> bool {
        self.classification == CommandClass::Blocked
    }
}

/// Allow/block-list classifier for shell commands.
#[derive(Debug, Clone)]
pub struct ShellCommandValidator {
    allowed_commands: Vec<String>,
    blocked_commands: Vec<String>,
}

impl Default for ShellCommandValidator {
    fn default() -> Self {
        Self::new(default_allowed_commands(), default_blocked_commands())
    }
}

impl ShellCommandValidator {
    pub fn new(allowed_commands: Vec<String>, blocked_commands: Vec<String>) -> Self {
        Self {
            allowed_commands,
            blocked_commands,
        }
    }

    /// Classify a shell command.
    ///
    /// Any chaining, redirection, or substitution operator is rejected with
    /// [`SecurityError::DangerousPattern`] before the allow/block lists are
    /// consulted. Otherwise the base program decides the verdict:
    /// - block-listed programs, or allow-listed programs invoked with a
    ///   dangerous subcommand (`git push`, `npm publish`, `find -delete`, ...),
    ///   are `Blocked`;
    /// - allow-listed programs are `Safe`, unless an argument points outside
    ///   the working directory (including `--opt=/abs` values and any `$`
    ///   expansion) or environment assignments are prefixed, which demotes
    ///   them to `Unknown`;
    /// - anything else is `Unknown` and requires approval.
    pub fn validate(&self, command: &str) -> Result<CommandVerdict, SecurityError> {
        if let Some(pattern) = find_dangerous_pattern(command) {
            return Err(SecurityError::DangerousPattern {
                pattern: pattern.escape_debug().to_string(),
            });
        }

        let trimmed = command.trim();
        let cmd_part = skip_env_assignments(trimmed);
        let Some(program) = cmd_part.split_whitespace().next() else {
            return Err(SecurityError::EmptyCommand);
        };
        let base_cmd = program.rsplit('/').next().unwrap_or(program);
        if base_cmd.is_empty() {
            return Err(SecurityError::EmptyCommand);
        }

        if self.blocked_commands.iter().any(|blocked| blocked == base_cmd) {
            return Ok(CommandVerdict::blocked(format!(
                "'{base_cmd}' is on the block list"
            )));
        }

        if !self.allowed_commands.iter().any(|allowed| allowed == base_cmd) {
            return Ok(CommandVerdict::unknown(format!(
                "'{base_cmd}' is not on the allow list"
            )));
        }

        if let Some(reason) = blocked_arguments(base_cmd, cmd_part) {
            return Ok(CommandVerdict::blocked(reason));
        }

        let args: Vec<&str> = cmd_part.split_whitespace().skip(1).collect();
        if let Some(arg) = args.iter().find(|arg| is_path_escape_argument(arg)) {
            return Ok(CommandVerdict::unknown(format!(
                "argument '{arg}' references a path outside the working directory"
            )));
        }

        if cmd_part.len() != trimmed.len() {
            return Ok(CommandVerdict::unknown(
                "environment assignments require approval",
            ));
        }

        Ok(CommandVerdict::safe(format!(
            "'{base_cmd}' is on the allow list"
        )))
    }

    pub fn allowed_commands(&self) -> &[String] {
        &self.allowed_commands
    }

    pub fn blocked_commands(&self) -> &[String] {
        &self.blocked_commands
    }
}

fn find_dangerous_pattern(command: &str) -> Option<&'static str> {
    DANGEROUS_PATTERNS
        .iter()
        .copied()
        .find(|pattern| command.contains(pattern))
}

/// Skip leading environment variable assignments (e.g. `FOO=bar cmd args`).
/// Returns the remainder starting at the first non-assignment word.
fn skip_env_assignments(s: &str) -> &str {
    let mut rest = s;
    loop {
        let Some(word) = rest.split_whitespace().next() else {
            return rest;
        };
        if word.contains('=')
            && word
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        {
            rest = rest[word.len()..].trim_start();
        } else {
            return rest;
        }
    }
}

fn is_path_escape_argument(arg: &str) -> bool {
    let arg = arg.trim_matches(|c| c == '\'' || c == '"');
    // `sh -c` expands variables, so `$HOME/...` lands anywhere
    if arg.contains('$') {
        return true;
    }
    let escapes = |value: &str| {
        value.starts_with('/')
            || value.starts_with('~')
            || value.split('/').any(|part| part == "..")
    };
    escapes(arg)
        || arg
            .split_once('=')
            .is_some_and(|(_, value)| escapes(value.trim_matches(|c| c == '\'' || c == '"')))
}

fn is_git_blocked_option(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    // `-c key=val` and the glued `-ckey=val`
    if word.starts_with("-c") && !word.starts_with("--") {
        return true;
    }
    GIT_BLOCKED_OPTIONS.iter().any(|option| {
        lower == *option
            || lower
                .strip_prefix(option)
                .is_some_and(|rest| rest.starts_with('='))
    })
}

/// Index of the git subcommand, past global options like `--no-pager` or `-C dir`.
fn git_subcommand_index(words: &[&str]) -> usize {
    let mut idx = 0;
    while let Some(word) = words.get(idx) {
        if !word.starts_with('-') {
            break;
        }
        idx += if GIT_OPTIONS_WITH_VALUE.contains(word) { 2 } else { 1 };
    }
    idx
}

fn blocked_arguments(base_cmd: &str, full_segment: &str) -> Option<String> {
    let args = full_segment
        .trim()
        .split_once(char::is_whitespace)
        .map_or("", |(_, rest)| rest.trim_start());

    let words: Vec<&str> = args.split_whitespace().collect();
    let subcommand = words.first().copied().unwrap_or("");

    match base_cmd {
        "git" => {
            let (global, rest) = words.split_at(git_subcommand_index(&words).min(words.len()));
            if let Some(option) = global
                .iter()
                .chain(rest.iter().filter(|w| w.starts_with("--")))
                .find(|w| is_git_blocked_option(w))
            {
                return Some(format!("git option '{option}' can inject code or config"));
            }
            let words = rest;
            let subcommand = words.first().copied().unwrap_or("");
            if matches!(subcommand, "push" | "send-email" | "request-pull") {
                return Some(format!("git {subcommand} sends data off the machine"));
            }
            if subcommand == "credential" {
                return Some("git credential exposes stored secrets".to_string());
            }
            if subcommand == "remote" {
                let sub_action = words.get(1).copied().unwrap_or("");
                if !matches!(sub_action, "" | "-v" | "show" | "get-url") {
                    return Some(format!("git remote {sub_action} mutates remotes"));
                }
            }
            if subcommand == "config" {
                let has_write_flag = words.iter().any(|w| matches!(*w, "--global" | "--system"));
                let config_args = words
                    .iter()
                    .skip(1)
                    .filter(|w| !w.starts_with('-'))
                    .count();
                if has_write_flag || config_args > 1 {
                    return Some("git config writes are not allowed".to_string());
                }
            }
            if subcommand == "submodule" && words.get(1).copied() == Some("add") {
                return Some("git submodule add fetches external code".to_string());
            }
            if words.iter().any(|w| {
                *w == "--upload-pack"
                    || w.starts_with("--upload-pack=")
                    || *w == "--receive-pack"
                    || w.starts_with("--receive-pack=")
            }) {
                return Some("git pack hooks execute arbitrary programs".to_string());
            }
            None
        }
        "npm" => matches!(
            subcommand,
            "publish" | "login" | "adduser" | "owner" | "token" | "access" | "profile"
        )
        .then(|| format!("npm {subcommand} touches registry credentials")),
        "cargo" => matches!(subcommand, "publish" | "login" | "owner" | "yank")
            .then(|| format!("cargo {subcommand} touches registry credentials")),
        "find" => words
            .iter()
            .find(|w| matches!(**w, "-delete" | "-exec" | "-execdir" | "-ok" | "-okdir" | "-fprint"))
            .map(|flag| format!("find {flag} can modify files or run programs")),
        _ => None,
    }
}
