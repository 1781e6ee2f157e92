use std::sync::LazyLock;

use regex::Regex;

use crate::error::SecurityError;

/// Default maximum accepted input length, in characters.
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 10_000;

/// A compiled screening rule.
struct ScreeningRule {
    label: &'static str,
    pattern: Regex,
}

static SCREENING_RULES: LazyLock<Vec<ScreeningRule>> = LazyLock::new(|| {
    let sources: [(&'static str, &str); 5] = [
        (
            "sql_injection",
            r"(?i)\bunion\s+(all\s+)?select\b|\bdrop\s+(table|database)\b|\bdelete\s+from\b|\binsert\s+into\s+\w+|\btruncate\s+table\b|'\s*or\s+'?1'?\s*=\s*'?1|;\s*--",
        ),
        ("script_tag", r"(?i)<\s*script"),
        ("code_evaluation", r"(?i)\b(eval|exec)\s*\("),
        ("path_traversal", r"\.\./|\.\.\\"),
        (
            "dangerous_uri",
            r"(?i)\b(javascript|vbscript)\s*:|data:text/html|file://",
        ),
    ];
    sources
        .into_iter()
        .filter_map(|(label, source)| match Regex::new(source) {
            Ok(pattern) => Some(ScreeningRule { label, pattern }),
            Err(e) => {
                tracing::error!(rule = label, error = %e, "failed to compile input screening rule");
                None
            }
        })
        .collect()
});

/// Screens free-form user input before it enters the conversation.
#[derive(Debug, Clone, Copy)]
pub struct InputSanitizer {
    max_length: usize,
}

impl Default for InputSanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INPUT_LENGTH)
    }
}

impl InputSanitizer {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Reject empty, oversized, or suspicious text; otherwise return the
    /// normalized form.
    pub fn sanitize(&self, text: &str) -> Result<String, SecurityError> {
        if text.trim().is_empty() {
            return Err(SecurityError::EmptyInput);
        }

        let length = text.chars().count();
        if length > self.max_length {
            return Err(SecurityError::InputTooLong {
                length,
                limit: self.max_length,
            });
        }

        if let Some(rule) = SCREENING_RULES.iter().find(|rule| rule.pattern.is_match(text)) {
            tracing::warn!(rule = rule.label, "input rejected by screening rule");
            return Err(SecurityError::SuspiciousInput {
                pattern: rule.label,
            });
        }

        let normalized = normalize(text);
        if normalized.is_empty() {
            return Err(SecurityError::EmptyInput);
        }
        Ok(normalized)
    }
}

/// Unify line endings, drop control characters other than `\n`, collapse
/// runs of spaces/tabs, and trim each line's trailing blanks.
fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut pending_space = false;
    for ch in unified.chars() {
        match ch {
            '\n' => {
                pending_space = false;
                out.push('\n');
            }
            ' ' | '\t' => pending_space = true,
            c if c.is_control() => {}
            c => {
                if pending_space && !out.is_empty() && !out.ends_with('\n') {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            }
        }
    }
    out.trim().to_string()
}
