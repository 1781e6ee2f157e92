use super::message::{Message, Role};
use std::collections::HashSet;

/// Keep the leading system message (if any) plus the most recent
/// `max_pairs * 2` messages.
///
/// Tool messages whose originating assistant call fell outside the kept
/// window are dropped, so the result never starts a turn with an orphaned
/// tool reply. The result has at most `2 * max_pairs + 1` entries and
/// trimming it again is a no-op.
pub fn trim_history(history: &[Message], max_pairs: usize) -> Vec<Message> {
    let (head, rest) = match history.split_first() {
        Some((first, rest)) if first.role == Role::System => (Some(first), rest),
        _ => (None, history),
    };

    let keep = max_pairs.saturating_mul(2);
    let window = &rest[rest.len().saturating_sub(keep)..];

    let mut known_calls: HashSet<&str> = HashSet::new();
    let mut trimmed = Vec::with_capacity(window.len() + 1);
    trimmed.extend(head.cloned());
    for message in window {
        if message.role == Role::Tool {
            let linked = message
                .tool_call_id
                .as_deref()
                .is_some_and(|id| known_calls.contains(id));
            if !linked {
                continue;
            }
        }
        known_calls.extend(message.tool_calls.iter().map(|call| call.id.as_str()));
        trimmed.push(message.clone());
    }
    trimmed
}

/// Bounds conversation history between iterations.
///
/// Trimming only kicks in once the history exceeds 1.5x its target size
/// (`2 * max_pairs + 1`), so a long conversation is trimmed in batches
/// rather than on every turn.
#[derive(Debug, Clone, Copy)]
pub struct MemoryManager {
    max_pairs: usize,
}

impl MemoryManager {
    pub fn new(max_pairs: usize) -> Self {
        Self { max_pairs }
    }

    pub fn max_pairs(&self) -> usize {
        self.max_pairs
    }

    /// Size the history is trimmed back to.
    pub fn target_len(&self) -> usize {
        self.max_pairs.saturating_mul(2).saturating_add(1)
    }

    /// True when `len` exceeds `target_len() * 1.5`.
    pub fn should_trim(&self, len: usize) -> bool {
        len.saturating_mul(2) > self.target_len().saturating_mul(3)
    }

    /// Trim in place when over the threshold. Returns whether anything changed.
    pub fn maybe_trim(&self, history: &mut Vec<Message>) -> bool {
        if !self.should_trim(history.len()) {
            return false;
        }
        let before = history.len();
        *history = trim_history(history, self.max_pairs);
        tracing::debug!(
            before,
            after = history.len(),
            max_pairs = self.max_pairs,
            "trimmed conversation history"
        );
        true
    }
}
