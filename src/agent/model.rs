use super::message::Message;
use crate::tools::ToolSpec;
use async_trait::async_trait;

/// Language-model collaborator.
///
/// Receives the full history and every tool schema; returns the next
/// assistant message, optionally carrying tool calls. Wire format and
/// retries belong to the implementation.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> anyhow::Result<Message>;
}
