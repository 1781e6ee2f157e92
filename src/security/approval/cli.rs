use crate::security::approval::{ApprovalBroker, ApprovalDecision, ApprovalRequest};
use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Prompts on stderr and reads the answer from stdin. Timeouts, read errors
/// and unrecognized answers all deny.
pub struct CliApprovalBroker {
    timeout: Duration,
}

impl CliApprovalBroker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn default_timeout() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl ApprovalBroker for CliApprovalBroker {
    fn request_approval<'a>(
        &'a self,
        request: &'a ApprovalRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApprovalDecision>> + Send + 'a>> {
        Box::pin(async move {
            eprintln!();
            eprintln!("┌─ Tool Approval Required ─────────────────────────");
            eprintln!("│ Tool:    {}", request.tool_name);
            eprintln!("│ Args:    {}", request.args_summary);
            eprintln!("│ Reason:  {}", request.reason);
            eprintln!("├──────────────────────────────────────────────────");
            eprintln!("│ [A]llow for session  Allow [O]nce  [D]eny");
            eprintln!("└──────────────────────────────────────────────────");
            eprint!("  > ");

            let decision = match tokio::time::timeout(self.timeout, read_single_char()).await {
                Ok(Ok(ch)) => parse_choice(ch),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "approval input error; denying");
                    ApprovalDecision::Deny
                }
                Err(_) => {
                    tracing::warn!(tool = %request.tool_name, "approval timed out; denying");
                    ApprovalDecision::Deny
                }
            };
            Ok(decision)
        })
    }
}

fn parse_choice(ch: char) -> ApprovalDecision {
    match ch.to_ascii_lowercase() {
        'a' | 'y' => ApprovalDecision::Allow,
        'o' => ApprovalDecision::AllowOnce,
        _ => ApprovalDecision::Deny,
    }
}

async fn read_single_char() -> Result<char> {
    let ch = tokio::task::spawn_blocking(|| {
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        input
            .trim()
            .chars()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no input received"))
    })
    .await??;
    Ok(ch)
}
