use super::memory::MemoryManager;
use super::message::{Message, Role};
use super::model::ModelClient;
use super::store::ConversationStore;
use crate::config::{Config, EngineConfig};
use crate::error::EngineError;
use crate::security::approval::grant_key;
use crate::security::{
    ApprovalBroker, ApprovalDecision, ApprovalManager, ApprovalRequest, Disposition,
    InputSanitizer, RateLimiter,
};
use crate::tools::{self, KnowledgeBase, ToolCall, ToolRegistry, ToolResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// ── Settings & shared context ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_tool_rounds: usize,
    pub max_pairs: usize,
    /// Tools whose payload is echoed back as a user message after the
    /// regular tool reply.
    pub raw_content_tools: HashSet<String>,
    pub system_prompt: String,
}

impl EngineSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_tool_rounds: config.max_tool_rounds,
            max_pairs: config.max_pairs,
            raw_content_tools: config.raw_content_tools.iter().cloned().collect(),
            system_prompt: config.system_prompt.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Collaborators shared by every conversation. Owned by the caller and
/// handed to engines behind an `Arc`.
pub struct EngineContext {
    pub model: Arc<dyn ModelClient>,
    pub registry: Arc<ToolRegistry>,
    pub approvals: Arc<ApprovalManager>,
    pub store: Arc<dyn ConversationStore>,
    pub sanitizer: InputSanitizer,
    /// Guards `run_iteration` when set.
    pub iteration_limiter: Option<RateLimiter>,
    /// Asked in-process for confirmations. Without one, iterations suspend.
    pub broker: Option<Arc<dyn ApprovalBroker>>,
    pub settings: EngineSettings,
}

impl EngineContext {
    pub fn new(
        model: Arc<dyn ModelClient>,
        registry: Arc<ToolRegistry>,
        approvals: Arc<ApprovalManager>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            model,
            registry,
            approvals,
            store,
            sanitizer: InputSanitizer::default(),
            iteration_limiter: None,
            broker: None,
            settings: EngineSettings::default(),
        }
    }

    /// Wire the builtin registry, persisted approval rules, input limits and
    /// the optional iteration limiter from `config`.
    pub fn from_config(
        config: &Config,
        model: Arc<dyn ModelClient>,
        store: Arc<dyn ConversationStore>,
        knowledge: Option<Arc<dyn KnowledgeBase>>,
    ) -> anyhow::Result<Self> {
        let exec = Arc::new(tools::execution_context(config)?);
        let registry = Arc::new(tools::default_registry(config, exec, knowledge)?);
        let approvals = Arc::new(ApprovalManager::load(
            config.approvals_path(),
            tools::command_validator(config),
            config.security.read_only_tools.clone(),
        ));

        let mut ctx = Self::new(model, registry, approvals, store)
            .with_sanitizer(InputSanitizer::new(config.security.max_input_length))
            .with_settings(EngineSettings::from_config(&config.engine));
        if config.rate_limit.iterations_max_calls > 0 {
            ctx = ctx.with_iteration_limiter(RateLimiter::new(
                "iterations",
                config.rate_limit.iterations_max_calls,
                Duration::from_secs(config.rate_limit.iterations_period_secs),
            ));
        }
        Ok(ctx)
    }

    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_sanitizer(mut self, sanitizer: InputSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    #[must_use]
    pub fn with_iteration_limiter(mut self, limiter: RateLimiter) -> Self {
        self.iteration_limiter = Some(limiter);
        self
    }

    #[must_use]
    pub fn with_broker(mut self, broker: Arc<dyn ApprovalBroker>) -> Self {
        self.broker = Some(broker);
        self
    }
}

// ── Public result types ──────────────────────────────────────────────────────

/// Why an iteration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    /// The model answered without requesting tools.
    Completed,
    /// The round cap was reached while the model still wanted tools.
    MaxRounds,
}

/// What happened to one requested tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CallOutcome {
    Executed,
    Blocked,
    Denied,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub tool_name: String,
    pub args: serde_json::Map<String, Value>,
    pub result: ToolResult,
    pub outcome: CallOutcome,
    /// 1-based model round that requested the call.
    pub round: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IterationReport {
    pub final_text: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub rounds: usize,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone)]
pub enum IterationOutcome {
    Completed(IterationReport),
    /// A call needs a human decision; continue with
    /// [`ConversationEngine::resume`] and this token.
    PendingApproval {
        token: String,
        request: ApprovalRequest,
    },
}

impl IterationOutcome {
    pub fn report(&self) -> Option<&IterationReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::PendingApproval { .. } => None,
        }
    }

    pub fn pending_token(&self) -> Option<&str> {
        match self {
            Self::Completed(_) => None,
            Self::PendingApproval { token, .. } => Some(token),
        }
    }
}

// ── Conversation state ───────────────────────────────────────────────────────

/// Bookkeeping for the iteration in flight.
#[derive(Debug, Clone)]
struct IterationProgress {
    /// History length before the user turn; restored when the model fails.
    checkpoint: usize,
    rounds: usize,
    records: Vec<ToolCallRecord>,
    /// Raw-content user turns held back until the batch's tool replies are in.
    raw_echoes: Vec<Message>,
}

#[derive(Debug, Clone)]
struct SuspendedIteration {
    token: String,
    progress: IterationProgress,
    /// Front entry is the call awaiting the decision.
    remaining: VecDeque<ToolCall>,
    request: ApprovalRequest,
}

#[derive(Debug, Clone)]
pub struct ConversationState {
    pub session_id: String,
    pub messages: Vec<Message>,
    /// Grants from `Allow` decisions, keyed by [`grant_key`].
    session_grants: HashSet<String>,
    suspended: Option<SuspendedIteration>,
}

impl ConversationState {
    pub fn new(session_id: impl Into<String>, system_prompt: &str) -> Self {
        Self {
            session_id: session_id.into(),
            messages: vec![Message::system(system_prompt)],
            session_grants: HashSet::new(),
            suspended: None,
        }
    }

    pub fn is_awaiting_approval(&self) -> bool {
        self.suspended.is_some()
    }

    pub fn pending_request(&self) -> Option<&ApprovalRequest> {
        self.suspended.as_ref().map(|s| &s.request)
    }

    pub fn has_grant(&self, key: &str) -> bool {
        self.session_grants.contains(key)
    }
}

enum Gate {
    Run,
    Reject { reason: String, outcome: CallOutcome },
    Suspend { reason: String },
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// Drives one conversation: model calls, gated tool dispatch, history
/// trimming and persistence.
pub struct ConversationEngine {
    ctx: Arc<EngineContext>,
    memory: MemoryManager,
    state: ConversationState,
}

impl ConversationEngine {
    /// Start a fresh conversation seeded with the configured system prompt.
    pub fn new(ctx: Arc<EngineContext>, session_id: impl Into<String>) -> Self {
        let state = ConversationState::new(session_id, &ctx.settings.system_prompt);
        let memory = MemoryManager::new(ctx.settings.max_pairs);
        Self { ctx, memory, state }
    }

    /// Resume a stored conversation, or start a fresh one if none exists.
    pub async fn open(
        ctx: Arc<EngineContext>,
        session_id: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let mut engine = Self::new(ctx, session_id);
        let stored = engine
            .ctx
            .store
            .load(&engine.state.session_id)
            .await
            .map_err(EngineError::Persistence)?;
        if let Some(mut messages) = stored.filter(|m| !m.is_empty()) {
            if messages[0].role != Role::System {
                messages.insert(0, Message::system(&engine.ctx.settings.system_prompt));
            }
            tracing::debug!(
                session = %engine.state.session_id,
                messages = messages.len(),
                "conversation restored"
            );
            engine.state.messages = messages;
        }
        Ok(engine)
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn history(&self) -> &[Message] {
        &self.state.messages
    }

    pub fn session_id(&self) -> &str {
        &self.state.session_id
    }

    /// Process one user turn to completion or suspension.
    pub async fn run_iteration(&mut self, input: &str) -> Result<IterationOutcome, EngineError> {
        if let Some(suspended) = &self.state.suspended {
            return Err(EngineError::ApprovalPending {
                token: suspended.token.clone(),
            });
        }

        let text = self.ctx.sanitizer.sanitize(input)?;
        if let Some(limiter) = &self.ctx.iteration_limiter {
            limiter.check()?;
        }

        let progress = IterationProgress {
            checkpoint: self.state.messages.len(),
            rounds: 0,
            records: Vec::new(),
            raw_echoes: Vec::new(),
        };
        self.state.messages.push(Message::user(text));
        tracing::info!(session = %self.state.session_id, "iteration started");

        self.drive(progress, VecDeque::new()).await
    }

    /// Continue a suspended iteration with a human decision.
    pub async fn resume(
        &mut self,
        token: &str,
        decision: ApprovalDecision,
    ) -> Result<IterationOutcome, EngineError> {
        let Some(mut suspended) = self.state.suspended.take_if(|s| s.token == token) else {
            return Err(EngineError::UnknownApprovalToken {
                token: token.to_string(),
            });
        };
        let Some(call) = suspended.remaining.pop_front() else {
            return self.drive(suspended.progress, suspended.remaining).await;
        };

        tracing::info!(
            session = %self.state.session_id,
            tool = %call.name,
            %decision,
            "approval decision received"
        );
        let mut progress = suspended.progress;
        match self.apply_decision(&call, decision) {
            None => self.execute_call(&call, &mut progress).await,
            Some(reason) => {
                self.record(&call, ToolResult::error(reason), CallOutcome::Denied, &mut progress);
            }
        }
        self.drive(progress, suspended.remaining).await
    }

    async fn drive(
        &mut self,
        mut progress: IterationProgress,
        mut pending: VecDeque<ToolCall>,
    ) -> Result<IterationOutcome, EngineError> {
        let ctx = Arc::clone(&self.ctx);
        let tools = ctx.registry.get_definitions();

        loop {
            while let Some(call) = pending.pop_front() {
                match self.gate(&call).await {
                    Gate::Run => self.execute_call(&call, &mut progress).await,
                    Gate::Reject { reason, outcome } => {
                        self.record(&call, ToolResult::error(reason), outcome, &mut progress);
                    }
                    Gate::Suspend { reason } => {
                        let token = Uuid::new_v4().to_string();
                        let request = ApprovalRequest::new(&call.name, &call.args, reason);
                        tracing::info!(
                            session = %self.state.session_id,
                            tool = %call.name,
                            %token,
                            "iteration suspended awaiting approval"
                        );
                        pending.push_front(call);
                        self.state.suspended = Some(SuspendedIteration {
                            token: token.clone(),
                            progress,
                            remaining: pending,
                            request: request.clone(),
                        });
                        return Ok(IterationOutcome::PendingApproval { token, request });
                    }
                }
            }
            self.state.messages.append(&mut progress.raw_echoes);

            if progress.rounds >= ctx.settings.max_tool_rounds {
                let notice = format!(
                    "Stopped after {} tool rounds without a final answer.",
                    progress.rounds
                );
                tracing::warn!(
                    session = %self.state.session_id,
                    rounds = progress.rounds,
                    "tool round limit reached"
                );
                self.state.messages.push(Message::assistant(notice.clone()));
                return self.finish(progress, notice, StopReason::MaxRounds).await;
            }

            let reply = match ctx.model.invoke(&self.state.messages, &tools).await {
                Ok(reply) => reply,
                Err(error) => {
                    self.state.messages.truncate(progress.checkpoint);
                    tracing::warn!(
                        session = %self.state.session_id,
                        error = %error,
                        "model invocation failed; history rolled back"
                    );
                    return Err(EngineError::Model(error));
                }
            };
            progress.rounds += 1;

            let reply = normalize_reply(reply);
            if !reply.has_tool_calls() {
                let final_text = reply.content.clone();
                self.state.messages.push(reply);
                return self.finish(progress, final_text, StopReason::Completed).await;
            }

            tracing::debug!(
                round = progress.rounds,
                calls = reply.tool_calls.len(),
                "model requested tools"
            );
            pending.extend(reply.tool_calls.iter().cloned());
            self.state.messages.push(reply);
        }
    }

    async fn gate(&mut self, call: &ToolCall) -> Gate {
        let disposition = self
            .ctx
            .approvals
            .disposition(&call.name, &call.args, call.risk_hint);

        match disposition {
            Disposition::Execute => Gate::Run,
            Disposition::Block { reason } => {
                tracing::info!(tool = %call.name, %reason, "tool call blocked");
                Gate::Reject {
                    reason,
                    outcome: CallOutcome::Blocked,
                }
            }
            Disposition::Confirm { reason } => {
                if self.state.has_grant(&grant_key(&call.name, &call.args)) {
                    tracing::debug!(tool = %call.name, "covered by session grant");
                    return Gate::Run;
                }
                let Some(broker) = self.ctx.broker.clone() else {
                    return Gate::Suspend { reason };
                };

                let request = ApprovalRequest::new(&call.name, &call.args, reason);
                let decision = match broker.request_approval(&request).await {
                    Ok(decision) => decision,
                    Err(error) => {
                        tracing::warn!(tool = %call.name, error = %error, "approval broker failed; denying");
                        ApprovalDecision::Deny
                    }
                };
                tracing::info!(tool = %call.name, %decision, "approval decision");
                match self.apply_decision(call, decision) {
                    None => Gate::Run,
                    Some(reason) => Gate::Reject {
                        reason,
                        outcome: CallOutcome::Denied,
                    },
                }
            }
        }
    }

    /// Returns the denial reason, or `None` when the call may run.
    fn apply_decision(&mut self, call: &ToolCall, decision: ApprovalDecision) -> Option<String> {
        match decision {
            ApprovalDecision::Allow => {
                self.state
                    .session_grants
                    .insert(grant_key(&call.name, &call.args));
                None
            }
            ApprovalDecision::AllowOnce => None,
            ApprovalDecision::Deny => Some(format!(
                "Tool call '{}' was denied by the user",
                call.name
            )),
        }
    }

    async fn execute_call(&mut self, call: &ToolCall, progress: &mut IterationProgress) {
        let result = self
            .ctx
            .registry
            .execute(&call.name, call.args.clone())
            .await;
        self.record(call, result, CallOutcome::Executed, progress);
    }

    fn record(
        &mut self,
        call: &ToolCall,
        result: ToolResult,
        outcome: CallOutcome,
        progress: &mut IterationProgress,
    ) {
        self.state
            .messages
            .push(Message::tool(&call.id, result.to_json_string()));

        if outcome == CallOutcome::Executed
            && result.is_success()
            && self.ctx.settings.raw_content_tools.contains(&call.name)
        {
            let payload = match result.get("content") {
                Some(Value::String(content)) => content.clone(),
                _ => result.to_json_string(),
            };
            progress.raw_echoes.push(Message::user(payload));
        }

        progress.records.push(ToolCallRecord {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            args: call.args.clone(),
            result,
            outcome,
            round: progress.rounds,
        });
    }

    async fn finish(
        &mut self,
        progress: IterationProgress,
        final_text: String,
        stop_reason: StopReason,
    ) -> Result<IterationOutcome, EngineError> {
        self.memory.maybe_trim(&mut self.state.messages);
        self.ctx
            .store
            .save(&self.state.session_id, &self.state.messages)
            .await
            .map_err(EngineError::Persistence)?;

        tracing::info!(
            session = %self.state.session_id,
            rounds = progress.rounds,
            tool_calls = progress.records.len(),
            %stop_reason,
            "iteration finished"
        );
        Ok(IterationOutcome::Completed(IterationReport {
            final_text,
            tool_calls: progress.records,
            rounds: progress.rounds,
            stop_reason,
        }))
    }
}

/// Force the assistant role and give every call a unique, non-empty id.
fn normalize_reply(mut reply: Message) -> Message {
    reply.role = Role::Assistant;
    reply.tool_call_id = None;
    let mut seen = HashSet::new();
    for call in &mut reply.tool_calls {
        if call.id.trim().is_empty() || !seen.insert(call.id.clone()) {
            call.id = format!("call_{}", Uuid::new_v4().simple());
            seen.insert(call.id.clone());
        }
    }
    reply
}
