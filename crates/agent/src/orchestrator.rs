//! The research loop.
//!
//! One [`ResearchLoop::run`] call serves one question:
//!
//! 1. **Build** the transcript: system prompt (+ recalled memories),
//!    history window, the question
//! 2. **Check** for a stuck loop and inject a correction when needed
//! 3. **Compact** the transcript into a view that fits the context budget
//! 4. **Call** the model
//! 5. **If tool calls**: execute them, append one result per request, loop
//! 6. **If text**: scrub it, enforce research completeness, append the
//!    bibliography and deliver it
//!
//! Every path ends in a [`LoopOutcome`]; failures reach the user as text.

use std::sync::Arc;

use asklab_config::AppConfig;
use asklab_core::channel::{ProgressEvent, RequestContext};
use asklab_core::error::{MemoryError, ProviderError};
use asklab_core::event::{DomainEvent, EventBus};
use asklab_core::memory::{MemoryBackend, MemoryEntry, MemoryQuery};
use asklab_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use asklab_core::session::SessionStore;
use asklab_core::text::prefix_chars;
use asklab_core::turn::{ConversationId, Turn};
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::citations::Source;
use crate::compactor::{CORRECTION, ContextCompactor, TrimLevel};
use crate::executor::ToolExecutor;
use crate::output::{CHUNK_LIMIT, chunk_message};
use crate::policy::{KeywordResearchPolicy, ResearchNeed, ResearchPolicy};
use crate::profile::ModelProfile;
use crate::prompt::{system_prompt, with_recalled};
use crate::state::{LoopPhase, OrchestrationState};
use crate::stuck::{StuckDetector, correction};
use crate::thought::{extract_reasoning, recover_synthesis, scrub};

pub const ABORT_MESSAGE: &str =
    "I couldn't complete the research within the iteration limit. Please try rephrasing your question.";

pub const FAILURE_MESSAGE: &str = "I ran into a problem reaching the language model. Please try again.";

/// Used when the model keeps answering with nothing near the end of the budget.
pub const APOLOGY_MESSAGE: &str = "I apologize, but I wasn't able to find a clear answer.";

pub const FINAL_ANSWER_NUDGE: &str = "Provide your final answer now, with citations.";

/// Iterations at the end of the budget in which the loop stops asking
/// for more research.
const GRACE_ITERATIONS: u32 = 2;

/// Characters of the answer kept in the session history.
const HISTORY_ANSWER_CHARS: usize = 400;

/// Characters of the answer stored in long-term memory.
const MEMORY_ANSWER_CHARS: usize = 1500;

/// Shorter answers are not worth remembering.
const MEMORY_MIN_ANSWER_CHARS: usize = 50;

/// Tunables of a research loop.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub max_iterations: u32,
    /// Prior conversation turns included in the transcript
    pub history_turns: usize,
    pub min_pages: usize,
    pub char_budget: usize,
    pub tool_result_cap: usize,
    pub recall_limit: usize,
    pub profile: ModelProfile,
}

impl LoopSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
            max_iterations: config.agent.max_iterations,
            history_turns: config.agent.history_turns,
            min_pages: config.agent.min_pages,
            char_budget: config.context.char_budget,
            tool_result_cap: config.context.tool_result_cap,
            recall_limit: config.memory.recall_limit,
            profile: ModelProfile::detect(&config.model, config.agent.profile),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// How a loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    Finalized,
    Aborted,
    Failed,
    Cancelled,
}

impl LoopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finalized => "finalized",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    fn phase(&self) -> LoopPhase {
        match self {
            Self::Finalized => LoopPhase::Finalized,
            Self::Aborted => LoopPhase::Aborted,
            Self::Failed => LoopPhase::Failed,
            Self::Cancelled => LoopPhase::Cancelled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub status: LoopStatus,
    /// Text delivered to the user, if any
    pub answer: Option<String>,
    pub iterations: u32,
    pub sources: Vec<Source>,
    pub tool_results: usize,
    pub last_trim: TrimLevel,
}

/// Reachability of the long-term memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryStatus {
    Disabled,
    Connected { backend: String },
    Unreachable { backend: String, reason: String },
}

impl std::fmt::Display for MemoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "❌ Long-term memory is not enabled."),
            Self::Connected { backend } => write!(f, "✅ Memory ({backend}) is enabled and connected."),
            Self::Unreachable { backend, reason } => {
                write!(f, "❌ Cannot connect to memory ({backend}): {reason}")
            }
        }
    }
}

/// Result of one guarded model call.
enum ModelCall {
    Response(ProviderResponse),
    Failed(ProviderError),
    Cancelled,
}

pub struct ResearchLoop {
    provider: Arc<dyn Provider>,
    executor: ToolExecutor,
    sessions: Arc<dyn SessionStore>,
    memory: Option<Arc<dyn MemoryBackend>>,
    policy: Arc<dyn ResearchPolicy>,
    event_bus: Arc<EventBus>,
    compactor: ContextCompactor,
    detector: StuckDetector,
    settings: LoopSettings,
}

impl ResearchLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        executor: ToolExecutor,
        sessions: Arc<dyn SessionStore>,
        settings: LoopSettings,
    ) -> Self {
        let compactor = ContextCompactor::new(
            settings.profile.trim_bands(),
            settings.tool_result_cap,
            settings.max_iterations,
        );
        Self {
            provider,
            executor,
            sessions,
            memory: None,
            policy: Arc::new(KeywordResearchPolicy::new(settings.min_pages)),
            event_bus: Arc::new(EventBus::default()),
            compactor,
            detector: StuckDetector::new(settings.profile.stuck_thresholds()),
            settings,
        }
    }

    /// Attach a memory backend for recall and post-answer writes.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryBackend>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn ResearchPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = bus;
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Answer later questions with another model.
    ///
    /// Trim bands and stuck thresholds follow the new profile.
    pub fn switch_model(&mut self, model: impl Into<String>, profile: ModelProfile) {
        self.settings.model = model.into();
        self.settings.profile = profile;
        self.compactor = ContextCompactor::new(
            profile.trim_bands(),
            self.settings.tool_result_cap,
            self.settings.max_iterations,
        );
        self.detector = StuckDetector::new(profile.stuck_thresholds());
        info!(model = %self.settings.model, profile = profile.as_str(), "Model switched");
    }

    /// Forget the stored history of one conversation.
    pub async fn reset(&self, conversation: &ConversationId) -> Result<(), MemoryError> {
        self.sessions.clear(conversation).await?;
        info!(conversation_id = %conversation, "Conversation history cleared");
        Ok(())
    }

    pub async fn memory_status(&self) -> MemoryStatus {
        let Some(memory) = &self.memory else {
            return MemoryStatus::Disabled;
        };
        let backend = memory.name().to_string();
        match memory.health_check().await {
            Ok(()) => MemoryStatus::Connected { backend },
            Err(e) => {
                warn!(backend = %backend, error = %e, "Memory health check failed");
                MemoryStatus::Unreachable {
                    backend,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Whether the model provider answers at all.
    pub async fn ping(&self) -> Result<bool, ProviderError> {
        self.provider.health_check().await
    }

    /// Answer one question.
    pub async fn run(&self, ctx: &RequestContext, question: &str) -> LoopOutcome {
        info!(
            conversation_id = %ctx.conversation_id,
            sender = %ctx.sender_id,
            model = %self.settings.model,
            "Research started"
        );
        self.event_bus.publish(DomainEvent::QuestionReceived {
            conversation_id: ctx.conversation_id.to_string(),
            sender_id: ctx.sender_id.clone(),
            content_preview: prefix_chars(question, 100).to_string(),
            timestamp: Utc::now(),
        });

        let need = self.policy.assess(question);
        let mut state = OrchestrationState::new(self.settings.max_iterations);
        let mut transcript = self.initial_turns(ctx, question, need).await;
        let tools = self.executor.definitions();

        let (status, answer) = loop {
            if ctx.cancel.is_cancelled() {
                break (LoopStatus::Cancelled, None);
            }
            if state.iteration >= self.settings.max_iterations {
                warn!(
                    conversation_id = %ctx.conversation_id,
                    iterations = state.iteration,
                    "Iteration budget exhausted"
                );
                self.send(ctx, ABORT_MESSAGE).await;
                break (LoopStatus::Aborted, Some(ABORT_MESSAGE.to_string()));
            }

            state.iteration += 1;
            state.phase = LoopPhase::AwaitingModel;
            debug!(conversation_id = %ctx.conversation_id, iteration = state.iteration, "Research iteration");

            if state.iteration >= 2 {
                self.check_stuck(ctx, &mut state, &mut transcript);
            }

            let compaction = self
                .compactor
                .compact(&transcript, state.iteration, self.settings.char_budget);
            if compaction.level != state.last_trim {
                debug!(level = %compaction.level, iteration = state.iteration, "Trim level changed");
            }
            state.last_trim = compaction.level;
            if compaction.dropped > 0 {
                self.event_bus.publish(DomainEvent::ContextCompacted {
                    conversation_id: ctx.conversation_id.to_string(),
                    level: compaction.level.to_string(),
                    turns_dropped: compaction.dropped,
                    timestamp: Utc::now(),
                });
            }

            let response = match self.call_model(ctx, compaction.turns, &tools).await {
                ModelCall::Response(response) => response,
                ModelCall::Failed(ProviderError::ContextOverflow(reason)) => {
                    warn!(conversation_id = %ctx.conversation_id, %reason, "Context overflow, retrying with emergency compaction");
                    notify(ctx, ProgressEvent::Retrying { attempt: 2 }).await;
                    let emergency = self.compactor.compact_at(
                        &transcript,
                        state.iteration,
                        self.settings.char_budget / 2,
                        TrimLevel::Emergency,
                    );
                    state.last_trim = TrimLevel::Emergency;
                    match self.call_model(ctx, emergency.turns, &tools).await {
                        ModelCall::Response(response) => response,
                        ModelCall::Cancelled => break (LoopStatus::Cancelled, None),
                        ModelCall::Failed(e) => break self.fail(ctx, &e).await,
                    }
                }
                ModelCall::Failed(e) => break self.fail(ctx, &e).await,
                ModelCall::Cancelled => break (LoopStatus::Cancelled, None),
            };

            self.event_bus.publish(DomainEvent::ResponseGenerated {
                conversation_id: ctx.conversation_id.to_string(),
                model: response.model.clone(),
                tokens_used: response.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0),
                tool_calls: response.turn.tool_calls.len(),
                timestamp: Utc::now(),
            });

            let turn = response.turn;
            let has_calls = turn.has_tool_calls();
            state.record_thought(&turn.content, has_calls);
            let reasoning = extract_reasoning(&turn.content);
            if let Some(excerpt) = &reasoning {
                notify(ctx, ProgressEvent::Thinking { excerpt: prefix_chars(excerpt, 200).to_string() }).await;
            }

            if has_calls {
                state.phase = LoopPhase::DispatchingTools;
                let calls = turn.tool_calls.clone();
                transcript.push(turn);
                for call in &calls {
                    let result = self.executor.execute(call, ctx, &mut state.ledger).await;
                    transcript.push(Turn::tool_result(&call.id, result.output));
                    state.record_tool_result();
                }
                continue;
            }

            let mut candidate = scrub(&turn.content);
            if candidate.is_empty() {
                if let Some(recovered) = reasoning.as_deref().and_then(recover_synthesis) {
                    debug!(conversation_id = %ctx.conversation_id, "Recovered answer from reasoning");
                    candidate = scrub(&recovered);
                }
            }
            transcript.push(turn);

            if candidate.is_empty() {
                if state.remaining_iterations() < GRACE_ITERATIONS {
                    candidate = APOLOGY_MESSAGE.to_string();
                } else {
                    transcript.push(Turn::synthetic(CORRECTION, FINAL_ANSWER_NUDGE));
                    continue;
                }
            }

            let missing = need.min_pages().saturating_sub(state.ledger.pages_read());
            if missing > 0 && state.remaining_iterations() > GRACE_ITERATIONS {
                debug!(
                    conversation_id = %ctx.conversation_id,
                    pages_read = state.ledger.pages_read(),
                    missing,
                    "Answer held back until more pages are read"
                );
                transcript.push(Turn::synthetic(
                    CORRECTION,
                    format!("Read {missing} more page(s) before answering."),
                ));
                continue;
            }

            let answer = state.ledger.sources.append_to(&candidate);
            self.finalize(ctx, question, &answer, &state).await;
            break (LoopStatus::Finalized, Some(answer));
        };

        state.phase = status.phase();
        info!(
            conversation_id = %ctx.conversation_id,
            status = status.as_str(),
            iterations = state.iteration,
            tool_results = state.tool_results,
            pages_read = state.ledger.pages_read(),
            "Research finished"
        );
        self.event_bus.publish(DomainEvent::LoopFinished {
            conversation_id: ctx.conversation_id.to_string(),
            status: status.as_str().to_string(),
            iterations: state.iteration,
            timestamp: Utc::now(),
        });

        LoopOutcome {
            status,
            answer,
            iterations: state.iteration,
            sources: state.ledger.sources.iter().cloned().collect(),
            tool_results: state.tool_results,
            last_trim: state.last_trim,
        }
    }

    /// System prompt with recalled memories, the history window and the question.
    async fn initial_turns(&self, ctx: &RequestContext, question: &str, need: ResearchNeed) -> Vec<Turn> {
        let pages = need.min_pages().max(self.settings.min_pages);
        let base = system_prompt(self.settings.profile, pages, self.executor.memory_enabled());
        let recalled = self.recall(ctx, question).await;
        let mut turns = vec![Turn::system(with_recalled(&base, &recalled))];

        match self.sessions.get(&ctx.conversation_id).await {
            Ok(history) => {
                let skip = history.len().saturating_sub(self.settings.history_turns);
                turns.extend(history.into_iter().skip(skip));
            }
            Err(e) => warn!(conversation_id = %ctx.conversation_id, error = %e, "History unavailable"),
        }

        turns.push(Turn::user(question));
        turns
    }

    async fn recall(&self, ctx: &RequestContext, question: &str) -> Vec<MemoryEntry> {
        let Some(memory) = &self.memory else {
            return vec![];
        };
        let query = MemoryQuery::scoped(question, ctx.sender_id.as_str(), self.settings.recall_limit);
        match memory.search(query).await {
            Ok(entries) => {
                if !entries.is_empty() {
                    debug!(count = entries.len(), "Recalled memories for context");
                }
                entries
            }
            Err(e) => {
                warn!("Memory recall failed: {e}");
                vec![]
            }
        }
    }

    fn check_stuck(&self, ctx: &RequestContext, state: &mut OrchestrationState, transcript: &mut Vec<Turn>) {
        let Some(reason) = self.detector.check(state) else {
            return;
        };
        state.corrections += 1;
        warn!(
            conversation_id = %ctx.conversation_id,
            iteration = state.iteration,
            %reason,
            corrections = state.corrections,
            "Stuck loop detected"
        );
        self.event_bus.publish(DomainEvent::StuckLoopDetected {
            conversation_id: ctx.conversation_id.to_string(),
            reason: reason.to_string(),
            iteration: state.iteration,
            timestamp: Utc::now(),
        });
        let text = correction(reason, state.corrections, state.remaining_iterations());
        transcript.push(Turn::synthetic(CORRECTION, text));
    }

    async fn call_model(&self, ctx: &RequestContext, turns: Vec<Turn>, tools: &[ToolDefinition]) -> ModelCall {
        let request = ProviderRequest {
            model: self.settings.model.clone(),
            turns,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            tools: tools.to_vec(),
        };

        tokio::select! {
            _ = ctx.cancel.cancelled() => ModelCall::Cancelled,
            result = self.provider.complete(request) => match result {
                Ok(response) => ModelCall::Response(response),
                Err(e) => ModelCall::Failed(e),
            },
        }
    }

    async fn fail(&self, ctx: &RequestContext, e: &ProviderError) -> (LoopStatus, Option<String>) {
        error!(conversation_id = %ctx.conversation_id, error = %e, "Model call failed");
        self.event_bus.publish(DomainEvent::ErrorOccurred {
            context: format!("model call for {}", ctx.conversation_id),
            error_message: e.to_string(),
            timestamp: Utc::now(),
        });
        self.send(ctx, FAILURE_MESSAGE).await;
        (LoopStatus::Failed, Some(FAILURE_MESSAGE.to_string()))
    }

    /// Persist the exchange, schedule the memory write and deliver the answer.
    async fn finalize(&self, ctx: &RequestContext, question: &str, answer: &str, state: &OrchestrationState) {
        let exchange = vec![
            Turn::user(question),
            Turn::assistant(prefix_chars(answer, HISTORY_ANSWER_CHARS)),
        ];
        if let Err(e) = self.sessions.append(&ctx.conversation_id, exchange).await {
            warn!(conversation_id = %ctx.conversation_id, error = %e, "Failed to store history");
        }

        self.spawn_memory_write(ctx, question, answer, state.ledger.sources.len());

        for chunk in chunk_message(answer, CHUNK_LIMIT) {
            self.send(ctx, &chunk).await;
        }
    }

    /// Fire-and-forget write of the exchange to long-term memory.
    fn spawn_memory_write(&self, ctx: &RequestContext, question: &str, answer: &str, sources: usize) {
        let Some(memory) = self.memory.clone() else {
            return;
        };
        if answer.chars().count() <= MEMORY_MIN_ANSWER_CHARS {
            return;
        }

        let mut entry = MemoryEntry::new(
            format!("User: {question}\n\nAssistant: {}", prefix_chars(answer, MEMORY_ANSWER_CHARS)),
            Some(ctx.sender_id.clone()),
        );
        let kind = if sources > 0 { "research_qa" } else { "conversation" };
        entry.metadata.insert("model".into(), self.settings.model.clone().into());
        entry.metadata.insert("type".into(), kind.into());
        entry
            .metadata
            .insert("conversation_id".into(), ctx.conversation_id.to_string().into());
        entry.metadata.insert("sources_count".into(), sources.into());

        let bus = self.event_bus.clone();
        tokio::spawn(async move {
            match memory.store(entry).await {
                Ok(id) => debug!(memory_id = %id, "Saved exchange to memory"),
                Err(e) => {
                    warn!("Failed to save exchange to memory: {e}");
                    bus.publish(DomainEvent::ErrorOccurred {
                        context: "memory write".into(),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
        });
    }

    async fn send(&self, ctx: &RequestContext, text: &str) {
        if let Err(e) = ctx.sink.send(text).await {
            warn!(conversation_id = %ctx.conversation_id, error = %e, "Failed to deliver message");
        }
    }
}

async fn notify(ctx: &RequestContext, event: ProgressEvent) {
    if let Err(e) = ctx.sink.progress(&event).await {
        debug!(error = %e, "Progress update not delivered");
    }
}
