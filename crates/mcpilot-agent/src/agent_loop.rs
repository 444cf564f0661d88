//! Agent loop — the streaming LLM ↔ tool-calling loop for one user turn.
//!
//! Each iteration runs the compaction guard, advertises the registry's
//! visible operations, streams one model reply, and dispatches its tool
//! calls in order. A reply without tool calls ends the turn.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use mcpilot_core::hooks::TurnObserver;
use mcpilot_core::types::{Message, StreamDelta, ToolDefinition};
use mcpilot_core::AgentError;
use mcpilot_providers::traits::{LlmProvider, LlmRequestConfig};

use crate::compaction::{transcript_chars, CompactionOutcome, Compactor};
use crate::registry::{parse_arguments, SkillRegistry};
use crate::stream::StreamAssembler;

/// Default maximum tool round-trips per user turn.
pub const DEFAULT_MAX_ITERATIONS: u32 = 1000;

/// How a turn ended.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    /// The model answered without requesting tools.
    Answer { content: String, reasoning: String },
    /// The turn was stopped after this many tool round-trips.
    IterationLimit { iterations: u32 },
}

// ─────────────────────────────────────────────
// AgentLoop
// ─────────────────────────────────────────────

/// One conversation: transcript, skills, and the model driving them.
pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    registry: SkillRegistry,
    compactor: Compactor,
    transcript: Vec<Message>,
    model: String,
    max_iterations: u32,
    request_config: LlmRequestConfig,
    observers: Vec<Box<dyn TurnObserver>>,
}

impl AgentLoop {
    /// Create a loop using the provider's default model.
    pub fn new(provider: Arc<dyn LlmProvider>, registry: SkillRegistry, compactor: Compactor) -> Self {
        let model = provider.default_model().to_string();
        Self {
            provider,
            registry,
            compactor,
            transcript: Vec::new(),
            model,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            request_config: LlmRequestConfig::default(),
            observers: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_request_config(mut self, config: LlmRequestConfig) -> Self {
        self.request_config = config;
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn TurnObserver>) {
        self.observers.push(observer);
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SkillRegistry {
        &mut self.registry
    }

    /// Begin a conversation with `system_prompt`, discarding any previous one.
    pub fn start(&mut self, system_prompt: impl Into<String>) {
        self.transcript.clear();
        self.append(Message::system(system_prompt));
        info!(model = %self.model, skills = self.registry.len(), "Conversation started");
    }

    /// Drive one user turn to completion.
    ///
    /// Provider failures end the turn with `Err`; the transcript keeps every
    /// message appended before the failure. Tool failures are fed back to the
    /// model as tool results.
    pub async fn run_turn(&mut self, input: &str) -> Result<TurnOutcome, AgentError> {
        if !self.transcript.first().is_some_and(Message::is_system) {
            return Err(AgentError::NotStarted);
        }
        self.append(Message::user(input));

        let mut iterations: u32 = 0;
        loop {
            if iterations >= self.max_iterations {
                let text = format!(
                    "Max tool iterations ({}) reached. Stopping execution.",
                    self.max_iterations
                );
                warn!("{}", text);
                self.notify(|o| o.on_warning(&text));
                return Ok(TurnOutcome::IterationLimit { iterations });
            }

            self.compact_if_needed().await;

            let tools: Vec<ToolDefinition> = self
                .registry
                .visible_operations()
                .await
                .iter()
                .map(|op| op.to_definition())
                .collect();
            debug!(iteration = iterations, tools = tools.len(), "Calling model");

            let mut stream = self
                .provider
                .chat_stream(&self.transcript, Some(&tools), &self.model, &self.request_config)
                .await
                .inspect_err(|e| error!(error = %e, "Model call failed"))?;

            let mut assembler = StreamAssembler::new();
            while let Some(item) = stream.next().await {
                let delta = item.inspect_err(|e| error!(error = %e, "Model stream broke"))?;
                match &delta {
                    StreamDelta::Reasoning(text) => self.notify(|o| o.on_reasoning_delta(text)),
                    StreamDelta::Content(text) => self.notify(|o| o.on_content_delta(text)),
                    StreamDelta::ToolFragment { .. } => {}
                }
                assembler.push(&delta);
            }

            let reply = assembler.finish();
            self.append(reply.to_message());

            if !reply.has_tool_calls() {
                debug!(iterations, "Turn finished");
                return Ok(TurnOutcome::Answer {
                    content: reply.content,
                    reasoning: reply.reasoning,
                });
            }

            for call in &reply.tool_calls {
                debug!(tool = %call.name(), id = %call.id, "Tool call");
                self.notify(|o| o.on_tool_call(call));
                let result = match parse_arguments(call.arguments()) {
                    Ok(arguments) => self.registry.dispatch(call.name(), arguments).await,
                    Err(e) => {
                        warn!(tool = %call.name(), error = %e, "Bad tool arguments");
                        e.to_string()
                    }
                };
                self.notify(|o| o.on_tool_result(call, &result));
                self.append(Message::tool_result(&call.id, result));
            }
            iterations += 1;
        }
    }

    /// Close every skill backend.
    pub async fn shutdown(&mut self) {
        self.registry.shutdown().await;
    }

    async fn compact_if_needed(&mut self) {
        if !self.compactor.needs_compaction(&self.transcript) {
            return;
        }
        let notice = format!(
            "Context length ({}) exceeds limit. Condensing...",
            transcript_chars(&self.transcript)
        );
        info!("{}", notice);
        self.notify(|o| o.on_notice(&notice));

        match self.compactor.maybe_compact(&self.transcript).await {
            CompactionOutcome::Compacted(compacted) => {
                debug!(before = self.transcript.len(), after = compacted.len(), "Transcript compacted");
                self.transcript = compacted;
                self.notify(|o| o.on_notice("Context condensed successfully."));
            }
            CompactionOutcome::Failed(e) => {
                let text = format!("Condensing failed: {e}");
                warn!("{}", text);
                self.notify(|o| o.on_warning(&text));
            }
            CompactionOutcome::Skipped => {}
        }
    }

    fn append(&mut self, message: Message) {
        self.notify(|o| o.on_message(&message));
        self.transcript.push(message);
    }

    fn notify(&mut self, mut event: impl FnMut(&mut dyn TurnObserver)) {
        for observer in &mut self.observers {
            event(observer.as_mut());
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
