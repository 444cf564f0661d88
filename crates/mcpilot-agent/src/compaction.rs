//! Context compaction — summarizing old history under a character budget.
//!
//! When the transcript grows past `char_limit` characters, everything between
//! the system message and the last `keep_last` messages is replaced by one
//! user message holding a model-written summary:
//!
//! ```text
//! [system, m1, m2, ..., mk, t1..tN]  →  [system, user(summary of m1..mk), t1..tN]
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use mcpilot_core::types::Message;
use mcpilot_core::ProviderError;
use mcpilot_providers::traits::{LlmProvider, LlmRequestConfig};

/// Instruction sent ahead of the rendered history.
pub const SUMMARY_INSTRUCTION: &str = "Summarize the following interaction history concisely, focusing on completed actions, key findings, and current state. Ignore minor details.";

/// When and how to compact.
#[derive(Clone, Debug)]
pub struct CompactionPolicy {
    /// Compact once the transcript holds more characters than this.
    pub char_limit: usize,
    /// Messages at the end that are always kept verbatim.
    pub keep_last: usize,
    /// Model used for the summary call.
    pub summary_model: String,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            char_limit: 1_000_000,
            keep_last: 10,
            summary_model: "deepseek-chat".into(),
        }
    }
}

/// Result of one compaction check.
#[derive(Debug)]
pub enum CompactionOutcome {
    /// Under budget, or nothing in the middle to summarize.
    Skipped,
    /// The replacement transcript.
    Compacted(Vec<Message>),
    /// The summary call failed; the transcript is unchanged.
    Failed(ProviderError),
}

/// Characters of content plus reasoning across the transcript.
pub fn transcript_chars(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| m.text().chars().count() + m.reasoning().chars().count())
        .sum()
}

/// A three-way split of the transcript.
#[derive(Debug)]
pub struct Partition<'a> {
    pub system: &'a Message,
    /// What gets summarized. Never empty.
    pub middle: &'a [Message],
    pub tail: &'a [Message],
}

/// Split `messages` into system, middle, and the last `keep_last` messages.
///
/// Returns `None` unless there are more than `keep_last + 2` messages and the
/// first one is the system message. If the tail would open with tool results,
/// the boundary moves forward so they are summarized together with the
/// assistant message that requested them. The tail never exceeds `keep_last`.
pub fn partition(messages: &[Message], keep_last: usize) -> Option<Partition<'_>> {
    if messages.len() <= keep_last + 2 {
        return None;
    }
    let (system, rest) = messages.split_first()?;
    if !system.is_system() {
        return None;
    }

    let mut split = rest.len() - keep_last;
    while rest.get(split).is_some_and(|m| matches!(m, Message::Tool { .. })) {
        split += 1;
    }
    let (middle, tail) = rest.split_at(split);
    debug_assert!(tail.len() <= keep_last);
    Some(Partition {
        system,
        middle,
        tail,
    })
}

/// Summary prompt: the instruction, a blank line, then `role: content` lines.
fn summary_prompt(middle: &[Message]) -> String {
    let mut prompt = format!("{SUMMARY_INSTRUCTION}\n\n");
    for m in middle {
        prompt.push_str(m.role());
        prompt.push_str(": ");
        prompt.push_str(m.text());
        prompt.push('\n');
    }
    prompt
}

fn summary_message(summary: &str) -> Message {
    Message::user(format!(
        "## Previous Conversation Summary\n{summary}\n\n(Resume task based on this summary)"
    ))
}

// ─────────────────────────────────────────────
// Compactor
// ─────────────────────────────────────────────

/// Summarizes old history through a non-streaming model call.
pub struct Compactor {
    provider: Arc<dyn LlmProvider>,
    policy: CompactionPolicy,
    request_config: LlmRequestConfig,
}

impl Compactor {
    pub fn new(provider: Arc<dyn LlmProvider>, policy: CompactionPolicy) -> Self {
        Self {
            provider,
            policy,
            request_config: LlmRequestConfig::default(),
        }
    }

    pub fn with_request_config(mut self, config: LlmRequestConfig) -> Self {
        self.request_config = config;
        self
    }

    pub fn policy(&self) -> &CompactionPolicy {
        &self.policy
    }

    /// Over budget and long enough to have something to summarize.
    pub fn needs_compaction(&self, messages: &[Message]) -> bool {
        messages.len() > self.policy.keep_last + 2
            && transcript_chars(messages) > self.policy.char_limit
    }

    /// Compact `messages` if they are over budget.
    pub async fn maybe_compact(&self, messages: &[Message]) -> CompactionOutcome {
        if !self.needs_compaction(messages) {
            return CompactionOutcome::Skipped;
        }
        let Some(parts) = partition(messages, self.policy.keep_last) else {
            return CompactionOutcome::Skipped;
        };

        debug!(
            summarized = parts.middle.len(),
            kept = parts.tail.len(),
            model = %self.policy.summary_model,
            "Compacting transcript"
        );
        let prompt = [Message::user(summary_prompt(parts.middle))];
        let response = match self
            .provider
            .complete(&prompt, &self.policy.summary_model, &self.request_config)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Summary call failed");
                return CompactionOutcome::Failed(e);
            }
        };

        let summary = response.content.unwrap_or_default();
        if summary.trim().is_empty() {
            return CompactionOutcome::Failed(ProviderError::Decode("empty summary".into()));
        }

        let mut compacted = Vec::with_capacity(parts.tail.len() + 2);
        compacted.push(parts.system.clone());
        compacted.push(summary_message(summary.trim()));
        compacted.extend_from_slice(parts.tail);
        debug_assert!(compacted.len() <= self.policy.keep_last + 2);
        CompactionOutcome::Compacted(compacted)
    }
}
