//! Core types for mcpilot — chat messages, tool calls, and stream deltas.
//!
//! These types model the OpenAI chat completions format spoken by DeepSeek and
//! every other OpenAI-compatible endpoint. Streaming chunks are decoded once,
//! at the transport boundary, into [`StreamDelta`] values so the agent loop
//! never inspects raw chunk shapes.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Messages (OpenAI chat completions format)
// ─────────────────────────────────────────────

/// A chat message in the OpenAI format, tagged by `role`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "system")]
    System { content: String },

    #[serde(rename = "user")]
    User { content: String },

    #[serde(rename = "assistant")]
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
        /// Reasoning text from thinking models (DeepSeek-R1, Kimi). Must be
        /// replayed verbatim on later requests.
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning_content: Option<String>,
    },

    #[serde(rename = "tool")]
    Tool {
        content: String,
        tool_call_id: String,
    },
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Create a plain assistant text message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: Some(content.into()),
            tool_calls: None,
            reasoning_content: None,
        }
    }

    /// Create an assistant message from one fully reassembled model reply.
    ///
    /// Empty reasoning is dropped. Content is kept even when empty unless the
    /// reply carries tool calls, in which case empty content is omitted.
    pub fn assistant_reply(
        content: impl Into<String>,
        reasoning: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        let content = content.into();
        let reasoning = reasoning.into();
        let has_calls = !tool_calls.is_empty();
        Message::Assistant {
            content: if has_calls && content.is_empty() {
                None
            } else {
                Some(content)
            },
            tool_calls: has_calls.then_some(tool_calls),
            reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
        }
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
        }
    }

    /// Wire name of this message's role.
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    /// Text content, or `""` when the message has none.
    pub fn text(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Tool { content, .. } => content,
            Message::Assistant { content, .. } => content.as_deref().unwrap_or(""),
        }
    }

    /// Reasoning text, or `""` for anything but a thinking assistant reply.
    pub fn reasoning(&self) -> &str {
        match self {
            Message::Assistant {
                reasoning_content: Some(r),
                ..
            } => r,
            _ => "",
        }
    }

    /// Tool calls carried by an assistant message.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant {
                tool_calls: Some(calls),
                ..
            } => calls,
            _ => &[],
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Message::System { .. })
    }
}

// ─────────────────────────────────────────────
// Tool Calls (function calling)
// ─────────────────────────────────────────────

/// A tool call from the assistant, requesting execution of a function.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique ID for this tool call (used to match results).
    pub id: String,
    /// Always "function" in current OpenAI API.
    #[serde(rename = "type")]
    pub call_type: String,
    /// The function to call.
    pub function: FunctionCall,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        ToolCall {
            id: id.into(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn arguments(&self) -> &str {
        &self.function.arguments
    }
}

/// The function name and arguments within a tool call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    /// Name of the function/tool to call.
    pub name: String,
    /// JSON-encoded arguments string, exactly as streamed by the model.
    pub arguments: String,
}

// ─────────────────────────────────────────────
// Tool Definitions (for LLM requests)
// ─────────────────────────────────────────────

/// Definition of a tool, sent to the LLM so it knows what it may call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// Always "function".
    #[serde(rename = "type")]
    pub tool_type: String,
    /// The function schema.
    pub function: FunctionDefinition,
}

/// Schema of a function tool.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

// ─────────────────────────────────────────────
// Stream deltas
// ─────────────────────────────────────────────

/// One decoded increment of a streamed model reply.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamDelta {
    /// A piece of reasoning ("thinking") text.
    Reasoning(String),
    /// A piece of the visible answer.
    Content(String),
    /// A piece of a tool call. A fresh `id` starts a new call; fragments
    /// without one continue the call in flight.
    ToolFragment {
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
}

// ─────────────────────────────────────────────
// LLM Response (non-streaming)
// ─────────────────────────────────────────────

/// A complete (non-streamed) reply from an LLM provider. Only used for
/// summaries, so it carries just the text.
#[derive(Clone, Debug, Default)]
pub struct LlmResponse {
    pub content: Option<String>,
    /// Why the model stopped generating.
    pub finish_reason: Option<String>,
}

// ─────────────────────────────────────────────
// Provider wire types
// ─────────────────────────────────────────────

/// Raw chat completion response from an OpenAI-compatible API.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

/// A single choice in a chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

/// The assistant message within a chat completion choice.
#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Take the first choice. `None` when the API returned no choices.
    pub fn into_response(self) -> Option<LlmResponse> {
        self.choices.into_iter().next().map(|c| LlmResponse {
            content: c.message.content,
            finish_reason: c.finish_reason,
        })
    }
}

/// One `data:` chunk of a streamed chat completion.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

/// The incremental payload of a chunk. Every field may be absent or null.
#[derive(Debug, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallChunk>>,
}

#[derive(Debug, Deserialize)]
pub struct ToolCallChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionChunk>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionChunk {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

impl ChatCompletionChunk {
    /// Flatten the first choice's delta into ordered [`StreamDelta`]s.
    ///
    /// Order within a chunk is reasoning, content, then tool fragments.
    /// Empty strings are dropped; a tool fragment is kept if any of its
    /// fields is present.
    pub fn into_deltas(self) -> Vec<StreamDelta> {
        let Some(choice) = self.choices.into_iter().next() else {
            return Vec::new();
        };
        let delta = choice.delta;
        let mut out = Vec::new();

        if let Some(r) = delta.reasoning_content.filter(|s| !s.is_empty()) {
            out.push(StreamDelta::Reasoning(r));
        }
        if let Some(c) = delta.content.filter(|s| !s.is_empty()) {
            out.push(StreamDelta::Content(c));
        }
        for tc in delta.tool_calls.unwrap_or_default() {
            let (name, arguments) = match tc.function {
                Some(f) => (
                    f.name.filter(|s| !s.is_empty()),
                    f.arguments.filter(|s| !s.is_empty()),
                ),
                None => (None, None),
            };
            let id = tc.id.filter(|s| !s.is_empty());
            if id.is_some() || name.is_some() || arguments.is_some() {
                out.push(StreamDelta::ToolFragment {
                    id,
                    name,
                    arguments,
                });
            }
        }
        out
    }
}

/// Request body for an OpenAI-compatible chat completion API.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
