//! Reassembly of one streamed model reply.
//!
//! Reasoning and content arrive as text increments; tool calls arrive as
//! fragments. A fragment carrying an id different from the call in flight
//! seals that call and opens a new one. Fragments without an id continue the
//! call in flight.

use tracing::warn;

use mcpilot_core::types::{Message, StreamDelta, ToolCall};

/// Accumulates [`StreamDelta`]s into a complete reply.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    reasoning: String,
    content: String,
    calls: Vec<ToolCall>,
    current: Option<ToolCall>,
}

/// A fully reassembled model reply.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssembledReply {
    pub reasoning: String,
    pub content: String,
    /// Tool calls in emission order.
    pub tool_calls: Vec<ToolCall>,
}

impl AssembledReply {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// The assistant message to append to the transcript.
    pub fn to_message(&self) -> Message {
        Message::assistant_reply(
            self.content.clone(),
            self.reasoning.clone(),
            self.tool_calls.clone(),
        )
    }
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one delta.
    pub fn push(&mut self, delta: &StreamDelta) {
        match delta {
            StreamDelta::Reasoning(text) => self.reasoning.push_str(text),
            StreamDelta::Content(text) => self.content.push_str(text),
            StreamDelta::ToolFragment {
                id,
                name,
                arguments,
            } => self.push_fragment(id.as_deref(), name.as_deref(), arguments.as_deref()),
        }
    }

    fn push_fragment(&mut self, id: Option<&str>, name: Option<&str>, arguments: Option<&str>) {
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            let continues = self.current.as_ref().is_some_and(|c| c.id == id);
            if !continues {
                self.seal();
                self.current = Some(ToolCall::new(id, "", ""));
            }
        }

        let Some(call) = self.current.as_mut() else {
            if arguments.is_some_and(|a| !a.is_empty()) || name.is_some() {
                warn!(
                    name = name.unwrap_or(""),
                    "Dropping tool-call fragment with no call in flight"
                );
            }
            return;
        };

        if let Some(name) = name.filter(|n| !n.is_empty()) {
            if call.function.name.is_empty() {
                call.function.name = name.to_string();
            }
        }
        if let Some(arguments) = arguments {
            call.function.arguments.push_str(arguments);
        }
    }

    fn seal(&mut self) {
        if let Some(call) = self.current.take() {
            self.calls.push(call);
        }
    }

    /// Seal the call in flight and return the reply.
    pub fn finish(mut self) -> AssembledReply {
        self.seal();
        AssembledReply {
            reasoning: self.reasoning,
            content: self.content,
            tool_calls: self.calls,
        }
    }
}
