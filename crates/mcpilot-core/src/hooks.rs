//! Observation hooks for the agent loop.
//!
//! The loop owns the transcript; observers only watch. Session logs,
//! terminal rendering, and tests all plug in through [`TurnObserver`].

use crate::types::{Message, ToolCall};

/// Receives every event of a conversation as it happens.
///
/// All methods default to no-ops so an observer implements only what it
/// needs.
pub trait TurnObserver: Send {
    /// A message was appended to the transcript.
    fn on_message(&mut self, _message: &Message) {}

    /// A reasoning increment arrived from the model stream.
    fn on_reasoning_delta(&mut self, _text: &str) {}

    /// A content increment arrived from the model stream.
    fn on_content_delta(&mut self, _text: &str) {}

    /// A tool call is about to be dispatched.
    fn on_tool_call(&mut self, _call: &ToolCall) {}

    /// A tool call finished; `result` is what the model will see.
    fn on_tool_result(&mut self, _call: &ToolCall, _result: &str) {}

    /// Informational status (e.g. a compaction pass).
    fn on_notice(&mut self, _text: &str) {}

    /// A recoverable problem the user should see.
    fn on_warning(&mut self, _text: &str) {}
}

#[cfg(any(test, feature = "test-util"))]
pub use recorder::EventRecorder;

#[cfg(any(test, feature = "test-util"))]
mod recorder {
    use std::sync::{Arc, Mutex};

    use super::TurnObserver;
    use crate::types::{Message, ToolCall};

    /// Records every hook invocation as a line of text.
    ///
    /// Clones share one buffer, so a test can hand a clone to the loop and read
    /// the events back afterwards.
    #[derive(Debug, Default, Clone)]
    pub struct EventRecorder {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl EventRecorder {
        pub fn new() -> Self {
            Self::default()
        }

        /// Snapshot of everything recorded so far.
        pub fn events(&self) -> Vec<String> {
            self.events.lock().map(|e| e.clone()).unwrap_or_default()
        }

        fn record(&self, event: String) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event);
            }
        }
    }

    impl TurnObserver for EventRecorder {
        fn on_message(&mut self, message: &Message) {
            self.record(format!("message:{}", message.role()));
        }

        fn on_tool_call(&mut self, call: &ToolCall) {
            self.record(format!("call:{}", call.name()));
        }

        fn on_tool_result(&mut self, call: &ToolCall, result: &str) {
            self.record(format!("result:{}={}", call.name(), result));
        }

        fn on_notice(&mut self, text: &str) {
            self.record(format!("notice:{text}"));
        }

        fn on_warning(&mut self, text: &str) {
            self.record(format!("warning:{text}"));
        }
    }
}
