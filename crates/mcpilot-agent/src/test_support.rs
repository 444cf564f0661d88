//! In-memory fakes shared by the registry, compactor, and agent loop tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use serde_json::{json, Value};

use mcpilot_core::types::{LlmResponse, Message, StreamDelta, ToolDefinition};
use mcpilot_core::{McpError, ProviderError};
use mcpilot_providers::traits::{DeltaStream, LlmProvider, LlmRequestConfig};

use crate::backend::{BackendConnection, Connector, OperationSpec, ToolOutput};
use crate::skills::SkillDescriptor;

/// A descriptor for an in-memory skill with the given capability document.
pub(crate) fn skill(name: &str, document: &str) -> SkillDescriptor {
    SkillDescriptor::from_document(name, "fake", vec![], None, HashMap::new(), Some(document))
}

// ─────────────────────────────────────────────
// Fake backend
// ─────────────────────────────────────────────

/// Canned reply to one operation.
#[derive(Clone, Debug)]
pub(crate) enum Reply {
    Output(ToolOutput),
    Timeout(Duration),
    Closed,
}

#[derive(Clone, Debug, Default)]
struct FakeSkill {
    operations: Vec<OperationSpec>,
    replies: HashMap<String, Reply>,
}

#[derive(Default)]
struct Shared {
    connects: HashMap<String, usize>,
    failures_left: HashMap<String, usize>,
    calls: Vec<(String, String, Value)>,
    closes: usize,
}

/// Connector serving scripted skills. Clones of the `Arc` observe the same
/// counters.
#[derive(Default)]
pub(crate) struct FakeConnector {
    skills: HashMap<String, FakeSkill>,
    shared: Arc<Mutex<Shared>>,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a skill exposing `operations` as `(name, description)` pairs.
    /// Unscripted operations answer `"<op> ok"`.
    pub(crate) fn with_skill(mut self, name: &str, operations: &[(&str, &str)]) -> Self {
        let operations = operations
            .iter()
            .map(|(op, desc)| {
                OperationSpec::new(*op, *desc, json!({"type": "object", "properties": {}}))
            })
            .collect();
        self.skills.insert(
            name.to_string(),
            FakeSkill {
                operations,
                replies: HashMap::new(),
            },
        );
        self
    }

    pub(crate) fn with_reply(mut self, skill: &str, operation: &str, reply: Reply) -> Self {
        if let Some(s) = self.skills.get_mut(skill) {
            s.replies.insert(operation.to_string(), reply);
        }
        self
    }

    /// Make the next `times` connects to `skill` fail.
    pub(crate) fn failing(self, skill: &str, times: usize) -> Self {
        self.shared
            .lock()
            .unwrap()
            .failures_left
            .insert(skill.to_string(), times);
        self
    }

    pub(crate) fn connects(&self, skill: &str) -> usize {
        self.shared.lock().unwrap().connects.get(skill).copied().unwrap_or(0)
    }

    /// Every `(skill, operation, arguments)` invoked so far.
    pub(crate) fn calls(&self) -> Vec<(String, String, Value)> {
        self.shared.lock().unwrap().calls.clone()
    }

    pub(crate) fn closes(&self) -> usize {
        self.shared.lock().unwrap().closes
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, skill: &SkillDescriptor) -> Result<Box<dyn BackendConnection>, McpError> {
        let name = skill.name().to_string();
        {
            let mut shared = self.shared.lock().unwrap();
            *shared.connects.entry(name.clone()).or_default() += 1;
            if let Some(left) = shared.failures_left.get_mut(&name) {
                if *left > 0 {
                    *left -= 1;
                    return Err(McpError::Protocol("connection refused".into()));
                }
            }
        }
        let fake = self
            .skills
            .get(&name)
            .cloned()
            .ok_or_else(|| McpError::Protocol(format!("no fake server for {name}")))?;
        Ok(Box::new(FakeBackend {
            skill: name,
            fake,
            shared: Arc::clone(&self.shared),
            closed: false,
        }))
    }
}

struct FakeBackend {
    skill: String,
    fake: FakeSkill,
    shared: Arc<Mutex<Shared>>,
    closed: bool,
}

#[async_trait]
impl BackendConnection for FakeBackend {
    async fn list_operations(&mut self) -> Result<Vec<OperationSpec>, McpError> {
        if self.closed {
            return Err(McpError::Closed);
        }
        Ok(self.fake.operations.clone())
    }

    async fn call(&mut self, name: &str, arguments: Value) -> Result<ToolOutput, McpError> {
        if self.closed {
            return Err(McpError::Closed);
        }
        self.shared
            .lock()
            .unwrap()
            .calls
            .push((self.skill.clone(), name.to_string(), arguments));
        match self.fake.replies.get(name) {
            Some(Reply::Output(out)) => Ok(out.clone()),
            Some(Reply::Timeout(after)) => Err(McpError::Timeout(*after)),
            Some(Reply::Closed) => Err(McpError::Closed),
            None => Ok(ToolOutput::text(format!("{name} ok"))),
        }
    }

    async fn close(&mut self) {
        self.closed = true;
        self.shared.lock().unwrap().closes += 1;
    }
}

// ─────────────────────────────────────────────
// Scripted provider
// ─────────────────────────────────────────────

/// What the provider saw on one call.
#[derive(Clone, Debug)]
pub(crate) struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
    pub model: String,
}

type StreamScript = Result<Vec<Result<StreamDelta, ProviderError>>, ProviderError>;

/// Replays scripted streams for `chat_stream` and scripted text for
/// `complete`, in order.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    streams: Mutex<VecDeque<StreamScript>>,
    completions: Mutex<VecDeque<Result<String, ProviderError>>>,
    stream_requests: Mutex<Vec<RecordedRequest>>,
    complete_requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn stream(self, deltas: Vec<StreamDelta>) -> Self {
        self.streams
            .lock()
            .unwrap()
            .push_back(Ok(deltas.into_iter().map(Ok).collect()));
        self
    }

    /// A stream that yields `deltas` and then breaks with `error`.
    pub(crate) fn broken_stream(self, deltas: Vec<StreamDelta>, error: ProviderError) -> Self {
        let mut items: Vec<_> = deltas.into_iter().map(Ok).collect();
        items.push(Err(error));
        self.streams.lock().unwrap().push_back(Ok(items));
        self
    }

    /// A stream that fails to open.
    pub(crate) fn open_error(self, error: ProviderError) -> Self {
        self.streams.lock().unwrap().push_back(Err(error));
        self
    }

    pub(crate) fn completion(self, reply: Result<&str, ProviderError>) -> Self {
        self.completions
            .lock()
            .unwrap()
            .push_back(reply.map(str::to_string));
        self
    }

    pub(crate) fn stream_requests(&self) -> Vec<RecordedRequest> {
        self.stream_requests.lock().unwrap().clone()
    }

    pub(crate) fn complete_requests(&self) -> Vec<RecordedRequest> {
        self.complete_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        model: &str,
        _config: &LlmRequestConfig,
    ) -> Result<DeltaStream, ProviderError> {
        self.stream_requests.lock().unwrap().push(RecordedRequest {
            messages: messages.to_vec(),
            tools: tools
                .unwrap_or_default()
                .iter()
                .map(|t| t.function.name.clone())
                .collect(),
            model: model.to_string(),
        });
        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Stream("script exhausted".into())))?;
        Ok(Box::pin(stream::iter(script)))
    }

    async fn complete(
        &self,
        messages: &[Message],
        model: &str,
        _config: &LlmRequestConfig,
    ) -> Result<LlmResponse, ProviderError> {
        self.complete_requests.lock().unwrap().push(RecordedRequest {
            messages: messages.to_vec(),
            tools: vec![],
            model: model.to_string(),
        });
        let text = self
            .completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Decode("script exhausted".into())))?;
        Ok(LlmResponse {
            content: Some(text),
            ..Default::default()
        })
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    fn display_name(&self) -> &str {
        "Scripted"
    }
}

/// Shorthand for a tool-call fragment.
pub(crate) fn fragment(id: Option<&str>, name: Option<&str>, arguments: Option<&str>) -> StreamDelta {
    StreamDelta::ToolFragment {
        id: id.map(str::to_string),
        name: name.map(str::to_string),
        arguments: arguments.map(str::to_string),
    }
}
