//! Skill Registry — progressive disclosure and dispatch across skills.
//!
//! Every registered skill starts unloaded and is advertised to the model as a
//! single `skill_<name>` operation. Calling it marks the skill loaded,
//! connects its backend, and returns the skill's full instructions; from the
//! next model call on, the backend's real operations are advertised instead.
//!
//! Dispatch never fails at the text boundary: [`SkillRegistry::dispatch`]
//! renders every [`DispatchError`] as the string the model sees.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use mcpilot_core::{DispatchError, McpError};

use crate::backend::{BackendConnection, Connector, OperationSpec};
use crate::skills::{SkillDescriptor, DISCLOSURE_PREFIX};

// ─────────────────────────────────────────────
// SkillHandle
// ─────────────────────────────────────────────

/// Runtime state of one registered skill.
struct SkillHandle {
    descriptor: SkillDescriptor,
    loaded: bool,
    connection: Option<Box<dyn BackendConnection>>,
    /// Non-empty only while `connection` is live.
    operations: Vec<OperationSpec>,
}

impl SkillHandle {
    fn new(descriptor: SkillDescriptor) -> Self {
        Self {
            descriptor,
            loaded: false,
            connection: None,
            operations: Vec::new(),
        }
    }

    fn name(&self) -> &str {
        self.descriptor.name()
    }

    fn offers(&self, operation: &str) -> bool {
        self.operations.iter().any(|op| op.name == operation)
    }

    /// Forget a broken connection so the next visibility check reconnects.
    fn disconnect(&mut self) {
        self.connection = None;
        self.operations.clear();
    }
}

// ─────────────────────────────────────────────
// SkillRegistry
// ─────────────────────────────────────────────

/// Ordered collection of skills, owned by one conversation.
pub struct SkillRegistry {
    handles: Vec<SkillHandle>,
    connector: Arc<dyn Connector>,
    /// Refuse to pick when several loaded skills offer the same operation.
    strict: bool,
}

impl SkillRegistry {
    /// Create an empty registry that opens backends through `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            handles: Vec::new(),
            connector,
            strict: false,
        }
    }

    /// Enable or disable strict operation names.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Add a skill. A name that is already registered is skipped.
    pub fn register(&mut self, descriptor: SkillDescriptor) -> bool {
        if self.handles.iter().any(|h| h.name() == descriptor.name()) {
            warn!("Skill '{}' already registered, skipping.", descriptor.name());
            return false;
        }
        debug!(skill = %descriptor.name(), "Registered skill");
        self.handles.push(SkillHandle::new(descriptor));
        true
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Registered descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &SkillDescriptor> {
        self.handles.iter().map(|h| &h.descriptor)
    }

    pub fn is_loaded(&self, skill: &str) -> bool {
        self.handles.iter().any(|h| h.name() == skill && h.loaded)
    }

    /// Operations to advertise on the next model call.
    ///
    /// Unloaded skills contribute their disclosure operation; loaded skills
    /// contribute their backend's operations, connecting first if needed.
    /// A skill whose backend cannot be reached contributes nothing.
    pub async fn visible_operations(&mut self) -> Vec<OperationSpec> {
        let mut visible = Vec::new();
        for idx in 0..self.handles.len() {
            if self.handles[idx].loaded {
                self.ensure_connected(idx).await;
                visible.extend(self.handles[idx].operations.iter().cloned());
            } else {
                visible.push(self.handles[idx].descriptor.disclosure_operation());
            }
        }
        visible
    }

    /// Run one operation, returning the text the model should see.
    pub async fn dispatch(&mut self, name: &str, arguments: Value) -> String {
        match self.try_dispatch(name, arguments).await {
            Ok(text) => text,
            Err(e) => {
                warn!(tool = %name, error = %e, "Dispatch failed");
                e.to_string()
            }
        }
    }

    /// Run one operation.
    ///
    /// `skill_<name>` loads that skill and returns its instructions. Any other
    /// name goes to the first loaded skill offering it.
    pub async fn try_dispatch(&mut self, name: &str, arguments: Value) -> Result<String, DispatchError> {
        if let Some(skill) = name.strip_prefix(DISCLOSURE_PREFIX) {
            let idx = self
                .handles
                .iter()
                .position(|h| h.name() == skill)
                .ok_or_else(|| DispatchError::SkillNotFound(skill.to_string()))?;
            if !self.handles[idx].loaded {
                info!(skill = %skill, "Loading skill");
                self.handles[idx].loaded = true;
            }
            self.ensure_connected(idx).await;
            return Ok(self.handles[idx].descriptor.full_instructions().to_string());
        }

        let owners: Vec<usize> = self
            .handles
            .iter()
            .enumerate()
            .filter(|(_, h)| h.loaded && h.offers(name))
            .map(|(i, _)| i)
            .collect();

        let Some(&idx) = owners.first() else {
            return Err(DispatchError::NotFound(name.to_string()));
        };
        if self.strict && owners.len() > 1 {
            return Err(DispatchError::AmbiguousMatch {
                name: name.to_string(),
                skills: owners
                    .iter()
                    .map(|&i| self.handles[i].name().to_string())
                    .collect(),
            });
        }

        let handle = &mut self.handles[idx];
        debug!(skill = %handle.name(), tool = %name, "Dispatching");
        let Some(connection) = handle.connection.as_mut() else {
            return Err(DispatchError::NotFound(name.to_string()));
        };

        match connection.call(name, arguments).await {
            Ok(output) if output.is_error => Err(DispatchError::Backend {
                tool: name.to_string(),
                message: output.joined(),
            }),
            Ok(output) => Ok(output.joined()),
            Err(McpError::Timeout(after)) => Err(DispatchError::Timeout {
                tool: name.to_string(),
                after,
            }),
            Err(e) => {
                if matches!(e, McpError::Closed | McpError::Io(_)) {
                    warn!(skill = %handle.name(), error = %e, "Backend connection lost; will reconnect");
                    handle.disconnect();
                }
                Err(DispatchError::Backend {
                    tool: name.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Close every live backend connection.
    pub async fn shutdown(&mut self) {
        for handle in &mut self.handles {
            if let Some(mut connection) = handle.connection.take() {
                debug!(skill = %handle.descriptor.name(), "Closing backend");
                connection.close().await;
            }
            handle.operations.clear();
        }
    }

    /// Connect the skill at `idx` and cache its operations, once.
    ///
    /// Failures are logged and leave the skill without operations; the next
    /// call retries.
    async fn ensure_connected(&mut self, idx: usize) {
        if self.handles[idx].connection.is_some() {
            return;
        }
        let connector = Arc::clone(&self.connector);
        let handle = &mut self.handles[idx];
        let name = handle.descriptor.name().to_string();

        let mut connection = match connector.connect(&handle.descriptor).await {
            Ok(c) => c,
            Err(e) => {
                warn!(skill = %name, "Failed to connect to skill {}: {}", name, e);
                return;
            }
        };
        match connection.list_operations().await {
            Ok(operations) => {
                info!(skill = %name, operations = operations.len(), "Connected to MCP skill: {}", name);
                handle.operations = operations;
                handle.connection = Some(connection);
            }
            Err(e) => {
                warn!(skill = %name, "Failed to connect to skill {}: {}", name, e);
                connection.close().await;
                return;
            }
        }

        self.warn_on_overlap(idx);
    }

    /// Warn when a loaded skill exposes a name another loaded skill also has.
    fn warn_on_overlap(&self, idx: usize) {
        let handle = &self.handles[idx];
        for op in &handle.operations {
            for other in self.handles.iter().filter(|h| h.loaded && h.name() != handle.name()) {
                if other.offers(&op.name) {
                    warn!(
                        operation = %op.name,
                        skill = %handle.name(),
                        other = %other.name(),
                        "Operation exposed by more than one skill"
                    );
                }
            }
        }
    }
}

/// Parse a tool call's argument text into a JSON object.
///
/// Empty text means no arguments.
pub fn parse_arguments(text: &str) -> Result<Value, DispatchError> {
    if text.trim().is_empty() {
        return Ok(json!({}));
    }
    let value: Value =
        serde_json::from_str(text).map_err(|e| DispatchError::InvalidArguments(e.to_string()))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(DispatchError::InvalidArguments(format!(
            "tool arguments must be a JSON object, got: {value}"
        )))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ToolOutput;
    use crate::test_support::{skill, FakeConnector, Reply};
    use std::time::Duration;

    const NOTES_DOC: &str = "---\nname: notes\ndescription: \"Plain-text notes\"\n---\n\n# Notes\n\nKeeps notes in a local folder.\n\n## Tools\n\n- create_note\n";

    fn notes_connector() -> FakeConnector {
        FakeConnector::new().with_skill(
            "notes",
            &[
                ("create_note", "Create a note"),
                ("list_notes", "List notes"),
                ("search_notes", "Search notes"),
            ],
        )
    }

    fn registry(connector: FakeConnector) -> (SkillRegistry, Arc<FakeConnector>) {
        let connector = Arc::new(connector);
        (SkillRegistry::new(connector.clone()), connector)
    }

    fn names(ops: &[OperationSpec]) -> Vec<&str> {
        ops.iter().map(|o| o.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_unloaded_skills_show_only_disclosure() {
        let (mut reg, conn) = registry(notes_connector().with_skill("web", &[("fetch", "Fetch")]));
        reg.register(skill("notes", NOTES_DOC));
        reg.register(skill("web", "Fetch pages from the web."));

        let ops = reg.visible_operations().await;
        assert_eq!(names(&ops), vec!["skill_notes", "skill_web"]);
        assert_eq!(
            ops[0].description,
            "Load notes capabilities.\n# Notes\n\nKeeps notes in a local folder."
        );
        assert_eq!(
            ops[0].parameters,
            json!({"type": "object", "properties": {}, "required": []})
        );
        assert_eq!(conn.connects("notes"), 0);
    }

    #[tokio::test]
    async fn test_disclosure_loads_and_reveals_operations() {
        let (mut reg, conn) = registry(notes_connector());
        reg.register(skill("notes", NOTES_DOC));

        let text = reg.dispatch("skill_notes", json!({})).await;
        assert!(text.starts_with("# Notes"));
        assert!(text.contains("## Tools"));
        assert!(reg.is_loaded("notes"));

        let ops = reg.visible_operations().await;
        assert_eq!(names(&ops), vec!["create_note", "list_notes", "search_notes"]);
        assert_eq!(conn.connects("notes"), 1);
    }

    #[tokio::test]
    async fn test_repeated_disclosure_connects_once() {
        let (mut reg, conn) = registry(notes_connector());
        reg.register(skill("notes", NOTES_DOC));

        let first = reg.dispatch("skill_notes", json!({})).await;
        let second = reg.dispatch("skill_notes", json!({})).await;
        reg.visible_operations().await;
        reg.visible_operations().await;

        assert_eq!(first, second);
        assert_eq!(conn.connects("notes"), 1);
    }

    #[tokio::test]
    async fn test_dispatch_reaches_backend() {
        let (mut reg, conn) = registry(notes_connector().with_reply(
            "notes",
            "create_note",
            Reply::Output(ToolOutput {
                segments: vec!["Note created".into(), "id: 7".into()],
                is_error: false,
            }),
        ));
        reg.register(skill("notes", NOTES_DOC));
        reg.dispatch("skill_notes", json!({})).await;

        let result = reg.dispatch("create_note", json!({"title": "x"})).await;
        assert_eq!(result, "Note created\nid: 7");
        assert_eq!(
            conn.calls(),
            vec![("notes".into(), "create_note".into(), json!({"title": "x"}))]
        );
    }

    #[tokio::test]
    async fn test_dispatch_errors_become_text() {
        let (mut reg, _) = registry(
            notes_connector()
                .with_reply(
                    "notes",
                    "create_note",
                    Reply::Output(ToolOutput {
                        segments: vec!["disk full".into()],
                        is_error: true,
                    }),
                )
                .with_reply("notes", "search_notes", Reply::Timeout(Duration::from_secs(120))),
        );
        reg.register(skill("notes", NOTES_DOC));

        assert_eq!(
            reg.dispatch("skill_ghost", json!({})).await,
            "Error: Skill 'ghost' not found."
        );
        // Not loaded yet.
        assert_eq!(
            reg.dispatch("create_note", json!({})).await,
            "Error: Tool 'create_note' not found or skill not loaded."
        );

        reg.dispatch("skill_notes", json!({})).await;
        assert_eq!(
            reg.dispatch("frobnicate", json!({})).await,
            "Error: Tool 'frobnicate' not found or skill not loaded."
        );
        assert_eq!(
            reg.dispatch("create_note", json!({})).await,
            "Error executing create_note: disk full"
        );
        assert_eq!(
            reg.dispatch("search_notes", json!({})).await,
            "Error executing search_notes: timed out after 120s"
        );
    }

    #[tokio::test]
    async fn test_duplicate_registration_keeps_first() {
        let (mut reg, _) = registry(FakeConnector::new());
        assert!(reg.register(skill("notes", "First notes skill document.")));
        assert!(!reg.register(skill("notes", "Second notes skill document.")));

        assert_eq!(reg.len(), 1);
        let ops = reg.visible_operations().await;
        assert!(ops[0].description.contains("First notes"));
    }

    #[tokio::test]
    async fn test_first_match_wins_unless_strict() {
        let connector = || {
            FakeConnector::new()
                .with_skill("web", &[("search", "Search the web")])
                .with_skill("notes", &[("search", "Search notes")])
        };

        let (mut reg, conn) = registry(connector());
        reg.register(skill("web", "Web access for the agent."));
        reg.register(skill("notes", "Notes for the agent."));
        reg.dispatch("skill_web", json!({})).await;
        reg.dispatch("skill_notes", json!({})).await;
        assert_eq!(reg.dispatch("search", json!({})).await, "search ok");
        assert_eq!(conn.calls()[0].0, "web");

        let (reg, _) = registry(connector());
        let mut reg = reg.with_strict(true);
        reg.register(skill("web", "Web access for the agent."));
        reg.register(skill("notes", "Notes for the agent."));
        reg.dispatch("skill_web", json!({})).await;
        reg.dispatch("skill_notes", json!({})).await;
        assert!(matches!(
            reg.try_dispatch("search", json!({})).await,
            Err(DispatchError::AmbiguousMatch { ref skills, .. }) if skills == &["web", "notes"]
        ));
    }

    #[tokio::test]
    async fn test_failed_connect_is_retried() {
        let (mut reg, conn) = registry(notes_connector().failing("notes", 1));
        reg.register(skill("notes", NOTES_DOC));

        // Instructions come back even when the backend is down.
        let text = reg.dispatch("skill_notes", json!({})).await;
        assert!(text.starts_with("# Notes"));
        assert_eq!(conn.connects("notes"), 1);
        assert_eq!(
            reg.dispatch("create_note", json!({})).await,
            "Error: Tool 'create_note' not found or skill not loaded."
        );

        let ops = reg.visible_operations().await;
        assert_eq!(ops.len(), 3);
        assert_eq!(conn.connects("notes"), 2);
    }

    #[tokio::test]
    async fn test_lost_connection_reconnects() {
        let (mut reg, conn) = registry(notes_connector().with_reply("notes", "list_notes", Reply::Closed));
        reg.register(skill("notes", NOTES_DOC));
        reg.dispatch("skill_notes", json!({})).await;

        assert_eq!(
            reg.dispatch("list_notes", json!({})).await,
            "Error executing list_notes: connection closed"
        );
        assert_eq!(reg.visible_operations().await.len(), 3);
        assert_eq!(conn.connects("notes"), 2);
    }

    #[tokio::test]
    async fn test_shutdown_closes_connections() {
        let (mut reg, conn) = registry(notes_connector().with_skill("web", &[("fetch", "Fetch")]));
        reg.register(skill("notes", NOTES_DOC));
        reg.register(skill("web", "Web access for the agent."));
        reg.register(skill("idle", "Never loaded at all."));
        reg.dispatch("skill_notes", json!({})).await;
        reg.dispatch("skill_web", json!({})).await;

        reg.shutdown().await;
        assert_eq!(conn.closes(), 2);
        reg.shutdown().await;
        assert_eq!(conn.closes(), 2);
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments("").unwrap(), json!({}));
        assert_eq!(parse_arguments("  ").unwrap(), json!({}));
        assert_eq!(parse_arguments(r#"{"a":1}"#).unwrap(), json!({"a": 1}));
        assert!(matches!(
            parse_arguments("[1,2]"),
            Err(DispatchError::InvalidArguments(_))
        ));
        let err = parse_arguments("{broken").unwrap_err();
        assert!(err.to_string().starts_with("Error: "));
    }
}
