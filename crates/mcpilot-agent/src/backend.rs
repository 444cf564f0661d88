//! Backend seam — how the registry talks to a skill's server.
//!
//! [`Connector`] opens a [`BackendConnection`] for a skill; the connection
//! lists and invokes operations. The production implementation is the MCP
//! stdio client in [`crate::mcp`]; tests plug in in-memory fakes.

use async_trait::async_trait;
use mcpilot_core::types::ToolDefinition;
use mcpilot_core::McpError;
use serde_json::Value;

use crate::skills::SkillDescriptor;

/// One operation a backend offers.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

impl OperationSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Provider-facing function definition.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, &self.description, self.parameters.clone())
    }
}

/// Result of one backend invocation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolOutput {
    /// Text segments, in order. Non-text content is dropped.
    pub segments: Vec<String>,
    /// The backend flagged the result as a failure.
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            segments: vec![text.into()],
            is_error: false,
        }
    }

    /// Segments joined with newlines.
    pub fn joined(&self) -> String {
        self.segments.join("\n")
    }
}

/// A live connection to one skill's backend.
#[async_trait]
pub trait BackendConnection: Send {
    /// Everything the backend currently offers.
    async fn list_operations(&mut self) -> Result<Vec<OperationSpec>, McpError>;

    /// Invoke one operation with an arguments object.
    async fn call(&mut self, name: &str, arguments: Value) -> Result<ToolOutput, McpError>;

    /// Release the connection. Further calls fail with [`McpError::Closed`].
    async fn close(&mut self);
}

/// Opens backend connections for skills.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, skill: &SkillDescriptor) -> Result<Box<dyn BackendConnection>, McpError>;
}
