//! Error types shared across mcpilot crates.
//!
//! Library code returns these closed enums; text is produced only at the
//! boundary where a result is handed back to the model or the user.

use std::time::Duration;

use thiserror::Error;

/// Why a tool dispatch did not produce a backend result.
///
/// The `Display` form is exactly what the model sees as the tool result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// `skill_<name>` was called for a skill that was never registered.
    #[error("Error: Skill '{0}' not found.")]
    SkillNotFound(String),

    /// No loaded skill exposes this operation.
    #[error("Error: Tool '{0}' not found or skill not loaded.")]
    NotFound(String),

    /// Several loaded skills expose the operation and strict naming is on.
    #[error("Error: Tool '{name}' is provided by more than one loaded skill ({}).", .skills.join(", "))]
    AmbiguousMatch { name: String, skills: Vec<String> },

    /// The model's argument text was not a JSON object.
    #[error("Error: {0}")]
    InvalidArguments(String),

    /// The backend reported a failure or the transport broke mid-call.
    #[error("Error executing {tool}: {message}")]
    Backend { tool: String, message: String },

    /// The backend did not answer within the configured timeout.
    #[error("Error executing {tool}: timed out after {after:?}")]
    Timeout { tool: String, after: Duration },
}

/// Failures talking to an MCP server over stdio.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("stdio error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON-RPC message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection closed")]
    Closed,
}

/// Failures calling an LLM provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no configured provider for model '{0}'")]
    NotConfigured(String),

    /// Transport failure; carried as text so core needs no HTTP client.
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Failures that abort a whole agent turn.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("conversation not started; call start() with a system prompt first")]
    NotStarted,
}
