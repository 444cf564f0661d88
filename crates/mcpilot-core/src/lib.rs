//! mcpilot core — shared vocabulary for the agent, providers, and CLI.
//!
//! - [`types`]: chat messages, tool calls, stream deltas (OpenAI wire format)
//! - [`error`]: closed error enums for dispatch, MCP transport, and providers
//! - [`hooks`]: the [`hooks::TurnObserver`] trait fired by the agent loop
//! - [`session`]: per-session JSONL + Markdown conversation logs
//! - [`config`]: `~/.mcpilot/config.json` schema, loader, env overrides

pub mod config;
pub mod error;
pub mod hooks;
pub mod session;
pub mod types;
pub mod utils;

pub use error::{AgentError, DispatchError, McpError, ProviderError};
pub use hooks::TurnObserver;
pub use types::{Message, StreamDelta, ToolCall, ToolDefinition};
