//! mcpilot agent — skills, MCP backends, and the streaming turn loop.
//!
//! This crate contains:
//! - **skills**: `SKILL.md` parsing and skill directory discovery
//! - **backend** / **mcp**: the backend connection seam and its MCP stdio client
//! - **registry**: progressive disclosure and tool dispatch across skills
//! - **compaction**: summarization of old history under a character budget
//! - **stream**: reassembly of streamed reasoning, content, and tool calls
//! - **context**: system prompt construction
//! - **agent_loop**: the model ↔ tool loop for one user turn

pub mod agent_loop;
pub mod backend;
pub mod compaction;
pub mod context;
pub mod mcp;
pub mod registry;
pub mod skills;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_support;

pub use agent_loop::{AgentLoop, TurnOutcome};
pub use backend::{BackendConnection, Connector, OperationSpec, ToolOutput};
pub use compaction::{CompactionOutcome, CompactionPolicy, Compactor};
pub use context::ContextBuilder;
pub use mcp::{McpStdioClient, StdioConnector};
pub use registry::SkillRegistry;
pub use skills::{discover_skills, SkillDescriptor};
pub use stream::{AssembledReply, StreamAssembler};
