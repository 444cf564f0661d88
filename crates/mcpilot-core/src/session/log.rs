//! Per-session conversation log.
//!
//! Two append-only files per session, named `session_<YYYYMMDD_HHMMSS>`:
//! - `.jsonl`: `{"timestamp","role","content",...extra}` per event, flushed per line
//! - `.md`: a human-readable transcript
//!
//! Roles: `system`, `user`, `assistant` (+`reasoning_content`),
//! `tool_call` (+`tool_name`, `arguments`), `tool_result` (+`tool_name`).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::hooks::TurnObserver;
use crate::types::{Message, ToolCall};
use crate::utils;

/// Writes every conversation event to JSONL and Markdown.
///
/// Write failures are logged with `warn!` and otherwise ignored; logging
/// never interrupts a turn.
pub struct SessionLog {
    session_id: String,
    jsonl_path: PathBuf,
    md_path: PathBuf,
    jsonl: File,
    md: File,
}

impl SessionLog {
    /// Create the log directory and open a new session's files.
    pub fn create(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;

        let session_id = format!("session_{}", utils::session_stamp());
        let jsonl_path = dir.join(format!("{session_id}.jsonl"));
        let md_path = dir.join(format!("{session_id}.md"));

        let jsonl = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&jsonl_path)?;
        let mut md = File::create(&md_path)?;
        write!(md, "# Conversation Log: {session_id}\n\n")?;

        debug!("Session log started at {}", jsonl_path.display());
        Ok(Self {
            session_id,
            jsonl_path,
            md_path,
            jsonl,
            md,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn jsonl_path(&self) -> &Path {
        &self.jsonl_path
    }

    pub fn md_path(&self) -> &Path {
        &self.md_path
    }

    /// Record one event in both files.
    pub fn log(&mut self, role: &str, content: &str, extra: &[(&str, &str)]) {
        if let Err(e) = self.write_jsonl(role, content, extra) {
            warn!("Failed to write {}: {}", self.jsonl_path.display(), e);
        }
        if let Err(e) = self.write_md(role, content, extra) {
            warn!("Failed to write {}: {}", self.md_path.display(), e);
        }
    }

    fn write_jsonl(&mut self, role: &str, content: &str, extra: &[(&str, &str)]) -> std::io::Result<()> {
        let mut entry = Map::new();
        entry.insert("timestamp".into(), Value::String(utils::timestamp()));
        entry.insert("role".into(), Value::String(role.to_string()));
        entry.insert("content".into(), Value::String(content.to_string()));
        for (key, value) in extra {
            entry.insert((*key).to_string(), Value::String((*value).to_string()));
        }
        let line = serde_json::to_string(&Value::Object(entry)).map_err(std::io::Error::other)?;
        writeln!(self.jsonl, "{line}")?;
        self.jsonl.flush()
    }

    fn write_md(&mut self, role: &str, content: &str, extra: &[(&str, &str)]) -> std::io::Result<()> {
        let get = |key: &str| {
            extra
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| *v)
                .unwrap_or("")
        };
        let md = &mut self.md;
        match role {
            "system" => write!(md, "## System Prompt\n\n{content}\n\n")?,
            "user" => write!(md, "## User\n\n{content}\n\n")?,
            "assistant" => {
                let reasoning = get("reasoning_content");
                if !reasoning.is_empty() {
                    write!(md, "### Reasoning\n> {}\n\n", reasoning.replace('\n', "\n> "))?;
                }
                write!(md, "## Assistant\n\n{content}\n\n")?;
            }
            "tool_call" => write!(
                md,
                "### Tool Call: `{}`\n\nArguments:\n```json\n{}\n```\n\n",
                get("tool_name"),
                get("arguments")
            )?,
            "tool_result" => write!(
                md,
                "### Tool Output ({})\n\n```\n{content}\n```\n\n",
                get("tool_name")
            )?,
            _ => write!(md, "## {role}\n\n{content}\n\n")?,
        }
        md.flush()
    }
}

impl TurnObserver for SessionLog {
    fn on_message(&mut self, message: &Message) {
        match message {
            Message::System { content } => self.log("system", content, &[]),
            Message::User { content } => self.log("user", content, &[]),
            Message::Assistant { .. } => {
                let reasoning = message.reasoning();
                if reasoning.is_empty() {
                    self.log("assistant", message.text(), &[]);
                } else {
                    self.log("assistant", message.text(), &[("reasoning_content", reasoning)]);
                }
            }
            // Tool results are logged with their tool name in `on_tool_result`.
            Message::Tool { .. } => {}
        }
    }

    fn on_tool_call(&mut self, call: &ToolCall) {
        self.log(
            "tool_call",
            "",
            &[("tool_name", call.name()), ("arguments", call.arguments())],
        );
    }

    fn on_tool_result(&mut self, call: &ToolCall, result: &str) {
        self.log("tool_result", result, &[("tool_name", call.name())]);
    }
}
