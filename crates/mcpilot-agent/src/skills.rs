//! Skills — descriptors for MCP servers and their capability documents.
//!
//! # Architecture
//!
//! A skill is an MCP server plus an optional `SKILL.md` that teaches the
//! model how to use it. Until the model asks for a skill, only a single
//! zero-argument `skill_<name>` operation is advertised, described by a
//! short blurb cut from the document. Calling it returns the full
//! instructions and unlocks the server's real operations.
//!
//! ## SKILL.md format
//!
//! ```text
//! ---
//! name: notes
//! description: "Create and search plain-text notes"
//! allowed-tools: create_note, list_notes
//! ---
//!
//! # Notes
//!
//! Keeps notes in a local folder ...
//!
//! ## Tools
//! ...
//! ```
//!
//! ## Discovery layout
//!
//! ```text
//! <dir>/<skill>/SKILL.md
//! <dir>/<skill>/server.py    (launched with the configured python)
//! <dir>/<skill>/server       (or an executable, launched directly)
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{debug, warn};

use crate::backend::OperationSpec;

/// Prefix of every disclosure operation name.
pub const DISCLOSURE_PREFIX: &str = "skill_";

/// Blurbs shorter than this fall back to the short description.
const MIN_BLURB_CHARS: usize = 10;

// ─────────────────────────────────────────────
// SkillDescriptor
// ─────────────────────────────────────────────

/// Static metadata for one skill. Immutable after construction.
#[derive(Clone, Debug)]
pub struct SkillDescriptor {
    name: String,
    command: String,
    args: Vec<String>,
    doc_path: Option<PathBuf>,
    env: HashMap<String, String>,
    short_description: String,
    full_instructions: String,
    disclosure_blurb: String,
}

impl SkillDescriptor {
    /// Build a descriptor, reading the capability document if there is one.
    ///
    /// A missing or unreadable document is not an error; the skill just gets
    /// the generic `"Tools for <name>"` text.
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
        doc_path: Option<PathBuf>,
        env: HashMap<String, String>,
    ) -> Self {
        let name = name.into();
        let document = doc_path.as_deref().and_then(|p| match std::fs::read_to_string(p) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(skill = %name, path = %p.display(), error = %e, "Cannot read skill document");
                None
            }
        });
        Self::from_document(name, command, args, doc_path, env, document.as_deref())
    }

    /// Build a descriptor from document text already in memory.
    pub fn from_document(
        name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
        doc_path: Option<PathBuf>,
        env: HashMap<String, String>,
        document: Option<&str>,
    ) -> Self {
        let name = name.into();
        let fallback = format!("Tools for {name}");

        let (short_description, full_instructions) = match document {
            Some(text) => {
                let description = parse_frontmatter(text)
                    .and_then(|pairs| {
                        pairs
                            .into_iter()
                            .find(|(k, _)| k == "description")
                            .map(|(_, v)| trim_quotes(&v).to_string())
                    })
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| fallback.clone());
                (description, strip_frontmatter(text).to_string())
            }
            None => (fallback.clone(), fallback),
        };

        let blurb = extract_blurb(&full_instructions);
        let disclosure_blurb = if blurb.chars().count() < MIN_BLURB_CHARS {
            short_description.clone()
        } else {
            blurb
        };

        Self {
            name,
            command: command.into(),
            args,
            doc_path,
            env,
            short_description,
            full_instructions,
            disclosure_blurb,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn doc_path(&self) -> Option<&Path> {
        self.doc_path.as_deref()
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// One-line description used in the system prompt.
    pub fn short_description(&self) -> &str {
        &self.short_description
    }

    /// Text returned to the model when the skill is disclosed.
    pub fn full_instructions(&self) -> &str {
        &self.full_instructions
    }

    /// Introductory part of the document shown before disclosure.
    pub fn disclosure_blurb(&self) -> &str {
        &self.disclosure_blurb
    }

    /// `skill_<name>`.
    pub fn disclosure_name(&self) -> String {
        format!("{DISCLOSURE_PREFIX}{}", self.name)
    }

    /// The zero-argument operation advertised while the skill is unloaded.
    pub fn disclosure_operation(&self) -> OperationSpec {
        OperationSpec {
            name: self.disclosure_name(),
            description: format!("Load {} capabilities.\n{}", self.name, self.disclosure_blurb),
            parameters: json!({"type": "object", "properties": {}, "required": []}),
        }
    }
}

// ─────────────────────────────────────────────
// Discovery
// ─────────────────────────────────────────────

/// Scan `dir` for skill subdirectories, sorted by name.
///
/// A subdirectory qualifies when it holds `SKILL.md` plus either
/// `server.py` (run with `python`) or an executable named `server`.
pub fn discover_skills(dir: &Path, python: &str) -> Vec<SkillDescriptor> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Skill directory not readable");
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    let mut out = Vec::new();
    for path in dirs {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let doc = path.join("SKILL.md");
        if !doc.is_file() {
            continue;
        }

        let script = path.join("server.py");
        let binary = path.join("server");
        let (command, args) = if script.is_file() {
            (python.to_string(), vec![script.to_string_lossy().into_owned()])
        } else if is_executable(&binary) {
            (binary.to_string_lossy().into_owned(), Vec::new())
        } else {
            debug!(skill = name, "SKILL.md without a server, skipping");
            continue;
        };

        debug!(skill = name, command = %command, "discovered skill");
        out.push(SkillDescriptor::new(name, command, args, Some(doc), HashMap::new()));
    }
    out
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ─────────────────────────────────────────────
// Helper functions
// ─────────────────────────────────────────────

/// Parse YAML-like frontmatter (between `---` delimiters) into key-value pairs.
fn parse_frontmatter(content: &str) -> Option<Vec<(String, String)>> {
    let after_first = content.strip_prefix("---")?;
    let end = after_first.find("\n---")?;
    let block = &after_first[..end];

    let mut pairs = Vec::new();
    for line in block.lines() {
        let line = line.trim();
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                pairs.push((key.to_string(), value.trim().to_string()));
            }
        }
    }

    Some(pairs)
}

/// Strip YAML frontmatter from markdown content.
fn strip_frontmatter(content: &str) -> &str {
    let Some(after_first) = content.strip_prefix("---") else {
        return content;
    };
    match after_first.find("\n---") {
        Some(end) => {
            let rest = &after_first[end + 4..];
            rest.trim_start_matches(['\r', '\n'])
        }
        None => content,
    }
}

fn trim_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'')
}

/// The document's introduction: everything before the first `##` heading
/// that introduces the tool list.
fn extract_blurb(body: &str) -> String {
    let mut kept = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed == "---"
            || trimmed.starts_with("name:")
            || trimmed.starts_with("description:")
            || trimmed.starts_with("allowed-tools:")
        {
            continue;
        }
        if trimmed.starts_with("##") && (trimmed.contains("Tool") || trimmed.contains("工具")) {
            break;
        }
        kept.push(line);
    }
    kept.join("\n").trim().to_string()
}
