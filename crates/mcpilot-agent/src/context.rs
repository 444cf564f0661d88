//! Context builder — constructs the system prompt.
//!
//! The prompt describes the runtime environment, explains the loader-tool
//! protocol, and lists every registered skill by its short description.

use std::path::PathBuf;

use chrono::Local;
use tracing::warn;

use crate::skills::SkillDescriptor;

const IDENTITY: &str =
    "You are an efficient autonomous agent capable of using tools and skills to solve complex tasks.";

const SKILL_SYSTEM: &str = "## Skill System\n\
You have access to a dynamic skill system via MCP.\n\
Initially, you only have access to \"Loader Tools\" (e.g., `skill_planner`).\n\
To use specific tools (like `init_planning`), you must FIRST confirm you need that capability by checking the loader description, and then call the loader tool.";

const INSTRUCTIONS: &str = "## Instructions\n\
1. Analyze the user's request.\n\
2. If you need a specific tool, check if its skill is loaded.\n\
3. If not loaded, call the corresponding `skill_<name>` tool first.\n\
4. Once loaded, you will receive detailed instructions and access to specialized tools in the next turn.\n\
5. Use minimal steps or tool calls to achieve the user's goal.\n\
\n\
Keep reasoning chain-of-thought light and concise, avoid overthinking. Focus on practical steps and efficient execution. Always use planner tools to break down complex tasks each time you are assigned something to do.";

/// Builds the system prompt for a session.
#[derive(Clone, Debug)]
pub struct ContextBuilder {
    cwd: PathBuf,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    /// Use the process's current directory.
    pub fn new() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|e| {
            warn!(error = %e, "Cannot determine current directory");
            PathBuf::from(".")
        });
        Self { cwd }
    }

    /// Report a different working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Build the full system prompt.
    pub fn build_system_prompt<'a>(&self, skills: impl IntoIterator<Item = &'a SkillDescriptor>) -> String {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S %Z");
        let skill_lines: Vec<String> = skills
            .into_iter()
            .map(|s| format!("- {}: {}", s.name(), s.short_description()))
            .collect();

        format!(
            "{IDENTITY}\n\n\
             ## Environment\n\
             - Operating System: {os}\n\
             - Current working directory: {cwd}\n\
             - Current date and time: {now}\n\n\
             {SKILL_SYSTEM}\n\n\
             {INSTRUCTIONS}\n\n\
             ## Available Skills\n\
             {skills}",
            os = os_name(),
            cwd = self.cwd.display(),
            skills = skill_lines.join("\n"),
        )
    }
}

fn os_name() -> &'static str {
    match std::env::consts::OS {
        "macos" => "macOS",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::skill;

    #[test]
    fn test_prompt_sections_in_order() {
        let skills = [
            skill("notes", "---\ndescription: \"Plain-text notes\"\n---\nBody"),
            skill("web", "No front matter here."),
        ];
        let prompt = ContextBuilder::new()
            .with_cwd("/work/project")
            .build_system_prompt(&skills);

        assert!(prompt.starts_with(IDENTITY));
        let order = [
            "## Environment",
            "## Skill System",
            "## Instructions",
            "## Available Skills",
        ];
        let positions: Vec<usize> = order.iter().map(|h| prompt.find(h).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(prompt.contains("- Current working directory: /work/project"));
        assert!(prompt.contains("3. If not loaded, call the corresponding `skill_<name>` tool first."));
        assert!(prompt.ends_with("- notes: Plain-text notes\n- web: Tools for web"));
    }

    #[test]
    fn test_os_name_is_never_raw_macos() {
        assert_ne!(os_name(), "macos");
        let none: Vec<SkillDescriptor> = Vec::new();
        let prompt = ContextBuilder::new().build_system_prompt(&none);
        assert!(prompt.contains(&format!("- Operating System: {}", os_name())));
    }
}
