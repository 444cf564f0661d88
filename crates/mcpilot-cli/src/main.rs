//! mcpilot CLI — entry point.
//!
//! # Commands
//!
//! - `mcpilot agent [-m MESSAGE] [--stdin] [--logs]` — chat (single-shot or REPL)
//! - `mcpilot tool <skill> <operation> [--args JSON]` — call one skill operation directly
//! - `mcpilot status` — show configuration, providers, and discovered skills
//! - `mcpilot onboard` — write the default config and create data directories

mod credentials;
mod helpers;
mod onboard;
mod printer;
mod repl;
mod status;

use std::io::Read;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{debug, info};

use mcpilot_agent::registry::parse_arguments;
use mcpilot_agent::skills::DISCLOSURE_PREFIX;
use mcpilot_core::config::load_config;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// mcpilot — a reasoning-model agent that loads MCP skills on demand
#[derive(Parser)]
#[command(name = "mcpilot", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent (single-shot or interactive REPL)
    Agent {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long, conflicts_with = "stdin")]
        message: Option<String>,

        /// Read a single message from standard input
        #[arg(long, default_value_t = false)]
        stdin: bool,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Load a skill and call one of its operations directly
    Tool {
        /// Skill name (as listed by `mcpilot status`)
        skill: String,

        /// Operation exposed by the skill's server
        operation: String,

        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Show configuration, provider, and skill status
    Status,

    /// Initialize configuration and data directories
    Onboard,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    credentials::load_dotenv();

    match cli.command {
        Commands::Agent {
            message,
            stdin,
            logs,
        } => {
            init_logging(logs);
            run_agent(message, stdin).await
        }
        Commands::Tool {
            skill,
            operation,
            args,
            logs,
        } => {
            init_logging(logs);
            run_tool(&skill, &operation, &args).await
        }
        Commands::Status => status::run(),
        Commands::Onboard => onboard::run(),
    }
}

// ─────────────────────────────────────────────
// Agent command
// ─────────────────────────────────────────────

async fn run_agent(message: Option<String>, from_stdin: bool) -> Result<()> {
    let mut config = load_config(None);
    credentials::ensure_api_key(&mut config)?;

    let message = if from_stdin {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read message from stdin")?;
        Some(buf.trim().to_string())
    } else {
        message
    };

    let mut agent = helpers::build_agent(&config)?;

    let result = match message {
        Some(msg) if msg.is_empty() => Err(anyhow::anyhow!("empty message")),
        Some(msg) => {
            info!("processing single message");
            agent
                .run_turn(&msg)
                .await
                .map(|outcome| helpers::print_outcome(&outcome))
                .context("agent turn failed")
        }
        None => repl::run(&mut agent).await,
    };

    agent.shutdown().await;
    result
}

// ─────────────────────────────────────────────
// Tool command
// ─────────────────────────────────────────────

async fn run_tool(skill: &str, operation: &str, args: &str) -> Result<()> {
    let config = load_config(None);
    let arguments = parse_arguments(args).context("invalid --args")?;
    let mut registry = helpers::build_registry(&config);

    let result = async {
        let instructions = registry
            .try_dispatch(&format!("{DISCLOSURE_PREFIX}{skill}"), json!({}))
            .await?;
        debug!(skill, chars = instructions.len(), "skill loaded");
        registry.try_dispatch(operation, arguments).await
    }
    .await;

    registry.shutdown().await;
    match result {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("{skill}.{operation} failed"))),
    }
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("mcpilot=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn tool_args_default_to_empty_object() {
        let cli = Cli::try_parse_from(["mcpilot", "tool", "notes", "list_notes"]).unwrap();
        match cli.command {
            Commands::Tool {
                skill,
                operation,
                args,
                logs,
            } => {
                assert_eq!(skill, "notes");
                assert_eq!(operation, "list_notes");
                assert_eq!(args, "{}");
                assert!(!logs);
            }
            _ => panic!("expected tool command"),
        }
    }

    #[test]
    fn message_and_stdin_conflict() {
        assert!(Cli::try_parse_from(["mcpilot", "agent", "-m", "hi", "--stdin"]).is_err());
        assert!(Cli::try_parse_from(["mcpilot", "agent", "--stdin", "--logs"]).is_ok());
    }
}
