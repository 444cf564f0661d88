//! Terminal rendering of a conversation as it streams.

use std::io::{self, Stdout, Write};

use colored::Colorize;

use mcpilot_core::hooks::TurnObserver;
use mcpilot_core::types::{Message, ToolCall};
use mcpilot_core::utils::truncate_string;

const MAX_ARGS_CHARS: usize = 200;
const MAX_RESULT_CHARS: usize = 500;

/// Streams reasoning (dimmed italic) and content, and prints tool activity.
pub struct ConsolePrinter<W: Write + Send = Stdout> {
    out: W,
    in_reasoning: bool,
    /// Streamed text has been printed without a trailing newline.
    mid_line: bool,
}

impl ConsolePrinter<Stdout> {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for ConsolePrinter<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> ConsolePrinter<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            in_reasoning: false,
            mid_line: false,
        }
    }

    fn end_line(&mut self) {
        if self.mid_line {
            let _ = writeln!(self.out);
            self.mid_line = false;
        }
        self.in_reasoning = false;
    }

    /// `rendered` may carry ANSI styling; line state follows the raw `text`.
    fn write_stream(&mut self, text: &str, rendered: &str) {
        let _ = write!(self.out, "{rendered}");
        let _ = self.out.flush();
        self.mid_line = !text.ends_with('\n');
    }
}

impl<W: Write + Send> TurnObserver for ConsolePrinter<W> {
    fn on_message(&mut self, message: &Message) {
        if let Message::Assistant { .. } = message {
            self.end_line();
        }
    }

    fn on_reasoning_delta(&mut self, text: &str) {
        if !self.in_reasoning {
            self.end_line();
            let _ = writeln!(self.out, "{}", "Thinking:".dimmed().bold());
            self.in_reasoning = true;
        }
        let styled = text.dimmed().italic().to_string();
        self.write_stream(text, &styled);
    }

    fn on_content_delta(&mut self, text: &str) {
        if self.in_reasoning {
            self.end_line();
            let _ = writeln!(self.out);
        }
        self.write_stream(text, text);
    }

    fn on_tool_call(&mut self, call: &ToolCall) {
        self.end_line();
        let _ = writeln!(
            self.out,
            "{} {} {}",
            "▶".cyan(),
            call.name().bold(),
            truncate_string(call.arguments(), MAX_ARGS_CHARS).dimmed()
        );
    }

    fn on_tool_result(&mut self, _call: &ToolCall, result: &str) {
        let shown = truncate_string(result, MAX_RESULT_CHARS);
        let styled = if result.starts_with("Error") {
            shown.red().to_string()
        } else {
            shown.dimmed().to_string()
        };
        let _ = writeln!(self.out, "  {} {}", "↳".green(), styled);
    }

    fn on_notice(&mut self, text: &str) {
        self.end_line();
        let _ = writeln!(self.out, "{}", text.blue());
    }

    fn on_warning(&mut self, text: &str) {
        self.end_line();
        let _ = writeln!(self.out, "{}", text.yellow());
    }
}
