use std::io::{self, Write};

use fsagent_core::AgentEvent;
use tracing::{debug, info, warn};

pub const BANNER: &str = "Interactive File System Agent (type 'exit' to quit)";
pub const PROMPT: &str = "Enter your query: ";

/// Blank line, banner, then a rule of 50 `=`.
pub fn write_banner<W: Write + ?Sized>(out: &mut W) -> io::Result<()> {
    writeln!(out, "\n{BANNER}")?;
    writeln!(out, "{}", "=".repeat(50))
}

/// Blank line, then the prompt without a trailing newline; flushed so it
/// shows before input.
pub fn write_prompt<W: Write + ?Sized>(out: &mut W) -> io::Result<()> {
    write!(out, "\n{PROMPT}")?;
    out.flush()
}

/// Render one agent event for the interactive loop.
///
/// Completed text goes to `out`; tool activity goes to the log.
pub fn render_event<W: Write + ?Sized>(out: &mut W, event: &AgentEvent) -> io::Result<()> {
    match event {
        AgentEvent::TextComplete(text) => {
            writeln!(out, "Agent: {text}")?;
            out.flush()
        }
        AgentEvent::ToolCallStarted(tc) => {
            info!(tool = %tc.name, args = %tc.args, "tool call");
            Ok(())
        }
        AgentEvent::ToolCallFinished { tool_name, is_error: true, output, .. } => {
            warn!(tool = %tool_name, "tool failed: {output}");
            Ok(())
        }
        AgentEvent::ToolCallFinished { tool_name, output, .. } => {
            debug!(tool = %tool_name, bytes = output.len(), "tool finished");
            Ok(())
        }
        AgentEvent::TokenUsage { input, output } => {
            debug!(input, output, "token usage");
            Ok(())
        }
        AgentEvent::Error(e) => {
            warn!("model error: {e}");
            Ok(())
        }
        AgentEvent::TextDelta(_) | AgentEvent::TurnComplete => Ok(()),
    }
}

/// Write `text` and make sure the output ends with a newline.
pub fn write_final<W: Write + ?Sized>(out: &mut W, text: &str) -> io::Result<()> {
    write!(out, "{text}")?;
    if !text.ends_with('\n') {
        writeln!(out)?;
    }
    out.flush()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(f: impl FnOnce(&mut dyn Write) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn banner_has_fifty_char_rule() {
        let s = rendered(|o| write_banner(o));
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines[0], "");
        assert_eq!(lines[1], BANNER);
        assert_eq!(lines[2], "=".repeat(50));
    }

    #[test]
    fn prompt_follows_blank_line_without_trailing_newline() {
        assert_eq!(rendered(|o| write_prompt(o)), "\nEnter your query: ");
    }

    #[test]
    fn only_completed_text_is_printed() {
        let s = rendered(|out| {
            render_event(out, &AgentEvent::TextDelta("partial".into()))?;
            render_event(out, &AgentEvent::TextComplete("Found 2 files.".into()))?;
            render_event(out, &AgentEvent::TurnComplete)
        });
        assert_eq!(s, "Agent: Found 2 files.\n");
    }

    #[test]
    fn final_text_gets_one_newline() {
        assert_eq!(rendered(|o| write_final(o, "done")), "done\n");
        assert_eq!(rendered(|o| write_final(o, "done\n")), "done\n");
        assert_eq!(rendered(|o| write_final(o, "")), "\n");
    }
}
