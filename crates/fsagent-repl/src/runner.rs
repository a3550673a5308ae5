// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::future::Future;
use std::io::Write;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use fsagent_bootstrap::AgentSession;
use fsagent_core::AgentEvent;

use crate::input::LineSource;
use crate::output;

/// How an interactive session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The user typed `exit`.
    Exited,
    /// Input was exhausted.
    EndOfInput,
    /// The interrupt future fired (Ctrl-C).
    Interrupted,
}

/// Read-evaluate-print loop over an [`AgentSession`].
pub struct InteractiveSession {
    session: AgentSession,
    out: Box<dyn Write + Send>,
}

impl InteractiveSession {
    /// Session printing to stdout.
    pub fn new(session: AgentSession) -> Self {
        Self { session, out: Box::new(std::io::stdout()) }
    }

    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    pub fn session(&self) -> &AgentSession {
        &self.session
    }

    /// Run until `exit`, end of input, or `interrupt` resolves.
    ///
    /// `interrupt` is raced against both reading input and the agent turn.
    /// The tool server is shut down on every exit path, including errors,
    /// which are returned after cleanup.
    pub async fn run<L, I>(&mut self, input: &mut L, interrupt: I) -> anyhow::Result<SessionOutcome>
    where
        L: LineSource + ?Sized,
        I: Future<Output = ()>,
    {
        tokio::pin!(interrupt);
        let result = repl(&self.session, self.out.as_mut(), input, &mut interrupt).await;
        cleanup(&self.session, self.out.as_mut()).await;
        result
    }
}

async fn repl<L, I>(
    session: &AgentSession,
    out: &mut (dyn Write + Send),
    input: &mut L,
    interrupt: &mut I,
) -> anyhow::Result<SessionOutcome>
where
    L: LineSource + ?Sized,
    I: Future<Output = ()> + Unpin,
{
    output::write_banner(out)?;

    loop {
        output::write_prompt(out)?;
        let line = tokio::select! {
            biased;
            _ = &mut *interrupt => return Ok(SessionOutcome::Interrupted),
            line = input.next_line() => line?,
        };
        let Some(line) = line else {
            writeln!(out)?;
            return Ok(SessionOutcome::EndOfInput);
        };

        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") {
            return Ok(SessionOutcome::Exited);
        }
        if query.is_empty() {
            continue;
        }

        writeln!(out, "\nProcessing: '{query}'")?;
        tokio::select! {
            biased;
            _ = &mut *interrupt => return Ok(SessionOutcome::Interrupted),
            res = drive_turn(session, query, &mut *out) => res?,
        }
    }
}

/// Run one turn, rendering events as they arrive.
async fn drive_turn(
    session: &AgentSession,
    query: &str,
    out: &mut (dyn Write + Send),
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel::<AgentEvent>(64);
    let render = async {
        while let Some(event) = rx.recv().await {
            output::render_event(out, &event)?;
        }
        Ok::<_, std::io::Error>(())
    };
    let (turn, rendered) = tokio::join!(session.run_turn(query, tx), render);
    rendered?;
    turn
}

async fn cleanup(session: &AgentSession, out: &mut (dyn Write + Send)) {
    let _ = writeln!(out, "\nClosing MCP server connection...");
    let _ = out.flush();
    if let Err(e) = session.close().await {
        warn!("error while closing MCP server: {e:#}");
    }
    let _ = writeln!(out, "Session ended.");
    let _ = out.flush();
}

/// Answer a single prompt, printing only the agent's text.
///
/// The tool server is shut down before returning, whatever the outcome.
pub async fn run_once<I>(
    session: &AgentSession,
    prompt: &str,
    out: &mut (dyn Write + Send),
    interrupt: I,
) -> anyhow::Result<SessionOutcome>
where
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let result = tokio::select! {
        biased;
        _ = &mut interrupt => Ok(SessionOutcome::Interrupted),
        res = collect_text(session, prompt) => res.and_then(|text| {
            output::write_final(out, &text)?;
            Ok(SessionOutcome::Exited)
        }),
    };
    if let Err(e) = session.close().await {
        warn!("error while closing MCP server: {e:#}");
    }
    debug!(?result, "one-shot run finished");
    result
}

async fn collect_text(session: &AgentSession, prompt: &str) -> anyhow::Result<String> {
    let (tx, mut rx) = mpsc::channel::<AgentEvent>(64);
    let collect = async {
        let mut parts = Vec::new();
        while let Some(event) = rx.recv().await {
            if let AgentEvent::TextComplete(t) = event {
                parts.push(t);
            }
        }
        parts.join("\n")
    };
    let (turn, text) = tokio::join!(session.run_turn(prompt, tx), collect);
    turn.map(|()| text)
}
