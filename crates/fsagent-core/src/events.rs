// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use fsagent_tools::ToolCall;

/// Progress of one user turn, sent over an mpsc channel while
/// [`Agent::run_turn`](crate::Agent::run_turn) executes.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    TextDelta(String),
    /// All text of one model response; sent once its stream ends.
    TextComplete(String),
    ToolCallStarted(ToolCall),
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        output: String,
        is_error: bool,
    },
    TokenUsage { input: u32, output: u32 },
    /// No more events follow for this turn.
    TurnComplete,
    /// Sent just before the turn fails.
    Error(String),
}
