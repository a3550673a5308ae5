// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use fsagent_config::AgentConfig;
use fsagent_model::{CompletionRequest, Message, ModelProvider, ResponseEvent, ToolSchema};
use fsagent_tools::{ToolCall, ToolOutput, ToolRegistry};

use crate::{events::AgentEvent, session::Session};

/// An LLM agent with a fixed instruction and tool registry.
///
/// The agent holds no conversation state; each call to [`Agent::run_turn`]
/// works on the [`Session`] it is given.
pub struct Agent {
    name: String,
    instruction: String,
    model: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    max_tool_rounds: u32,
}

impl Agent {
    pub fn new(
        config: &AgentConfig,
        model: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            instruction: config.instruction.clone(),
            model,
            tools,
            max_tool_rounds: config.max_tool_rounds,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn model(&self) -> &Arc<dyn ModelProvider> {
        &self.model
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Push a user message, run the model ↔ tool loop, and stream events
    /// through the sender.  The caller drops the receiver when it is no
    /// longer interested.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        user_input: &str,
        tx: mpsc::Sender<AgentEvent>,
    ) -> anyhow::Result<()> {
        if session.messages.is_empty() {
            session.push(Message::system(&self.instruction));
        }
        session.push(Message::user(user_input));
        debug!(agent = %self.name, session = %session.id, "starting turn");

        let mut rounds = 0u32;
        loop {
            rounds += 1;
            if rounds > self.max_tool_rounds {
                // One final tool-free turn so the model can summarise.
                let wrap_msg = format!(
                    "You have reached the maximum tool-call budget ({} rounds). \
                     Do not call any more tools. \
                     Write a concise summary of what has been completed \
                     and what still remains to be done.",
                    self.max_tool_rounds
                );
                session.push(Message::user(wrap_msg));
                let (text, _) = self.stream_one_turn(session, &tx, false).await?;
                if !text.is_empty() {
                    session.push(Message::assistant(&text));
                }
                let _ = tx.send(AgentEvent::TurnComplete).await;
                break;
            }

            let (text, tool_calls) = self.stream_one_turn(session, &tx, true).await?;

            if !text.is_empty() {
                session.push(Message::assistant(&text));
            }

            if tool_calls.is_empty() {
                let _ = tx.send(AgentEvent::TurnComplete).await;
                break;
            }

            // Phase 1: all tool-call messages go in before any results.
            for tc in &tool_calls {
                let _ = tx.send(AgentEvent::ToolCallStarted(tc.clone())).await;
                session.push(Message::tool_call(&tc.id, &tc.name, tc.args.to_string()));
            }

            // Phase 2: execute in parallel; one panicking tool does not cancel the rest.
            let mut tasks = Vec::with_capacity(tool_calls.len());
            for tc in tool_calls.clone() {
                let registry = Arc::clone(&self.tools);
                tasks.push(tokio::spawn(async move { registry.execute(&tc).await }));
            }

            let mut outputs = Vec::with_capacity(tool_calls.len());
            for (tc, task) in tool_calls.iter().zip(tasks) {
                let output = match task.await {
                    Ok(o) => o,
                    Err(e) => ToolOutput::err(&tc.id, format!("tool execution panicked: {e}")),
                };
                if output.is_error {
                    warn!(tool = %tc.name, "tool returned an error: {}", output.content);
                }
                let _ = tx
                    .send(AgentEvent::ToolCallFinished {
                        call_id: tc.id.clone(),
                        tool_name: tc.name.clone(),
                        output: output.content.clone(),
                        is_error: output.is_error,
                    })
                    .await;
                outputs.push(output);
            }

            // Phase 3: results, in call order.
            for (tc, output) in tool_calls.iter().zip(outputs) {
                session.push(Message::tool_result(&tc.id, output.content));
            }
        }

        Ok(())
    }

    /// Call the model once, streaming text deltas and collecting tool calls.
    async fn stream_one_turn(
        &self,
        session: &Session,
        tx: &mpsc::Sender<AgentEvent>,
        with_tools: bool,
    ) -> anyhow::Result<(String, Vec<ToolCall>)> {
        let tools: Vec<ToolSchema> = if with_tools {
            self.tools
                .schemas()
                .into_iter()
                .map(|s| ToolSchema {
                    name: s.name,
                    description: s.description,
                    parameters: s.parameters,
                })
                .collect()
        } else {
            vec![]
        };

        let req = CompletionRequest { messages: session.messages.clone(), tools, stream: true };
        let mut stream = self.model.complete(req).await.context("model completion failed")?;

        let mut full_text = String::new();
        // Keyed by the provider's parallel-call index.
        let mut pending: HashMap<u32, PendingToolCall> = HashMap::new();

        while let Some(event) = stream.next().await {
            match event.context("model stream failed")? {
                ResponseEvent::TextDelta(delta) if !delta.is_empty() => {
                    full_text.push_str(&delta);
                    let _ = tx.send(AgentEvent::TextDelta(delta)).await;
                }
                ResponseEvent::TextDelta(_) => {}
                ResponseEvent::ToolCall { index, id, name, arguments } => {
                    let ptc = pending.entry(index).or_default();
                    if !id.is_empty() {
                        ptc.id = id;
                    }
                    if !name.is_empty() {
                        ptc.name = name;
                    }
                    ptc.args_buf.push_str(&arguments);
                }
                ResponseEvent::Usage { input_tokens, output_tokens } => {
                    let _ = tx
                        .send(AgentEvent::TokenUsage { input: input_tokens, output: output_tokens })
                        .await;
                }
                ResponseEvent::Done => break,
                ResponseEvent::Error(e) => {
                    let _ = tx.send(AgentEvent::Error(e.clone())).await;
                    bail!("model returned an error: {e}");
                }
            }
        }

        // Calls without a name cannot be dispatched and are dropped; an
        // empty id gets a synthetic one so results can still be matched.
        let mut sorted: Vec<(u32, PendingToolCall)> = pending.into_iter().collect();
        sorted.sort_by_key(|(idx, _)| *idx);
        let mut tool_calls = Vec::with_capacity(sorted.len());
        for (i, (_, ptc)) in sorted.into_iter().enumerate() {
            if ptc.name.is_empty() {
                warn!(tool_call_id = %ptc.id, "dropping tool call with empty name");
                continue;
            }
            let mut tc = ptc.finish();
            if tc.id.is_empty() {
                tc.id = format!("tc_synthetic_{i}");
            }
            tool_calls.push(tc);
        }

        if !full_text.is_empty() {
            let _ = tx.send(AgentEvent::TextComplete(full_text.clone())).await;
        }

        Ok((full_text, tool_calls))
    }
}

#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    args_buf: String,
}

impl PendingToolCall {
    fn finish(self) -> ToolCall {
        // Always an object: the tool server rejects `null` arguments.
        let args = if self.args_buf.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            match serde_json::from_str(&self.args_buf) {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        tool_name = %self.name,
                        tool_call_id = %self.id,
                        "invalid JSON arguments from model: {e}"
                    );
                    serde_json::Value::Object(Default::default())
                }
            }
        };
        ToolCall { id: self.id, name: self.name, args }
    }
}
