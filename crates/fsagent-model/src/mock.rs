// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::{provider::ResponseStream, CompletionRequest, ModelProvider, ResponseEvent, Role};

/// Offline provider selected with `provider = "mock"`.
///
/// Answers every request with `MOCK: <last user message>` and never calls a
/// tool, so the binary can be exercised without an API key.
#[derive(Debug, Default)]
pub struct MockProvider;

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let prompt = req
            .messages
            .iter()
            .rfind(|m| m.role == Role::User)
            .and_then(|m| m.as_text())
            .unwrap_or("[no input]");

        Ok(into_stream(vec![
            ResponseEvent::TextDelta(format!("MOCK: {prompt}")),
            ResponseEvent::Usage { input_tokens: 10, output_tokens: 10 },
            ResponseEvent::Done,
        ]))
    }
}

/// Test provider replaying one prepared event sequence per `complete` call.
///
/// Once the sequences run out every further call answers with
/// `[no more scripts]`.
pub struct ScriptedMockProvider {
    scripts: Mutex<VecDeque<Vec<ResponseEvent>>>,
    calls: AtomicUsize,
    /// Most recent request, for asserting on history and advertised tools.
    pub last_request: Mutex<Option<CompletionRequest>>,
}

impl ScriptedMockProvider {
    pub fn new(scripts: Vec<Vec<ResponseEvent>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A single plain-text answer.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![vec![
            ResponseEvent::TextDelta(reply.into()),
            ResponseEvent::Usage { input_tokens: 5, output_tokens: 5 },
            ResponseEvent::Done,
        ]])
    }

    /// One tool call, then `final_text` once the result has been sent back.
    pub fn tool_then_text(
        call_id: impl Into<String>,
        tool: impl Into<String>,
        arguments: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        let call = ResponseEvent::ToolCall {
            index: 0,
            id: call_id.into(),
            name: tool.into(),
            arguments: arguments.into(),
        };
        Self::new(vec![
            vec![call, ResponseEvent::Done],
            vec![ResponseEvent::TextDelta(final_text.into()), ResponseEvent::Done],
        ])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        "scripted-mock"
    }

    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(req);
        }
        let next = self
            .scripts
            .lock()
            .map_err(|_| anyhow::anyhow!("mock script lock poisoned"))?
            .pop_front();
        let events = next.unwrap_or_else(|| {
            vec![ResponseEvent::TextDelta("[no more scripts]".into()), ResponseEvent::Done]
        });
        Ok(into_stream(events))
    }
}

fn into_stream(events: Vec<ResponseEvent>) -> ResponseStream {
    Box::pin(stream::iter(events.into_iter().map(Ok)))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
