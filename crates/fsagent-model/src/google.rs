//! Google Gemini driver for the native Generative Language API.
//!
//! Uses the `streamGenerateContent` endpoint with server-sent events.
//! Supports text and function calls.
//!
//! # Auth
//! API key via the `x-goog-api-key` header, never in the URL.
//!
//! # Endpoint pattern
//! `POST https://generativelanguage.googleapis.com/v1beta/models/{model}:streamGenerateContent?alt=sse`

use std::collections::HashMap;

use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    provider::ResponseStream, sanitize::sanitize_gemini_schema, CompletionRequest, Message,
    MessageContent, ResponseEvent, Role,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GoogleProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            model,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            max_tokens: max_tokens.unwrap_or(8192),
            temperature: temperature.unwrap_or(0.2),
            client: reqwest::Client::new(),
        }
    }

    /// Build the JSON body for a `generateContent` call.
    fn request_body(&self, req: &CompletionRequest) -> Value {
        // Separate system instruction from conversation
        let mut system_parts: Vec<Value> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();
        let call_names = tool_call_names(&req.messages);

        for m in &req.messages {
            match m.role {
                Role::System => {
                    if let Some(t) = m.as_text() {
                        system_parts.push(json!({ "text": t }));
                    }
                }
                Role::User | Role::Tool => {
                    let parts = message_to_gemini_parts(m, &call_names);
                    push_content(&mut contents, "user", parts);
                }
                Role::Assistant => {
                    let parts = message_to_gemini_parts(m, &call_names);
                    push_content(&mut contents, "model", parts);
                }
            }
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": self.max_tokens,
                "temperature": self.temperature,
            }
        });
        if !system_parts.is_empty() {
            body["systemInstruction"] = json!({ "parts": system_parts });
        }
        if !req.tools.is_empty() {
            let function_declarations: Vec<Value> = req.tools.iter().map(|t| json!({
                "name": t.name,
                "description": t.description,
                "parameters": sanitize_gemini_schema(&t.parameters),
            })).collect();
            body["tools"] = json!([{ "functionDeclarations": function_declarations }]);
        }
        body
    }
}

#[async_trait]
impl crate::ModelProvider for GoogleProvider {
    fn name(&self) -> &str { "google" }
    fn model_name(&self) -> &str { &self.model }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let key = self.api_key.as_deref()
            .context("Gemini API key not set (GEMINI_API_KEY or GOOGLE_API_KEY)")?;

        let body = self.request_body(&req);
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model,
        );

        debug!(model = %self.model, messages = req.messages.len(), tools = req.tools.len(),
            "sending Google Gemini request");

        let resp = self.client
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Google Gemini request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Google Gemini error {status}: {text}");
        }

        let mut decoder = SseDecoder::default();
        let event_stream = resp.bytes_stream().flat_map(move |chunk| {
            let events: Vec<anyhow::Result<ResponseEvent>> = match chunk {
                Ok(b) => decoder.feed(&b),
                Err(e) => vec![Err(anyhow::anyhow!(e.without_url()))],
            };
            futures::stream::iter(events)
        });

        Ok(Box::pin(event_stream))
    }
}

/// Incremental decoder for the SSE body.  Network chunks may split a
/// `data:` line anywhere, even inside a UTF-8 sequence, so raw bytes are
/// buffered and only complete lines are decoded.
#[derive(Default)]
struct SseDecoder {
    buf: Vec<u8>,
    next_call_index: u32,
}

impl SseDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Vec<anyhow::Result<ResponseEvent>> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = match std::str::from_utf8(&raw) {
                Ok(l) => l,
                Err(e) => {
                    debug!("skipping non-UTF-8 Gemini SSE line: {e}");
                    continue;
                }
            };
            let Some(data) = line.trim_end().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                events.push(Ok(ResponseEvent::Done));
                continue;
            }
            match serde_json::from_str::<Value>(data) {
                Ok(v) => events.extend(parse_gemini_chunk(&v, &mut self.next_call_index).into_iter().map(Ok)),
                Err(e) => debug!("skipping malformed Gemini SSE line: {e}"),
            }
        }
        events
    }
}

/// Append a content block, merging with the previous block of the same role.
/// Gemini expects parallel function calls (and their responses) grouped in
/// one turn.
fn push_content(contents: &mut Vec<Value>, role: &str, parts: Vec<Value>) {
    if let Some(last) = contents.last_mut() {
        if last["role"] == role {
            if let Some(existing) = last["parts"].as_array_mut() {
                existing.extend(parts);
                return;
            }
        }
    }
    contents.push(json!({ "role": role, "parts": parts }));
}

/// Map tool-call ids to function names; Gemini function responses are
/// matched by name, not id.
fn tool_call_names(messages: &[Message]) -> HashMap<&str, &str> {
    messages
        .iter()
        .filter_map(|m| match &m.content {
            MessageContent::ToolCall { tool_call_id, function } => {
                Some((tool_call_id.as_str(), function.name.as_str()))
            }
            _ => None,
        })
        .collect()
}

/// Convert a message into Gemini API `parts` array.
fn message_to_gemini_parts(m: &Message, call_names: &HashMap<&str, &str>) -> Vec<Value> {
    match &m.content {
        MessageContent::Text(t) => vec![json!({ "text": t })],
        MessageContent::ToolCall { tool_call_id: _, function } => {
            let input: Value = serde_json::from_str(&function.arguments).unwrap_or(json!({}));
            vec![json!({
                "functionCall": {
                    "name": function.name,
                    "args": input,
                }
            })]
        }
        MessageContent::ToolResult { tool_call_id, content } => {
            let name = call_names.get(tool_call_id.as_str()).copied().unwrap_or(tool_call_id);
            vec![json!({
                "functionResponse": {
                    "name": name,
                    "response": { "output": content },
                }
            })]
        }
    }
}

fn parse_gemini_chunk(v: &Value, next_call_index: &mut u32) -> Vec<ResponseEvent> {
    let mut events = Vec::new();

    if let Some(err) = v.get("error") {
        let msg = err["message"].as_str().unwrap_or("unknown error").to_string();
        events.push(ResponseEvent::Error(msg));
        return events;
    }

    let candidate = &v["candidates"][0];
    if let Some(parts) = candidate["content"]["parts"].as_array() {
        for part in parts {
            // Thought summaries are not surfaced to the user.
            if part.get("thought").and_then(Value::as_bool) == Some(true) {
                continue;
            }
            if let Some(fc) = part.get("functionCall") {
                let name = fc["name"].as_str().unwrap_or("").to_string();
                let index = *next_call_index;
                *next_call_index += 1;
                let id = fc["id"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("call_{index}_{name}"));
                let args = if fc["args"].is_null() {
                    "{}".to_string()
                } else {
                    fc["args"].to_string()
                };
                events.push(ResponseEvent::ToolCall { index, id, name, arguments: args });
                continue;
            }
            if let Some(text) = part["text"].as_str() {
                if !text.is_empty() {
                    events.push(ResponseEvent::TextDelta(text.to_string()));
                }
            }
        }
    }

    if let Some(meta) = v.get("usageMetadata") {
        if candidate["finishReason"].as_str().is_some() {
            events.push(ResponseEvent::Usage {
                input_tokens: meta["promptTokenCount"].as_u64().unwrap_or(0) as u32,
                output_tokens: meta["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
            });
        }
    }

    if candidate["finishReason"].as_str().is_some() {
        events.push(ResponseEvent::Done);
    }

    events
}
