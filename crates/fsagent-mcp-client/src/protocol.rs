//! JSON-RPC 2.0 envelopes and the MCP payload types this client uses.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::McpError;

/// Protocol revision announced in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC "method not found".
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Build a request envelope.
pub fn request(id: u64, method: &str, params: Option<Value>) -> Value {
    let mut msg = json!({ "jsonrpc": "2.0", "id": id, "method": method });
    if let Some(p) = params {
        msg["params"] = p;
    }
    msg
}

/// Build a notification envelope (no id, no response expected).
pub fn notification(method: &str, params: Option<Value>) -> Value {
    let mut msg = json!({ "jsonrpc": "2.0", "method": method });
    if let Some(p) = params {
        msg["params"] = p;
    }
    msg
}

/// Successful response to a server-initiated request.
pub fn response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

/// Error response to a server-initiated request.
pub fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

/// A message read from the server, classified by shape.
#[derive(Debug)]
pub enum Incoming {
    /// Reply to one of our requests.
    Response { id: u64, result: Result<Value, McpError> },
    /// The server is asking us something.
    Request { id: Value, method: String },
    /// Fire-and-forget message from the server.
    Notification { method: String, params: Value },
    /// Anything else (logged and dropped).
    Invalid(String),
}

/// Classify a decoded JSON-RPC message.
pub fn classify(msg: Value) -> Incoming {
    let method = msg.get("method").and_then(Value::as_str).map(str::to_string);
    let id = msg.get("id").cloned().filter(|v| !v.is_null());

    match (method, id) {
        (Some(method), Some(id)) => Incoming::Request { id, method },
        (Some(method), None) => Incoming::Notification {
            method,
            params: msg.get("params").cloned().unwrap_or(Value::Null),
        },
        (None, Some(id)) => {
            let Some(id) = id.as_u64() else {
                return Incoming::Invalid(format!("response with non-numeric id {id}"));
            };
            let result = if let Some(err) = msg.get("error") {
                Err(McpError::Rpc {
                    code: err["code"].as_i64().unwrap_or(0),
                    message: err["message"].as_str().unwrap_or("unknown error").to_string(),
                })
            } else {
                Ok(msg.get("result").cloned().unwrap_or(Value::Null))
            };
            Incoming::Response { id, result }
        }
        (None, None) => Incoming::Invalid(msg.to_string()),
    }
}

// ─── MCP payloads ─────────────────────────────────────────────────────────────

/// `serverInfo` from the `initialize` result.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    pub protocol_version: String,
    #[serde(default)]
    pub server_info: ServerInfo,
    #[serde(default)]
    pub capabilities: Value,
}

/// A tool advertised by the server in `tools/list`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct McpToolDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<McpToolDef>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// One content block of a tool result.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Content {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Result of `tools/call`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<Content>,
    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Join the text blocks; non-text blocks are summarised by type.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|c| match &c.text {
                Some(t) if c.kind == "text" => t.clone(),
                _ => format!("[{} content]", c.kind),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
