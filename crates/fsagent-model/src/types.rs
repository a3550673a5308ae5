use serde::{Deserialize, Serialize};

/// One entry of the conversation history sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: MessageContent::Text(text.into()) }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Text(text.into()) }
    }

    /// An assistant message requesting a single tool invocation.
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::ToolCall {
                tool_call_id: id.into(),
                function: FunctionCall { name: name.into(), arguments: arguments.into() },
            },
        }
    }

    pub fn tool_result(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult {
                tool_call_id: id.into(),
                content: content.into(),
            },
        }
    }

    /// Plain text of a `Text` message; `None` for tool calls and results.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Payload of a [`Message`]. Tool calls and results carry the call id that
/// links a result to the request it answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    ToolCall {
        tool_call_id: String,
        function: FunctionCall,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// Arguments as the raw JSON text produced by the model.
    pub arguments: String,
}

/// Tool declaration advertised to the model in each request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Full history plus the tools the model may call.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub stream: bool,
}

/// Streamed output of one model call.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    TextDelta(String),
    /// The model wants to call a tool.
    ///
    /// `index` distinguishes parallel calls within one response; deltas
    /// with the same index belong to the same call.
    ToolCall {
        index: u32,
        id: String,
        name: String,
        /// Argument JSON fragment; concatenate fragments of the same index.
        arguments: String,
    },
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
    Done,
    /// The provider reported a failure; the agent aborts the turn.
    Error(String),
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
