use std::time::Duration;

use tokio_util::codec::LinesCodecError;

/// Errors produced by the MCP client.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("failed to launch MCP server `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("MCP server connection closed")]
    Closed,

    #[error("MCP request `{method}` timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    #[error("MCP server returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("MCP transport error: {0}")]
    Transport(String),

    #[error("MCP I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed MCP message: {0}")]
    Protocol(#[from] serde_json::Error),
}

impl From<LinesCodecError> for McpError {
    fn from(e: LinesCodecError) -> Self {
        match e {
            LinesCodecError::Io(io) => McpError::Io(io),
            LinesCodecError::MaxLineLengthExceeded => {
                McpError::Transport("message exceeds maximum line length".into())
            }
        }
    }
}
