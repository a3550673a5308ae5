//! `fsagent-mcp-client`: the client side of the Model Context Protocol.
//!
//! Launches an MCP server as a child process and talks newline-delimited
//! JSON-RPC 2.0 over its stdin/stdout.  Only the subset needed to use a
//! server as a tool source is implemented: `initialize`, `tools/list`,
//! `tools/call`, and answering server `ping`s.
//!
//! # Architecture
//! ```text
//! Agent ── ToolRegistry ── McpTool ──┐
//!                                    ▼
//!                     McpClient (request/response by id)
//!                          │ stdin          ▲ stdout (reader task)
//!                          ▼                │
//!                   npx @modelcontextprotocol/server-filesystem <dir>
//! ```

mod client;
mod error;
pub mod protocol;
mod toolset;

pub use client::{McpClient, StdioServerParams};
pub use error::McpError;
pub use protocol::{CallToolResult, Content, McpToolDef, ServerInfo};
pub use toolset::{McpTool, McpToolset};
