// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default agent instruction.  The target directory is fixed by the tool
/// server, so the model is told not to ask for it.
pub const DEFAULT_INSTRUCTION: &str = "Help the user manage their files. You can list files, \
read files, etc. Dont ask the user for name of directory you are working with, you already \
know it, just do the tasks user is asking for.";

/// npm package that implements the filesystem MCP server.
pub const FILESYSTEM_SERVER_PACKAGE: &str = "@modelcontextprotocol/server-filesystem";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub mcp: McpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider identifier: "google" (alias "gemini") or "mock"
    pub provider: String,
    /// Model name forwarded to the provider API
    pub name: String,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files to avoid secrets
    /// in version-controlled files
    pub api_key: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
    /// Maximum tokens to request in a single completion
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "google".into(),
            name: "gemini-2.0-flash".into(),
            api_key_env: None,
            api_key: None,
            base_url: None,
            max_tokens: Some(8192),
            temperature: Some(0.2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent name, used in logs and as the session author
    pub name: String,
    /// System instruction given to the model
    pub instruction: String,
    /// Maximum number of autonomous tool-call rounds per user turn
    pub max_tool_rounds: u32,
    /// Application name the conversation sessions are filed under
    pub app_name: String,
    /// User identifier the conversation sessions are filed under
    pub user_id: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "mcp_filesystem_agent".into(),
            instruction: DEFAULT_INSTRUCTION.into(),
            max_tool_rounds: 25,
            app_name: "mcp_filesystem_app".into(),
            user_id: "user_fs".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory exposed to the filesystem server.  Relative paths resolve
    /// against the current working directory; `~` and `$VAR` are expanded.
    pub target_folder: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self { target_folder: "test_folder".into() }
    }
}

/// How to launch the MCP server subprocess.
///
/// The absolute target folder is always appended as the final argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Extra environment variables for the server process
    pub env: HashMap<String, String>,
    /// Expose only these tools to the agent (all tools when unset)
    pub tool_filter: Option<Vec<String>>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// How long to wait for the server to exit after stdin is closed
    pub shutdown_grace_secs: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            command: "npx".into(),
            args: vec!["-y".into(), FILESYSTEM_SERVER_PACKAGE.into()],
            env: HashMap::new(),
            tool_filter: None,
            request_timeout_secs: 60,
            shutdown_grace_secs: 5,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
