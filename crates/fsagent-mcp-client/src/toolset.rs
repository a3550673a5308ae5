use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use fsagent_config::McpConfig;
use fsagent_tools::{Tool, ToolCall, ToolOutput, Toolset};

use crate::client::{McpClient, StdioServerParams};
use crate::error::McpError;
use crate::protocol::McpToolDef;

/// Every tool of one MCP server, exposed through the [`Toolset`] interface.
pub struct McpToolset {
    name: String,
    client: Arc<McpClient>,
    tool_filter: Option<Vec<String>>,
    shutdown_grace: Duration,
}

impl McpToolset {
    /// Launch the server and complete the handshake.
    ///
    /// If the handshake fails the server is shut down before returning.
    pub async fn connect(
        name: impl Into<String>,
        params: &StdioServerParams,
        request_timeout: Duration,
        shutdown_grace: Duration,
    ) -> Result<Self, McpError> {
        let client = McpClient::connect_stdio(params, request_timeout)?;
        if let Err(e) = client.initialize().await {
            let _ = client.close(shutdown_grace).await;
            return Err(e);
        }
        Ok(Self {
            name: name.into(),
            client: Arc::new(client),
            tool_filter: None,
            shutdown_grace,
        })
    }

    /// Launch the configured filesystem server rooted at `root`.
    pub async fn from_config(cfg: &McpConfig, root: &Path) -> Result<Self, McpError> {
        let params = StdioServerParams::from_config(cfg, root);
        let toolset = Self::connect(
            "filesystem",
            &params,
            Duration::from_secs(cfg.request_timeout_secs),
            Duration::from_secs(cfg.shutdown_grace_secs),
        )
        .await?;
        Ok(toolset.with_filter(cfg.tool_filter.clone()))
    }

    /// Restrict the exposed tools to `filter` (by name).
    pub fn with_filter(mut self, filter: Option<Vec<String>>) -> Self {
        self.tool_filter = filter;
        self
    }

    pub fn client(&self) -> &Arc<McpClient> {
        &self.client
    }

    fn allowed(&self, name: &str) -> bool {
        self.tool_filter.as_ref().map_or(true, |f| f.iter().any(|n| n == name))
    }
}

#[async_trait]
impl Toolset for McpToolset {
    fn name(&self) -> &str {
        &self.name
    }

    async fn tools(&self) -> anyhow::Result<Vec<Arc<dyn Tool>>> {
        let defs = self.client.list_tools().await?;
        let tools: Vec<Arc<dyn Tool>> = defs
            .into_iter()
            .filter(|d| self.allowed(&d.name))
            .map(|def| Arc::new(McpTool::new(def, Arc::clone(&self.client))) as Arc<dyn Tool>)
            .collect();
        info!(toolset = %self.name, count = tools.len(), "MCP tools available");
        Ok(tools)
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.client.close(self.shutdown_grace).await?;
        Ok(())
    }
}

/// One remote tool; execution is forwarded to the server via `tools/call`.
pub struct McpTool {
    def: McpToolDef,
    description: String,
    client: Arc<McpClient>,
}

impl McpTool {
    pub fn new(def: McpToolDef, client: Arc<McpClient>) -> Self {
        let description = def.description.clone().unwrap_or_else(|| def.name.clone());
        Self { def, description, client }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.def.input_schema.clone()
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let args = if call.args.is_null() { Value::Object(Default::default()) } else { call.args.clone() };
        debug!(tool = %self.def.name, %args, "calling MCP tool");
        match self.client.call_tool(&self.def.name, args).await {
            Ok(result) if result.is_error => ToolOutput::err(&call.id, result.text()),
            Ok(result) => ToolOutput::ok(&call.id, result.text()),
            Err(e) => ToolOutput::err(&call.id, format!("MCP tool `{}` failed: {e}", self.def.name)),
        }
    }
}
