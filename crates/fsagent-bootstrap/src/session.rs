//! One-call setup of a ready-to-use agent session.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

use fsagent_config::Config;
use fsagent_core::{AgentEvent, InMemorySessionService, Runner};
use fsagent_mcp_client::{McpError, McpToolset};
use fsagent_model::ModelProvider;
use fsagent_tools::Toolset;

use crate::{setup_target_directory, AgentBuilder, TargetDirError};

/// Why a session could not be started.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error(transparent)]
    TargetDir(#[from] TargetDirError),

    #[error("failed to start MCP filesystem server: {0}")]
    Mcp(#[from] McpError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything a frontend needs to talk to the agent.
///
/// The owner must call [`AgentSession::close`] when done; it shuts the tool
/// server down.
pub struct AgentSession {
    pub target_dir: PathBuf,
    pub toolset: Arc<dyn Toolset>,
    pub runner: Arc<Runner>,
    pub user_id: String,
    pub session_id: String,
}

impl AgentSession {
    /// Run one agent turn in this session.
    pub async fn run_turn(&self, text: &str, tx: mpsc::Sender<AgentEvent>) -> anyhow::Result<()> {
        self.runner.run(&self.user_id, &self.session_id, text, tx).await
    }

    /// Shut the tool server down.  Safe to call more than once.
    pub async fn close(&self) -> anyhow::Result<()> {
        self.toolset.close().await
    }
}

/// Prepare the target directory, launch the filesystem server there, and
/// wire its tools into an agent with a fresh conversation session.
///
/// The directory is checked before anything is spawned.  If a later step
/// fails, the server is shut down before the error is returned.
pub async fn start_session(
    config: Arc<Config>,
    model: Arc<dyn ModelProvider>,
) -> Result<AgentSession, StartError> {
    let target_dir = setup_target_directory(&config.workspace.target_folder)?;

    let toolset = McpToolset::from_config(&config.mcp, &target_dir).await?;
    let toolset: Arc<dyn Toolset> = Arc::new(toolset);

    let tools = match toolset.tools().await {
        Ok(t) => t,
        Err(e) => {
            if let Err(close_err) = toolset.close().await {
                warn!("failed to close MCP server: {close_err}");
            }
            return Err(StartError::Other(e.context("failed to list MCP tools")));
        }
    };

    let agent = AgentBuilder::new(Arc::clone(&config)).with_tools(tools).build(model);
    info!(
        agent = %agent.name(),
        model = %agent.model().model_name(),
        tools = agent.tools().len(),
        "agent ready"
    );

    let service = Arc::new(InMemorySessionService::new());
    let mut state = HashMap::new();
    state.insert(
        "target_dir".to_string(),
        Value::String(target_dir.display().to_string()),
    );
    let session = service.create_session(&config.agent.app_name, &config.agent.user_id, state);
    let runner = Runner::new(config.agent.app_name.clone(), Arc::new(agent), service);

    Ok(AgentSession {
        target_dir,
        toolset,
        runner: Arc::new(runner),
        user_id: config.agent.user_id.clone(),
        session_id: session.id,
    })
}
