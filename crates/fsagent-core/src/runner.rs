use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;

use crate::{Agent, AgentEvent, InMemorySessionService};

/// Drives an [`Agent`] against sessions held by a session service.
pub struct Runner {
    app_name: String,
    agent: Arc<Agent>,
    session_service: Arc<InMemorySessionService>,
}

impl Runner {
    pub fn new(
        app_name: impl Into<String>,
        agent: Arc<Agent>,
        session_service: Arc<InMemorySessionService>,
    ) -> Self {
        Self { app_name: app_name.into(), agent, session_service }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn session_service(&self) -> &Arc<InMemorySessionService> {
        &self.session_service
    }

    /// Run one agent turn for `new_message` in an existing session.
    ///
    /// The session's history is stored back even if the turn fails, so a
    /// later turn sees what the model and tools already did.
    pub async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        new_message: &str,
        tx: mpsc::Sender<AgentEvent>,
    ) -> anyhow::Result<()> {
        let mut session = self
            .session_service
            .get_session(&self.app_name, user_id, session_id)
            .ok_or_else(|| anyhow!("session not found: {session_id}"))?;

        let result = self.agent.run_turn(&mut session, new_message, tx).await;
        self.session_service.update_session(session);
        result
    }
}
