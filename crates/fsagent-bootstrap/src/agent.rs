// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! [`AgentBuilder`]: single entry point for constructing a wired Agent.

use std::sync::Arc;

use fsagent_config::Config;
use fsagent_core::Agent;
use fsagent_model::ModelProvider;
use fsagent_tools::{Tool, ToolRegistry};

/// Constructs an [`Agent`] from configuration and discovered tools.
///
/// # Example
/// ```rust,ignore
/// let agent = AgentBuilder::new(config)
///     .with_tools(toolset.tools().await?)
///     .build(model);
/// ```
pub struct AgentBuilder {
    config: Arc<Config>,
    registry: ToolRegistry,
}

impl AgentBuilder {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config, registry: ToolRegistry::new() }
    }

    /// Add tools (typically everything a toolset exposes).
    pub fn with_tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        for tool in tools {
            self.registry.register_dyn(tool);
        }
        self
    }

    pub fn build(self, model: Arc<dyn ModelProvider>) -> Agent {
        Agent::new(&self.config.agent, model, Arc::new(self.registry))
    }
}
