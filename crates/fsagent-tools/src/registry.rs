// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use crate::{Tool, ToolCall, ToolOutput};

/// Name, description and JSON Schema of one tool, as advertised to the model.
///
/// Converted into `fsagent_model::ToolSchema` by the agent so this crate does
/// not depend on the model crate.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Tools available to the agent, keyed by name.
///
/// Populated once at startup from the tools the MCP filesystem server
/// advertises; a later registration under the same name replaces the earlier.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_dyn(Arc::new(tool));
    }

    /// Register a tool discovered at runtime, such as an MCP server tool.
    pub fn register_dyn(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_owned();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::debug!(tool = %name, "replacing previously registered tool");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Schemas for all registered tools, sorted by name.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.sorted()
            .into_iter()
            .map(|tool| ToolSchema {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// Dispatch `call` by name. Unknown names yield an error output for the
    /// model rather than failing the turn.
    pub async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(tool) = self.tools.get(&call.name) else {
            tracing::warn!(tool = %call.name, "model requested an unknown tool");
            return ToolOutput::err(&call.id, format!("unknown tool: {}", call.name));
        };
        tool.execute(call).await
    }

    /// Registered tool names in alphabetical order.
    pub fn names(&self) -> Vec<String> {
        self.sorted().into_iter().map(|t| t.name().to_owned()).collect()
    }

    fn sorted(&self) -> Vec<&Arc<dyn Tool>> {
        let mut tools: Vec<&Arc<dyn Tool>> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl FromIterator<Arc<dyn Tool>> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Tool>>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), |mut reg, tool| {
            reg.register_dyn(tool);
            reg
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
