//! Tool registry for crewloop
//!
//! This module provides the [`ToolRegistry`], the closed name → handler
//! mapping built once at start-up. Execution never fails: unknown names and
//! handler errors come back as error results for the model to read.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{CrewError, Result};
use crate::providers::ToolDefinition;

use super::{Tool, ToolContext, ToolOutput};

/// A registry that holds and dispatches tools in registration order.
///
/// # Example
///
/// ```rust
/// use crewloop::config::AgentMode;
/// use crewloop::tools::{control::RestartProgramTool, ToolContext, ToolRegistry};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let mut registry = ToolRegistry::new();
/// registry.register(Box::new(RestartProgramTool)).unwrap();
///
/// let ctx = ToolContext::new("Claude", AgentMode::Single);
/// let output = registry.execute("restart_program", json!({}), &ctx).await;
/// assert!(output.signals().restart);
/// # });
/// ```
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. A second tool with the same name is a start-up error.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(CrewError::Config(format!(
                "Duplicate tool registration: {}",
                name
            )));
        }
        info!(tool = %name, "Registering tool");
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    /// Execute a tool by name.
    ///
    /// Unknown names and handler failures are turned into error results.
    pub async fn execute(&self, name: &str, input: Value, ctx: &ToolContext) -> ToolOutput {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "Model requested an unknown tool");
            return ToolOutput::error(format!("Tool not found: {}", name));
        };

        let start = Instant::now();
        match tool.execute(input, ctx).await {
            Ok(output) => {
                info!(
                    tool = name,
                    is_error = output.is_error,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool executed"
                );
                output
            }
            Err(e) => {
                error!(
                    tool = name,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                ToolOutput::error(e.to_string())
            }
        }
    }

    /// Definitions for the reasoning service, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.parameters()))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
