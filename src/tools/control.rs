//! Lifecycle tools: restart, reset and shutdown.
//!
//! These tools only describe the transition they want; the loop reads the
//! flags from the result and does the persisting and process replacement.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::error::Result;

use super::types::optional_str;
use super::{Tool, ToolContext, ToolOutput};

const DEFAULT_RESTART_REASON: &str = "Reloading tools";
const DEFAULT_SHUTDOWN_REASON: &str = "Shutdown requested";

/// Restart the process and keep the conversation.
pub struct RestartProgramTool;

#[async_trait]
impl Tool for RestartProgramTool {
    fn name(&self) -> &str {
        "restart_program"
    }

    fn description(&self) -> &str {
        "Restart the program while preserving the conversation. The conversation is saved \
         and reloaded when the program starts again."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "reason": {
                    "type": "string",
                    "description": "Optional reason for restarting."
                }
            }
        })
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let reason = optional_str(&input, "reason").unwrap_or(DEFAULT_RESTART_REASON);
        info!(reason, "Restart requested by agent");
        Ok(ToolOutput::structured(json!({
            "message": "Program will restart.",
            "reason": reason,
            "restart": true,
            "agent_initiated": true
        })))
    }
}

/// Restart the process with an empty conversation.
pub struct ResetContextTool;

#[async_trait]
impl Tool for ResetContextTool {
    fn name(&self) -> &str {
        "reset_context"
    }

    fn description(&self) -> &str {
        "Discard the saved conversation and restart the program with a clean context."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _input: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        info!("Context reset requested by agent");
        Ok(ToolOutput::structured(json!({
            "message": "Conversation context will be discarded and the program restarted.",
            "restart": true,
            "reset_context": true
        })))
    }
}

/// Stop for good. Saved state is removed on the way out.
pub struct GracefulShutdownTool;

#[async_trait]
impl Tool for GracefulShutdownTool {
    fn name(&self) -> &str {
        "graceful_shutdown"
    }

    fn description(&self) -> &str {
        "Shut yourself down completely once all intended work is finished. The saved \
         conversation is deleted and the agent does not continue afterwards. Use it only \
         when you are ready to conclude the session."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "reason": {
                    "type": "string",
                    "description": "Optional reason for shutting down."
                },
                "final_message": {
                    "type": "string",
                    "description": "Optional last words shown before shutdown."
                }
            }
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let reason = optional_str(&input, "reason").unwrap_or(DEFAULT_SHUTDOWN_REASON);
        let default_final = format!("{} shutting down gracefully. Goodbye!", ctx.agent_name);
        let final_message = optional_str(&input, "final_message").unwrap_or(&default_final);
        info!(reason, final_message, "Graceful shutdown requested");
        Ok(ToolOutput::structured(json!({
            "message": "Shutting down.",
            "reason": reason,
            "final_message": final_message,
            "shutdown": true
        })))
    }
}
