//! crewloop - long-running autonomous agents with durable restarts

pub mod agent;
pub mod bus;
pub mod config;
pub mod error;
pub mod health;
pub mod providers;
pub mod relay;
pub mod session;
pub mod tools;
pub mod utils;

pub use agent::{AgentLoop, Transition};
pub use bus::{InboundQueue, QueuedMessage};
pub use config::{AgentMode, Config, TeamConfig};
pub use error::{CrewError, Result};
pub use providers::{
    ChatOptions, ClaudeProvider, InferenceBoundary, LLMProvider, LLMResponse, LLMToolCall,
    RetryProvider, ToolDefinition, Usage,
};
pub use session::{ContextStore, Message, PersistedSession, Role};
