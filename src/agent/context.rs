//! System prompt and the fixed messages the loop injects into a conversation.
//!
//! [`ContextBuilder`] renders the per-mode system prompt for one agent. The
//! constants below are the only text the loop ever writes on the model's
//! behalf.

use crate::config::AgentMode;

/// User turn appended after restoring a persisted session.
pub const RESTART_NOTICE: &str = "The program has restarted and is continuing execution \
automatically. Please continue from where you left off.";

/// User turn appended in team mode when nothing arrived since the last reply.
pub const IDLE_NOTICE: &str =
    "[Automated Message] There are currently no new messages. Please wait.";

/// Prefix of the single user turn that replaces the conversation after a
/// token-budget summary.
pub const SUMMARY_PREFIX: &str = "Summary of your progress before the restart:";

/// Prompt shown on the terminal when waiting for human input.
pub const HUMAN_PROMPT: &str = "You: ";

/// Directive appended to the system prompt when a check-in is forced.
pub fn check_in_directive(limit: u32) -> String {
    format!(
        "You have made more than {} consecutive tool calls without hearing from the human \
         operator. Before doing anything else, use ask_human to report your progress and \
         confirm how to proceed.",
        limit
    )
}

/// The user turn that carries a progress summary into the next incarnation.
pub fn summary_message(summary: &str) -> String {
    format!("{}\n{}", SUMMARY_PREFIX, summary.trim())
}

/// Builds the system prompt for one agent.
///
/// # Example
///
/// ```rust
/// use crewloop::agent::ContextBuilder;
/// use crewloop::config::AgentMode;
///
/// let prompt = ContextBuilder::new("Alice", AgentMode::Team)
///     .with_peers(vec!["Bob".to_string()])
///     .build_system_prompt();
/// assert!(prompt.contains("You are Alice"));
/// assert!(prompt.contains("Bob"));
/// ```
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    agent_name: String,
    mode: AgentMode,
    peers: Vec<String>,
    extra: Option<String>,
}

impl ContextBuilder {
    pub fn new(agent_name: &str, mode: AgentMode) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            mode,
            peers: Vec::new(),
            extra: None,
        }
    }

    /// Names of the other agents on the team. Ignored in single-agent mode.
    pub fn with_peers(mut self, peers: Vec<String>) -> Self {
        self.peers = peers;
        self
    }

    /// Free-form instructions appended after the base prompt.
    pub fn with_extra(mut self, extra: &str) -> Self {
        let extra = extra.trim();
        self.extra = (!extra.is_empty()).then(|| extra.to_string());
        self
    }

    pub fn build_system_prompt(&self) -> String {
        let name = &self.agent_name;
        let mut prompt = match self.mode {
            AgentMode::Team => {
                let mut p = format!(
                    "You are {name}, an autonomous AI agent that runs continuously and works \
                     as one member of a team of agents. Always refer to yourself as {name}. \
                     Coordinate with your teammates through the group chat and direct \
                     messages, and work together with them to finish the tasks you are given. \
                     Be helpful, harmless, and honest."
                );
                if !self.peers.is_empty() {
                    p.push_str(&format!(
                        "\n\nYour teammates are: {}.",
                        self.peers.join(", ")
                    ));
                }
                p
            }
            AgentMode::Single => format!(
                "You are {name}, an autonomous AI agent that runs continuously. Always refer \
                 to yourself as {name}. Work through your tasks on your own where you can, \
                 and ask the human operator for help when you need it. Be helpful, \
                 harmless, and honest."
            ),
        };
        if let Some(extra) = &self.extra {
            prompt.push_str("\n\n");
            prompt.push_str(extra);
        }
        prompt
    }
}
