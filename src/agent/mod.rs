//! Agent module - the loop that drives one long-running agent
//!
//! Each iteration of the [`AgentLoop`]:
//!
//! - gathers input (queued messages, the group feed, or a human line)
//! - calls the reasoning service through the inference boundary
//! - executes the requested tools and records their results
//! - decides on a [`Transition`]: continue, restart, reset or exit
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌───────────────────┐
//! │ InboundQueue │────>│  AgentLoop  │────>│ InferenceBoundary │
//! │ (inbox/feed) │     │             │     │  (retry, cache)   │
//! └──────────────┘     └─────────────┘     └───────────────────┘
//!                         │       │
//!                         ▼       ▼
//!                ┌──────────────┐ ┌──────────────┐
//!                │ ContextStore │ │ ToolRegistry │
//!                └──────────────┘ └──────────────┘
//! ```
//!
//! The loop never replaces the process itself. `Restart` and `Reset` are
//! returned to the CLI supervisor, which re-executes the binary.

mod context;
mod r#loop;

pub use context::{
    check_in_directive, summary_message, ContextBuilder, HUMAN_PROMPT, IDLE_NOTICE,
    RESTART_NOTICE, SUMMARY_PREFIX,
};
pub use r#loop::{AgentLoop, LoopLimits, ToolCallCounter, Transition};
