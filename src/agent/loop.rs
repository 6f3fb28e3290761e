//! Agent loop implementation
//!
//! One [`AgentLoop`] drives one agent: gather input, run one inference call,
//! dispatch the requested tools, then decide whether to keep going. Process
//! replacement is not done here; [`AgentLoop::run`] returns a [`Transition`]
//! and the caller acts on it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bus::{render_batch, InboundQueue};
use crate::config::{AgentMode, AgentSettings};
use crate::error::{CrewError, Result};
use crate::health::UsageMetrics;
use crate::providers::{CheckIn, Inference, InferenceBoundary, LLMToolCall};
use crate::relay::GroupFeed;
use crate::session::{ContentBlock, ContextStore, Message, PersistedSession, RestartCause, Role};
use crate::tools::{AskHumanTool, ControlSignals, HumanInput, ToolContext, ToolRegistry};
use crate::utils::error_record::ErrorRecord;

use super::context::{
    check_in_directive, summary_message, HUMAN_PROMPT, IDLE_NOTICE, RESTART_NOTICE,
};

/// What the loop wants to happen after an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Run another iteration.
    Continue,
    /// Replace the process; the persisted conversation is resumed.
    Restart,
    /// Replace the process with nothing persisted.
    Reset,
    /// Stop cleanly.
    Exit,
}

/// Consecutive tool-calling iterations since the last human or user turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolCallCounter(u32);

impl ToolCallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_count(count: u32) -> Self {
        Self(count)
    }

    pub fn count(self) -> u32 {
        self.0
    }

    /// Account for one iteration's tool calls. An `ask_human` call counts as
    /// hearing from the human.
    pub fn record(&mut self, calls: &[LLMToolCall]) {
        if calls.is_empty() {
            return;
        }
        if calls.iter().any(|c| c.name == AskHumanTool::NAME) {
            self.0 = 0;
        } else {
            self.0 = self.0.saturating_add(1);
        }
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }

    pub fn exceeds(self, limit: u32) -> bool {
        self.0 > limit
    }
}

/// Per-incarnation limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLimits {
    /// Tool-calling iterations allowed before a forced check-in (single mode).
    pub max_consecutive_tool_calls: u32,
    /// Billable tokens before the conversation is summarized and restarted.
    pub token_budget: u64,
    pub turn_delay: Duration,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self::from(&AgentSettings::default())
    }
}

impl From<&AgentSettings> for LoopLimits {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            max_consecutive_tool_calls: settings.max_consecutive_tool_calls,
            token_budget: settings.token_budget,
            turn_delay: Duration::from_millis(settings.turn_delay_ms),
        }
    }
}

/// The agent state machine.
pub struct AgentLoop {
    identity: String,
    mode: AgentMode,
    boundary: InferenceBoundary,
    tools: Arc<ToolRegistry>,
    store: ContextStore,
    queue: Arc<InboundQueue>,
    human: Arc<dyn HumanInput>,
    feed: Option<GroupFeed>,
    metrics: Arc<UsageMetrics>,
    error_record: Option<ErrorRecord>,
    limits: LoopLimits,
    ctx: ToolContext,
    session_id: Uuid,
    conversation: Vec<Message>,
    counter: ToolCallCounter,
    tokens_used: u64,
    await_user: bool,
}

impl AgentLoop {
    /// Create a loop with a fresh conversation. Call [`restore`](Self::restore)
    /// before running to pick up a persisted session.
    pub fn new(
        identity: &str,
        mode: AgentMode,
        boundary: InferenceBoundary,
        tools: Arc<ToolRegistry>,
        store: ContextStore,
        human: Arc<dyn HumanInput>,
    ) -> Self {
        Self {
            identity: identity.to_string(),
            mode,
            boundary,
            tools,
            store,
            queue: Arc::new(InboundQueue::new()),
            human,
            feed: None,
            metrics: Arc::new(UsageMetrics::new()),
            error_record: None,
            limits: LoopLimits::default(),
            ctx: ToolContext::new(identity, mode),
            session_id: Uuid::new_v4(),
            conversation: Vec::new(),
            counter: ToolCallCounter::new(),
            tokens_used: 0,
            await_user: !mode.is_team(),
        }
    }

    /// Share an inbound queue with the inbox server.
    pub fn with_queue(mut self, queue: Arc<InboundQueue>) -> Self {
        self.queue = queue;
        self
    }

    /// Poll the group relay at the start of every iteration.
    pub fn with_feed(mut self, feed: GroupFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<UsageMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_error_record(mut self, record: ErrorRecord) -> Self {
        self.error_record = Some(record);
        self
    }

    pub fn with_limits(mut self, limits: LoopLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    pub fn counter(&self) -> ToolCallCounter {
        self.counter
    }

    pub fn tokens_used(&self) -> u64 {
        self.tokens_used
    }

    /// Whether the next iteration blocks on the human channel.
    pub fn awaiting_user(&self) -> bool {
        self.await_user
    }

    pub fn queue(&self) -> &Arc<InboundQueue> {
        &self.queue
    }

    pub fn metrics(&self) -> &Arc<UsageMetrics> {
        &self.metrics
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    /// Load the persisted session, if any. Returns `true` when one was found.
    ///
    /// A restored conversation gets a cached user turn announcing the restart
    /// and the first iteration does not wait for the human.
    pub async fn restore(&mut self) -> Result<bool> {
        let Some(session) = self.store.load().await? else {
            info!(agent = %self.identity, mode = ?self.mode, "Starting a fresh session");
            return Ok(false);
        };

        self.session_id = session.session_id;
        self.counter = ToolCallCounter::from_count(session.consecutive_tool_calls);
        if let Some(feed) = self.feed.as_mut() {
            feed.resume_from(session.group_cursor.as_deref());
        }
        self.conversation = session.messages;
        self.conversation.push(Message::with_blocks(
            Role::User,
            vec![ContentBlock::text(RESTART_NOTICE).cached()],
        ));
        self.await_user = false;
        info!(
            agent = %self.identity,
            session_id = %self.session_id,
            cause = ?session.cause,
            messages = self.conversation.len(),
            consecutive_tool_calls = self.counter.count(),
            "Resumed persisted session"
        );
        Ok(true)
    }

    /// Run iterations until one returns something other than
    /// [`Transition::Continue`].
    ///
    /// `Exit` deletes the persisted session. A failure is logged, written to
    /// the error record and persisted as an error exit before it is returned.
    pub async fn run(&mut self) -> Result<Transition> {
        info!(agent = %self.identity, mode = ?self.mode, "Agent loop started");
        loop {
            match self.step().await {
                Ok(Transition::Continue) => continue,
                Ok(Transition::Exit) => {
                    if let Err(e) = self.store.delete().await {
                        self.record_failure(&e).await;
                        return Err(e);
                    }
                    info!(agent = %self.identity, "Agent loop exited");
                    return Ok(Transition::Exit);
                }
                Ok(transition) => {
                    info!(agent = %self.identity, ?transition, "Agent loop stopping for replacement");
                    return Ok(transition);
                }
                Err(e) => {
                    self.record_failure(&e).await;
                    return Err(e);
                }
            }
        }
    }

    /// Run one iteration.
    pub async fn step(&mut self) -> Result<Transition> {
        self.metrics.record_iteration();

        if !self.gather_input().await? {
            info!(agent = %self.identity, "Human input closed");
            return Ok(Transition::Exit);
        }

        let check_in = self.pending_check_in();
        if check_in.is_some() {
            warn!(
                agent = %self.identity,
                consecutive_tool_calls = self.counter.count(),
                "Consecutive tool call limit exceeded, forcing a check-in"
            );
        }

        let Inference { response, usage } = self
            .boundary
            .infer(&mut self.conversation, check_in.as_ref())
            .await?;
        self.metrics
            .record_inference(usage.input_tokens, usage.output_tokens);
        self.tokens_used += usage.billable();

        let text = response.text_content();
        if !text.trim().is_empty() {
            info!(agent = %self.identity, text = %text, "Assistant reply");
        }
        if response.content.is_empty() {
            debug!(agent = %self.identity, "Empty assistant response");
        } else {
            self.conversation.push(response.to_message());
        }

        let calls = response.tool_calls();
        self.counter.record(&calls);
        let signals = if calls.is_empty() {
            self.await_user = !self.mode.is_team();
            ControlSignals::default()
        } else {
            self.await_user = false;
            self.dispatch(&calls).await
        };

        if signals.restart && signals.reset_context {
            self.store.delete().await?;
            self.metrics.record_restart();
            info!(agent = %self.identity, "Context reset requested");
            return Ok(Transition::Reset);
        }
        if signals.restart {
            self.absorb_pending();
            self.persist(RestartCause::ToolRequested, None).await?;
            self.metrics.record_restart();
            info!(agent = %self.identity, "Restart requested");
            return Ok(Transition::Restart);
        }
        if signals.shutdown {
            info!(agent = %self.identity, "Shutdown requested");
            return Ok(Transition::Exit);
        }

        if self.tokens_used >= self.limits.token_budget {
            return self.compact().await;
        }

        if !self.limits.turn_delay.is_zero() {
            tokio::time::sleep(self.limits.turn_delay).await;
        }
        Ok(Transition::Continue)
    }

    /// Append this iteration's user turn, if any. Returns `false` when the
    /// human channel closed while waiting for input.
    async fn gather_input(&mut self) -> Result<bool> {
        if let Some(feed) = self.feed.as_mut() {
            feed.poll(&self.queue).await;
        }

        let drained = self.queue.drain_all();
        if !drained.is_empty() {
            debug!(agent = %self.identity, count = drained.len(), "Draining queued messages");
            self.conversation.push(Message::user(&render_batch(&drained)));
            self.counter.reset();
            return Ok(true);
        }

        if self.mode.is_team() {
            let needs_turn = self
                .conversation
                .last()
                .map_or(true, |m| m.role == Role::Assistant);
            if needs_turn {
                self.conversation.push(Message::user(IDLE_NOTICE));
            }
            return Ok(true);
        }

        if !self.await_user {
            return Ok(true);
        }
        loop {
            let Some(line) = self.human.read_line(HUMAN_PROMPT).await? else {
                return Ok(false);
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.conversation.push(Message::user(line));
            self.counter.reset();
            return Ok(true);
        }
    }

    fn pending_check_in(&self) -> Option<CheckIn> {
        if self.mode.is_team() || !self.counter.exceeds(self.limits.max_consecutive_tool_calls) {
            return None;
        }
        Some(CheckIn {
            tool: Some(AskHumanTool::NAME.to_string()),
            directive: check_in_directive(self.limits.max_consecutive_tool_calls),
        })
    }

    /// Move messages that arrived since the last drain into the conversation
    /// so they survive process replacement.
    fn absorb_pending(&mut self) {
        let pending = self.queue.drain_all();
        if pending.is_empty() {
            return;
        }
        info!(agent = %self.identity, count = pending.len(), "Keeping queued messages across restart");
        self.conversation.push(Message::user(&render_batch(&pending)));
        self.counter.reset();
    }

    /// Execute tool calls in request order and append one tool-result turn.
    async fn dispatch(&mut self, calls: &[LLMToolCall]) -> ControlSignals {
        let mut signals = ControlSignals::default();
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            info!(tool = %call.name, id = %call.id, "Executing tool");
            let output = self
                .tools
                .execute(&call.name, call.input.clone(), &self.ctx)
                .await;
            self.metrics.record_tool_call(output.is_error);

            let s = output.signals();
            signals.restart |= s.restart;
            signals.reset_context |= s.reset_context;
            signals.shutdown |= s.shutdown;

            results.push(ContentBlock::tool_result(
                &call.id,
                &output.to_content(),
                output.is_error,
            ));
        }
        self.conversation
            .push(Message::with_blocks(Role::User, results));
        signals
    }

    /// Summarize, replace the conversation with the summary and persist it.
    async fn compact(&mut self) -> Result<Transition> {
        info!(
            agent = %self.identity,
            tokens_used = self.tokens_used,
            budget = self.limits.token_budget,
            "Token budget reached, summarizing before restart"
        );
        let (summary, usage) = self.boundary.summarize(&self.conversation).await?;
        self.metrics
            .record_inference(usage.input_tokens, usage.output_tokens);

        self.conversation = vec![Message::user(&summary_message(&summary))];
        self.absorb_pending();
        self.persist(RestartCause::TokenBudget, Some(&summary)).await?;
        self.metrics.record_restart();
        Ok(Transition::Restart)
    }

    async fn persist(&self, cause: RestartCause, summary: Option<&str>) -> Result<()> {
        let mut session = PersistedSession::new(
            self.session_id,
            &self.identity,
            cause,
            self.conversation.clone(),
        )
        .with_counter(self.counter.count())
        .with_group_cursor(self.feed.as_ref().and_then(GroupFeed::last_seen));
        if let Some(summary) = summary {
            session = session.with_summary(summary);
        }
        self.store.save(&session).await
    }

    async fn record_failure(&mut self, e: &CrewError) {
        error!(agent = %self.identity, error = %e, "Agent loop failed");
        self.metrics.record_error();
        if let Some(record) = &self.error_record {
            if let Err(write_err) = record.append(&e.to_string()).await {
                warn!(
                    path = %record.path().display(),
                    error = %write_err,
                    "Could not write error record"
                );
            }
        }
        self.absorb_pending();
        if let Err(persist_err) = self.persist(RestartCause::ErrorExit, None).await {
            error!(agent = %self.identity, error = %persist_err, "Could not persist session after failure");
        }
    }
}
