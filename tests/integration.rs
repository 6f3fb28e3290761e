//! Integration tests for crewloop
//!
//! These tests drive the public API the way the binary does: a loop across
//! process incarnations, the queue under concurrent producers, the relay
//! servers over real sockets and the retry policy.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::{tempdir, TempDir};

use crewloop::agent::{AgentLoop, LoopLimits, Transition, RESTART_NOTICE};
use crewloop::bus::{InboundQueue, QueuedMessage};
use crewloop::config::{AgentMode, OversightSettings, TeamConfig};
use crewloop::error::{CrewError, ProviderError, Result};
use crewloop::health::UsageMetrics;
use crewloop::providers::{
    ChatOptions, InferenceBoundary, LLMProvider, LLMResponse, RetryProvider, ToolDefinition,
};
use crewloop::relay::{
    group, inbox, GroupFeed, GroupLog, InboxState, RelayClient, DEFAULT_RELAY_TIMEOUT,
};
use crewloop::session::{ContextStore, Message, Role};
use crewloop::tools::{build_registry, HumanInput, ToolDeps};
use crewloop::utils::error_record::ErrorRecord;

// ============================================================================
// Test doubles
// ============================================================================

/// Replays canned responses, then answers with plain text.
struct ScriptedProvider {
    script: Mutex<VecDeque<LLMResponse>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    fn new(script: Vec<LLMResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn last_request(&self) -> Vec<Message> {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
        _options: &ChatOptions,
    ) -> Result<LLMResponse> {
        self.seen.lock().unwrap().push(messages.to_vec());
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| LLMResponse::text("nothing to do")))
    }
}

/// Human channel fed from a fixed list of lines.
struct ScriptedHuman {
    lines: Mutex<VecDeque<String>>,
}

impl ScriptedHuman {
    fn new(lines: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            lines: Mutex::new(lines.iter().map(|s| s.to_string()).collect()),
        })
    }
}

#[async_trait]
impl HumanInput for ScriptedHuman {
    async fn read_line(&self, _prompt: &str) -> Result<Option<String>> {
        Ok(self.lines.lock().unwrap().pop_front())
    }
}

/// Always fails with the error `make_err` builds; counts attempts.
struct FlakyProvider {
    calls: AtomicU32,
    fail_count: u32,
    make_err: fn() -> CrewError,
}

#[async_trait]
impl LLMProvider for FlakyProvider {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn chat(
        &self,
        _messages: &[Message],
        _tools: &[ToolDefinition],
        _options: &ChatOptions,
    ) -> Result<LLMResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_count {
            Err((self.make_err)())
        } else {
            Ok(LLMResponse::text("ok"))
        }
    }
}

fn tool_call(name: &str, input: serde_json::Value) -> LLMResponse {
    LLMResponse::default().with_tool_call(&format!("toolu_{}", name), name, input)
}

fn agent(
    mode: AgentMode,
    dir: &TempDir,
    provider: Arc<ScriptedProvider>,
    human: Arc<dyn HumanInput>,
) -> AgentLoop {
    let registry = Arc::new(
        build_registry(
            mode,
            ToolDeps {
                human: Arc::clone(&human),
                relay: RelayClient::new("http://127.0.0.1:9", DEFAULT_RELAY_TIMEOUT).unwrap(),
                team: Arc::new(TeamConfig::solo()),
                oversight: OversightSettings::default(),
            },
        )
        .unwrap(),
    );
    let boundary = InferenceBoundary::new(
        provider,
        registry.definitions(),
        ChatOptions::new("test-model", 256).with_system("You are Claude."),
    );
    AgentLoop::new(
        "Claude",
        mode,
        boundary,
        registry,
        ContextStore::new(dir.path().join("sessions"), "Claude"),
        human,
    )
    .with_limits(LoopLimits {
        turn_delay: Duration::ZERO,
        ..LoopLimits::default()
    })
    .with_error_record(ErrorRecord::new(dir.path().join("error.txt")))
}

async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ============================================================================
// Restart protocol
// ============================================================================

#[tokio::test]
async fn test_restart_resumes_exact_conversation() {
    let dir = tempdir().unwrap();

    let first = ScriptedProvider::new(vec![
        LLMResponse::text("Looking around."),
        tool_call("restart_program", json!({"reason": "picked up new tools"})),
    ]);
    let mut incarnation = agent(
        AgentMode::Single,
        &dir,
        first,
        ScriptedHuman::new(&["do the thing", "keep going"]),
    );
    assert!(!incarnation.restore().await.unwrap());
    assert_eq!(incarnation.run().await.unwrap(), Transition::Restart);
    let before = incarnation.conversation().to_vec();

    // user, assistant, user, assistant(tool_use), user(tool_result)
    assert_eq!(before.len(), 5);
    assert!(before[4].has_tool_results());

    let second = ScriptedProvider::new(vec![tool_call(
        "graceful_shutdown",
        json!({"reason": "finished"}),
    )]);
    let mut next = agent(
        AgentMode::Single,
        &dir,
        Arc::clone(&second),
        ScriptedHuman::new(&[]),
    );
    assert!(next.restore().await.unwrap());
    assert_eq!(&next.conversation()[..before.len()], &before[..]);

    assert_eq!(next.run().await.unwrap(), Transition::Exit);
    let sent = second.last_request();
    assert_eq!(sent.len(), before.len() + 1);
    assert_eq!(sent.last().unwrap().role, Role::User);
    assert_eq!(sent.last().unwrap().text(), RESTART_NOTICE);

    // A clean exit leaves nothing to resume.
    assert!(!next.store().exists().await);
}

#[tokio::test]
async fn test_reset_starts_next_incarnation_empty() {
    let dir = tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        tool_call("restart_program", json!({})),
        tool_call("reset_context", json!({})),
    ]);

    let mut first = agent(
        AgentMode::Single,
        &dir,
        Arc::clone(&provider),
        ScriptedHuman::new(&["start"]),
    );
    assert_eq!(first.run().await.unwrap(), Transition::Restart);
    assert!(first.store().exists().await);

    let mut second = agent(
        AgentMode::Single,
        &dir,
        Arc::clone(&provider),
        ScriptedHuman::new(&[]),
    );
    assert!(second.restore().await.unwrap());
    assert_eq!(second.run().await.unwrap(), Transition::Reset);

    let mut third = agent(
        AgentMode::Single,
        &dir,
        provider,
        ScriptedHuman::new(&[]),
    );
    assert!(!third.restore().await.unwrap());
    assert!(third.conversation().is_empty());
}

#[tokio::test]
async fn test_closed_human_channel_exits_cleanly() {
    let dir = tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![]);
    let mut agent = agent(
        AgentMode::Single,
        &dir,
        Arc::clone(&provider),
        ScriptedHuman::new(&[]),
    );
    assert_eq!(agent.run().await.unwrap(), Transition::Exit);
    assert!(provider.seen.lock().unwrap().is_empty());
}

// ============================================================================
// Inbound queue
// ============================================================================

#[tokio::test]
async fn test_concurrent_enqueue_then_drain() {
    let queue = Arc::new(InboundQueue::new());
    let producers = (0..8).map(|p| {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            for i in 0..50 {
                queue.enqueue(QueuedMessage::direct(&format!("agent{}", p), &i.to_string()));
                tokio::task::yield_now().await;
            }
        })
    });
    for result in futures::future::join_all(producers).await {
        result.unwrap();
    }

    let drained = queue.drain_all();
    assert_eq!(drained.len(), 400);
    let seqs: HashSet<u64> = drained.iter().map(|m| m.seq).collect();
    assert_eq!(seqs.len(), 400);
    assert!(queue.drain_all().is_empty());
}

#[tokio::test]
async fn test_inbox_message_reaches_the_loop() {
    let dir = tempdir().unwrap();
    let queue = Arc::new(InboundQueue::new());
    let metrics = Arc::new(UsageMetrics::new());
    let base = serve(inbox::router(InboxState::new(
        "Claude",
        AgentMode::Team,
        Arc::clone(&queue),
        Arc::clone(&metrics),
    )))
    .await;

    let client = RelayClient::new("http://127.0.0.1:9", DEFAULT_RELAY_TIMEOUT).unwrap();
    client
        .send_direct(&format!("{}/send-message", base), "Bob", "status?")
        .await
        .unwrap();
    assert_eq!(metrics.snapshot().messages_enqueued, 1);

    let provider = ScriptedProvider::new(vec![LLMResponse::text("On it.")]);
    let mut agent = agent(
        AgentMode::Team,
        &dir,
        Arc::clone(&provider),
        ScriptedHuman::new(&[]),
    )
    .with_queue(queue)
    .with_metrics(metrics);
    assert_eq!(agent.step().await.unwrap(), Transition::Continue);

    let sent = provider.last_request();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text(), "[Direct message from Bob]: status?\n");
}

// ============================================================================
// Group relay
// ============================================================================

#[tokio::test]
async fn test_group_relay_after_filter() {
    let dir = tempdir().unwrap();
    let log = Arc::new(
        GroupLog::open(dir.path().join("chat.txt"), "Welcome, team")
            .await
            .unwrap(),
    );
    let base = serve(group::router(log)).await;
    let client = RelayClient::new(&base, DEFAULT_RELAY_TIMEOUT).unwrap();

    client.send_group("Alice", "first").await.unwrap();
    client.send_group("Bob", "second").await.unwrap();
    client.send_group("Alice", "third").await.unwrap();

    let all = client.fetch_group(None).await.unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].username, "supervisor");

    let after_first = client.fetch_group(Some(&all[1].timestamp)).await.unwrap();
    let texts: Vec<_> = after_first.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(texts, vec!["second", "third"]);
    assert!(after_first[0].timestamp < after_first[1].timestamp);
}

#[tokio::test]
async fn test_team_loop_reads_group_chat_once_across_restart() {
    let dir = tempdir().unwrap();
    let log = Arc::new(
        GroupLog::open(dir.path().join("chat.txt"), "Welcome, team")
            .await
            .unwrap(),
    );
    let base = serve(group::router(Arc::clone(&log))).await;
    log.append("Bob", "first task").await.unwrap();

    let provider = ScriptedProvider::new(vec![
        LLMResponse::text("Reading the chat."),
        tool_call("restart_program", json!({"reason": "reload"})),
    ]);
    let feed = GroupFeed::new(RelayClient::new(&base, DEFAULT_RELAY_TIMEOUT).unwrap(), "Claude");
    let mut first = agent(
        AgentMode::Team,
        &dir,
        Arc::clone(&provider),
        ScriptedHuman::new(&[]),
    )
    .with_feed(feed);
    assert!(!first.restore().await.unwrap());

    assert_eq!(first.step().await.unwrap(), Transition::Continue);
    let sent = provider.last_request();
    assert_eq!(
        sent[0].text(),
        "[Group Chat] supervisor: Welcome, team\n[Group Chat] Bob: first task\n"
    );
    assert_eq!(first.step().await.unwrap(), Transition::Restart);

    log.append("Bob", "second task").await.unwrap();

    // The replacement process starts with a feed that has seen nothing.
    let second = ScriptedProvider::new(vec![LLMResponse::text("On it.")]);
    let feed = GroupFeed::new(RelayClient::new(&base, DEFAULT_RELAY_TIMEOUT).unwrap(), "Claude");
    let mut next = agent(
        AgentMode::Team,
        &dir,
        Arc::clone(&second),
        ScriptedHuman::new(&[]),
    )
    .with_feed(feed);
    assert!(next.restore().await.unwrap());
    assert_eq!(next.step().await.unwrap(), Transition::Continue);

    let sent = second.last_request();
    assert_eq!(sent.last().unwrap().text(), "[Group Chat] Bob: second task\n");
    let first_task_turns = sent
        .iter()
        .filter(|m| m.text().contains("first task"))
        .count();
    assert_eq!(first_task_turns, 1);
}

#[tokio::test]
async fn test_group_log_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chat.txt");
    {
        let log = GroupLog::open(&path, "hello").await.unwrap();
        log.append("Alice", "line one\nline two").await.unwrap();
    }
    let reopened = GroupLog::open(&path, "ignored").await.unwrap();
    let entries = reopened.since(None).await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].message, "line one\nline two");
}

// ============================================================================
// Retry policy
// ============================================================================

#[tokio::test]
async fn test_retry_stops_after_five_attempts() {
    let inner = Arc::new(FlakyProvider {
        calls: AtomicU32::new(0),
        fail_count: u32::MAX,
        make_err: || CrewError::ProviderTyped(ProviderError::Overloaded("529".into())),
    });
    let provider = RetryProvider::new(Box::new(SharedProvider(Arc::clone(&inner))))
        .with_max_attempts(5)
        .with_delay_ms(0);

    let err = provider
        .chat(&[Message::user("hi")], &[], &ChatOptions::new("m", 10))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CrewError::ProviderTyped(ProviderError::Overloaded(_))
    ));
    assert_eq!(inner.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_retry_recovers_on_third_attempt() {
    let inner = Arc::new(FlakyProvider {
        calls: AtomicU32::new(0),
        fail_count: 2,
        make_err: || CrewError::ProviderTyped(ProviderError::RateLimit("429".into())),
    });
    let provider = RetryProvider::new(Box::new(SharedProvider(Arc::clone(&inner))))
        .with_delay_ms(0);

    let response = provider
        .chat(&[Message::user("hi")], &[], &ChatOptions::new("m", 10))
        .await
        .unwrap();
    assert_eq!(response.text_content(), "ok");
    assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_auth_errors_are_not_retried() {
    let inner = Arc::new(FlakyProvider {
        calls: AtomicU32::new(0),
        fail_count: u32::MAX,
        make_err: || CrewError::ProviderTyped(ProviderError::Auth("401".into())),
    });
    let provider =
        RetryProvider::new(Box::new(SharedProvider(Arc::clone(&inner)))).with_delay_ms(0);
    assert!(provider
        .chat(&[Message::user("hi")], &[], &ChatOptions::new("m", 10))
        .await
        .is_err());
    assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
}

/// Lets a test keep a handle on a provider the retry wrapper owns.
struct SharedProvider(Arc<FlakyProvider>);

#[async_trait]
impl LLMProvider for SharedProvider {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<LLMResponse> {
        self.0.chat(messages, tools, options).await
    }
}

// ============================================================================
// Error record
// ============================================================================

#[test]
fn test_error_record_appends_entries() {
    let dir = tempdir().unwrap();
    let record = ErrorRecord::new(dir.path().join("logs").join("error.txt"));

    tokio_test::block_on(async {
        record.append("first failure").await.unwrap();
        record.append("second failure").await.unwrap();
    });

    let content = std::fs::read_to_string(record.path()).unwrap();
    assert_eq!(content.matches("ERROR: ").count(), 2);
    assert!(content.contains("first failure"));
    assert!(content.trim_end().ends_with("second failure"));
}
