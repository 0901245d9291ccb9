//! Integration tests for the request lifecycle.
//!
//! These tests drive whole turns against scripted exchanges and check the
//! transcript, freshness marker and lifecycle state that result.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ragchat_conversation::{ConversationStore, LifecycleConfig, RequestLifecycle};
use ragchat_core::util::FALLBACK_MESSAGE;
use ragchat_core::{
    AskRequest, AskResponse, Exchange, ExchangeError, KeyValueStore, LifecycleState, Message,
    SequentialIdGenerator,
};
use ragchat_session::{MemoryStore, SessionIdentity};
use tokio::sync::Notify;

/// Answers every question with a fixed reply and records what it was asked.
struct ScriptedExchange {
    answer: String,
    requests: Mutex<Vec<AskRequest>>,
}

impl ScriptedExchange {
    fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<AskRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Exchange for ScriptedExchange {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ExchangeError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        Ok(AskResponse::new(self.answer.clone()))
    }
}

struct FailingExchange;

#[async_trait]
impl Exchange for FailingExchange {
    async fn ask(&self, _request: &AskRequest) -> Result<AskResponse, ExchangeError> {
        Err(ExchangeError::Transport("connection refused".to_string()))
    }
}

/// Fails every other call, starting with the second.
struct FlakyExchange {
    calls: AtomicUsize,
}

#[async_trait]
impl Exchange for FlakyExchange {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ExchangeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call % 2 == 1 {
            return Err(ExchangeError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(AskResponse::new(format!("echo: {}", request.question)))
    }
}

/// Holds every call until the gate is opened.
struct GatedExchange {
    gate: Arc<Notify>,
    calls: AtomicUsize,
}

#[async_trait]
impl Exchange for GatedExchange {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ExchangeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(AskResponse::new(format!("answer to {}", request.question)))
    }
}

/// Answers after a short delay, counting calls.
struct SlowExchange {
    calls: AtomicUsize,
}

#[async_trait]
impl Exchange for SlowExchange {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ExchangeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(AskResponse::new(format!("answer to {}", request.question)))
    }
}

struct NeverExchange;

#[async_trait]
impl Exchange for NeverExchange {
    async fn ask(&self, _request: &AskRequest) -> Result<AskResponse, ExchangeError> {
        std::future::pending().await
    }
}

struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        anyhow::bail!("storage unavailable")
    }

    fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
        anyhow::bail!("storage unavailable")
    }
}

fn lifecycle_with<E: Exchange>(exchange: E) -> RequestLifecycle<E, MemoryStore> {
    let identity = SessionIdentity::new(MemoryStore::new())
        .with_id_generator(SequentialIdGenerator::new("session"));
    let store = ConversationStore::new().with_id_generator(SequentialIdGenerator::new("msg"));
    RequestLifecycle::new(exchange, Arc::new(identity), Arc::new(store))
}

fn turns(messages: &[Message]) -> Vec<(&str, bool)> {
    messages.iter().map(|m| (m.content(), m.is_user())).collect()
}

fn assert_single_fresh_tail(messages: &[Message]) {
    let fresh: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_fresh())
        .map(|(i, _)| i)
        .collect();

    if messages.is_empty() {
        assert!(fresh.is_empty());
    } else {
        assert_eq!(fresh, vec![messages.len() - 1], "only the tail may be fresh");
    }
}

#[tokio::test]
async fn test_successful_turn_appends_question_and_answer() {
    let exchange = Arc::new(ScriptedExchange::new("Hi there"));
    let lifecycle = lifecycle_with(exchange.clone());

    lifecycle.submit("Hello").await;

    let messages = lifecycle.store().snapshot();
    assert_eq!(turns(&messages), vec![("Hello", true), ("Hi there", false)]);
    assert_single_fresh_tail(&messages);
    assert_eq!(lifecycle.state(), LifecycleState::Idle);

    let requests = exchange.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].question, "Hello");
    assert_eq!(requests[0].session_id.as_str(), "session-1");
}

#[tokio::test]
async fn test_failed_turn_appends_fallback() {
    let lifecycle = lifecycle_with(FailingExchange);

    lifecycle.submit("Hello").await;

    let messages = lifecycle.store().snapshot();
    assert_eq!(
        turns(&messages),
        vec![("Hello", true), (FALLBACK_MESSAGE, false)]
    );
    assert_single_fresh_tail(&messages);
    assert_eq!(lifecycle.state(), LifecycleState::Idle);
}

#[tokio::test]
async fn test_failure_does_not_lock_out_next_turn() {
    let lifecycle = lifecycle_with(FlakyExchange {
        calls: AtomicUsize::new(0),
    });

    lifecycle.submit("one").await;
    lifecycle.submit("two").await;
    lifecycle.submit("three").await;

    let messages = lifecycle.store().snapshot();
    assert_eq!(
        turns(&messages),
        vec![
            ("one", true),
            ("echo: one", false),
            ("two", true),
            (FALLBACK_MESSAGE, false),
            ("three", true),
            ("echo: three", false),
        ]
    );
    assert_eq!(lifecycle.state(), LifecycleState::Idle);
}

#[tokio::test]
async fn test_blank_input_is_ignored() {
    let exchange = Arc::new(ScriptedExchange::new("unused"));
    let lifecycle = lifecycle_with(exchange.clone());
    let state_rx = lifecycle.subscribe_state();

    lifecycle.submit("").await;
    lifecycle.submit("   ").await;
    lifecycle.submit("\n\t").await;

    assert!(lifecycle.store().is_empty());
    assert_eq!(lifecycle.state(), LifecycleState::Idle);
    assert!(!state_rx.has_changed().unwrap_or(true));
    assert!(exchange.requests().is_empty());
}

#[tokio::test]
async fn test_input_is_trimmed() {
    let exchange = Arc::new(ScriptedExchange::new("ok"));
    let lifecycle = lifecycle_with(exchange.clone());

    lifecycle.submit("  What is RAG?  \n").await;

    let messages = lifecycle.store().snapshot();
    assert_eq!(messages[0].content(), "What is RAG?");
    assert_eq!(exchange.requests()[0].question, "What is RAG?");
}

#[tokio::test]
async fn test_second_submit_while_sending_is_dropped() {
    let gate = Arc::new(Notify::new());
    let exchange = Arc::new(GatedExchange {
        gate: gate.clone(),
        calls: AtomicUsize::new(0),
    });
    let lifecycle = lifecycle_with(exchange.clone());

    let first = lifecycle.submit("A");
    let second = async {
        lifecycle
            .subscribe_state()
            .wait_for(|s| *s == LifecycleState::Sending)
            .await
            .unwrap();

        lifecycle.submit("B").await;

        // B left no trace while A is pending.
        let pending = lifecycle.store().snapshot();
        assert_eq!(turns(&pending), vec![("A", true)]);
        assert_single_fresh_tail(&pending);
        assert!(lifecycle.is_sending());

        // A rejected submit must not release the guard for the next one.
        lifecycle.submit("C").await;

        let pending = lifecycle.store().snapshot();
        assert_eq!(turns(&pending), vec![("A", true)]);
        assert_eq!(lifecycle.state(), LifecycleState::Sending);

        gate.notify_one();
    };

    tokio::join!(first, second);

    let messages = lifecycle.store().snapshot();
    assert_eq!(turns(&messages), vec![("A", true), ("answer to A", false)]);
    assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
    assert_eq!(lifecycle.state(), LifecycleState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatches_never_overlap() {
    let exchange = Arc::new(SlowExchange {
        calls: AtomicUsize::new(0),
    });
    let lifecycle = Arc::new(lifecycle_with(exchange.clone()));

    let handles: Vec<_> = (0..16)
        .map(|i| lifecycle.dispatch(format!("question {i}")))
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let messages = lifecycle.store().snapshot();
    assert!(!messages.is_empty());
    assert_eq!(messages.len() % 2, 0);
    for pair in messages.chunks(2) {
        assert!(pair[0].is_user() && !pair[1].is_user());
        assert_eq!(pair[1].content(), format!("answer to {}", pair[0].content()));
    }
    assert_eq!(exchange.calls.load(Ordering::SeqCst), messages.len() / 2);
    assert_single_fresh_tail(&messages);
    assert_eq!(lifecycle.state(), LifecycleState::Idle);
}

#[tokio::test]
async fn test_transcript_length_tracks_accepted_turns() {
    let lifecycle = lifecycle_with(FlakyExchange {
        calls: AtomicUsize::new(0),
    });
    let inputs = ["hi", "", "  ", "what", "why", "\t", "how"];

    let mut accepted = 0;
    for input in inputs {
        lifecycle.submit(input).await;
        if !input.trim().is_empty() {
            accepted += 1;
        }

        let messages = lifecycle.store().snapshot();
        assert_eq!(messages.len(), accepted * 2);
        assert_single_fresh_tail(&messages);
    }

    assert_eq!(accepted, 4);
}

#[tokio::test]
async fn test_timeout_falls_back_and_returns_to_idle() {
    let lifecycle = lifecycle_with(NeverExchange).with_config(
        LifecycleConfig::default().with_exchange_timeout(Some(Duration::from_millis(20))),
    );

    lifecycle.submit("Hello").await;

    let messages = lifecycle.store().snapshot();
    assert_eq!(
        turns(&messages),
        vec![("Hello", true), (FALLBACK_MESSAGE, false)]
    );
    assert_eq!(lifecycle.state(), LifecycleState::Idle);
}

#[tokio::test]
async fn test_dropped_turn_returns_to_idle() {
    let lifecycle = lifecycle_with(NeverExchange);

    let outcome = tokio::time::timeout(Duration::from_millis(20), lifecycle.submit("Hello")).await;
    assert!(outcome.is_err());

    assert_eq!(turns(&lifecycle.store().snapshot()), vec![("Hello", true)]);
    assert_eq!(lifecycle.state(), LifecycleState::Idle);
}

#[tokio::test]
async fn test_session_failure_falls_back_without_calling_exchange() {
    let exchange = Arc::new(ScriptedExchange::new("unused"));
    let lifecycle = RequestLifecycle::new(
        exchange.clone(),
        Arc::new(SessionIdentity::new(BrokenStore)),
        Arc::new(ConversationStore::new()),
    );

    lifecycle.submit("Hello").await;

    assert_eq!(
        turns(&lifecycle.store().snapshot()),
        vec![("Hello", true), (FALLBACK_MESSAGE, false)]
    );
    assert!(exchange.requests().is_empty());
    assert_eq!(lifecycle.state(), LifecycleState::Idle);
}

#[tokio::test]
async fn test_session_id_is_stable_across_turns() {
    let exchange = Arc::new(ScriptedExchange::new("ok"));
    let lifecycle = lifecycle_with(exchange.clone());

    lifecycle.submit("first").await;
    lifecycle.submit("second").await;

    let requests = exchange.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].session_id, requests[1].session_id);
}

#[tokio::test]
async fn test_dispatch_runs_turn_in_background() {
    let exchange: Arc<dyn Exchange> = Arc::new(ScriptedExchange::new("Hi there"));
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let lifecycle: Arc<RequestLifecycle> = Arc::new(RequestLifecycle::new(
        exchange,
        Arc::new(SessionIdentity::new(storage)),
        Arc::new(ConversationStore::new()),
    ));

    lifecycle.dispatch("Hello").await.unwrap();

    assert_eq!(
        turns(&lifecycle.store().snapshot()),
        vec![("Hello", true), ("Hi there", false)]
    );
}

#[tokio::test]
async fn test_state_subscribers_see_full_cycle() {
    let gate = Arc::new(Notify::new());
    let lifecycle = Arc::new(lifecycle_with(GatedExchange {
        gate: gate.clone(),
        calls: AtomicUsize::new(0),
    }));
    let mut state_rx = lifecycle.subscribe_state();

    let turn = lifecycle.dispatch("Hello");

    state_rx
        .wait_for(|s| *s == LifecycleState::Sending)
        .await
        .unwrap();
    gate.notify_one();
    state_rx
        .wait_for(|s| *s == LifecycleState::Idle)
        .await
        .unwrap();
    turn.await.unwrap();

    assert_eq!(lifecycle.store().len(), 2);
}
