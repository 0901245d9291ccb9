//! Request lifecycle for a single conversation turn.
//!
//! `RequestLifecycle` records the user's message, asks the remote exchange,
//! and records either the answer or a fixed apology. Only one turn may be
//! outstanding at a time; submissions that arrive meanwhile are dropped.

use std::sync::Arc;
use std::time::Duration;

use ragchat_core::util::FALLBACK_MESSAGE;
use ragchat_core::{
    AskRequest, AskResponse, Exchange, ExchangeError, KeyValueStore, LifecycleState,
};
use ragchat_session::SessionIdentity;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::store::ConversationStore;

/// Configuration for the request lifecycle.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Upper bound on a single exchange call. `None` waits indefinitely.
    pub exchange_timeout: Option<Duration>,
    /// Assistant reply recorded when the exchange fails
    pub fallback_message: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            exchange_timeout: None,
            fallback_message: FALLBACK_MESSAGE.to_string(),
        }
    }
}

impl LifecycleConfig {
    /// Set the exchange timeout.
    #[must_use]
    pub const fn with_exchange_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    /// Set the fallback reply.
    #[must_use]
    pub fn with_fallback_message(mut self, message: String) -> Self {
        self.fallback_message = message;
        self
    }
}

/// Marks a turn as outstanding for as long as it is alive.
///
/// Dropping the guard returns the lifecycle to `Idle`, whether the turn
/// finished, failed or its future was dropped mid-flight.
struct InFlight<'a> {
    state: &'a watch::Sender<LifecycleState>,
}

impl<'a> InFlight<'a> {
    /// Move `Idle -> Sending` in one step, or return `None` if a turn is
    /// already outstanding.
    fn begin(state: &'a watch::Sender<LifecycleState>) -> Option<Self> {
        let acquired = state.send_if_modified(|current| {
            if *current == LifecycleState::Idle {
                *current = LifecycleState::Sending;
                true
            } else {
                false
            }
        });

        acquired.then(|| Self { state })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.send_replace(LifecycleState::Idle);
    }
}

/// Single-flight turn orchestrator.
///
/// Shares the transcript store and session identity with the rest of the
/// client; owns only the lifecycle state.
pub struct RequestLifecycle<E = Arc<dyn Exchange>, S = Arc<dyn KeyValueStore>>
where
    E: Exchange,
    S: KeyValueStore,
{
    exchange: E,
    identity: Arc<SessionIdentity<S>>,
    store: Arc<ConversationStore>,
    state: watch::Sender<LifecycleState>,
    config: LifecycleConfig,
}

impl<E, S> RequestLifecycle<E, S>
where
    E: Exchange,
    S: KeyValueStore,
{
    /// Create a lifecycle in the `Idle` state.
    pub fn new(
        exchange: E,
        identity: Arc<SessionIdentity<S>>,
        store: Arc<ConversationStore>,
    ) -> Self {
        Self {
            exchange,
            identity,
            store,
            state: watch::Sender::new(LifecycleState::Idle),
            config: LifecycleConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one turn for `user_text`.
    ///
    /// Blank input, or input arriving while another turn is outstanding, is
    /// dropped without touching the transcript. Otherwise the trimmed text and
    /// then the reply (or the fallback message) are appended, and the state
    /// returns to `Idle`. Nothing is reported to the caller; observe the store
    /// and state instead.
    pub async fn submit(&self, user_text: &str) {
        let question = user_text.trim();
        if question.is_empty() {
            debug!("Ignoring empty submission");
            return;
        }

        let Some(_turn) = InFlight::begin(&self.state) else {
            debug!("Turn already in flight, dropping submission");
            return;
        };

        self.store.append(question, true);

        let reply = match self.exchange_turn(question).await {
            Ok(response) => {
                debug!(
                    "Received answer with {} sources",
                    response.sources.as_ref().map_or(0, Vec::len)
                );
                response.answer
            }
            Err(e) => {
                error!("Failed to send message: {e}");
                self.config.fallback_message.clone()
            }
        };

        self.store.append(reply, false);
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.state() == LifecycleState::Sending
    }

    /// Receive the lifecycle state every time it changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    #[must_use]
    pub const fn identity(&self) -> &Arc<SessionIdentity<S>> {
        &self.identity
    }

    #[must_use]
    pub const fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    async fn exchange_turn(&self, question: &str) -> Result<AskResponse, ExchangeError> {
        let session_id = self
            .identity
            .get_or_create_session_id()
            .map_err(|e| ExchangeError::Session(e.to_string()))?;

        let request = AskRequest::new(question, session_id);
        info!("Sending question for session: {}", request.session_id);

        match self.config.exchange_timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange.ask(&request))
                .await
                .unwrap_or(Err(ExchangeError::Timeout(limit))),
            None => self.exchange.ask(&request).await,
        }
    }
}

impl<E, S> RequestLifecycle<E, S>
where
    E: Exchange + 'static,
    S: KeyValueStore + 'static,
{
    /// Start a turn on the runtime without waiting for it.
    pub fn dispatch(self: &Arc<Self>, user_text: impl Into<String>) -> JoinHandle<()> {
        let lifecycle = Arc::clone(self);
        let user_text = user_text.into();
        tokio::spawn(async move { lifecycle.submit(&user_text).await })
    }
}
