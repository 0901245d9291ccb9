//! Transcript storage for a conversation.
//!
//! The transcript is an append-only sequence of messages. The newest message
//! is the only one flagged fresh, which presentation layers use to animate or
//! scroll to it.

use ragchat_core::{IdGenerator, Message, MessageId, UuidGenerator};
use tokio::sync::watch;

/// Ordered transcript of a conversation.
///
/// Every append publishes the new transcript to subscribers.
pub struct ConversationStore {
    messages: watch::Sender<Vec<Message>>,
    ids: Box<dyn IdGenerator>,
}

impl ConversationStore {
    /// Create an empty store with random message ids.
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: watch::Sender::new(Vec::new()),
            ids: Box::new(UuidGenerator),
        }
    }

    /// Replace the generator used for message ids.
    #[must_use]
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Append a message and make it the only fresh one.
    pub fn append(&self, content: impl Into<String>, is_user: bool) -> MessageId {
        let id = MessageId::new(self.ids.generate());
        let message = Message::new(id.clone(), content.into(), is_user);

        self.messages.send_modify(|messages| {
            for existing in messages.iter_mut() {
                existing.mark_stale();
            }
            messages.push(message);
        });

        id
    }

    /// The transcript as of now.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    /// Receive the transcript every time it changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.messages.subscribe()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.borrow().is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<Message> {
        self.messages.borrow().last().cloned()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
