use std::sync::Arc;

use once_cell::sync::OnceCell;
use ragchat_core::util::SESSION_KEY;
use ragchat_core::{IdGenerator, KeyValueStore, SessionId, UuidGenerator};
use tracing::{debug, info};

/// Obtains or creates the session id of this installation.
///
/// The id is resolved once and cached, so storage sees at most one write per
/// client lifetime.
pub struct SessionIdentity<S = Arc<dyn KeyValueStore>>
where
    S: KeyValueStore,
{
    storage: S,
    ids: Box<dyn IdGenerator>,
    resolved: OnceCell<SessionId>,
}

impl<S: KeyValueStore> SessionIdentity<S> {
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            ids: Box::new(UuidGenerator),
            resolved: OnceCell::new(),
        }
    }

    /// Replace the generator used for new session ids.
    #[must_use]
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Return the stored session id, creating and persisting one if absent.
    pub fn get_or_create_session_id(&self) -> anyhow::Result<SessionId> {
        self.resolved
            .get_or_try_init(|| self.load_or_create())
            .cloned()
    }

    /// The id, if it has already been resolved in this process.
    #[must_use]
    pub fn cached(&self) -> Option<&SessionId> {
        self.resolved.get()
    }

    fn load_or_create(&self) -> anyhow::Result<SessionId> {
        if let Some(existing) = self.storage.get(SESSION_KEY)?.filter(|v| !v.is_empty()) {
            debug!("Reusing stored session id: {existing}");
            return Ok(SessionId::new(existing));
        }

        let id = SessionId::new(self.ids.generate());
        self.storage.set(SESSION_KEY, id.as_str())?;
        info!("Created session id: {id}");
        Ok(id)
    }
}
