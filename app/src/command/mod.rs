//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy with its own type and input, so
//! dispatch is resolved at compile time.

use std::sync::Arc;

use ragchat_config::Config;
use ragchat_conversation::{ConversationStore, LifecycleConfig, RequestLifecycle};
use ragchat_core::{Exchange, KeyValueStore};
use ragchat_providers::HttpExchange;
use ragchat_session::{FileStore, SessionIdentity};
use tracing::info;

mod chat;
mod info;
mod init;
mod session;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use session::SessionStrategy;
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    ///
    /// # Errors
    /// Returns an error if command execution fails.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Collaborators shared by the commands that talk to the backend.
struct CommonComponents {
    config: Config,
    storage: Arc<dyn KeyValueStore>,
    identity: Arc<SessionIdentity>,
    exchange: Arc<HttpExchange>,
}

impl CommonComponents {
    /// A lifecycle over a fresh, empty transcript.
    fn lifecycle(&self) -> RequestLifecycle {
        let exchange: Arc<dyn Exchange> = self.exchange.clone();
        let lifecycle_config =
            LifecycleConfig::default().with_exchange_timeout(self.config.backend.timeout());

        RequestLifecycle::new(
            exchange,
            Arc::clone(&self.identity),
            Arc::new(ConversationStore::new()),
        )
        .with_config(lifecycle_config)
    }
}

fn init_common_components() -> anyhow::Result<CommonComponents> {
    let config = Config::load()?;

    let state_file = config.storage.state_file_path()?;
    info!("Session state file: {}", state_file.display());

    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(state_file));
    let identity = Arc::new(SessionIdentity::new(Arc::clone(&storage)));
    let exchange = Arc::new(HttpExchange::new(config.backend.base_url.clone()));

    Ok(CommonComponents {
        config,
        storage,
        identity,
        exchange,
    })
}
