use ragchat_config::{BACKEND_URL_ENV, Config};
use ragchat_core::KeyValueStore;
use ragchat_core::util::SESSION_KEY;
use tracing::info;

use super::init_common_components;

/// Strategy for displaying configuration information.
///
/// This strategy outputs:
/// - Backend URL (credentials masked) and health
/// - Turn timeout
/// - Session state file and the stored session id, if any
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let common = init_common_components()?;
        let config = &common.config;

        println!("=== ragchat Configuration ===\n");

        println!("Config File: {}", Config::config_path()?.display());
        if std::env::var_os(BACKEND_URL_ENV).is_some() {
            println!("  ({BACKEND_URL_ENV} is set and overrides the backend URL)");
        }
        println!();

        println!("Backend:");
        println!("  URL: {}", mask_url_credentials(&config.backend.base_url));
        match config.backend.timeout_secs {
            Some(secs) => println!("  Timeout: {secs}s"),
            None => println!("  Timeout: (none)"),
        }

        info!("Checking backend health");
        match common.exchange.health().await {
            Ok(()) => println!("  Status: OK"),
            Err(e) => {
                println!("  Status: Unreachable");
                println!("  Error: {e}");
            }
        }
        println!();

        println!("Session:");
        println!(
            "  State File: {}",
            config.storage.state_file_path()?.display()
        );
        match common.storage.get(SESSION_KEY)? {
            Some(id) if !id.is_empty() => println!("  Session ID: {id}"),
            _ => println!("  Session ID: (not created yet)"),
        }

        Ok(())
    }
}

fn mask_url_credentials(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };

    let Some((credentials, after_at)) = rest.split_once('@') else {
        return url.to_string();
    };

    let username = credentials
        .split_once(':')
        .map_or(credentials, |(username, _password)| username);

    format!("{scheme}://{username}:***@{after_at}")
}
