use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ragchat_core::util::APP_DIR;
use tracing::info;

/// Environment variable overriding `backend.base_url`.
pub const BACKEND_URL_ENV: &str = "RAGCHAT_BACKEND_URL";

const CONFIG_TEMPLATE: &str = r#"{
  "backend": {
    "base_url": "http://localhost:8000",
    "timeout_secs": null
  },
  "storage": {
    "state_file": null
  }
}"#;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "BackendConfig::default_base_url")]
    pub base_url: String,
    /// Seconds to wait for an answer before giving up on a turn.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            timeout_secs: None,
        }
    }
}

impl BackendConfig {
    fn default_base_url() -> String {
        "http://localhost:8000".to_string()
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StorageConfig {
    /// Where the session id is persisted. Defaults to `~/ragchat/state.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

impl StorageConfig {
    pub fn state_file_path(&self) -> anyhow::Result<PathBuf> {
        match &self.state_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Config::config_dir()?.join("state.json")),
        }
    }
}

impl Config {
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join(APP_DIR))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load `~/ragchat/config.json`, applying `RAGCHAT_BACKEND_URL` on top.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path, std::env::var(BACKEND_URL_ENV).ok())
    }

    /// Load from an explicit path. A missing file is only accepted when a
    /// backend URL override is supplied.
    pub fn load_from(config_path: &Path, backend_url: Option<String>) -> anyhow::Result<Self> {
        let backend_url = backend_url.filter(|url| !url.trim().is_empty());

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config = Self::from_json(&content)?;
            info!("Loaded config from {}", config_path.display());
            config
        } else if backend_url.is_some() {
            Self::default()
        } else {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'ragchat init' to create config.",
                config_path.display()
            );
        };

        if let Some(url) = backend_url {
            info!("Backend URL overridden by {BACKEND_URL_ENV}");
            config.backend.base_url = url;
        }

        Ok(config)
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");

        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        std::fs::write(&config_path, CONFIG_TEMPLATE)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Point backend.base_url at your question-answering backend");
        println!("   2. Run 'ragchat info' to check the backend is reachable");
        println!("   3. Run 'ragchat chat' to start a conversation");
        println!();
        println!("🔧 Configuration options:");
        println!("   - backend.timeout_secs: give up on a turn after this many seconds");
        println!("   - storage.state_file: where the session id is kept");
        println!("   - {BACKEND_URL_ENV}: overrides backend.base_url");
        println!();
        Ok(())
    }
}
