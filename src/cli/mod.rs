//! Application configuration
//!
//! Settings come from an optional TOML file layered with environment
//! variables of the form `GMAIL_RELAY__SECTION__KEY`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::providers::gmail::DEFAULT_GMAIL_API_BASE;

/// Environment prefix for configuration overrides
const ENV_PREFIX: &str = "GMAIL_RELAY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gmail: GmailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailConfig {
    /// OAuth client credential downloaded from the Google Cloud console
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// Where the authorized user's token is persisted
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    /// Address written to the `from` header of every message
    #[serde(default)]
    pub sender: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_api_base_url() -> String {
    DEFAULT_GMAIL_API_BASE.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_path: default_token_path(),
            sender: String::new(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl AppConfig {
    /// Default config path: ~/.gmail-relay/config.toml
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".gmail-relay").join("config.toml"))
    }

    /// Load configuration from `path` (if it exists) and the environment
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

        let config: Self = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.gmail.sender.trim().is_empty() {
            anyhow::bail!(
                "gmail.sender must be set to the address mail is sent from \
                 (run `gmrelay init --sender <address>` to write a starter config)"
            );
        }
        Ok(())
    }

    /// Write a starter configuration file, refusing to overwrite one
    pub fn write_template(path: &Path, sender: &str) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Configuration already exists at {}", path.display());
        }

        let mut config = Self::default();
        config.gmail.sender = sender.to_string();

        let content = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
        Ok(())
    }
}
