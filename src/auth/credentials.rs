use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Google's OAuth2 authorization endpoint
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
/// Google's OAuth2 token endpoint
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Static application credential issued by the Google Cloud console
#[derive(Debug, Clone)]
pub struct ApplicationCredential {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_uri: String,
    pub token_uri: String,
}

/// On-disk layout of `credentials.json`
#[derive(Deserialize)]
struct CredentialFile {
    web: Option<ClientSection>,
    installed: Option<ClientSection>,
}

#[derive(Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl ApplicationCredential {
    /// Load the credential file downloaded from the Google Cloud console.
    ///
    /// Accepts both the `web` and the `installed` client layouts; the first
    /// redirect URI is the one used for the authorization flow.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid credentials file {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: CredentialFile =
            serde_json::from_str(content).context("Failed to parse credentials JSON")?;

        let section = file
            .web
            .or(file.installed)
            .context("Credentials must contain a 'web' or 'installed' section")?;

        if section.client_id.is_empty() || section.client_secret.is_empty() {
            anyhow::bail!("client_id and client_secret must not be empty");
        }

        let redirect_uri = section
            .redirect_uris
            .into_iter()
            .next()
            .context("Credentials contain no redirect_uris")?;

        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
            redirect_uri,
            auth_uri: section.auth_uri.unwrap_or_else(|| DEFAULT_AUTH_URI.to_string()),
            token_uri: section.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        })
    }
}
