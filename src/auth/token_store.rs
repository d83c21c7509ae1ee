use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// Serialize SecretString for storage
fn serialize_secret<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

/// Deserialize SecretString from storage
fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(SecretString::new(s))
}

fn serialize_optional_secret<S>(secret: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match secret {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    Ok(s.map(SecretString::new))
}

/// OAuth token for the single authorized user.
///
/// Field names and the millisecond `expiry_date` follow the `token.json`
/// layout written by Google's client libraries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// OAuth access token (stored securely)
    #[serde(serialize_with = "serialize_secret", deserialize_with = "deserialize_secret")]
    pub access_token: SecretString,
    /// OAuth refresh token, only issued for offline access
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_secret",
        deserialize_with = "deserialize_optional_secret"
    )]
    pub refresh_token: Option<SecretString>,
    /// Space separated granted scopes
    pub scope: String,
    pub token_type: String,
    /// Token expiration time (UTC)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expiry_date: DateTime<Utc>,
}

impl StoredToken {
    /// Check if token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiry_date
    }
}

/// Token storage - persists the single token to a JSON file
#[derive(Debug, Clone)]
pub struct TokenStore {
    /// Path to token storage file
    file_path: PathBuf,
}

impl TokenStore {
    pub fn new(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.file_path).await.unwrap_or(false)
    }

    /// Read the persisted token.
    ///
    /// `Ok(None)` when no token file exists; an unreadable or malformed file
    /// is an error.
    pub async fn load(&self) -> Result<Option<StoredToken>> {
        let content = match tokio::fs::read_to_string(&self.file_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read token file {}", self.file_path.display())
                })
            }
        };

        let token = serde_json::from_str(&content).context("Failed to parse token file")?;
        Ok(Some(token))
    }

    /// Persist the token, replacing any existing file atomically
    pub async fn save(&self, token: &StoredToken) -> Result<()> {
        let json = serde_json::to_string_pretty(token).context("Failed to serialize token")?;

        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, json)
            .await
            .with_context(|| format!("Failed to write token file {}", tmp_path.display()))?;

        // Set file permissions to 0600 (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .context("Failed to restrict token file permissions")?;
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, &self.file_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e).with_context(|| {
                format!("Failed to replace token file {}", self.file_path.display())
            });
        }

        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .file_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "token.json".into());
        name.push(".tmp");
        self.file_path.with_file_name(name)
    }
}
