//! OAuth2 session for the single authorized user
//!
//! The [`SessionManager`] owns the application credential and the currently
//! loaded token. It decides whether an authorization redirect is needed,
//! completes the code exchange, and signs outgoing sends with the token.

use secrecy::ExposeSecret;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::auth::{ApplicationCredential, OAuthClient, StoredToken, TokenStore};
use crate::mail::{self, MailMessage, MessageError};
use crate::providers::MailProvider;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("App is Unauthorized")]
    Unauthorized,

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Failed to persist token: {0}")]
    Persistence(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(#[from] MessageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The application credential could not be loaded; terminal
    Unconfigured,
    Unauthorized,
    Authorized,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Unconfigured => write!(f, "unconfigured"),
            SessionState::Unauthorized => write!(f, "unauthorized"),
            SessionState::Authorized => write!(f, "authorized"),
        }
    }
}

/// Outcome of [`SessionManager::ensure_authorized`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Ready,
    /// The user must visit `url` and grant access
    Required { url: Url },
}

impl Authorization {
    pub fn needs_authorization(&self) -> bool {
        matches!(self, Authorization::Required { .. })
    }
}

/// In-memory authorization state
pub struct SessionContext {
    credential: ApplicationCredential,
    token: Option<StoredToken>,
}

struct Configured {
    oauth: OAuthClient,
    context: Mutex<SessionContext>,
}

pub struct SessionManager {
    /// `Err` holds the reason the credential could not be loaded
    configured: Result<Configured, String>,
    token_store: TokenStore,
    provider: Arc<dyn MailProvider>,
    sender: String,
}

impl SessionManager {
    /// Build the session from the startup credential load.
    ///
    /// A failed credential load does not abort: the manager starts
    /// `Unconfigured` and every operation reports a configuration error.
    /// A token already on disk is adopted immediately.
    pub async fn new(
        credential: anyhow::Result<ApplicationCredential>,
        token_store: TokenStore,
        provider: Arc<dyn MailProvider>,
        sender: String,
    ) -> Self {
        let configured = match credential {
            Ok(credential) => match OAuthClient::new(&credential) {
                Ok(oauth) => {
                    let token = load_token(&token_store).await;
                    Ok(Configured {
                        oauth,
                        context: Mutex::new(SessionContext { credential, token }),
                    })
                }
                Err(e) => Err(e.to_string()),
            },
            Err(e) => Err(format!("{:#}", e)),
        };

        if let Err(reason) = &configured {
            error!("❌ Credentials unavailable, add credentials and restart: {}", reason);
        }

        Self {
            configured,
            token_store,
            provider,
            sender,
        }
    }

    fn configured(&self) -> Result<&Configured, SessionError> {
        self.configured
            .as_ref()
            .map_err(|reason| SessionError::Configuration(reason.clone()))
    }

    /// Fail with a configuration error when credentials never loaded
    pub fn ensure_configured(&self) -> Result<(), SessionError> {
        self.configured().map(|_| ())
    }

    /// Fail unless a token is currently held in memory
    pub async fn ensure_token(&self) -> Result<(), SessionError> {
        let configured = self.configured()?;
        if configured.context.lock().await.token.is_some() {
            Ok(())
        } else {
            Err(SessionError::Unauthorized)
        }
    }

    /// Whether a token file is present on disk, independent of memory
    pub async fn token_file_exists(&self) -> bool {
        self.token_store.exists().await
    }

    pub async fn state(&self) -> SessionState {
        match &self.configured {
            Err(_) => SessionState::Unconfigured,
            Ok(configured) => {
                if configured.context.lock().await.token.is_some() {
                    SessionState::Authorized
                } else {
                    SessionState::Unauthorized
                }
            }
        }
    }

    /// Redirect URI registered for the authorization callback
    pub async fn redirect_uri(&self) -> Result<String, SessionError> {
        let configured = self.configured()?;
        let context = configured.context.lock().await;
        Ok(context.credential.redirect_uri.clone())
    }

    pub fn authorization_url(&self) -> Result<Url, SessionError> {
        Ok(self.configured()?.oauth.authorization_url())
    }

    /// Snapshot of the token currently held in memory
    pub async fn current_token(&self) -> Option<StoredToken> {
        let configured = self.configured.as_ref().ok()?;
        configured.context.lock().await.token.clone()
    }

    /// Check for a persisted token and adopt it.
    ///
    /// A missing or unreadable token file yields the authorization URL the
    /// user must visit, and drops any token held in memory.
    pub async fn ensure_authorized(&self) -> Result<Authorization, SessionError> {
        let configured = self.configured()?;

        match self.token_store.load().await {
            Ok(Some(token)) => {
                if token.is_expired() {
                    warn!("Stored token expired at {}", token.expiry_date);
                }
                configured.context.lock().await.token = Some(token);
                Ok(Authorization::Ready)
            }
            Ok(None) => {
                info!("No stored token, authorization required");
                configured.context.lock().await.token = None;
                Ok(Authorization::Required {
                    url: configured.oauth.authorization_url(),
                })
            }
            Err(e) => {
                warn!("Failed to load stored token, authorization required: {:#}", e);
                configured.context.lock().await.token = None;
                Ok(Authorization::Required {
                    url: configured.oauth.authorization_url(),
                })
            }
        }
    }

    /// Exchange `code` for a token, persist it, then adopt it.
    ///
    /// The token only becomes active once it is durably stored; if the write
    /// fails the session keeps its previous state.
    pub async fn complete_authorization(&self, code: &str) -> Result<(), SessionError> {
        let configured = self.configured()?;

        let code = code.trim();
        if code.is_empty() {
            return Err(SessionError::TokenExchange("Authorization code is empty".to_string()));
        }

        let token = configured.oauth.exchange_code(code).await.map_err(|e| {
            error!("Failed in generating token: {}", e);
            SessionError::TokenExchange(e.to_string())
        })?;

        // Hold the lock across the write so file and memory agree
        let mut context = configured.context.lock().await;
        self.token_store.save(&token).await.map_err(|e| {
            error!("Failed in saving the token: {:#}", e);
            SessionError::Persistence(format!("{:#}", e))
        })?;

        info!(
            "🔐 Token stored at {} (scope: {}, expires: {})",
            self.token_store.path().display(),
            token.scope,
            token.expiry_date
        );
        context.token = Some(token);
        Ok(())
    }

    /// Send `message` as the authorized user.
    ///
    /// Without a loaded token this fails with [`SessionError::Unauthorized`]
    /// before the provider is contacted.
    pub async fn authorized_send(&self, message: MailMessage) -> Result<serde_json::Value, SessionError> {
        let configured = self.configured()?;

        let access_token = {
            let context = configured.context.lock().await;
            match &context.token {
                Some(token) => token.access_token.expose_secret().clone(),
                None => return Err(SessionError::Unauthorized),
            }
        };

        message.validate()?;

        let raw = mail::encode_message(&message, &self.sender);
        debug!("Sending message to {} ({} encoded bytes)", message.to, raw.len());

        let result = self
            .provider
            .send_raw(&access_token, &raw)
            .await
            .map_err(|e| {
                if e.is_unauthorized() {
                    warn!("Gmail rejected the stored token: {}", e);
                    SessionError::Unauthorized
                } else {
                    error!("Gmail send failed: {}", e);
                    SessionError::Send(e.to_string())
                }
            })?;

        info!("📨 Message sent to {}", message.to);
        Ok(result)
    }
}

async fn load_token(token_store: &TokenStore) -> Option<StoredToken> {
    match token_store.load().await {
        Ok(Some(token)) => {
            info!("🔐 Loaded stored token (expires: {})", token.expiry_date);
            Some(token)
        }
        Ok(None) => None,
        Err(e) => {
            warn!("Ignoring unreadable token file: {:#}", e);
            None
        }
    }
}
