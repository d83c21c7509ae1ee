pub mod error;
pub mod gmail;

use async_trait::async_trait;
use error::ProviderError;

/// Remote API able to deliver an already encoded message.
///
/// `raw` is the web-safe base64 envelope produced by [`crate::mail`]; the
/// provider response body is returned untouched so it can be echoed to the
/// caller.
#[async_trait]
pub trait MailProvider: Send + Sync {
    async fn send_raw(&self, access_token: &str, raw: &str) -> Result<serde_json::Value, ProviderError>;
}

pub use gmail::GmailProvider;
