use super::{error::ProviderError, MailProvider};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Default Gmail REST API host
pub const DEFAULT_GMAIL_API_BASE: &str = "https://gmail.googleapis.com";

/// Upper bound for a single send request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Gmail `users.messages.send` client for the authorized user (`me`)
pub struct GmailProvider {
    base_url: String,
    client: Client,
}

impl GmailProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl MailProvider for GmailProvider {
    async fn send_raw(&self, access_token: &str, raw: &str) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/gmail/v1/users/me/messages/send", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await?;

        // Check for errors
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::ApiError {
                status,
                message: format!("Gmail API error: {}", error_text),
            });
        }

        let body = response.text().await?;
        let result = serde_json::from_str(&body)?;

        tracing::debug!("Gmail accepted message: {}", body);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_send_raw_posts_bearer_and_raw() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/gmail/v1/users/me/messages/send")
            .match_header("authorization", "Bearer ya29.token")
            .match_body(Matcher::Json(serde_json::json!({ "raw": "dG86IGFAYi5jb20=" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"18c1","threadId":"18c1","labelIds":["SENT"]}"#)
            .create_async()
            .await;

        let provider = GmailProvider::new(format!("{}/", server.url())).unwrap();
        let result = provider.send_raw("ya29.token", "dG86IGFAYi5jb20=").await.unwrap();

        mock.assert_async().await;
        assert_eq!(result["id"], "18c1");
        assert_eq!(result["labelIds"][0], "SENT");
    }

    #[tokio::test]
    async fn test_send_raw_reports_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/gmail/v1/users/me/messages/send")
            .with_status(401)
            .with_body(r#"{"error":{"code":401,"message":"Invalid Credentials"}}"#)
            .create_async()
            .await;

        let provider = GmailProvider::new(server.url()).unwrap();
        let err = provider.send_raw("expired", "cmF3").await.unwrap_err();

        assert!(err.is_unauthorized());
        assert!(err.to_string().contains("Invalid Credentials"));
    }

    #[tokio::test]
    async fn test_send_raw_server_error_is_not_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/gmail/v1/users/me/messages/send")
            .with_status(500)
            .with_body("backend error")
            .create_async()
            .await;

        let provider = GmailProvider::new(server.url()).unwrap();
        let err = provider.send_raw("token", "cmF3").await.unwrap_err();

        assert!(!err.is_unauthorized());
        assert!(matches!(err, ProviderError::ApiError { status: 500, .. }));
    }
}
