//! OAuth2 authorization code flow against Google's endpoints

use chrono::Utc;
use oauth2::basic::{BasicClient, BasicTokenType};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, RedirectUrl, RequestTokenError,
    TokenResponse, TokenUrl,
};
use secrecy::SecretString;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::credentials::ApplicationCredential;
use super::token_store::StoredToken;

/// Scopes requested for the relay: read mail state and send mail
pub const GMAIL_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
];

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(3600);

#[derive(Error, Debug)]
pub enum OAuthError {
    #[error("Invalid OAuth endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("Authorization code was rejected: {0}")]
    Rejected(String),

    #[error("Token request failed: {0}")]
    Request(String),
}

/// OAuth2 client bound to one application credential
#[derive(Debug, Clone)]
pub struct OAuthClient {
    client: BasicClient,
    auth_url: Url,
    client_id: String,
    redirect_uri: String,
}

impl OAuthClient {
    pub fn new(credential: &ApplicationCredential) -> Result<Self, OAuthError> {
        let client = BasicClient::new(
            ClientId::new(credential.client_id.clone()),
            Some(ClientSecret::new(credential.client_secret.clone())),
            AuthUrl::new(credential.auth_uri.clone())?,
            Some(TokenUrl::new(credential.token_uri.clone())?),
        )
        .set_redirect_uri(RedirectUrl::new(credential.redirect_uri.clone())?);

        Ok(Self {
            client,
            auth_url: Url::parse(&credential.auth_uri)?,
            client_id: credential.client_id.clone(),
            redirect_uri: credential.redirect_uri.clone(),
        })
    }

    /// Consent URL requesting offline access for [`GMAIL_SCOPES`].
    ///
    /// Deterministic for a given credential: no CSRF state is attached
    /// because the callback is a fixed, unauthenticated route.
    pub fn authorization_url(&self) -> Url {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("access_type", "offline")
            .append_pair("scope", &GMAIL_SCOPES.join(" "))
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri);
        url
    }

    /// Exchange an authorization code for a token at the token endpoint
    pub async fn exchange_code(&self, code: &str) -> Result<StoredToken, OAuthError> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(resp) => {
                    let mut message = resp.error().to_string();
                    if let Some(description) = resp.error_description() {
                        message = format!("{}: {}", message, description);
                    }
                    OAuthError::Rejected(message)
                }
                other => OAuthError::Request(other.to_string()),
            })?;

        let expires_in = response.expires_in().unwrap_or(DEFAULT_EXPIRES_IN);
        let expiry_date = Utc::now()
            + chrono::Duration::from_std(expires_in).unwrap_or_else(|_| chrono::Duration::hours(1));

        let scope = response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" "))
            .unwrap_or_else(|| GMAIL_SCOPES.join(" "));

        let token_type = match response.token_type() {
            BasicTokenType::Bearer => "Bearer".to_string(),
            other => AsRef::<str>::as_ref(other).to_string(),
        };

        if response.refresh_token().is_none() {
            tracing::warn!("Token endpoint issued no refresh token");
        }

        Ok(StoredToken {
            access_token: SecretString::new(response.access_token().secret().clone()),
            refresh_token: response
                .refresh_token()
                .map(|t| SecretString::new(t.secret().clone())),
            scope,
            token_type,
            expiry_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn credential(token_uri: &str) -> ApplicationCredential {
        ApplicationCredential {
            client_id: "client-abc".to_string(),
            client_secret: "secret-xyz".to_string(),
            redirect_uri: "http://localhost:3000/api/authorize".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri: token_uri.to_string(),
        }
    }

    #[test]
    fn test_authorization_url_requests_offline_access_and_scopes() {
        let client = OAuthClient::new(&credential("https://oauth2.googleapis.com/token")).unwrap();
        let url = client.authorization_url();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params.get("access_type").map(String::as_str), Some("offline"));
        assert_eq!(params.get("response_type").map(String::as_str), Some("code"));
        assert_eq!(params.get("client_id").map(String::as_str), Some("client-abc"));
        assert_eq!(
            params.get("redirect_uri").map(String::as_str),
            Some("http://localhost:3000/api/authorize")
        );

        let scopes: Vec<&str> = params["scope"].split(' ').collect();
        assert_eq!(scopes, GMAIL_SCOPES.to_vec());
        assert!(!params.contains_key("state"));
    }

    #[test]
    fn test_authorization_url_is_deterministic() {
        let client = OAuthClient::new(&credential("https://oauth2.googleapis.com/token")).unwrap();
        assert_eq!(client.authorization_url(), client.authorization_url());
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        assert!(matches!(
            OAuthClient::new(&credential("not a url")),
            Err(OAuthError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_exchange_code_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::Regex("code=good-code".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"ya29.token","refresh_token":"1//refresh","expires_in":3599,"scope":"https://www.googleapis.com/auth/gmail.readonly https://www.googleapis.com/auth/gmail.send","token_type":"Bearer"}"#,
            )
            .create_async()
            .await;

        let client = OAuthClient::new(&credential(&format!("{}/token", server.url()))).unwrap();
        let token = client.exchange_code("good-code").await.unwrap();

        mock.assert_async().await;
        assert_eq!(token.access_token.expose_secret(), "ya29.token");
        assert_eq!(
            token.refresh_token.as_ref().map(|t| t.expose_secret().as_str()),
            Some("1//refresh")
        );
        assert_eq!(token.scope, GMAIL_SCOPES.join(" "));
        assert_eq!(token.token_type, "Bearer");
        assert!(!token.is_expired());
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant","error_description":"Bad Request"}"#)
            .create_async()
            .await;

        let client = OAuthClient::new(&credential(&format!("{}/token", server.url()))).unwrap();
        let err = client.exchange_code("bad-code").await.unwrap_err();

        match err {
            OAuthError::Rejected(message) => assert!(message.contains("invalid_grant")),
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }
}
