pub mod credentials;
pub mod oauth;
pub mod token_store;

pub use credentials::ApplicationCredential;
pub use oauth::{OAuthClient, OAuthError, GMAIL_SCOPES};
pub use token_store::{StoredToken, TokenStore};
