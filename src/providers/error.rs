use thiserror::Error;

/// Mail provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Provider API error: {status} - {message}")]
    ApiError { status: u16, message: String },
}

impl ProviderError {
    /// The provider refused the bearer token
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ProviderError::ApiError { status: 401, .. })
    }
}
