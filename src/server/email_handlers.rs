use super::{AppError, AppState};
use crate::mail::MailMessage;
use crate::session::Authorization;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Query string Google appends when redirecting back after consent
#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    code: Option<String>,
    error: Option<String>,
}

/// GET /api/initialize
///
/// Reports success when a token is stored, otherwise returns the consent
/// link the user has to open.
pub async fn initialize(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let response = match state.session.ensure_authorized().await? {
        Authorization::Ready => serde_json::json!({
            "success": true,
            "msg": "Initialization Successful"
        }),
        Authorization::Required { url } => serde_json::json!({
            "msg": "Authorize the API using the redirection link",
            "redirect": url.as_str()
        }),
    };

    Ok(Json(response))
}

/// GET /api/authorize?code=...
///
/// Redirect target of the consent screen; exchanges and stores the token.
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AuthorizeQuery>, QueryRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.session.ensure_configured()?;

    let Query(query) =
        query.map_err(|e| AppError::BadRequest(format!("Invalid query string: {}", e)))?;

    if let Some(error) = query.error {
        warn!("User declined authorization: {}", error);
        return Err(AppError::BadRequest(format!("Authorization denied: {}", error)));
    }

    let code = query
        .code
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    state.session.complete_authorization(&code).await?;

    info!("✅ Authorization completed");
    Ok(Json(serde_json::json!({
        "success": true,
        "msg": "Token successfully generated and stored"
    })))
}

/// POST /api/sendemail
///
/// The body is parsed here rather than by an extractor so that session
/// errors take precedence and every failure is answered as JSON.
pub async fn send_email(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    state.session.ensure_token().await?;

    let message: MailMessage = serde_json::from_slice(&body).map_err(|e| {
        warn!("❌ Failed to parse send request: {}", e);
        AppError::BadRequest(format!("Invalid request format: {}", e))
    })?;

    let result = state.session.authorized_send(message).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "result": result
    })))
}
