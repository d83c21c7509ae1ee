mod email_handlers;

use crate::auth::{ApplicationCredential, TokenStore};
use crate::cli::AppConfig;
use crate::providers::GmailProvider;
use crate::session::{SessionError, SessionManager};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router as AxumRouter,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers
pub struct AppState {
    pub session: SessionManager,
}

impl AppState {
    /// Load credentials and token as configured and build the session.
    ///
    /// A missing credential file leaves the session unconfigured instead of
    /// failing startup, so the API can report the problem.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let credential = ApplicationCredential::load(&config.gmail.credentials_path).await;
        let provider = GmailProvider::new(config.gmail.api_base_url.clone())
            .map_err(|e| anyhow::anyhow!("Failed to initialize Gmail client: {}", e))?;

        let session = SessionManager::new(
            credential,
            TokenStore::new(config.gmail.token_path.clone()),
            Arc::new(provider),
            config.gmail.sender.clone(),
        )
        .await;

        Ok(Self { session })
    }
}

/// Build the HTTP routes around `state`
pub fn build_router(state: Arc<AppState>) -> AxumRouter {
    let api = AxumRouter::new()
        .route("/initialize", get(email_handlers::initialize))
        .route("/authorize", get(email_handlers::authorize))
        .route("/sendemail", post(email_handlers::send_email));

    AxumRouter::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(&config).await?);

    match state.session.redirect_uri().await {
        Ok(uri) => info!("🔐 Authorization callback expected at {}", uri),
        Err(e) => error!("⚠️  {}", e),
    }
    info!("Session state: {}", state.session.state().await);

    let app = build_router(state);

    // Bind to main address
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("🚀 Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "gmail-relay"
    }))
}

/// Error type for HTTP handlers
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Session(SessionError),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Session(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Session(err) => match err {
                SessionError::Configuration(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Credentials not configured, add credentials and restart".to_string(),
                ),
                SessionError::Unauthorized => (StatusCode::UNAUTHORIZED, err.to_string()),
                SessionError::TokenExchange(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed in generating token".to_string(),
                ),
                SessionError::Persistence(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed in saving the token".to_string(),
                ),
                SessionError::Send(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
                SessionError::InvalidMessage(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            },
        };

        let body = Json(serde_json::json!({
            "success": false,
            "msg": message
        }));

        (status, body).into_response()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Session(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AppError {}
