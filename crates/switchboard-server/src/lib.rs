//! Switchboard server library logic.
//!
//! Wires the call gateway together: the axum router, the shared application
//! state, and the blocking-database helper every handler goes through. The
//! collaborator seams (call control, dialogue, audio pipeline, queues) are
//! injected once at startup through [`AppState::new`]; no component
//! constructs its own client lazily.

pub mod api_callback;
pub mod api_calls;
pub mod api_stream;
pub mod auth;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod events;
pub mod queue;
pub mod registry;
pub mod telephony;
pub mod workers;

use crate::auth::TokenValidator;
use crate::config::Config;
use crate::dialogue::{AudioPipeline, Dialogue};
use crate::error::AppError;
use crate::queue::Queues;
use crate::registry::UrlTemplates;
use crate::telephony::CallControl;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use switchboard_db::{DbPool, StoreError};
use tower_http::cors::{Any, CorsLayer};

/// Maximum request body size (2 MiB). Protects against OOM from oversized
/// callback batches.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Application state shared across request handlers and queue workers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Callback and stream URL templates.
    pub urls: UrlTemplates,
    /// Outbound call-control client, constructed once at startup.
    pub call_control: Arc<dyn CallControl>,
    /// Dialogue collaborator.
    pub dialogue: Arc<dyn Dialogue>,
    /// Realtime audio consumer.
    pub audio_pipeline: Arc<dyn AudioPipeline>,
    /// The three notification channels.
    pub queues: Queues,
    /// Provider bearer-token validator with its JWKS cache.
    pub token_validator: Arc<TokenValidator>,
}

impl AppState {
    /// Builds the state from configuration and the injected collaborators.
    pub fn new(
        config: Config,
        pool: DbPool,
        call_control: Arc<dyn CallControl>,
        dialogue: Arc<dyn Dialogue>,
        audio_pipeline: Arc<dyn AudioPipeline>,
    ) -> Self {
        let urls = UrlTemplates::from_public_domain(&config.telephony.public_domain);
        let token_validator = Arc::new(TokenValidator::new(&config.telephony));
        let queues = Queues::in_memory(&config.queue);
        Self {
            pool,
            config: Arc::new(config),
            urls,
            call_control,
            dialogue,
            audio_pipeline,
            queues,
            token_validator,
        }
    }
}

/// Runs a closure against a pooled database connection on the blocking
/// thread pool.
pub(crate) async fn with_conn<F, T>(pool: &DbPool, f: F) -> Result<T, AppError>
where
    F: FnOnce(&rusqlite::Connection) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| AppError::Internal(format!("db pool error: {e}")))?;
        f(&conn).map_err(AppError::from)
    })
    .await
    .map_err(|e| AppError::Internal(format!("blocking task failed: {e}")))?
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/call",
            get(api_calls::call_list_get).post(api_calls::call_post),
        )
        .route("/call/{call_id_or_phone_number}", get(api_calls::call_get))
        .route(
            "/communication/callback/{session_id}/{secret}",
            post(api_callback::callback_post),
        )
        .route(
            "/communication/stream/{session_id}/{secret}",
            get(api_stream::stream_ws),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(state))
}
