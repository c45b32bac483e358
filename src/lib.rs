//! Microblog - a small Twitter-like backend
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Users, follow graph, tweets, timeline                    │
//! │  - Health, metrics, admin endpoints                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Validation and business rules                            │
//! │  - Fan-out-on-read timeline                                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx), per-call deadlines                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: User store and tweet store
//! - `data`: Database layer and models
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus collectors

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse};

/// Application state shared across all handlers
///
/// Cloned for each request; everything inside is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// User store
    pub users: Arc<service::UserService>,

    /// Tweet store
    pub tweets: Arc<service::TweetService>,
}

impl AppState {
    /// Initialize application state
    ///
    /// Opens the database (running migrations) and wires the services.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrated
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect_with_config(&config.database).await?;
        tracing::info!(
            path = %config.database.path.display(),
            query_timeout_ms = config.database.query_timeout_ms,
            "Database connected"
        );

        let state = Self::with_database(config, Arc::new(db));
        tracing::info!("Application state initialized successfully");
        Ok(state)
    }

    /// Wire services on top of an already opened database
    pub fn with_database(config: config::AppConfig, db: Arc<data::Database>) -> Self {
        let users = Arc::new(service::UserService::new(db.clone()));
        let tweets = Arc::new(service::TweetService::new(db.clone(), users.clone()));

        Self {
            config: Arc::new(config),
            db,
            users,
            tweets,
        }
    }
}

/// Largest accepted request body
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, routing::get};
    use tower_http::{
        compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
        trace::TraceLayer,
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check))
        .nest("/api", api::api_router())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn db_health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            axum::Json(serde_json::json!({ "status": "ok" })),
        ),
        Err(error) => {
            tracing::error!(%error, "Database health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(serde_json::json!({ "status": "error", "error": error.to_string() })),
            )
        }
    }
}
