//! Microblog binary entry point

use microblog::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Initialize AppState
/// 4. Start background tasks (follower counter reconciliation)
/// 5. Start HTTP server until Ctrl-C
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    let default_filter = format!("microblog={},tower_http=debug", config.logging.level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting Microblog...");
    microblog::metrics::init_metrics();

    // 3. Initialize application state
    let state = AppState::new(config.clone()).await?;
    let app = microblog::build_router(state.clone());

    // 4. Start background tasks
    if config.reconcile.interval_seconds > 0 {
        spawn_reconcile_task(state.clone());
    }

    // 5. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.db.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

/// Spawn background follower counter reconciliation
fn spawn_reconcile_task(state: AppState) {
    tokio::spawn(async move {
        let interval_secs = state.config.reconcile.interval_seconds;
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));

        // Consume the immediate first tick to delay the first pass by one interval.
        interval.tick().await;

        loop {
            interval.tick().await;

            tracing::debug!("Running scheduled follower counter reconciliation...");
            if let Err(error) = state.users.reconcile_follower_counts().await {
                tracing::error!(%error, "Follower counter reconciliation failed");
            }
        }
    });

    tracing::info!("Reconcile task spawned");
}
