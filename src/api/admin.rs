//! Admin API endpoints
//!
//! Operational maintenance of the follow graph.

use axum::{Router, extract::State, response::Json, routing::post};

use super::dto::ReconcileResponse;
use crate::AppState;
use crate::error::AppError;

/// Create admin router
///
/// Routes:
/// - POST /api/v1/admin/reconcile - Recompute follower counters
pub fn admin_router() -> Router<AppState> {
    Router::new().route("/reconcile", post(reconcile))
}

/// POST /api/v1/admin/reconcile
///
/// Recomputes every `followers_count` from the following lists and
/// reports how many rows were corrected.
async fn reconcile(State(state): State<AppState>) -> Result<Json<ReconcileResponse>, AppError> {
    let corrected = state.users.reconcile_follower_counts().await?;
    Ok(Json(ReconcileResponse { corrected }))
}
