//! API layer
//!
//! HTTP handlers for:
//! - Users and the follow graph
//! - Tweets and timelines
//! - Admin API
//! - Metrics (Prometheus)

mod admin;
mod dto;
mod extract;
pub mod metrics;
mod tweets;
mod users;

pub use dto::*;

pub use admin::admin_router;
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use metrics::{metrics_router, track_requests};

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::AppState;

/// Create the JSON API router, mounted under `/api`
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Users
        .route("/v1/users", post(users::create_user))
        .route("/v1/users/:id", get(users::get_user))
        // Follow graph
        .route(
            "/v1/users/:id/follow/:target_id",
            post(users::follow_user),
        )
        .route(
            "/v1/users/:id/unfollow/:target_id",
            post(users::unfollow_user),
        )
        .route("/v1/users/:id/following", get(users::get_following))
        .route("/v1/users/:id/followers", get(users::get_followers))
        // Tweets
        .route("/v1/tweets", post(tweets::create_tweet))
        .route("/v1/users/:id/tweets", get(tweets::user_tweets))
        .route("/v1/users/:id/timeline", get(tweets::timeline))
        // Admin
        .nest("/v1/admin", admin_router())
        .route_layer(middleware::from_fn(track_requests))
}
