//! Tweet and timeline endpoints

use axum::{extract::State, http::StatusCode, response::Json};

use super::dto::{TimelineParams, TimelineResponse, UserTweetsResponse};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;
use crate::data::{NewTweet, Tweet};
use crate::error::AppError;

/// POST /api/v1/tweets
pub async fn create_tweet(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewTweet>,
) -> Result<(StatusCode, Json<Tweet>), AppError> {
    let tweet = state.tweets.create(input).await?;
    Ok((StatusCode::CREATED, Json(tweet)))
}

/// GET /api/v1/users/:id/tweets
pub async fn user_tweets(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<UserTweetsResponse>, AppError> {
    let tweets = state.tweets.by_user(&id).await?;

    Ok(Json(UserTweetsResponse {
        user_id: id,
        count: tweets.len(),
        tweets,
    }))
}

/// GET /api/v1/users/:id/timeline
///
/// Out-of-range `page`/`limit` values are not clamped; the tweet store
/// rejects them with 400. Non-numeric values are rejected here.
pub async fn timeline(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(params): ApiQuery<TimelineParams>,
) -> Result<Json<TimelineResponse>, AppError> {
    let page = params.page();
    let limit = params.limit();
    let tweets = state.tweets.timeline(&id, page, limit).await?;

    Ok(Json(TimelineResponse {
        user_id: id,
        page,
        limit,
        count: tweets.len(),
        tweets,
    }))
}
