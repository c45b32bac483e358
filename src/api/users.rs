//! User and follow-graph endpoints

use axum::{extract::State, http::StatusCode, response::Json};

use super::dto::{FollowResponse, FollowersResponse, FollowingResponse};
use super::extract::{ApiJson, ApiPath};
use crate::AppState;
use crate::data::{NewUser, User};
use crate::error::AppError;

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.users.create(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<User>, AppError> {
    let user = state.users.get_by_id(&id).await?;
    Ok(Json(user))
}

/// POST /api/v1/users/:id/follow/:target_id
pub async fn follow_user(
    State(state): State<AppState>,
    ApiPath((id, target_id)): ApiPath<(String, String)>,
) -> Result<Json<FollowResponse>, AppError> {
    let changed = state.users.follow(&id, &target_id).await?;
    let message = if changed {
        "Successfully followed user"
    } else {
        "Already following user"
    };

    Ok(Json(FollowResponse {
        message: message.to_string(),
        changed,
    }))
}

/// POST /api/v1/users/:id/unfollow/:target_id
pub async fn unfollow_user(
    State(state): State<AppState>,
    ApiPath((id, target_id)): ApiPath<(String, String)>,
) -> Result<Json<FollowResponse>, AppError> {
    let changed = state.users.unfollow(&id, &target_id).await?;
    let message = if changed {
        "Successfully unfollowed user"
    } else {
        "Not following user"
    };

    Ok(Json(FollowResponse {
        message: message.to_string(),
        changed,
    }))
}

/// GET /api/v1/users/:id/following
pub async fn get_following(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<FollowingResponse>, AppError> {
    let following = state.users.following(&id).await?;

    Ok(Json(FollowingResponse {
        user_id: id,
        count: following.len(),
        following,
    }))
}

/// GET /api/v1/users/:id/followers
pub async fn get_followers(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<FollowersResponse>, AppError> {
    let followers = state.users.followers(&id).await?;

    Ok(Json(FollowersResponse {
        user_id: id,
        count: followers.len(),
        followers,
    }))
}
