//! API response DTOs
//!
//! Envelopes wrapped around the stored models for list endpoints.

use serde::{Deserialize, Serialize};

use crate::data::{Tweet, User};

/// GET /api/v1/users/:id/following
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowingResponse {
    pub user_id: String,
    pub count: usize,
    pub following: Vec<User>,
}

/// GET /api/v1/users/:id/followers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowersResponse {
    pub user_id: String,
    pub count: usize,
    pub followers: Vec<User>,
}

/// Result of a follow or unfollow request
///
/// `changed` is false when the request was a no-op (already following,
/// or not following to begin with).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowResponse {
    pub message: String,
    pub changed: bool,
}

/// GET /api/v1/users/:id/tweets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTweetsResponse {
    pub user_id: String,
    pub count: usize,
    pub tweets: Vec<Tweet>,
}

/// GET /api/v1/users/:id/timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineResponse {
    pub user_id: String,
    pub page: i64,
    pub limit: i64,
    pub count: usize,
    pub tweets: Vec<Tweet>,
}

/// Query string of the timeline endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelineParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl TimelineParams {
    pub const DEFAULT_PAGE: i64 = 1;
    pub const DEFAULT_LIMIT: i64 = 10;

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(Self::DEFAULT_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }
}

/// POST /api/v1/admin/reconcile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub corrected: u64,
}
