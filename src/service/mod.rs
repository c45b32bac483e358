//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services validate input, then delegate persistence to the database.

mod lookup;
mod tweet;
mod user;

pub use lookup::UserLookup;
pub use tweet::{MAX_PAGE_SIZE, MAX_TWEET_CHARS, TweetService};
pub use user::UserService;

#[cfg(test)]
pub use lookup::MockUserLookup;

use crate::data::EntityId;
use crate::error::AppError;

/// Parse a caller-supplied id, rejecting anything that is not a well-formed key.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<EntityId, AppError> {
    EntityId::parse(raw).ok_or_else(|| AppError::Validation(format!("invalid {what} id: {raw}")))
}
