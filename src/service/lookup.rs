//! Narrow view of user data needed by the tweet store.

use async_trait::async_trait;

use crate::data::EntityId;
use crate::error::AppError;

/// Capability the tweet store depends on instead of reading the users table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserLookup: Send + Sync {
    /// Whether a user with this id exists
    async fn exists(&self, id: &EntityId) -> Result<bool, AppError>;

    /// Raw `following` entries of a user, or `None` if the user does not exist
    ///
    /// Entries are returned as stored and may include malformed ids.
    async fn following(&self, id: &EntityId) -> Result<Option<Vec<String>>, AppError>;
}
