//! Data models
//!
//! Rust structs representing stored documents and the inputs that create them.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Parse a well-formed key.
    ///
    /// Accepts any casing and returns the canonical upper-case form, so
    /// lookups and `following` membership compare equal strings.
    pub fn parse(raw: &str) -> Option<Self> {
        ulid::Ulid::from_string(raw.trim())
            .ok()
            .map(|ulid| Self(ulid.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// User
// =============================================================================

/// A registered user
///
/// `following` holds the ids this user follows as opaque strings. They are
/// weak references: nothing guarantees the target still exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub following: Vec<String>,
    /// Denormalized count of users whose `following` contains this id
    pub followers_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for User {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let raw_following: String = row.try_get("following")?;
        let following = serde_json::from_str::<Vec<String>>(&raw_following).map_err(|e| {
            sqlx::Error::ColumnDecode {
                index: "following".to_string(),
                source: Box::new(e),
            }
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            following,
            followers_count: row.try_get("followers_count")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Input for creating a user
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
}

// =============================================================================
// Tweet
// =============================================================================

/// A short post, immutable once stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tweet {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a tweet
///
/// Any client-supplied timestamp is ignored; the store assigns `created_at`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTweet {
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub content: String,
}
