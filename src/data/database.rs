//! SQLite database operations
//!
//! All database access goes through this module.
//! Every public call is bounded by the configured query deadline.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use super::models::*;
use crate::config::DatabaseConfig;
use crate::error::AppError;
use crate::metrics::{DB_QUERIES_TOTAL, DB_QUERY_DURATION_SECONDS, DB_TIMEOUTS_TOTAL};

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_CONNECTIONS: u32 = 8;

const USER_COLUMNS: &str =
    "id, username, email, following, followers_count, created_at, updated_at";
const TWEET_COLUMNS: &str = "id, author_id, content, created_at";

/// Database connection pool wrapper.
///
/// Created once at startup and shared behind an `Arc`. Stores borrow it
/// and never close it; the pool is closed when the process drops the last
/// handle or calls [`Database::close`].
pub struct Database {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl Database {
    /// Connect to SQLite database with default pool settings
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        Self::open(path, DEFAULT_MAX_CONNECTIONS, DEFAULT_QUERY_TIMEOUT).await
    }

    /// Connect using the `[database]` configuration section.
    pub async fn connect_with_config(config: &DatabaseConfig) -> Result<Self, AppError> {
        Self::open(
            &config.path,
            config.max_connections,
            config.query_timeout(),
        )
        .await
    }

    async fn open(
        path: &Path,
        max_connections: u32,
        query_timeout: Duration,
    ) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        // Create connection string
        let connection_string = format!("sqlite:{}?mode=rwc", path.display());

        // Create connection pool
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&connection_string)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!(
            path = %path.display(),
            max_connections,
            query_timeout_ms = query_timeout.as_millis() as u64,
            "Database connected and migrated successfully"
        );

        Ok(Self {
            pool,
            query_timeout,
        })
    }

    /// Override the per-call deadline.
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Close every pooled connection. Used on shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run one storage operation under the query deadline.
    ///
    /// Expiry drops the inner future, which cancels the in-flight statement
    /// (open transactions roll back on drop) and yields `StorageTimeout`.
    pub(crate) async fn bounded<T, F>(
        &self,
        operation: &'static str,
        table: &'static str,
        work: F,
    ) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let timer = DB_QUERY_DURATION_SECONDS
            .with_label_values(&[operation, table])
            .start_timer();
        DB_QUERIES_TOTAL.with_label_values(&[operation, table]).inc();

        let outcome = tokio::time::timeout(self.query_timeout, work).await;
        timer.observe_duration();

        match outcome {
            Ok(result) => result,
            Err(_) => {
                DB_TIMEOUTS_TOTAL.with_label_values(&[operation]).inc();
                tracing::warn!(
                    operation,
                    table,
                    timeout_ms = self.query_timeout.as_millis() as u64,
                    "Storage call exceeded its deadline"
                );
                Err(AppError::StorageTimeout(operation))
            }
        }
    }

    /// Round-trip a trivial statement to check the store is reachable.
    pub async fn ping(&self) -> Result<(), AppError> {
        self.bounded("ping", "none", async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok::<_, AppError>(())
        })
        .await
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user
    ///
    /// # Errors
    /// `Conflict` when username or email is already taken
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        self.bounded("insert_user", "users", async {
            let following = serde_json::to_string(&user.following)
                .map_err(|e| AppError::Internal(e.into()))?;

            sqlx::query(
                r#"
                INSERT INTO users (
                    id, username, email, following, followers_count, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(following)
            .bind(user.followers_count)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await
            .map_err(AppError::from_write)?;

            Ok::<_, AppError>(())
        })
        .await
    }

    /// Get a user by id
    pub async fn get_user(&self, id: &EntityId) -> Result<Option<User>, AppError> {
        self.bounded("get_user", "users", async {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
            let user = sqlx::query_as::<_, User>(&sql)
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;
            Ok::<_, AppError>(user)
        })
        .await
    }

    /// Check whether a user row exists
    pub async fn user_exists(&self, id: &EntityId) -> Result<bool, AppError> {
        self.bounded("user_exists", "users", async {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)",
            )
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await?;
            Ok::<_, AppError>(exists)
        })
        .await
    }

    /// Read only the `following` set of a user
    ///
    /// # Returns
    /// `None` when the user does not exist
    pub async fn get_following_ids(&self, id: &EntityId) -> Result<Option<Vec<String>>, AppError> {
        self.bounded("get_following_ids", "users", async {
            let raw = sqlx::query_scalar::<_, String>("SELECT following FROM users WHERE id = ?")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

            let following = raw
                .map(|raw| serde_json::from_str::<Vec<String>>(&raw))
                .transpose()
                .map_err(|e| AppError::Internal(e.into()))?;
            Ok::<_, AppError>(following)
        })
        .await
    }

    /// Batch-fetch users by id
    ///
    /// Ids that do not resolve are simply absent from the result. The ids
    /// travel as one bound JSON array, so the list length is not limited by
    /// SQLite's host-parameter cap.
    pub async fn get_users_by_ids(&self, ids: &[EntityId]) -> Result<Vec<User>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.bounded("get_users_by_ids", "users", async {
            let ids = id_array(ids)?;
            let sql = format!(
                r#"
                SELECT {USER_COLUMNS} FROM users
                WHERE id IN (SELECT value FROM json_each(?))
                ORDER BY created_at ASC, id ASC
                "#
            );
            let users = sqlx::query_as::<_, User>(&sql)
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
            Ok::<_, AppError>(users)
        })
        .await
    }

    /// Get every user whose `following` set contains `id`
    ///
    /// This is a membership scan over the whole table; no reverse index exists.
    pub async fn get_followers(&self, id: &EntityId) -> Result<Vec<User>, AppError> {
        self.bounded("get_followers", "users", async {
            let sql = format!(
                r#"
                SELECT {USER_COLUMNS} FROM users
                WHERE EXISTS (SELECT 1 FROM json_each(users.following) WHERE value = ?)
                ORDER BY created_at ASC, id ASC
                "#
            );
            let users = sqlx::query_as::<_, User>(&sql)
                .bind(id.as_str())
                .fetch_all(&self.pool)
                .await?;
            Ok::<_, AppError>(users)
        })
        .await
    }

    /// Add `target` to `actor`'s following set and bump the target's counter.
    ///
    /// Both writes share one transaction. The counter only moves when the
    /// set actually grew, so repeated or concurrent follows count once.
    /// The first statement is a write, which takes the SQLite write lock up
    /// front and lets concurrent callers wait on the busy timeout.
    ///
    /// # Returns
    /// `true` if the edge was created, `false` if it already existed
    ///
    /// # Errors
    /// `NotFound` if either user is missing (nothing is written)
    pub async fn add_following(
        &self,
        actor: &EntityId,
        target: &EntityId,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.bounded("add_following", "users", async {
            let mut tx = self.pool.begin().await?;

            let added = sqlx::query(
                r#"
                UPDATE users
                SET following = json_insert(following, '$[#]', ?), updated_at = ?
                WHERE id = ?
                  AND NOT EXISTS (SELECT 1 FROM json_each(users.following) WHERE value = ?)
                "#,
            )
            .bind(target.as_str())
            .bind(now)
            .bind(actor.as_str())
            .bind(target.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected()
                > 0;

            if !added {
                let actor_exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)",
                )
                .bind(actor.as_str())
                .fetch_one(&mut *tx)
                .await?;
                if !actor_exists {
                    return Err(AppError::NotFound);
                }
                tx.commit().await?;
                return Ok(false);
            }

            let bumped = sqlx::query(
                "UPDATE users SET followers_count = followers_count + 1 WHERE id = ?",
            )
            .bind(target.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if bumped == 0 {
                // Dropping the transaction rolls back the set update.
                return Err(AppError::NotFound);
            }

            tx.commit().await?;
            Ok::<_, AppError>(true)
        })
        .await
    }

    /// Remove `target` from `actor`'s following set and drop the counter.
    ///
    /// The counter only moves when the set shrank and never goes below zero.
    ///
    /// # Returns
    /// `true` if an edge was removed, `false` if there was nothing to remove
    pub async fn remove_following(
        &self,
        actor: &EntityId,
        target: &EntityId,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.bounded("remove_following", "users", async {
            let mut tx = self.pool.begin().await?;

            let removed = sqlx::query(
                r#"
                UPDATE users
                SET following = (
                        SELECT COALESCE(json_group_array(value), '[]')
                        FROM json_each(users.following)
                        WHERE value <> ?
                    ),
                    updated_at = ?
                WHERE id = ?
                  AND EXISTS (SELECT 1 FROM json_each(users.following) WHERE value = ?)
                "#,
            )
            .bind(target.as_str())
            .bind(now)
            .bind(actor.as_str())
            .bind(target.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected()
                > 0;

            if removed {
                sqlx::query(
                    "UPDATE users SET followers_count = MAX(followers_count - 1, 0) WHERE id = ?",
                )
                .bind(target.as_str())
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok::<_, AppError>(removed)
        })
        .await
    }

    /// Recompute every `followers_count` from the follow graph.
    ///
    /// # Returns
    /// Number of users whose stored counter was wrong and has been fixed
    pub async fn reconcile_follower_counts(&self) -> Result<u64, AppError> {
        self.bounded("reconcile_follower_counts", "users", async {
            let corrected = sqlx::query(
                r#"
                UPDATE users
                SET followers_count = (
                    SELECT COUNT(*) FROM users AS f
                    WHERE EXISTS (SELECT 1 FROM json_each(f.following) WHERE value = users.id)
                )
                WHERE followers_count <> (
                    SELECT COUNT(*) FROM users AS f
                    WHERE EXISTS (SELECT 1 FROM json_each(f.following) WHERE value = users.id)
                )
                "#,
            )
            .execute(&self.pool)
            .await?
            .rows_affected();
            Ok::<_, AppError>(corrected)
        })
        .await
    }

    /// Overwrite a stored counter. Only used to simulate drift in tests.
    #[cfg(test)]
    pub(crate) async fn set_followers_count_for_test(
        &self,
        id: &EntityId,
        count: i64,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET followers_count = ? WHERE id = ?")
            .bind(count)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Append a raw string to a user's following set, bypassing validation.
    #[cfg(test)]
    pub(crate) async fn push_raw_following_for_test(
        &self,
        id: &EntityId,
        raw: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET following = json_insert(following, '$[#]', ?) WHERE id = ?")
            .bind(raw)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replace a user's following set wholesale, bypassing validation.
    #[cfg(test)]
    pub(crate) async fn set_following_for_test(
        &self,
        id: &EntityId,
        following: &[String],
    ) -> Result<(), AppError> {
        let following = serde_json::to_string(following).map_err(|e| AppError::Internal(e.into()))?;
        sqlx::query("UPDATE users SET following = ? WHERE id = ?")
            .bind(following)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Tweets
    // =========================================================================

    /// Insert a tweet and return the timestamp it was stored with.
    ///
    /// The stored `created_at` is `max(now, newest existing created_at)` so
    /// timestamps never decrease in insertion order even if the clock steps
    /// back.
    pub async fn insert_tweet(
        &self,
        id: &EntityId,
        author_id: &EntityId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, AppError> {
        self.bounded("insert_tweet", "tweets", async {
            let created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
                r#"
                INSERT INTO tweets (id, author_id, content, created_at)
                VALUES (?, ?, ?, MAX(?, COALESCE((SELECT MAX(created_at) FROM tweets), '')))
                RETURNING created_at
                "#,
            )
            .bind(id.as_str())
            .bind(author_id.as_str())
            .bind(content)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from_write)?;
            Ok::<_, AppError>(created_at)
        })
        .await
    }

    /// Get all tweets by one author, newest first
    pub async fn get_tweets_by_author(&self, author_id: &EntityId) -> Result<Vec<Tweet>, AppError> {
        self.bounded("get_tweets_by_author", "tweets", async {
            let sql = format!(
                r#"
                SELECT {TWEET_COLUMNS} FROM tweets
                WHERE author_id = ?
                ORDER BY created_at DESC, seq DESC
                "#
            );
            let tweets = sqlx::query_as::<_, Tweet>(&sql)
                .bind(author_id.as_str())
                .fetch_all(&self.pool)
                .await?;
            Ok::<_, AppError>(tweets)
        })
        .await
    }

    /// Get one page of tweets written by any of `author_ids`, newest first
    ///
    /// # Arguments
    /// * `limit` - Maximum number of results
    /// * `offset` - Number of records to skip
    pub async fn get_tweets_by_authors(
        &self,
        author_ids: &[EntityId],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Tweet>, AppError> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.bounded("get_tweets_by_authors", "tweets", async {
            let authors = id_array(author_ids)?;
            let sql = format!(
                r#"
                SELECT {TWEET_COLUMNS} FROM tweets
                WHERE author_id IN (SELECT value FROM json_each(?))
                ORDER BY created_at DESC, seq DESC
                LIMIT ? OFFSET ?
                "#
            );
            let tweets = sqlx::query_as::<_, Tweet>(&sql)
                .bind(authors)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
            Ok::<_, AppError>(tweets)
        })
        .await
    }
}

/// Encode ids as a JSON array for `json_each(?)`.
fn id_array(ids: &[EntityId]) -> Result<String, AppError> {
    serde_json::to_string(ids).map_err(|e| AppError::Internal(e.into()))
}
