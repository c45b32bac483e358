//! User service
//!
//! Account creation, lookups and the follow graph.

use std::sync::Arc;

use async_trait::async_trait;

use super::lookup::UserLookup;
use super::parse_id;
use crate::data::{Database, EntityId, NewUser, User};
use crate::error::AppError;
use crate::metrics::{
    FOLLOW_GRAPH_CHANGES_TOTAL, FOLLOWER_COUNTS_REPAIRED_TOTAL, USERS_CREATED_TOTAL,
};

fn outcome_label(changed: bool) -> &'static str {
    if changed { "applied" } else { "unchanged" }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        None => false,
    }
}

/// User service
pub struct UserService {
    db: Arc<Database>,
}

impl UserService {
    /// Create new user service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a user
    ///
    /// Starts with an empty following set and a zero follower count.
    /// Uniqueness of username and email is enforced by the database.
    ///
    /// # Errors
    /// `Validation` for blank username or malformed email,
    /// `Conflict` if either is already taken
    pub async fn create(&self, input: NewUser) -> Result<User, AppError> {
        let username = input.username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("username cannot be empty".to_string()));
        }

        let email = input.email.trim();
        if !is_plausible_email(email) {
            return Err(AppError::Validation("email is not valid".to_string()));
        }

        let now = chrono::Utc::now();
        let user = User {
            id: EntityId::new().0,
            username: username.to_string(),
            email: email.to_string(),
            following: Vec::new(),
            followers_count: 0,
            created_at: now,
            updated_at: now,
        };

        self.db.insert_user(&user).await?;
        USERS_CREATED_TOTAL.inc();

        tracing::info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// Point lookup
    ///
    /// # Errors
    /// `NotFound` if the id is malformed or does not resolve
    pub async fn get_by_id(&self, id: &str) -> Result<User, AppError> {
        let id = EntityId::parse(id).ok_or(AppError::NotFound)?;
        self.db.get_user(&id).await?.ok_or(AppError::NotFound)
    }

    /// Make `actor_id` follow `target_id`
    ///
    /// Following someone already followed succeeds without touching the
    /// follower count.
    ///
    /// # Returns
    /// `true` if a new edge was created
    ///
    /// # Errors
    /// `Validation` for malformed ids or self-follow,
    /// `NotFound` if the target (or actor) does not exist
    pub async fn follow(&self, actor_id: &str, target_id: &str) -> Result<bool, AppError> {
        let actor = parse_id(actor_id, "user")?;
        let target = parse_id(target_id, "target")?;

        if actor == target {
            return Err(AppError::Validation("cannot follow yourself".to_string()));
        }

        if !self.db.user_exists(&target).await? {
            return Err(AppError::NotFound);
        }

        let created = self
            .db
            .add_following(&actor, &target, chrono::Utc::now())
            .await?;

        FOLLOW_GRAPH_CHANGES_TOTAL
            .with_label_values(&["follow", outcome_label(created)])
            .inc();
        tracing::info!(actor = %actor, target = %target, created, "Follow processed");

        Ok(created)
    }

    /// Make `actor_id` stop following `target_id`
    ///
    /// Unfollowing someone not followed is a successful no-op.
    ///
    /// # Returns
    /// `true` if an existing edge was removed
    ///
    /// # Errors
    /// `Validation` for malformed ids
    pub async fn unfollow(&self, actor_id: &str, target_id: &str) -> Result<bool, AppError> {
        let actor = parse_id(actor_id, "user")?;
        let target = parse_id(target_id, "target")?;

        let removed = self
            .db
            .remove_following(&actor, &target, chrono::Utc::now())
            .await?;

        FOLLOW_GRAPH_CHANGES_TOTAL
            .with_label_values(&["unfollow", outcome_label(removed)])
            .inc();
        tracing::info!(actor = %actor, target = %target, removed, "Unfollow processed");

        Ok(removed)
    }

    /// Users that `user_id` follows
    ///
    /// Entries of the following set that are not well-formed ids, or that no
    /// longer resolve, are skipped.
    pub async fn following(&self, user_id: &str) -> Result<Vec<User>, AppError> {
        let id = parse_id(user_id, "user")?;
        let raw_ids = self
            .db
            .get_following_ids(&id)
            .await?
            .ok_or(AppError::NotFound)?;

        let ids: Vec<EntityId> = raw_ids
            .iter()
            .filter_map(|raw| EntityId::parse(raw))
            .collect();
        if ids.len() < raw_ids.len() {
            tracing::debug!(
                user_id = %id,
                skipped = raw_ids.len() - ids.len(),
                "Skipped malformed following entries"
            );
        }

        self.db.get_users_by_ids(&ids).await
    }

    /// Users whose following set contains `user_id`
    ///
    /// Computed by a membership query; there is no stored reverse index.
    pub async fn followers(&self, user_id: &str) -> Result<Vec<User>, AppError> {
        let id = parse_id(user_id, "user")?;
        if !self.db.user_exists(&id).await? {
            return Err(AppError::NotFound);
        }
        self.db.get_followers(&id).await
    }

    /// Recompute every follower counter from the follow graph.
    ///
    /// # Returns
    /// Number of counters that were wrong and have been corrected
    pub async fn reconcile_follower_counts(&self) -> Result<u64, AppError> {
        let corrected = self.db.reconcile_follower_counts().await?;
        FOLLOWER_COUNTS_REPAIRED_TOTAL.inc_by(corrected);

        if corrected > 0 {
            tracing::warn!(corrected, "Repaired drifted follower counts");
        } else {
            tracing::debug!("Follower counts consistent");
        }
        Ok(corrected)
    }
}

#[async_trait]
impl UserLookup for UserService {
    async fn exists(&self, id: &EntityId) -> Result<bool, AppError> {
        self.db.user_exists(id).await
    }

    async fn following(&self, id: &EntityId) -> Result<Option<Vec<String>>, AppError> {
        self.db.get_following_ids(id).await
    }
}
