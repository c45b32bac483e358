//! Tweet service
//!
//! Tweet creation and the two read paths: by author and the home timeline.
//! The timeline is fanned out on read: every request queries the tweets of
//! the user and everyone they follow, nothing is precomputed.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::lookup::UserLookup;
use super::parse_id;
use crate::data::{Database, EntityId, NewTweet, Tweet};
use crate::error::AppError;
use crate::metrics::TWEETS_CREATED_TOTAL;

/// Maximum tweet length, in characters
pub const MAX_TWEET_CHARS: usize = 280;

/// Largest accepted timeline page
pub const MAX_PAGE_SIZE: i64 = 100;

/// Tweet service
pub struct TweetService {
    db: Arc<Database>,
    users: Arc<dyn UserLookup>,
}

impl TweetService {
    /// Create new tweet service
    pub fn new(db: Arc<Database>, users: Arc<dyn UserLookup>) -> Self {
        Self { db, users }
    }

    /// Publish a tweet
    ///
    /// The creation timestamp is always assigned here.
    ///
    /// # Errors
    /// `Validation` for a missing/malformed author id or bad content,
    /// `NotFound` if the author does not exist
    pub async fn create(&self, input: NewTweet) -> Result<Tweet, AppError> {
        if input.author_id.trim().is_empty() {
            return Err(AppError::Validation("author id is required".to_string()));
        }
        let author = parse_id(&input.author_id, "author")?;

        if input.content.is_empty() {
            return Err(AppError::Validation(
                "tweet content cannot be empty".to_string(),
            ));
        }
        if input.content.chars().count() > MAX_TWEET_CHARS {
            return Err(AppError::Validation(format!(
                "tweet content cannot exceed {MAX_TWEET_CHARS} characters"
            )));
        }

        if !self.users.exists(&author).await? {
            return Err(AppError::NotFound);
        }

        let id = EntityId::new();
        let created_at = self
            .db
            .insert_tweet(&id, &author, &input.content, chrono::Utc::now())
            .await?;
        TWEETS_CREATED_TOTAL.inc();

        tracing::info!(tweet_id = %id, author_id = %author, "Tweet created");

        Ok(Tweet {
            id: id.0,
            author_id: author.0,
            content: input.content,
            created_at,
        })
    }

    /// All tweets by one author, newest first
    ///
    /// An unknown author simply has no tweets.
    pub async fn by_user(&self, user_id: &str) -> Result<Vec<Tweet>, AppError> {
        let author = parse_id(user_id, "user")?;
        self.db.get_tweets_by_author(&author).await
    }

    /// One page of the home timeline of `user_id`
    ///
    /// Merges the user's own tweets with those of everyone they follow,
    /// newest first. `page` is 1-based. No total is computed; a page shorter
    /// than `page_size` is the last one.
    ///
    /// # Errors
    /// `Validation` for bad paging parameters or a malformed id.
    /// An unknown user yields an empty page rather than an error.
    pub async fn timeline(
        &self,
        user_id: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<Tweet>, AppError> {
        if page < 1 {
            return Err(AppError::Validation(
                "invalid page number: must be at least 1".to_string(),
            ));
        }
        if page_size < 1 {
            return Err(AppError::Validation(
                "invalid page size: must be at least 1".to_string(),
            ));
        }
        if page_size > MAX_PAGE_SIZE {
            return Err(AppError::Validation(format!(
                "page size exceeded: maximum {MAX_PAGE_SIZE}"
            )));
        }
        let offset = (page - 1)
            .checked_mul(page_size)
            .ok_or_else(|| AppError::Validation("invalid page number: too large".to_string()))?;

        let user = parse_id(user_id, "user")?;
        let Some(following) = self.users.following(&user).await? else {
            return Ok(Vec::new());
        };

        let authors = fan_out_ids(&user, &following);
        self.db
            .get_tweets_by_authors(&authors, page_size, offset)
            .await
    }
}

/// The user plus every well-formed id they follow, deduplicated.
fn fan_out_ids(user: &EntityId, following: &[String]) -> Vec<EntityId> {
    let mut ids = BTreeSet::new();
    ids.insert(user.clone());

    for raw in following {
        match EntityId::parse(raw) {
            Some(id) => {
                ids.insert(id);
            }
            None => tracing::debug!(user_id = %user, entry = %raw, "Skipping malformed following entry"),
        }
    }

    ids.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NewUser;
    use crate::service::{MockUserLookup, UserService};
    use tempfile::TempDir;

    struct Fixture {
        users: Arc<UserService>,
        tweets: TweetService,
        db: Arc<Database>,
        _temp_dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("service-tweet.db");
        let db = Arc::new(Database::connect(&db_path).await.unwrap());
        let users = Arc::new(UserService::new(db.clone()));
        let tweets = TweetService::new(db.clone(), users.clone());
        Fixture {
            users,
            tweets,
            db,
            _temp_dir: temp_dir,
        }
    }

    impl Fixture {
        async fn user(&self, username: &str) -> String {
            self.users
                .create(NewUser {
                    username: username.to_string(),
                    email: format!("{username}@example.com"),
                })
                .await
                .unwrap()
                .id
        }

        async fn post(&self, author_id: &str, content: &str) -> Tweet {
            self.tweets
                .create(NewTweet {
                    author_id: author_id.to_string(),
                    content: content.to_string(),
                })
                .await
                .unwrap()
        }
    }

    fn contents(tweets: &[Tweet]) -> Vec<&str> {
        tweets.iter().map(|t| t.content.as_str()).collect()
    }

    #[tokio::test]
    async fn create_assigns_id_and_timestamp() {
        let fx = fixture().await;
        let alice = fx.user("alice").await;

        let before = chrono::Utc::now();
        let tweet = fx.post(&alice, "Test tweet content").await;

        assert!(EntityId::parse(&tweet.id).is_some());
        assert_eq!(tweet.author_id, alice);
        assert!(tweet.created_at >= before);
    }

    #[tokio::test]
    async fn content_length_boundary() {
        let fx = fixture().await;
        let alice = fx.user("alice").await;

        let exact = "a".repeat(MAX_TWEET_CHARS);
        let tweet = fx.post(&alice, &exact).await;
        assert_eq!(tweet.content.chars().count(), MAX_TWEET_CHARS);

        let too_long = fx
            .tweets
            .create(NewTweet {
                author_id: alice.clone(),
                content: "a".repeat(MAX_TWEET_CHARS + 1),
            })
            .await;
        assert!(matches!(too_long, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn content_limit_counts_characters_not_bytes() {
        let fx = fixture().await;
        let alice = fx.user("alice").await;

        let accented = "é".repeat(MAX_TWEET_CHARS);
        assert!(accented.len() > MAX_TWEET_CHARS);
        let tweet = fx.post(&alice, &accented).await;
        assert_eq!(tweet.content, accented);
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let fx = fixture().await;
        let alice = fx.user("alice").await;

        for (author_id, content) in [
            (alice.as_str(), ""),
            ("", "hello"),
            ("not-an-id", "hello"),
        ] {
            let result = fx
                .tweets
                .create(NewTweet {
                    author_id: author_id.to_string(),
                    content: content.to_string(),
                })
                .await;
            assert!(
                matches!(result, Err(AppError::Validation(_))),
                "expected validation error for author={author_id:?} content={content:?}"
            );
        }
    }

    #[tokio::test]
    async fn whitespace_content_is_kept_verbatim() {
        let fx = fixture().await;
        let alice = fx.user("alice").await;

        let single = fx.post(&alice, " ").await;
        assert_eq!(single.content, " ");

        let padded = fx.post(&alice, "  spaced out  ").await;
        assert_eq!(padded.content, "  spaced out  ");
    }

    #[tokio::test]
    async fn create_for_unknown_author_is_not_found() {
        let fx = fixture().await;

        let result = fx
            .tweets
            .create(NewTweet {
                author_id: EntityId::new().0,
                content: "hello".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn author_check_goes_through_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            Database::connect(&temp_dir.path().join("mock.db"))
                .await
                .unwrap(),
        );

        let mut lookup = MockUserLookup::new();
        lookup.expect_exists().times(1).returning(|_| Ok(false));
        let tweets = TweetService::new(db.clone(), Arc::new(lookup));

        let result = tweets
            .create(NewTweet {
                author_id: EntityId::new().0,
                content: "hello".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn timeline_uses_lookup_following_set() {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            Database::connect(&temp_dir.path().join("fake.db"))
                .await
                .unwrap(),
        );

        // No user rows at all: the lookup alone decides who is followed.
        let reader = EntityId::new();
        let followed = EntityId::new();
        let stranger = EntityId::new();
        let now = chrono::Utc::now();
        db.insert_tweet(&EntityId::new(), &followed, "followed", now)
            .await
            .unwrap();
        db.insert_tweet(&EntityId::new(), &stranger, "stranger", now)
            .await
            .unwrap();

        let followed_raw = followed.0.clone();
        let mut lookup = MockUserLookup::new();
        lookup
            .expect_following()
            .returning(move |_| Ok(Some(vec![followed_raw.clone(), "junk".to_string()])));
        let tweets = TweetService::new(db, Arc::new(lookup));

        let page = tweets.timeline(&reader.0, 1, 10).await.unwrap();
        assert_eq!(contents(&page), vec!["followed"]);
    }

    #[tokio::test]
    async fn by_user_orders_newest_first() {
        let fx = fixture().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;

        fx.post(&alice, "first").await;
        fx.post(&bob, "other").await;
        fx.post(&alice, "second").await;
        fx.post(&alice, "third").await;

        let tweets = fx.tweets.by_user(&alice).await.unwrap();
        assert_eq!(contents(&tweets), vec!["third", "second", "first"]);
        assert!(tweets.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn by_user_empty_and_malformed() {
        let fx = fixture().await;
        let alice = fx.user("alice").await;

        assert!(fx.tweets.by_user(&alice).await.unwrap().is_empty());
        assert!(fx.tweets.by_user(&EntityId::new().0).await.unwrap().is_empty());
        assert!(matches!(
            fx.tweets.by_user("xyz").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn timeline_merges_followed_authors() {
        let fx = fixture().await;
        let u1 = fx.user("u1").await;
        let u2 = fx.user("u2").await;
        let u3 = fx.user("u3").await;

        fx.users.follow(&u1, &u2).await.unwrap();
        fx.users.follow(&u1, &u3).await.unwrap();
        fx.post(&u2, "a").await;
        fx.post(&u3, "b").await;

        let page = fx.tweets.timeline(&u1, 1, 10).await.unwrap();
        assert_eq!(contents(&page), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn timeline_includes_own_tweets_and_excludes_others() {
        let fx = fixture().await;
        let u1 = fx.user("u1").await;
        let u2 = fx.user("u2").await;
        let u3 = fx.user("u3").await;

        fx.users.follow(&u1, &u2).await.unwrap();
        fx.post(&u1, "mine").await;
        fx.post(&u2, "followed").await;
        fx.post(&u3, "not followed").await;

        let page = fx.tweets.timeline(&u1, 1, 10).await.unwrap();
        assert_eq!(contents(&page), vec!["followed", "mine"]);

        // u2 does not follow u1
        let page = fx.tweets.timeline(&u2, 1, 10).await.unwrap();
        assert_eq!(contents(&page), vec!["followed"]);
    }

    #[tokio::test]
    async fn timeline_pages_are_disjoint_and_consecutive() {
        let fx = fixture().await;
        let u1 = fx.user("u1").await;
        let u2 = fx.user("u2").await;
        fx.users.follow(&u1, &u2).await.unwrap();

        let mut posted = Vec::new();
        for i in 0..7 {
            let author = if i % 2 == 0 { &u1 } else { &u2 };
            posted.push(fx.post(author, &format!("t{i}")).await.id);
        }
        posted.reverse();

        let mut seen = Vec::new();
        for page in 1..=3 {
            let tweets = fx.tweets.timeline(&u1, page, 3).await.unwrap();
            seen.extend(tweets.into_iter().map(|t| t.id));
        }
        assert_eq!(seen, posted);

        let past_end = fx.tweets.timeline(&u1, 4, 3).await.unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn timeline_pagination_bounds() {
        let fx = fixture().await;
        let u1 = fx.user("u1").await;

        for (page, size) in [(0, 10), (-1, 10), (1, 0), (1, MAX_PAGE_SIZE + 1)] {
            assert!(
                matches!(
                    fx.tweets.timeline(&u1, page, size).await,
                    Err(AppError::Validation(_))
                ),
                "page={page} size={size} should be rejected"
            );
        }

        assert!(fx.tweets.timeline(&u1, 1, MAX_PAGE_SIZE).await.is_ok());
        assert!(fx.tweets.timeline(&u1, i64::MAX, MAX_PAGE_SIZE).await.is_err());
    }

    #[tokio::test]
    async fn timeline_for_unknown_user_is_empty() {
        let fx = fixture().await;
        let u1 = fx.user("u1").await;
        fx.post(&u1, "hello").await;

        let page = fx.tweets.timeline(&EntityId::new().0, 1, 10).await.unwrap();
        assert!(page.is_empty());

        assert!(matches!(
            fx.tweets.timeline("bogus", 1, 10).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn timeline_tolerates_corrupt_following_entries() {
        let fx = fixture().await;
        let u1 = fx.user("u1").await;
        let u2 = fx.user("u2").await;
        fx.users.follow(&u1, &u2).await.unwrap();
        fx.post(&u2, "still visible").await;

        let u1_id = EntityId::parse(&u1).unwrap();
        fx.db
            .push_raw_following_for_test(&u1_id, "%%%")
            .await
            .unwrap();

        let page = fx.tweets.timeline(&u1, 1, 10).await.unwrap();
        assert_eq!(contents(&page), vec!["still visible"]);
    }

    #[tokio::test]
    async fn timeline_handles_very_large_following_sets() {
        let fx = fixture().await;
        let u1 = fx.user("u1").await;
        let u2 = fx.user("u2").await;
        fx.post(&u2, "found among many").await;
        fx.post(&u1, "own").await;

        let mut following: Vec<String> = (0..40_000).map(|_| EntityId::new().0).collect();
        following.push(u2.clone());
        fx.db
            .set_following_for_test(&EntityId::parse(&u1).unwrap(), &following)
            .await
            .unwrap();

        let page = fx.tweets.timeline(&u1, 1, 10).await.unwrap();
        assert_eq!(contents(&page), vec!["own", "found among many"]);
    }

    #[tokio::test]
    async fn unfollowed_authors_leave_the_timeline() {
        let fx = fixture().await;
        let u1 = fx.user("u1").await;
        let u2 = fx.user("u2").await;
        fx.users.follow(&u1, &u2).await.unwrap();
        fx.post(&u2, "gone soon").await;

        assert_eq!(fx.tweets.timeline(&u1, 1, 10).await.unwrap().len(), 1);
        fx.users.unfollow(&u1, &u2).await.unwrap();
        assert!(fx.tweets.timeline(&u1, 1, 10).await.unwrap().is_empty());
    }

    #[test]
    fn fan_out_dedupes_and_skips_garbage() {
        let user = EntityId::new();
        let other = EntityId::new();
        let following = vec![
            other.0.clone(),
            other.0.to_ascii_lowercase(),
            user.0.clone(),
            "garbage".to_string(),
        ];

        let ids = fan_out_ids(&user, &following);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&user));
        assert!(ids.contains(&other));
    }
}
