//! Persistence for users, quizzes and their responses.
//!
//! Redis is the production backend; [`MemoryStore`] keeps everything in
//! process for local runs and the API tests.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use tinyquiz_common::{Quiz, QuizError, QuizId, QuizResponse, User, UserId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unique constraint violated
    #[error("{0}")]
    Conflict(String),
}

impl From<StoreError> for QuizError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => QuizError::Validation(msg),
            StoreError::Redis(e) => QuizError::Storage(e.to_string()),
            StoreError::Serialization(e) => QuizError::Internal(e.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Document store contract shared by every backend
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Backend name for logs and `/api/ready`
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> StoreResult<()>;

    /// Insert a new user; `Conflict` if the email is taken
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    /// Overwrite an existing user, keeping the lookup indexes current
    async fn update_user(&self, user: &User) -> StoreResult<()>;

    async fn user(&self, id: &UserId) -> StoreResult<Option<User>>;

    /// Lookup by normalized (trimmed, lowercased) email
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn user_by_google_id(&self, google_id: &str) -> StoreResult<Option<User>>;

    async fn insert_quiz(&self, quiz: &Quiz) -> StoreResult<()>;

    /// Quiz with all responses, in submission order
    async fn quiz(&self, id: &QuizId) -> StoreResult<Option<Quiz>>;

    /// Atomically append a response; `false` if the quiz no longer exists
    async fn append_response(&self, id: &QuizId, response: &QuizResponse) -> StoreResult<bool>;

    /// Remove a quiz and its responses; `false` if it did not exist
    async fn delete_quiz(&self, id: &QuizId) -> StoreResult<bool>;

    /// All quizzes created by `creator`, newest first
    async fn quizzes_by_creator(&self, creator: &UserId) -> StoreResult<Vec<Quiz>>;

    /// Delete quizzes with `expires_at < now`, optionally only one creator's
    async fn delete_expired(&self, now: DateTime<Utc>, creator: Option<&UserId>) -> StoreResult<usize>;

    /// Remember an OAuth `state` value for `ttl_secs`
    async fn put_oauth_state(&self, state: &str, ttl_secs: u64) -> StoreResult<()>;

    /// Consume an OAuth `state`; `true` if it was present and unexpired
    async fn take_oauth_state(&self, state: &str) -> StoreResult<bool>;
}

/// Normalize an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
