//! Redis-backed store.
//!
//! Layout:
//! - `quiz:{id}` JSON quiz document (without responses)
//! - `quiz:{id}:responses` list of JSON responses, appended with RPUSH
//! - `tinyquiz:quiz_expiry` sorted set of quiz ids scored by expiry (ms)
//! - `user:quizzes:{uid}` sorted set of quiz ids scored by creation (ms)
//! - `user:{id}` JSON user, plus `user:email:{email}` / `user:google:{gid}` id indexes
//! - `oauth:state:{state}` short-lived OAuth state marker

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use tinyquiz_common::constants::{QUIZ_TTL_SECS, redis_keys};
use tinyquiz_common::{Quiz, QuizId, QuizResponse, User, UserId};

use super::{normalize_email, QuizStore, StoreError, StoreResult};

/// Push onto the response list only while the quiz document exists
const APPEND_RESPONSE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return redis.call('RPUSH', KEYS[2], ARGV[1])
end
return -1
"#;

/// Claim the email index, then write the user and its Google index, all or nothing
const INSERT_USER_SCRIPT: &str = r#"
if redis.call('SETNX', KEYS[1], ARGV[1]) == 0 then
    return 0
end
redis.call('SET', KEYS[2], ARGV[2])
if KEYS[3] then
    redis.call('SET', KEYS[3], ARGV[1])
end
return 1
"#;

fn quiz_key(id: &QuizId) -> String {
    format!("{}{}", redis_keys::QUIZ_PREFIX, id)
}

fn responses_key(id: &QuizId) -> String {
    format!("{}{}{}", redis_keys::QUIZ_PREFIX, id, redis_keys::RESPONSES_SUFFIX)
}

fn creator_key(id: &UserId) -> String {
    format!("{}{}", redis_keys::USER_QUIZZES_PREFIX, id)
}

fn user_key(id: &UserId) -> String {
    format!("{}{}", redis_keys::USER_PREFIX, id)
}

fn email_key(email: &str) -> String {
    format!("{}{}", redis_keys::USER_EMAIL_PREFIX, normalize_email(email))
}

fn google_key(google_id: &str) -> String {
    format!("{}{}", redis_keys::USER_GOOGLE_PREFIX, google_id)
}

fn oauth_state_key(state: &str) -> String {
    format!("{}{}", redis_keys::OAUTH_STATE_PREFIX, state)
}

pub struct RedisStore {
    /// Auto-reconnecting connection
    conn: ConnectionManager,
    append_script: redis::Script,
    insert_user_script: redis::Script,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self {
            conn,
            append_script: redis::Script::new(APPEND_RESPONSE_SCRIPT),
            insert_user_script: redis::Script::new(INSERT_USER_SCRIPT),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// Quiz document without its responses
    async fn quiz_document(&self, id: &QuizId) -> StoreResult<Option<Quiz>> {
        let mut conn = self.conn();
        let data: Option<String> = conn.get(quiz_key(id)).await?;
        match data {
            Some(d) => Ok(Some(serde_json::from_str(&d)?)),
            None => Ok(None),
        }
    }

    /// Drop every key belonging to `quiz`; returns whether the document existed
    async fn remove(&self, quiz: &Quiz) -> StoreResult<bool> {
        let mut conn = self.conn();
        let (removed,): (i64,) = redis::pipe()
            .atomic()
            .del(quiz_key(&quiz.id))
            .del(responses_key(&quiz.id))
            .ignore()
            .zrem(redis_keys::QUIZ_EXPIRY, quiz.id.as_str())
            .ignore()
            .zrem(creator_key(&quiz.creator_id), quiz.id.as_str())
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    /// Sorted set and exclusive upper score bound holding the expiry candidates.
    ///
    /// A creator's own index is scored by creation time, which trails expiry
    /// by the fixed quiz lifetime.
    fn expired_scan(now: DateTime<Utc>, creator: Option<&UserId>) -> (String, String) {
        match creator {
            Some(creator) => (
                creator_key(creator),
                format!("({}", now.timestamp_millis() - QUIZ_TTL_SECS * 1000),
            ),
            None => (
                redis_keys::QUIZ_EXPIRY.to_string(),
                format!("({}", now.timestamp_millis()),
            ),
        }
    }

    async fn user_by_index(&self, index_key: String) -> StoreResult<Option<User>> {
        let mut conn = self.conn();
        let id: Option<String> = conn.get(index_key).await?;
        match id {
            Some(id) => self.user(&UserId::from_stored(id)).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl QuizStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut conn = self.conn();
        let data = serde_json::to_string(user)?;

        let mut invocation = self.insert_user_script.prepare_invoke();
        invocation
            .key(email_key(&user.email))
            .key(user_key(&user.id))
            .arg(user.id.as_str())
            .arg(&data);
        if let Some(ref google_id) = user.google_id {
            invocation.key(google_key(google_id));
        }

        let claimed: i64 = invocation.invoke_async(&mut conn).await?;
        if claimed == 0 {
            return Err(StoreError::Conflict(
                "User already exists with this email".to_string(),
            ));
        }

        tracing::debug!(user_id = %user.id, "User stored");
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut conn = self.conn();
        let data = serde_json::to_string(user)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(user_key(&user.id), &data)
            .ignore()
            .set(email_key(&user.email), user.id.as_str())
            .ignore();
        if let Some(ref google_id) = user.google_id {
            pipe.set(google_key(google_id), user.id.as_str()).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn user(&self, id: &UserId) -> StoreResult<Option<User>> {
        let mut conn = self.conn();
        let data: Option<String> = conn.get(user_key(id)).await?;
        match data {
            Some(d) => Ok(Some(serde_json::from_str(&d)?)),
            None => Ok(None),
        }
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.user_by_index(email_key(email)).await
    }

    async fn user_by_google_id(&self, google_id: &str) -> StoreResult<Option<User>> {
        self.user_by_index(google_key(google_id)).await
    }

    async fn insert_quiz(&self, quiz: &Quiz) -> StoreResult<()> {
        let mut conn = self.conn();
        let data = serde_json::to_string(quiz)?;

        let _: () = redis::pipe()
            .atomic()
            .set(quiz_key(&quiz.id), &data)
            .ignore()
            .zadd(
                redis_keys::QUIZ_EXPIRY,
                quiz.id.as_str(),
                quiz.expires_at.timestamp_millis(),
            )
            .ignore()
            .zadd(
                creator_key(&quiz.creator_id),
                quiz.id.as_str(),
                quiz.created_at.timestamp_millis(),
            )
            .ignore()
            .query_async(&mut conn)
            .await?;

        tracing::debug!(quiz_id = %quiz.id, creator = %quiz.creator_id, "Quiz stored");
        Ok(())
    }

    async fn quiz(&self, id: &QuizId) -> StoreResult<Option<Quiz>> {
        let Some(mut quiz) = self.quiz_document(id).await? else {
            return Ok(None);
        };

        let mut conn = self.conn();
        let raw: Vec<String> = conn.lrange(responses_key(id), 0, -1).await?;
        quiz.responses = raw
            .iter()
            .map(|r| serde_json::from_str(r))
            .collect::<Result<_, _>>()?;

        Ok(Some(quiz))
    }

    async fn append_response(&self, id: &QuizId, response: &QuizResponse) -> StoreResult<bool> {
        let mut conn = self.conn();
        let data = serde_json::to_string(response)?;

        let length: i64 = self
            .append_script
            .key(quiz_key(id))
            .key(responses_key(id))
            .arg(data)
            .invoke_async(&mut conn)
            .await?;

        Ok(length > 0)
    }

    async fn delete_quiz(&self, id: &QuizId) -> StoreResult<bool> {
        match self.quiz_document(id).await? {
            Some(quiz) => self.remove(&quiz).await,
            None => Ok(false),
        }
    }

    async fn quizzes_by_creator(&self, creator: &UserId) -> StoreResult<Vec<Quiz>> {
        let mut conn = self.conn();
        let ids: Vec<String> = conn.zrevrange(creator_key(creator), 0, -1).await?;

        let mut quizzes = Vec::with_capacity(ids.len());
        for id in ids {
            let id = QuizId::from_stored(id);
            match self.quiz(&id).await? {
                Some(quiz) => quizzes.push(quiz),
                None => {
                    // Index entry outlived its document
                    conn.zrem::<_, _, ()>(creator_key(creator), id.as_str()).await?;
                }
            }
        }
        Ok(quizzes)
    }

    async fn delete_expired(&self, now: DateTime<Utc>, creator: Option<&UserId>) -> StoreResult<usize> {
        let mut conn = self.conn();
        let (index, max) = Self::expired_scan(now, creator);
        let ids: Vec<String> = conn.zrangebyscore(&index, "-inf", max).await?;

        let mut deleted = 0;
        for id in ids {
            let id = QuizId::from_stored(id);
            let Some(quiz) = self.quiz_document(&id).await? else {
                // Index entry outlived its document
                conn.zrem::<_, _, ()>(&index, id.as_str()).await?;
                continue;
            };
            if quiz.expires_at >= now || creator.is_some_and(|c| !quiz.is_owned_by(c)) {
                continue;
            }
            if self.remove(&quiz).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn put_oauth_state(&self, state: &str, ttl_secs: u64) -> StoreResult<()> {
        let mut conn = self.conn();
        conn.set_ex::<_, _, ()>(oauth_state_key(state), "1", ttl_secs).await?;
        Ok(())
    }

    async fn take_oauth_state(&self, state: &str) -> StoreResult<bool> {
        let mut conn = self.conn();
        let removed: i64 = conn.del(oauth_state_key(state)).await?;
        Ok(removed > 0)
    }
}
