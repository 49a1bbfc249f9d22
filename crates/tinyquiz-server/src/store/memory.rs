//! In-process store backed by hash maps.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use tinyquiz_common::{Quiz, QuizId, QuizResponse, User, UserId};

use super::{normalize_email, QuizStore, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    emails: HashMap<String, UserId>,
    google_ids: HashMap<String, UserId>,
    quizzes: HashMap<QuizId, Quiz>,
    oauth_states: HashMap<String, DateTime<Utc>>,
}

/// Non-persistent store; everything is lost on restart
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn index_user(&mut self, user: &User) {
        self.emails.insert(normalize_email(&user.email), user.id.clone());
        if let Some(ref google_id) = user.google_id {
            self.google_ids.insert(google_id.clone(), user.id.clone());
        }
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.emails.contains_key(&normalize_email(&user.email)) {
            return Err(StoreError::Conflict(
                "User already exists with this email".to_string(),
            ));
        }
        inner.index_user(user);
        inner.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.index_user(user);
        inner.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn user(&self, id: &UserId) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .emails
            .get(&normalize_email(email))
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn user_by_google_id(&self, google_id: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .google_ids
            .get(google_id)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn insert_quiz(&self, quiz: &Quiz) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .quizzes
            .insert(quiz.id.clone(), quiz.clone());
        Ok(())
    }

    async fn quiz(&self, id: &QuizId) -> StoreResult<Option<Quiz>> {
        Ok(self.inner.read().await.quizzes.get(id).cloned())
    }

    async fn append_response(&self, id: &QuizId, response: &QuizResponse) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.quizzes.get_mut(id) {
            Some(quiz) => {
                quiz.responses.push(response.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_quiz(&self, id: &QuizId) -> StoreResult<bool> {
        Ok(self.inner.write().await.quizzes.remove(id).is_some())
    }

    async fn quizzes_by_creator(&self, creator: &UserId) -> StoreResult<Vec<Quiz>> {
        let inner = self.inner.read().await;
        let mut quizzes: Vec<Quiz> = inner
            .quizzes
            .values()
            .filter(|q| q.is_owned_by(creator))
            .cloned()
            .collect();
        quizzes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(quizzes)
    }

    async fn delete_expired(&self, now: DateTime<Utc>, creator: Option<&UserId>) -> StoreResult<usize> {
        let mut inner = self.inner.write().await;
        let before = inner.quizzes.len();
        inner.quizzes.retain(|_, quiz| {
            let expired = quiz.expires_at < now;
            let in_scope = creator.is_none_or(|c| quiz.is_owned_by(c));
            !(expired && in_scope)
        });
        Ok(before - inner.quizzes.len())
    }

    async fn put_oauth_state(&self, state: &str, ttl_secs: u64) -> StoreResult<()> {
        let expires = Utc::now() + Duration::seconds(ttl_secs as i64);
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        inner.oauth_states.retain(|_, exp| *exp > now);
        inner.oauth_states.insert(state.to_string(), expires);
        Ok(())
    }

    async fn take_oauth_state(&self, state: &str) -> StoreResult<bool> {
        let removed = self.inner.write().await.oauth_states.remove(state);
        Ok(removed.is_some_and(|exp| exp > Utc::now()))
    }
}
