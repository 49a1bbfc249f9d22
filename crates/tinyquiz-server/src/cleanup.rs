//! Periodic removal of expired quizzes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::store::{QuizStore, StoreResult};

/// One sweep over every creator's quizzes
pub async fn sweep_expired(store: &dyn QuizStore) -> StoreResult<usize> {
    let deleted = store.delete_expired(Utc::now(), None).await?;
    if deleted > 0 {
        tracing::info!(deleted = deleted, "Removed expired quizzes");
    } else {
        tracing::debug!("No expired quizzes to remove");
    }
    Ok(deleted)
}

/// Background worker: sweep every `interval` until shutdown is broadcast
pub async fn cleanup_worker(
    store: Arc<dyn QuizStore>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "🧹 Cleanup worker started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sweep_expired(store.as_ref()).await {
                    tracing::error!(error = %e, "Expired quiz cleanup failed");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("🧹 Cleanup worker shutting down...");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration as ChronoDuration;
    use tinyquiz_common::{AiProvider, Difficulty, Quiz, TimePerQuestion, UserId};

    fn quiz_created_at(created_at: chrono::DateTime<Utc>) -> Quiz {
        Quiz::new(
            UserId::new(),
            "Tides".into(),
            vec![],
            AiProvider::Nvidia,
            Difficulty::Medium,
            TimePerQuestion::DEFAULT,
            created_at,
        )
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let store = MemoryStore::new();
        store
            .insert_quiz(&quiz_created_at(Utc::now() - ChronoDuration::hours(1)))
            .await
            .unwrap();
        store.insert_quiz(&quiz_created_at(Utc::now())).await.unwrap();

        assert_eq!(sweep_expired(&store).await.unwrap(), 1);
        assert_eq!(sweep_expired(&store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let store: Arc<dyn QuizStore> = Arc::new(MemoryStore::new());
        let expired = quiz_created_at(Utc::now() - ChronoDuration::hours(1));
        store.insert_quiz(&expired).await.unwrap();

        let (tx, rx) = tokio::sync::broadcast::channel(1);
        let handle = tokio::spawn(cleanup_worker(store.clone(), Duration::from_secs(3600), rx));

        // The first tick fires immediately
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.quiz(&expired.id).await.unwrap().is_none());

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
