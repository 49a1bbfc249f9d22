//! Application state and shared resources.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use crate::auth::{GoogleOAuth, TokenService};
use crate::config::{AppConfig, StorageBackend};
use crate::providers::QuizGenerator;
use crate::store::{MemoryStore, QuizStore, RedisStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Users, quizzes and responses
    pub store: Arc<dyn QuizStore>,

    /// AI question generation
    pub generator: QuizGenerator,

    /// Bearer token issuance/validation
    pub tokens: Arc<TokenService>,

    /// Google sign-in (absent when not configured)
    pub google: Option<Arc<GoogleOAuth>>,

    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create application state, connecting to the configured store
    pub async fn new(config: AppConfig) -> Result<Self> {
        let store: Arc<dyn QuizStore> = match config.storage {
            StorageBackend::Redis => Arc::new(RedisStore::connect(&config.redis_url).await?),
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory store (data is lost on restart)");
                Arc::new(MemoryStore::new())
            }
        };

        let generator = QuizGenerator::from_config(&config.providers)?;
        Self::with_parts(config, store, generator)
    }

    /// Assemble state from already-built collaborators
    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn QuizStore>,
        generator: QuizGenerator,
    ) -> Result<Self> {
        let tokens = Arc::new(TokenService::new(&config.auth)?);

        let google = match config.google.clone() {
            Some(google) => Some(Arc::new(GoogleOAuth::new(google)?)),
            None => {
                tracing::warn!("Google OAuth credentials not set; Google sign-in is disabled");
                None
            }
        };

        Ok(Self {
            config: Arc::new(config),
            store,
            generator,
            tokens,
            google,
            started_at: Instant::now(),
        })
    }
}
