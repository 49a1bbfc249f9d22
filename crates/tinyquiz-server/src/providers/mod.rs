//! AI question generation.
//!
//! Every upstream provider is a [`QuestionSource`]: it builds its prompt,
//! performs one HTTP call and normalizes the reply into canonical
//! [`Question`]s. [`QuizGenerator`] selects a source by [`AiProvider`].

mod error;
mod gemini;
pub mod normalize;
mod nvidia;

pub use error::ProviderError;
pub use gemini::GeminiSource;
pub use nvidia::NvidiaSource;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tinyquiz_common::{AiProvider, Difficulty, Question};

use crate::config::ProvidersConfig;

/// What to generate
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub topic: String,
    pub question_count: usize,
    pub difficulty: Difficulty,
}

/// An upstream service that turns a topic into questions
#[async_trait]
pub trait QuestionSource: Send + Sync {
    fn provider(&self) -> AiProvider;

    /// Prompt sent upstream for this request
    fn prompt(&self, request: &GenerationRequest) -> String;

    /// One round trip to the provider, returning its raw reply text
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Reply text to canonical questions
    fn normalize(&self, raw: &str) -> Result<Vec<Question>, ProviderError>;
}

/// Provider entry for `GET /api/providers`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: AiProvider,
    pub name: &'static str,
    pub description: &'static str,
    pub requires_api_key: &'static str,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderCatalogue {
    pub providers: Vec<ProviderInfo>,
    pub default: AiProvider,
}

/// Provider-agnostic question generator
#[derive(Clone, Default)]
pub struct QuizGenerator {
    sources: HashMap<AiProvider, Arc<dyn QuestionSource>>,
}

impl QuizGenerator {
    /// Register a source for every provider that has an API key configured
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let mut generator = Self::default();

        if let Some(api_key) = config.gemini.api_key.as_deref() {
            generator = generator.with_source(Arc::new(GeminiSource::new(api_key, &config.gemini)?));
        }
        if let Some(api_key) = config.nvidia.api_key.as_deref() {
            generator = generator.with_source(Arc::new(NvidiaSource::new(api_key, &config.nvidia)?));
        }

        for provider in AiProvider::ALL {
            if !generator.is_available(provider) {
                tracing::warn!(
                    provider = %provider,
                    key = provider.api_key_name(),
                    "AI provider disabled (no API key configured)"
                );
            }
        }

        Ok(generator)
    }

    pub fn with_source(mut self, source: Arc<dyn QuestionSource>) -> Self {
        self.sources.insert(source.provider(), source);
        self
    }

    pub fn is_available(&self, provider: AiProvider) -> bool {
        self.sources.contains_key(&provider)
    }

    pub fn catalogue(&self) -> ProviderCatalogue {
        ProviderCatalogue {
            providers: AiProvider::ALL
                .into_iter()
                .map(|p| ProviderInfo {
                    id: p,
                    name: p.display_name(),
                    description: p.description(),
                    requires_api_key: p.api_key_name(),
                    available: self.is_available(p),
                })
                .collect(),
            default: AiProvider::default(),
        }
    }

    /// Produce exactly `request.question_count` validated questions
    pub async fn generate(
        &self,
        provider: AiProvider,
        request: &GenerationRequest,
    ) -> Result<Vec<Question>, ProviderError> {
        let source = self
            .sources
            .get(&provider)
            .ok_or(ProviderError::NotConfigured(provider))?;

        let prompt = source.prompt(request);
        let raw = source.complete(&prompt).await.inspect_err(|e| {
            tracing::warn!(provider = %provider, error = %e, "Upstream AI call failed");
        })?;

        let mut questions = source.normalize(&raw).inspect_err(|e| {
            tracing::warn!(provider = %provider, error = %e, "AI reply rejected");
        })?;

        if questions.len() < request.question_count {
            return Err(ProviderError::QuestionCount {
                expected: request.question_count,
                actual: questions.len(),
            });
        }
        if questions.len() > request.question_count {
            tracing::debug!(
                provider = %provider,
                requested = request.question_count,
                received = questions.len(),
                "Dropping surplus questions"
            );
            questions.truncate(request.question_count);
        }

        tracing::info!(
            provider = %provider,
            topic = %request.topic,
            count = questions.len(),
            "Generated quiz questions"
        );

        Ok(questions)
    }
}

/// Send a JSON request and classify transport failures
pub(crate) async fn send_json(
    provider: AiProvider,
    timeout_secs: u64,
    request: reqwest::RequestBuilder,
) -> Result<Value, ProviderError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Timeout { provider, secs: timeout_secs }
        } else {
            ProviderError::Network { provider, message: e.to_string() }
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            provider,
            status: status.as_u16(),
            body: upstream_error_message(&body),
        });
    }

    response.json::<Value>().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Timeout { provider, secs: timeout_secs }
        } else {
            ProviderError::MalformedResponse {
                provider,
                reason: format!("failed to parse response body: {e}"),
            }
        }
    })
}

/// Prefer `error.message` from a JSON error body, else the raw body
fn upstream_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies with a canned Provider-A payload
    struct CannedSource {
        reply: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuestionSource for CannedSource {
        fn provider(&self) -> AiProvider {
            AiProvider::Gemini
        }

        fn prompt(&self, request: &GenerationRequest) -> String {
            request.topic.clone()
        }

        async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }

        fn normalize(&self, raw: &str) -> Result<Vec<Question>, ProviderError> {
            normalize::parse_wrapped_questions(AiProvider::Gemini, raw)
        }
    }

    fn canned(count: usize) -> Arc<CannedSource> {
        let questions: Vec<Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "question": format!("Question {i}"),
                    "options": ["a", "b", "c", "d"],
                    "correctAnswer": i % 4,
                    "explanation": "because"
                })
            })
            .collect();
        Arc::new(CannedSource {
            reply: serde_json::json!({ "questions": questions }).to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn request(count: usize) -> GenerationRequest {
        GenerationRequest {
            topic: "Photosynthesis".into(),
            question_count: count,
            difficulty: Difficulty::Easy,
        }
    }

    #[tokio::test]
    async fn test_generate_exact_count() {
        let generator = QuizGenerator::default().with_source(canned(3));
        let questions = generator.generate(AiProvider::Gemini, &request(3)).await.unwrap();
        assert_eq!(questions.len(), 3);
    }

    #[tokio::test]
    async fn test_surplus_truncated_shortfall_rejected() {
        let generator = QuizGenerator::default().with_source(canned(5));
        let questions = generator.generate(AiProvider::Gemini, &request(2)).await.unwrap();
        assert_eq!(questions.len(), 2);

        let err = generator.generate(AiProvider::Gemini, &request(6)).await.unwrap_err();
        assert!(matches!(err, ProviderError::QuestionCount { expected: 6, actual: 5 }));
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let source = canned(1);
        let generator = QuizGenerator::default().with_source(source.clone());
        let err = generator.generate(AiProvider::Nvidia, &request(1)).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(AiProvider::Nvidia)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_catalogue_reflects_configuration() {
        let generator = QuizGenerator::default().with_source(canned(1));
        let catalogue = generator.catalogue();
        assert_eq!(catalogue.default, AiProvider::Gemini);
        assert_eq!(catalogue.providers.len(), 2);
        assert!(catalogue.providers[0].available);
        assert!(!catalogue.providers[1].available);
        assert_eq!(catalogue.providers[1].requires_api_key, "NVIDIA_API_KEY");
    }

    #[test]
    fn test_upstream_error_message() {
        assert_eq!(
            upstream_error_message(r#"{"error": {"message": "API key not valid"}}"#),
            "API key not valid"
        );
        assert_eq!(upstream_error_message("Bad Gateway"), "Bad Gateway");
    }
}
