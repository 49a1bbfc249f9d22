//! NVIDIA-hosted LLaMA provider (Provider B), spoken to over the
//! OpenAI-compatible chat completions API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use tinyquiz_common::{AiProvider, Question};

use super::normalize::parse_flat_questions;
use super::{send_json, GenerationRequest, ProviderError, QuestionSource};
use crate::config::ProviderSettings;

const DEFAULT_BASE_URL: &str = "https://integrate.api.nvidia.com";
const DEFAULT_MODEL: &str = "meta/llama-3.1-70b-instruct";

pub struct NvidiaSource {
    api_key: String,
    base_url: String,
    model: String,
    timeout_secs: u64,
    max_tokens: u32,
    temperature: f64,
    client: reqwest::Client,
}

impl NvidiaSource {
    pub fn new(api_key: &str, settings: &ProviderSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build NVIDIA HTTP client")?;

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: settings.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_secs: settings.timeout_secs,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            client,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[async_trait]
impl QuestionSource for NvidiaSource {
    fn provider(&self) -> AiProvider {
        AiProvider::Nvidia
    }

    fn prompt(&self, request: &GenerationRequest) -> String {
        let count = request.question_count;
        let topic = &request.topic;
        let level = request.difficulty.as_str().to_uppercase();
        let focus = request.difficulty.focus();

        format!(
            r#"Return strictly a JSON array of {count} MCQs for "{topic}" at {level} difficulty level.
DIFFICULTY LEVEL: {level} - Focus on {focus}

Each object must have:
- "question"
- "option1", "option2", "option3", "option4"
- "answer" (e.g., "option2")
- "explanation" (brief learning explanation)

Questions should be appropriate for {level} difficulty level.
Only return the array. No explanation, no extra text."#
        )
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let request = self
            .client
            .post(format!(
                "{}/v1/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&body);

        let response = send_json(AiProvider::Nvidia, self.timeout_secs, request).await?;

        response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::MalformedResponse {
                provider: AiProvider::Nvidia,
                reason: "completion has no message content".to_string(),
            })
    }

    fn normalize(&self, raw: &str) -> Result<Vec<Question>, ProviderError> {
        parse_flat_questions(AiProvider::Nvidia, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyquiz_common::Difficulty;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(base_url: String) -> NvidiaSource {
        let settings = ProviderSettings {
            base_url: Some(base_url),
            timeout_secs: 5,
            ..Default::default()
        };
        NvidiaSource::new("test-key", &settings).unwrap()
    }

    #[test]
    fn test_prompt_asks_for_flat_array() {
        let source = source("http://localhost".into());
        let prompt = source.prompt(&GenerationRequest {
            topic: "Rust ownership".into(),
            question_count: 4,
            difficulty: Difficulty::Hard,
        });
        assert!(prompt.starts_with("Return strictly a JSON array of 4 MCQs for \"Rust ownership\" at HARD"));
        assert!(prompt.contains("\"option1\", \"option2\", \"option3\", \"option4\""));
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let server = MockServer::start().await;

        let content = "Here you go:\n[{\"question\": \"Q\", \"option1\": \"A\", \"option2\": \"B\", \"option3\": \"C\", \"option4\": \"D\", \"answer\": \"option2\"}]";
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}, "index": 0}],
            "model": "meta/llama-3.1-70b-instruct"
        });

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let source = source(server.uri());
        let raw = source.complete("prompt").await.unwrap();
        let questions = source.normalize(&raw).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_option_index, 1);
        assert_eq!(questions[0].explanation, "The correct answer is option2.");
    }

    #[tokio::test]
    async fn test_not_found_is_upstream_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let err = source(server.uri()).complete("prompt").await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 404, .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Nothing listens on port 9 of localhost
        let err = source("http://127.0.0.1:9".into()).complete("prompt").await.unwrap_err();
        assert!(matches!(err, ProviderError::Network { .. }));
    }
}
