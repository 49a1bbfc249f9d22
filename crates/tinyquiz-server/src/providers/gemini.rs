//! Google Gemini provider (Provider A).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use tinyquiz_common::{AiProvider, Question};

use super::normalize::parse_wrapped_questions;
use super::{send_json, GenerationRequest, ProviderError, QuestionSource};
use crate::config::ProviderSettings;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-pro-latest";

pub struct GeminiSource {
    api_key: String,
    base_url: String,
    model: String,
    timeout_secs: u64,
    max_tokens: u32,
    temperature: f64,
    client: reqwest::Client,
}

impl GeminiSource {
    pub fn new(api_key: &str, settings: &ProviderSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build Gemini HTTP client")?;

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
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[async_trait]
impl QuestionSource for GeminiSource {
    fn provider(&self) -> AiProvider {
        AiProvider::Gemini
    }

    fn prompt(&self, request: &GenerationRequest) -> String {
        let count = request.question_count;
        let topic = &request.topic;
        let level = request.difficulty.as_str().to_uppercase();
        let focus = request.difficulty.focus();

        format!(
            r#"Generate exactly {count} multiple choice quiz questions about "{topic}" at {level} difficulty level.

DIFFICULTY LEVEL: {level} - Focus on {focus}

IMPORTANT: Respond ONLY with valid JSON in this exact format (no markdown, no explanations):

{{
  "questions": [
    {{
      "question": "What is the main purpose of JavaScript?",
      "options": [
        "To style web pages",
        "To add interactivity to web pages",
        "To structure web content",
        "To manage databases"
      ],
      "correctAnswer": 1,
      "explanation": "JavaScript is primarily used to add interactivity and dynamic behavior to web pages."
    }}
  ]
}}

Requirements:
- Each question must have exactly 4 options
- correctAnswer must be the index (0-3) of the correct option
- Questions should be appropriate for {level} difficulty level
- Include brief explanations for learning
- Focus specifically on: {topic}
- Ensure JSON is valid and parseable

Generate {count} questions following this format exactly."#
        )
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = GenerateContentRequest {
            contents: [Content { parts: [Part { text: prompt }] }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        let request = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url.trim_end_matches('/'),
                self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&body);

        let response = send_json(AiProvider::Gemini, self.timeout_secs, request).await?;

        response
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| ProviderError::MalformedResponse {
                provider: AiProvider::Gemini,
                reason: "invalid response structure from Gemini API".to_string(),
            })
    }

    fn normalize(&self, raw: &str) -> Result<Vec<Question>, ProviderError> {
        parse_wrapped_questions(AiProvider::Gemini, raw)
    }
}
