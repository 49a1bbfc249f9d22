//! Provider error types.

use thiserror::Error;
use tinyquiz_common::{AiProvider, QuizError};

/// Errors raised while generating questions from an upstream AI provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider has no API key configured.
    #[error("{} is not available. Please check {} environment variable.", .0.display_name(), .0.api_key_name())]
    NotConfigured(AiProvider),

    /// The API answered with a non-2xx status.
    #[error("{provider} API error (HTTP {status}): {body}")]
    Api {
        provider: AiProvider,
        status: u16,
        body: String,
    },

    /// The request timed out.
    #[error("request to {provider} API timed out after {secs}s")]
    Timeout { provider: AiProvider, secs: u64 },

    /// Connection failure or other transport error.
    #[error("unable to connect to {provider} API: {message}")]
    Network {
        provider: AiProvider,
        message: String,
    },

    /// The reply text could not be parsed at all.
    #[error("{provider} returned a malformed response: {reason}")]
    MalformedResponse {
        provider: AiProvider,
        reason: String,
    },

    /// The reply parsed but does not fit the question schema.
    #[error("{location}: {reason}")]
    SchemaViolation { location: String, reason: String },

    /// Fewer questions than requested came back.
    #[error("expected {expected} questions, received {actual}")]
    QuestionCount { expected: usize, actual: usize },
}

impl ProviderError {
    /// Schema violation attributed to a 1-based question index
    pub fn question(index: usize, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            location: format!("Question {index}"),
            reason: reason.into(),
        }
    }

    /// Schema violation of the reply as a whole
    pub fn structure(reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            location: "Response".to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ProviderError> for QuizError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(_) => QuizError::Config(err.to_string()),
            ProviderError::Timeout { .. } => QuizError::UpstreamTimeout(err.to_string()),
            ProviderError::Api { .. } | ProviderError::Network { .. } => {
                QuizError::Upstream(err.to_string())
            }
            ProviderError::MalformedResponse { .. }
            | ProviderError::SchemaViolation { .. }
            | ProviderError::QuestionCount { .. } => QuizError::InvalidGeneration(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ProviderError::question(3, "Must have exactly 4 options");
        assert_eq!(err.to_string(), "Question 3: Must have exactly 4 options");

        let err = ProviderError::NotConfigured(AiProvider::Nvidia);
        assert_eq!(
            err.to_string(),
            "NVIDIA Nemotron/LLaMA is not available. Please check NVIDIA_API_KEY environment variable."
        );
    }

    #[test]
    fn test_status_classes() {
        let timeout = ProviderError::Timeout { provider: AiProvider::Gemini, secs: 30 };
        assert_eq!(QuizError::from(timeout).status_code(), 504);

        let api = ProviderError::Api { provider: AiProvider::Gemini, status: 503, body: "busy".into() };
        assert_eq!(QuizError::from(api).status_code(), 502);

        let schema = ProviderError::structure("No questions generated");
        assert_eq!(QuizError::from(schema).status_code(), 500);
    }
}
