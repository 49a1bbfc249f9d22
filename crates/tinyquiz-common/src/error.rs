//! Common error types for TinyQuiz components.

use thiserror::Error;

/// Domain errors surfaced at the HTTP boundary
#[derive(Debug, Error)]
pub enum QuizError {
    /// Malformed caller input
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid or expired credential
    #[error("{0}")]
    Auth(String),

    /// Authenticated but not the resource owner
    #[error("{0}")]
    Authorization(String),

    /// Resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Quiz is past its expiry
    #[error("{0}")]
    Expired(String),

    /// Submitted answer vector does not fit the quiz
    #[error("Expected {expected} answers, received {actual}")]
    InvalidAnswers { expected: usize, actual: usize },

    /// AI provider unreachable or returned a non-2xx status
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// AI provider did not answer in time
    #[error("Upstream timed out: {0}")]
    UpstreamTimeout(String),

    /// AI output could not be turned into questions
    #[error("Invalid AI output: {0}")]
    InvalidGeneration(String),

    /// Persistence layer failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Server misconfiguration (e.g. provider without API key)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuizError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::InvalidAnswers { .. } => 400,
            Self::Auth(_) => 401,
            Self::Authorization(_) => 403,
            Self::NotFound(_) => 404,
            Self::Expired(_) => 410,
            Self::Upstream(_) => 502,
            Self::UpstreamTimeout(_) => 504,
            Self::InvalidGeneration(_) => 500,
            Self::Storage(_) => 503,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if the caller may reasonably retry the request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Upstream(_) | Self::UpstreamTimeout(_) | Self::Storage(_)
        )
    }

    /// Returns true if the message is safe to show to any caller
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(QuizError::Validation("x".into()).status_code(), 400);
        assert_eq!(QuizError::Expired("x".into()).status_code(), 410);
        assert_eq!(QuizError::Upstream("x".into()).status_code(), 502);
        assert_eq!(QuizError::UpstreamTimeout("x".into()).status_code(), 504);
        assert_eq!(QuizError::InvalidGeneration("x".into()).status_code(), 500);
    }

    #[test]
    fn test_retryable() {
        assert!(QuizError::UpstreamTimeout("x".into()).is_retryable());
        assert!(!QuizError::InvalidGeneration("x".into()).is_retryable());
        assert!(!QuizError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn test_invalid_answers_message() {
        let err = QuizError::InvalidAnswers { expected: 3, actual: 2 };
        assert_eq!(err.to_string(), "Expected 3 answers, received 2");
        assert!(err.is_client_error());
    }
}
