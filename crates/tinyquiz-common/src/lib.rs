//! # TinyQuiz Common
//!
//! Shared types and pure logic used across TinyQuiz components.
//!
//! ## Modules
//! - `types` - Core data structures (Quiz, Question, QuizResponse, User, ...)
//! - `scoring` - Scores one submission against the answer key
//! - `analytics` - Aggregates all responses of a quiz
//! - `error` - Common error taxonomy
//! - `constants` - Shared configuration constants

pub mod analytics;
pub mod constants;
pub mod error;
pub mod scoring;
pub mod types;

pub use error::QuizError;
pub use types::*;
