//! Core types shared across TinyQuiz components.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{OPTION_COUNT, QUIZ_TTL_SECS};
use crate::error::QuizError;

/// 24-character lowercase hex document identifier.
///
/// Layout follows the familiar document-store object id: a 4-byte
/// big-endian creation timestamp followed by 8 random bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

pub type QuizId = ObjectId;
pub type UserId = ObjectId;

impl ObjectId {
    pub const LEN: usize = 24;

    /// Generate a fresh identifier
    pub fn new() -> Self {
        let mut bytes = [0u8; 12];
        let secs = Utc::now().timestamp().max(0) as u32;
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        rand::rng().fill(&mut bytes[4..]);
        Self(hex::encode(bytes))
    }

    /// Parse a path/query parameter, rejecting anything that is not 24 hex digits
    pub fn parse(raw: &str) -> Result<Self, QuizError> {
        if raw.len() == Self::LEN && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(raw.to_ascii_lowercase()))
        } else {
            Err(QuizError::Validation("Invalid quiz ID format".to_string()))
        }
    }

    /// Wrap an id read back from storage, where it was written by [`ObjectId::new`]
    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upstream AI text-generation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    /// Google Gemini - replies with a `{"questions": [...]}` object
    Gemini,
    /// NVIDIA-hosted LLaMA - replies with a bare array of flat MCQs
    Nvidia,
}

impl AiProvider {
    pub const ALL: [AiProvider; 2] = [AiProvider::Gemini, AiProvider::Nvidia];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Nvidia => "nvidia",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Gemini => "Google Gemini",
            Self::Nvidia => "NVIDIA Nemotron/LLaMA",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Gemini => "Google's advanced language model, great for educational content",
            Self::Nvidia => "NVIDIA's LLaMA-based model, excellent for quiz generation",
        }
    }

    /// Name of the setting that must hold this provider's API key
    pub fn api_key_name(&self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::Nvidia => "NVIDIA_API_KEY",
        }
    }
}

impl Default for AiProvider {
    fn default() -> Self {
        Self::Gemini
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiProvider {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "nvidia" => Ok(Self::Nvidia),
            _ => Err(QuizError::Validation(format!(
                "Invalid AI provider. Available providers: {}",
                Self::ALL.map(|p| p.as_str()).join(", ")
            ))),
        }
    }
}

/// Question difficulty requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    /// What the prompt asks the model to focus on at this level
    pub fn focus(&self) -> &'static str {
        match self {
            Self::Easy => {
                "basic concepts, simple definitions, and fundamental principles that beginners should know"
            }
            Self::Medium => {
                "intermediate concepts requiring some understanding and application of knowledge"
            }
            Self::Hard => {
                "advanced concepts, complex applications, and detailed analysis requiring deep understanding"
            }
        }
    }

    /// Unknown or missing values fall back to `Easy`
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("medium") => Self::Medium,
            Some("hard") => Self::Hard,
            _ => Self::Easy,
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Easy
    }
}

/// Seconds allowed per question; one of a fixed set of values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct TimePerQuestion(u16);

impl TimePerQuestion {
    pub const ALLOWED: [u16; 6] = [15, 30, 45, 60, 90, 120];
    pub const DEFAULT: TimePerQuestion = TimePerQuestion(30);

    pub fn new(secs: u16) -> Option<Self> {
        Self::ALLOWED.contains(&secs).then_some(Self(secs))
    }

    /// Unknown or missing values fall back to 30 seconds
    pub fn parse_lenient(raw: Option<i64>) -> Self {
        raw.and_then(|v| u16::try_from(v).ok())
            .and_then(Self::new)
            .unwrap_or(Self::DEFAULT)
    }

    pub fn secs(&self) -> u16 {
        self.0
    }
}

impl Default for TimePerQuestion {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u16> for TimePerQuestion {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("invalid time per question: {value}"))
    }
}

impl From<TimePerQuestion> for u16 {
    fn from(value: TimePerQuestion) -> Self {
        value.0
    }
}

/// Canonical question shape every provider is normalized into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub correct_option_index: u8,
    pub explanation: String,
}

/// Question as shown to respondents (no answer key)
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub question: String,
    pub options: [String; OPTION_COUNT],
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            question: q.text.clone(),
            options: q.options.clone(),
        }
    }
}

/// Aggregate score of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    pub correct: u32,
    pub total: u32,
    pub percentage: u32,
}

/// One respondent's submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResponse {
    #[serde(rename = "name")]
    pub respondent_name: String,
    pub answers: Vec<i8>,
    pub score: Score,
    pub submitted_at: DateTime<Utc>,
}

/// A generated quiz with its collected responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: QuizId,
    pub creator_id: UserId,
    pub topic: String,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ai_provider: AiProvider,
    pub difficulty: Difficulty,
    pub time_per_question: TimePerQuestion,
    #[serde(default)]
    pub responses: Vec<QuizResponse>,
}

impl Quiz {
    /// Create a quiz that expires a fixed 30 minutes after `now`
    pub fn new(
        creator_id: UserId,
        topic: String,
        questions: Vec<Question>,
        ai_provider: AiProvider,
        difficulty: Difficulty,
        time_per_question: TimePerQuestion,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: QuizId::new(),
            creator_id,
            topic,
            questions,
            created_at: now,
            expires_at: now + Duration::seconds(QUIZ_TTL_SECS),
            ai_provider,
            difficulty,
            time_per_question,
            responses: Vec::new(),
        }
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Time left before expiry, never negative
    pub fn time_remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    pub fn minutes_remaining_at(&self, now: DateTime<Utc>) -> i64 {
        self.time_remaining_at(now).num_minutes()
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.creator_id == user
    }

    pub fn public_questions(&self) -> Vec<PublicQuestion> {
        self.questions.iter().map(PublicQuestion::from).collect()
    }
}

/// How an account was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
}

impl Default for AuthProvider {
    fn default() -> Self {
        Self::Local
    }
}

/// Stored account record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// Absent for accounts that only ever signed in with Google
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub provider: AuthProvider,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            profile_picture: self.profile_picture.clone(),
            provider: self.provider,
            created_at: self.created_at,
        }
    }
}

/// Account data safe to return to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    pub provider: AuthProvider,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_shape() {
        let id = ObjectId::new();
        assert_eq!(id.as_str().len(), 24);
        assert!(ObjectId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn test_object_id_rejects_bad_input() {
        assert!(ObjectId::parse("not-an-id").is_err());
        assert!(ObjectId::parse("0123456789abcdef0123456").is_err());
        assert!(ObjectId::parse("0123456789abcdef0123456g").is_err());
        let parsed = ObjectId::parse("0123456789ABCDEF01234567").unwrap();
        assert_eq!(parsed.as_str(), "0123456789abcdef01234567");
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("NVIDIA".parse::<AiProvider>().unwrap(), AiProvider::Nvidia);
        assert!("openai".parse::<AiProvider>().is_err());
    }

    #[test]
    fn test_lenient_parsing() {
        assert_eq!(Difficulty::parse_lenient(Some("hard")), Difficulty::Hard);
        assert_eq!(Difficulty::parse_lenient(Some("extreme")), Difficulty::Easy);
        assert_eq!(Difficulty::parse_lenient(None), Difficulty::Easy);
        assert_eq!(TimePerQuestion::parse_lenient(Some(90)).secs(), 90);
        assert_eq!(TimePerQuestion::parse_lenient(Some(20)).secs(), 30);
        assert_eq!(TimePerQuestion::parse_lenient(Some(-15)).secs(), 30);
    }

    #[test]
    fn test_quiz_expiry_window() {
        let now = Utc::now();
        let quiz = Quiz::new(
            UserId::new(),
            "Rust".into(),
            vec![],
            AiProvider::Gemini,
            Difficulty::Easy,
            TimePerQuestion::DEFAULT,
            now,
        );
        assert_eq!(quiz.expires_at - quiz.created_at, Duration::minutes(30));
        assert!(!quiz.is_expired_at(now));
        assert!(quiz.is_expired_at(now + Duration::minutes(31)));
        assert_eq!(quiz.minutes_remaining_at(now + Duration::minutes(45)), 0);
    }

    #[test]
    fn test_time_per_question_serde() {
        let t: TimePerQuestion = serde_json::from_str("45").unwrap();
        assert_eq!(t.secs(), 45);
        assert!(serde_json::from_str::<TimePerQuestion>("50").is_err());
    }
}
