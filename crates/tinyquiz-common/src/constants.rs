//! Shared constants for TinyQuiz components.

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";

/// Default frontend base URL used for share links and OAuth redirects
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:4200";

/// Fixed quiz lifetime (30 minutes)
pub const QUIZ_TTL_SECS: i64 = 30 * 60;

/// Maximum topic length in characters
pub const MAX_TOPIC_CHARS: usize = 200;

/// Bounds for the number of generated questions
pub const MIN_QUESTION_COUNT: usize = 1;
pub const MAX_QUESTION_COUNT: usize = 20;
pub const DEFAULT_QUESTION_COUNT: usize = 5;

/// Every question carries exactly this many options
pub const OPTION_COUNT: usize = 4;

/// Answer value meaning "left unanswered"
pub const UNANSWERED: i8 = -1;

/// Minimum password length for local accounts
pub const MIN_PASSWORD_CHARS: usize = 6;

/// Auth token validity (7 days)
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 3600;

/// OAuth `state` validity (10 minutes)
pub const OAUTH_STATE_TTL_SECS: u64 = 600;

/// Expiry sweep interval (1 hour)
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Upstream AI call timeout
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Pagination defaults for "my quizzes"
pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const MAX_PAGE_LIMIT: usize = 100;

/// Redis key prefixes
pub mod redis_keys {
    /// Quiz document: quiz:{quiz_id}
    pub const QUIZ_PREFIX: &str = "quiz:";

    /// Appended responses list: quiz:{quiz_id}:responses
    pub const RESPONSES_SUFFIX: &str = ":responses";

    /// Sorted set of quiz ids scored by expiry timestamp
    pub const QUIZ_EXPIRY: &str = "tinyquiz:quiz_expiry";

    /// Sorted set of a creator's quiz ids scored by creation: user:quizzes:{user_id}
    pub const USER_QUIZZES_PREFIX: &str = "user:quizzes:";

    /// User document: user:{user_id}
    pub const USER_PREFIX: &str = "user:";

    /// Email index: user:email:{email}
    pub const USER_EMAIL_PREFIX: &str = "user:email:";

    /// Google account index: user:google:{google_id}
    pub const USER_GOOGLE_PREFIX: &str = "user:google:";

    /// Pending OAuth state: oauth:state:{state}
    pub const OAUTH_STATE_PREFIX: &str = "oauth:state:";
}
