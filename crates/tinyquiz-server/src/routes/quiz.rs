//! Quiz generation, delivery, submission and creator endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tinyquiz_common::analytics::{self, OverallAnalytics, QuestionAnalytics};
use tinyquiz_common::constants::{
    DEFAULT_PAGE_LIMIT, DEFAULT_QUESTION_COUNT, MAX_PAGE_LIMIT, MAX_QUESTION_COUNT,
    MAX_TOPIC_CHARS, MIN_QUESTION_COUNT,
};
use tinyquiz_common::scoring::{self, QuestionResult};
use tinyquiz_common::{
    AiProvider, Difficulty, PublicQuestion, Quiz, QuizError, QuizId, QuizResponse, Score,
    TimePerQuestion, UserId,
};

use super::api_base;
use crate::auth::AuthUser;
use crate::error::{ApiError, AppJson};
use crate::providers::GenerationRequest;
use crate::share::{GeneratedSharing, QuizLinks};
use crate::state::AppState;

/// Fetch a quiz by its path parameter, rejecting malformed ids before any lookup
async fn load_quiz(state: &AppState, raw_id: &str) -> Result<Quiz, ApiError> {
    let id = QuizId::parse(raw_id)?;
    state
        .store
        .quiz(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Quiz not found"))
}

fn ensure_creator(quiz: &Quiz, user: &UserId, message: &str) -> Result<(), ApiError> {
    if quiz.is_owned_by(user) {
        Ok(())
    } else {
        tracing::warn!(quiz_id = %quiz.id, user_id = %user, "Non-creator access denied");
        Err(QuizError::Authorization(message.to_string()).into())
    }
}

fn links_for(state: &AppState, headers: &HeaderMap, id: &QuizId) -> QuizLinks {
    QuizLinks::new(&state.config.frontend_url, &api_base(&state.config, headers), id)
}

// === Generate ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    topic: Option<Value>,
    question_count: Option<Value>,
    provider: Option<String>,
    difficulty: Option<Value>,
    time_per_question: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    id: QuizId,
    topic: String,
    question_count: usize,
    ai_provider: AiProvider,
    ai_provider_name: &'static str,
    expires_at: DateTime<Utc>,
    message: String,
    sharing: GeneratedSharing,
}

fn validated_topic(raw: Option<&Value>) -> Result<String, QuizError> {
    let topic = raw
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            QuizError::Validation("Topic is required and must be a non-empty string".to_string())
        })?;

    if topic.chars().count() > MAX_TOPIC_CHARS {
        return Err(QuizError::Validation(format!(
            "Topic cannot exceed {MAX_TOPIC_CHARS} characters"
        )));
    }
    Ok(topic.to_string())
}

fn validated_question_count(raw: Option<&Value>) -> Result<usize, QuizError> {
    let out_of_range = || {
        QuizError::Validation(format!(
            "Question count must be between {MIN_QUESTION_COUNT} and {MAX_QUESTION_COUNT}"
        ))
    };

    match raw {
        None | Some(Value::Null) => Ok(DEFAULT_QUESTION_COUNT),
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| (MIN_QUESTION_COUNT..=MAX_QUESTION_COUNT).contains(n))
            .ok_or_else(out_of_range),
    }
}

/// `POST /api/quiz/generate`
pub async fn generate_quiz(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    AppJson(payload): AppJson<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateResponse>), ApiError> {
    let topic = validated_topic(payload.topic.as_ref())?;
    let question_count = validated_question_count(payload.question_count.as_ref())?;
    let provider = match payload.provider.as_deref() {
        Some(p) if !p.trim().is_empty() => p.parse::<AiProvider>()?,
        _ => AiProvider::default(),
    };
    let difficulty = Difficulty::parse_lenient(payload.difficulty.as_ref().and_then(Value::as_str));
    let time_per_question =
        TimePerQuestion::parse_lenient(payload.time_per_question.as_ref().and_then(Value::as_i64));

    let request = GenerationRequest {
        topic: topic.clone(),
        question_count,
        difficulty,
    };
    let questions = state.generator.generate(provider, &request).await?;

    let quiz = Quiz::new(
        auth.user_id,
        topic,
        questions,
        provider,
        difficulty,
        time_per_question,
        Utc::now(),
    );
    state.store.insert_quiz(&quiz).await?;

    tracing::info!(
        quiz_id = %quiz.id,
        provider = %provider,
        questions = quiz.question_count(),
        "Quiz created"
    );

    let links = links_for(&state, &headers, &quiz.id);
    Ok((
        StatusCode::CREATED,
        Json(GenerateResponse {
            id: quiz.id.clone(),
            question_count: quiz.question_count(),
            ai_provider: provider,
            ai_provider_name: provider.display_name(),
            expires_at: quiz.expires_at,
            message: format!("Quiz generated successfully using {}", provider.display_name()),
            sharing: GeneratedSharing::from(&links),
            topic: quiz.topic,
        }),
    ))
}

// === Public view ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuizView {
    id: QuizId,
    topic: String,
    questions: Vec<PublicQuestion>,
    question_count: usize,
    expires_at: DateTime<Utc>,
    /// Milliseconds until expiry
    time_remaining: i64,
    time_per_question: TimePerQuestion,
}

/// `GET /api/quiz/{id}`
pub async fn get_quiz(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicQuizView>, ApiError> {
    let quiz = load_quiz(&state, &id).await?;
    let now = Utc::now();

    if quiz.is_expired_at(now) {
        return Err(QuizError::Expired("Quiz has expired".to_string()).into());
    }

    Ok(Json(PublicQuizView {
        questions: quiz.public_questions(),
        question_count: quiz.question_count(),
        expires_at: quiz.expires_at,
        time_remaining: quiz.time_remaining_at(now).num_milliseconds(),
        time_per_question: quiz.time_per_question,
        topic: quiz.topic,
        id: quiz.id,
    }))
}

// === Submit ===

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    name: Option<Value>,
    answers: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    success: bool,
    score: Score,
    results: Vec<QuestionResult>,
    message: String,
}

/// `POST /api/quiz/{id}/submit`
pub async fn submit_quiz(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let quiz_id = QuizId::parse(&id)?;

    let name = payload
        .name
        .as_ref()
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            QuizError::Validation("Name is required and must be a non-empty string".to_string())
        })?
        .to_string();

    let raw_answers = payload
        .answers
        .as_ref()
        .and_then(Value::as_array)
        .ok_or_else(|| QuizError::Validation("Answers must be provided as an array".to_string()))?;

    let quiz = load_quiz(&state, quiz_id.as_str()).await?;
    let now = Utc::now();

    if quiz.is_expired_at(now) {
        return Err(QuizError::Expired(
            "Quiz has expired and no longer accepts submissions".to_string(),
        )
        .into());
    }

    if raw_answers.len() != quiz.question_count() {
        return Err(QuizError::InvalidAnswers {
            expected: quiz.question_count(),
            actual: raw_answers.len(),
        }
        .into());
    }

    let numeric = raw_answers
        .iter()
        .map(Value::as_i64)
        .collect::<Option<Vec<i64>>>()
        .ok_or_else(|| QuizError::Validation("Answers must be integers".to_string()))?;
    let answers = scoring::validate_answer_values(&numeric)?;
    let scorecard = scoring::score_submission(&quiz.questions, &answers)?;

    let response = QuizResponse {
        respondent_name: name,
        answers,
        score: scorecard.score,
        submitted_at: now,
    };
    if !state.store.append_response(&quiz.id, &response).await? {
        return Err(ApiError::not_found("Quiz not found"));
    }

    let score = scorecard.score;
    tracing::info!(
        quiz_id = %quiz.id,
        correct = score.correct,
        total = score.total,
        "Response recorded"
    );

    Ok(Json(SubmitResponse {
        success: true,
        score,
        results: scorecard.results,
        message: format!(
            "Quiz completed! You scored {} out of {} ({}%)",
            score.correct, score.total, score.percentage
        ),
    }))
}

// === Results ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsQuiz {
    id: QuizId,
    topic: String,
    /// Creator's email
    creator: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    question_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    quiz: ResultsQuiz,
    analytics: OverallAnalytics,
    question_analytics: Vec<QuestionAnalytics>,
    responses: Vec<QuizResponse>,
}

/// `GET /api/quiz/{id}/results`
pub async fn get_results(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ResultsResponse>, ApiError> {
    let quiz = load_quiz(&state, &id).await?;
    ensure_creator(&quiz, &auth.user_id, "Unauthorized - only quiz creator can view results")?;

    let creator = state.store.user(&quiz.creator_id).await?.map(|u| u.email);
    let analytics::QuizAnalytics {
        analytics,
        question_analytics,
    } = analytics::aggregate(&quiz.questions, &quiz.responses);

    Ok(Json(ResultsResponse {
        quiz: ResultsQuiz {
            question_count: quiz.question_count(),
            id: quiz.id,
            topic: quiz.topic,
            creator,
            created_at: quiz.created_at,
            expires_at: quiz.expires_at,
        },
        analytics,
        question_analytics,
        responses: quiz.responses,
    }))
}

// === Share ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareQuiz {
    id: QuizId,
    topic: String,
    question_count: usize,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    is_expired: bool,
    minutes_remaining: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareInstructions {
    teachers: &'static str,
    students: &'static str,
    mobile: &'static str,
    time_limit: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinks {
    quiz_url: String,
    api_url: String,
    qr_code: String,
    whatsapp_share: String,
    email_share: String,
    share_text: String,
    instructions: ShareInstructions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareStats {
    total_responses: usize,
    last_submission: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    quiz: ShareQuiz,
    sharing: ShareLinks,
    stats: ShareStats,
}

/// `GET /api/quiz/{id}/share`
pub async fn get_share(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ShareResponse>, ApiError> {
    let quiz = load_quiz(&state, &id).await?;
    ensure_creator(&quiz, &auth.user_id, "Unauthorized - only quiz creator can access sharing info")?;

    let now = Utc::now();
    let minutes_remaining = quiz.minutes_remaining_at(now);
    let count = quiz.question_count();
    let links = links_for(&state, &headers, &quiz.id);

    let sharing = ShareLinks {
        qr_code: links.qr_code(300),
        whatsapp_share: links.whatsapp(&quiz.topic),
        email_share: links.email(&quiz.topic, count),
        share_text: links.share_text(&quiz.topic, count, minutes_remaining),
        instructions: ShareInstructions {
            teachers: "Share any of these links with your students",
            students: "Students just need to click the link - no account required",
            mobile: "Show the QR code for easy mobile access",
            time_limit: format!("Quiz expires in {minutes_remaining} minutes"),
        },
        quiz_url: links.quiz_url,
        api_url: links.api_url,
    };

    Ok(Json(ShareResponse {
        stats: ShareStats {
            total_responses: quiz.responses.len(),
            last_submission: quiz.responses.last().map(|r| r.submitted_at),
        },
        quiz: ShareQuiz {
            is_expired: quiz.is_expired_at(now),
            question_count: count,
            id: quiz.id,
            topic: quiz.topic,
            created_at: quiz.created_at,
            expires_at: quiz.expires_at,
            minutes_remaining,
        },
        sharing,
    }))
}

// === My quizzes ===

#[derive(Debug, Deserialize)]
pub struct MyQuizzesQuery {
    page: Option<String>,
    limit: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    Active,
    Expired,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    id: QuizId,
    topic: String,
    question_count: usize,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    is_expired: bool,
    minutes_remaining: i64,
    response_count: usize,
    status: QuizStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    current_page: usize,
    total_pages: usize,
    total_quizzes: usize,
    has_next_page: bool,
    has_prev_page: bool,
    limit: usize,
}

#[derive(Debug, Serialize)]
pub struct MyQuizzesResponse {
    quizzes: Vec<QuizSummary>,
    pagination: Pagination,
}

fn parse_positive(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(default)
}

/// `GET /api/quiz/my-quizzes`
pub async fn my_quizzes(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<MyQuizzesQuery>,
) -> Result<Json<MyQuizzesResponse>, ApiError> {
    let page = parse_positive(query.page.as_deref(), 1);
    let limit = parse_positive(query.limit.as_deref(), DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
    let filter = match query.status.as_deref() {
        Some("active") => Some(QuizStatus::Active),
        Some("expired") => Some(QuizStatus::Expired),
        _ => None,
    };

    let now = Utc::now();
    let status_of = |quiz: &Quiz| {
        if quiz.expires_at > now {
            QuizStatus::Active
        } else {
            QuizStatus::Expired
        }
    };

    let matching: Vec<Quiz> = state
        .store
        .quizzes_by_creator(&auth.user_id)
        .await?
        .into_iter()
        .filter(|q| filter.is_none_or(|f| status_of(q) == f))
        .collect();

    let total_quizzes = matching.len();
    let total_pages = total_quizzes.div_ceil(limit);

    let quizzes = matching
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .map(|quiz| {
            let is_expired = quiz.is_expired_at(now);
            QuizSummary {
                question_count: quiz.question_count(),
                minutes_remaining: if is_expired { 0 } else { quiz.minutes_remaining_at(now) },
                response_count: quiz.responses.len(),
                status: if is_expired { QuizStatus::Expired } else { QuizStatus::Active },
                is_expired,
                created_at: quiz.created_at,
                expires_at: quiz.expires_at,
                id: quiz.id,
                topic: quiz.topic,
            }
        })
        .collect();

    Ok(Json(MyQuizzesResponse {
        quizzes,
        pagination: Pagination {
            current_page: page,
            total_pages,
            total_quizzes,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
            limit,
        },
    }))
}

// === Delete & cleanup ===

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    success: bool,
    message: &'static str,
}

/// `DELETE /api/quiz/{id}`
pub async fn delete_quiz(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let quiz = load_quiz(&state, &id).await?;
    ensure_creator(&quiz, &auth.user_id, "Unauthorized: Only the quiz creator can delete this quiz")?;

    state.store.delete_quiz(&quiz.id).await?;
    tracing::info!(quiz_id = %quiz.id, "Quiz deleted");

    Ok(Json(DeleteResponse {
        success: true,
        message: "Quiz successfully deleted",
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    success: bool,
    deleted_count: usize,
    message: String,
}

/// `POST /api/quiz/cleanup-expired`
pub async fn cleanup_expired(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<CleanupResponse>, ApiError> {
    let deleted_count = state
        .store
        .delete_expired(Utc::now(), Some(&auth.user_id))
        .await?;

    tracing::info!(user_id = %auth.user_id, deleted = deleted_count, "Creator cleanup");

    Ok(Json(CleanupResponse {
        success: true,
        deleted_count,
        message: format!("{deleted_count} expired quiz(es) have been removed"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_count_rules() {
        assert_eq!(validated_question_count(None).unwrap(), 5);
        assert_eq!(validated_question_count(Some(&json!(null))).unwrap(), 5);
        assert_eq!(validated_question_count(Some(&json!(20))).unwrap(), 20);
        assert!(validated_question_count(Some(&json!(0))).is_err());
        assert!(validated_question_count(Some(&json!(21))).is_err());
        assert!(validated_question_count(Some(&json!(-3))).is_err());
        assert!(validated_question_count(Some(&json!(2.5))).is_err());
    }

    #[test]
    fn test_topic_rules() {
        assert_eq!(validated_topic(Some(&json!("  Volcanoes "))).unwrap(), "Volcanoes");
        assert!(validated_topic(Some(&json!("   "))).is_err());
        assert!(validated_topic(Some(&json!(42))).is_err());
        assert!(validated_topic(None).is_err());
        assert!(validated_topic(Some(&json!("x".repeat(200)))).is_ok());
        assert!(validated_topic(Some(&json!("x".repeat(201)))).is_err());
    }

    #[test]
    fn test_page_parsing() {
        assert_eq!(parse_positive(None, 10), 10);
        assert_eq!(parse_positive(Some("3"), 1), 3);
        assert_eq!(parse_positive(Some("0"), 1), 1);
        assert_eq!(parse_positive(Some("abc"), 1), 1);
    }
}
