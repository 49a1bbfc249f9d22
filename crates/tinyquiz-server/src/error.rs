//! HTTP error mapping.
//!
//! Every handler returns [`ApiError`] on failure, rendered as
//! `{"error": "..."}`. The internal cause travels in a response extension and
//! is added as `details` by [`expose_error_details`] in development only.

use axum::{
    Json,
    extract::{FromRequest, Request, State, rejection::JsonRejection},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use tinyquiz_common::QuizError;

use crate::config::Environment;
use crate::providers::ProviderError;
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

/// Internal cause attached to error responses
#[derive(Debug, Clone)]
struct ErrorDetails {
    message: String,
    details: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<QuizError> for ApiError {
    fn from(err: QuizError) -> Self {
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Client errors and configuration problems speak for themselves
        if err.is_client_error() {
            return Self::new(status, err.to_string());
        }
        if let QuizError::Config(message) = err {
            tracing::error!(error = %message, "Service misconfigured");
            return Self::new(status, message);
        }

        let message = match err {
            QuizError::Upstream(_) => "AI service temporarily unavailable. Please try again later.",
            QuizError::UpstreamTimeout(_) => {
                "Quiz generation timed out. Please try again with a simpler topic."
            }
            QuizError::InvalidGeneration(_) => "Failed to generate quiz. Please try again.",
            QuizError::Storage(_) => "Service temporarily unavailable",
            _ => "Internal server error",
        };

        tracing::error!(status = status.as_u16(), error = %err, "Request failed");
        Self::new(status, message).with_details(err.to_string())
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        QuizError::from(err).into()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        QuizError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid JSON body").with_details(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            details: None,
        };
        let mut response = (self.status, Json(body)).into_response();

        if let Some(details) = self.details {
            response.extensions_mut().insert(ErrorDetails {
                message: self.message,
                details,
            });
        }
        response
    }
}

/// Re-render error bodies with `details` when running in development
pub async fn expose_error_details(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    if state.config.environment != Environment::Development {
        return response;
    }

    match response.extensions().get::<ErrorDetails>().cloned() {
        Some(info) => {
            let body = ErrorBody {
                error: &info.message,
                details: Some(&info.details),
            };
            (response.status(), Json(body)).into_response()
        }
        None => response,
    }
}

/// Give bodiless error responses (timeouts, 405s) the `{"error": ...}` shape
pub async fn json_error_bodies(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();

    if !(status.is_client_error() || status.is_server_error())
        || response.headers().contains_key(header::CONTENT_TYPE)
    {
        return response;
    }

    let message = match status {
        StatusCode::REQUEST_TIMEOUT => "Request timed out. Please try again.",
        _ => status.canonical_reason().unwrap_or("Request failed"),
    };
    let mut rendered = ApiError::new(status, message).into_response();
    rendered.headers_mut().extend(
        response
            .headers()
            .iter()
            .filter(|(name, _)| **name != header::CONTENT_LENGTH)
            .map(|(name, value)| (name.clone(), value.clone())),
    );
    rendered
}

/// `Json` extractor whose rejections use the API error shape
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);
