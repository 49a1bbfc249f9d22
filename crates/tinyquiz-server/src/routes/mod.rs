//! HTTP route handlers for TinyQuiz.

use std::time::Duration;

use axum::{
    Router,
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::error::{ApiError, expose_error_details, json_error_bodies};
use crate::state::AppState;

mod auth;
mod quiz;
mod system;


/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let router = Router::new()
        .route("/", get(system::banner))
        .nest("/api", api_routes())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), expose_error_details))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(middleware::from_fn(json_error_bodies))
        .layer(cors_layer(&config.cors_origins))
        .with_state(state);

    if config.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & metadata
        .route("/health", get(system::health_check))
        .route("/ready", get(system::ready_check))
        .route("/docs", get(system::docs))
        .route("/providers", get(system::providers))

        .nest("/auth", auth_routes())
        .nest("/quiz", quiz_routes())
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/google", get(auth::google_login))
        .route("/google/callback", get(auth::google_callback))
        .route("/profile", get(auth::profile))
}

fn quiz_routes() -> Router<AppState> {
    Router::new()
        .route("/generate", post(quiz::generate_quiz))
        .route("/my-quizzes", get(quiz::my_quizzes))
        .route("/cleanup-expired", post(quiz::cleanup_expired))
        .route("/{id}", get(quiz::get_quiz).delete(quiz::delete_quiz))
        .route("/{id}/submit", post(quiz::submit_quiz))
        .route("/{id}/results", get(quiz::get_results))
        .route("/{id}/share", get(quiz::get_share))
}

async fn not_found() -> ApiError {
    ApiError::not_found("Endpoint not found")
}

/// Any origin when none are configured; credentials only with an explicit list
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim()) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Base URL of this API as seen by the caller
pub(crate) fn api_base(config: &AppConfig, headers: &HeaderMap) -> String {
    if let Some(ref url) = config.public_url {
        return url.trim_end_matches('/').to_string();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or(&config.listen_addr);
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("http");

    format!("{scheme}://{host}")
}
