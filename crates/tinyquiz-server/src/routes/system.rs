//! Health, readiness and metadata endpoints.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::providers::ProviderCatalogue;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    message: &'static str,
    timestamp: DateTime<Utc>,
    /// Seconds since start
    uptime: f64,
    environment: &'static str,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "TinyQuiz Backend is running",
        timestamp: Utc::now(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        environment: state.config.environment.as_str(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    store: &'static str,
}

/// Readiness check (is the store reachable?)
pub async fn ready_check(
    State(state): State<AppState>,
) -> Result<Json<ReadyResponse>, StatusCode> {
    match state.store.ping().await {
        Ok(()) => Ok(Json(ReadyResponse {
            status: "ready",
            store: state.store.backend(),
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

#[derive(Serialize)]
pub struct Endpoints {
    health: &'static str,
    ready: &'static str,
    docs: &'static str,
    providers: &'static str,
    auth: &'static str,
    quiz: &'static str,
}

#[derive(Serialize)]
pub struct DocsResponse {
    name: &'static str,
    version: &'static str,
    description: &'static str,
    endpoints: Endpoints,
}

/// API overview
pub async fn docs() -> Json<DocsResponse> {
    Json(DocsResponse {
        name: "TinyQuiz API",
        version: env!("CARGO_PKG_VERSION"),
        description: "Backend API for TinyQuiz application",
        endpoints: Endpoints {
            health: "/api/health",
            ready: "/api/ready",
            docs: "/api/docs",
            providers: "/api/providers",
            auth: "/api/auth",
            quiz: "/api/quiz",
        },
    })
}

#[derive(Serialize)]
pub struct ProvidersResponse {
    #[serde(flatten)]
    catalogue: ProviderCatalogue,
    message: &'static str,
}

/// AI providers and whether each is configured
pub async fn providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        catalogue: state.generator.catalogue(),
        message: "Available AI providers for quiz generation",
    })
}

#[derive(Serialize)]
pub struct BannerResponse {
    message: &'static str,
    version: &'static str,
    status: &'static str,
}

/// `GET /`
pub async fn banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: "TinyQuiz API",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}
