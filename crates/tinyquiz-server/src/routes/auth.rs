//! Account endpoints: local register/login, Google sign-in, profile.

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use tinyquiz_common::constants::{MIN_PASSWORD_CHARS, OAUTH_STATE_TTL_SECS};
use tinyquiz_common::{AuthProvider, QuizError, User, UserId, UserProfile};

use super::api_base;
use crate::auth::{AuthUser, hash_password, resolve_user, verify_password};
use crate::error::{ApiError, AppJson};
use crate::state::AppState;
use crate::store::normalize_email;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    token: String,
    user: UserProfile,
}

/// Loose `local@domain.tld` shape check
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };

    let word = |s: &str| {
        !s.is_empty()
            && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+'))
            && !s.starts_with('.')
            && !s.ends_with('.')
    };

    word(local)
        && word(host)
        && (2..=6).contains(&tld.len())
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Credentials>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let email = normalize_email(payload.email.as_deref().unwrap_or_default());
    let password = payload.password.unwrap_or_default();

    let mut problems = Vec::new();
    if email.is_empty() {
        problems.push("Email is required".to_string());
    } else if !is_valid_email(&email) {
        problems.push("Please enter a valid email".to_string());
    }
    if password.is_empty() {
        problems.push("Password is required".to_string());
    } else if password.chars().count() < MIN_PASSWORD_CHARS {
        problems.push(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters long"
        ));
    }
    if !problems.is_empty() {
        return Err(QuizError::Validation(problems.join(", ")).into());
    }

    let cost = state.config.auth.password_cost;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| QuizError::Internal(format!("Password hashing task failed: {e}")))?
        .map_err(|e| QuizError::Internal(format!("Password hashing failed: {e}")))?;

    let user = User {
        id: UserId::new(),
        email,
        password_hash: Some(password_hash),
        google_id: None,
        name: None,
        profile_picture: None,
        provider: AuthProvider::Local,
        created_at: Utc::now(),
    };
    state.store.insert_user(&user).await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: state.tokens.issue(&user.id),
            user: user.profile(),
        }),
    ))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Credentials>,
) -> Result<Json<AuthResponse>, ApiError> {
    let invalid = || ApiError::from(QuizError::Auth("Invalid credentials".to_string()));

    let email = normalize_email(payload.email.as_deref().unwrap_or_default());
    let password = payload.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(invalid());
    }

    let user = state.store.user_by_email(&email).await?.ok_or_else(invalid)?;
    let Some(stored) = user.password_hash.clone() else {
        // Google-only account
        return Err(invalid());
    };

    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| QuizError::Internal(format!("Password check task failed: {e}")))?;
    if !matches {
        tracing::debug!(user_id = %user.id, "Login rejected");
        return Err(invalid());
    }

    Ok(Json(AuthResponse {
        token: state.tokens.issue(&user.id),
        user: user.profile(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    user: UserProfile,
}

/// `GET /api/auth/profile`
pub async fn profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state
        .store
        .user(&auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ProfileResponse {
        user: user.profile(),
    }))
}

fn login_error(state: &AppState, code: &str) -> Redirect {
    Redirect::to(&format!(
        "{}/login?error={code}",
        state.config.frontend_url.trim_end_matches('/')
    ))
}

/// `GET /api/auth/google`
pub async fn google_login(State(state): State<AppState>, headers: HeaderMap) -> Redirect {
    let Some(google) = state.google.as_ref() else {
        return login_error(&state, "oauth_unavailable");
    };

    let mut nonce = [0u8; 24];
    rand::rng().fill(&mut nonce);
    let oauth_state = URL_SAFE_NO_PAD.encode(nonce);

    if let Err(e) = state.store.put_oauth_state(&oauth_state, OAUTH_STATE_TTL_SECS).await {
        tracing::error!(error = %e, "Failed to persist OAuth state");
        return login_error(&state, "oauth_error");
    }

    let callback = google.callback_url(&api_base(&state.config, &headers));
    Redirect::to(&google.authorize_url(&oauth_state, &callback))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// `GET /api/auth/google/callback`
pub async fn google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let Some(google) = state.google.as_ref() else {
        return login_error(&state, "oauth_unavailable");
    };

    if let Some(ref reason) = query.error {
        tracing::info!(reason = %reason, "Google sign-in declined");
        return login_error(&state, "oauth_failed");
    }

    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return login_error(&state, "oauth_failed");
    };

    match state.store.take_oauth_state(&oauth_state).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("Unknown or expired OAuth state");
            return login_error(&state, "oauth_failed");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to check OAuth state");
            return login_error(&state, "oauth_error");
        }
    }

    let callback = google.callback_url(&api_base(&state.config, &headers));
    let profile = match google.exchange(&code, &callback).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(error = %e, "Google code exchange failed");
            return login_error(&state, "oauth_error");
        }
    };

    let user = match resolve_user(state.store.as_ref(), profile).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(error = %e, "Failed to resolve Google user");
            return login_error(&state, "oauth_error");
        }
    };

    let token = state.tokens.issue(&user.id);
    Redirect::to(&format!(
        "{}/auth-success?token={}",
        state.config.frontend_url.trim_end_matches('/'),
        urlencoding::encode(&token)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("first.last+quiz@mail.example.org"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@example.c"));
        assert!(!is_valid_email("ada@@example.com"));
    }
}
