//! Authentication: password hashing, bearer tokens and Google sign-in.

mod google;
mod password;
mod token;

pub use google::{GoogleOAuth, resolve_user};
pub use password::{hash_password, verify_password};
pub use token::TokenService;

use axum::{extract::FromRequestParts, http::header, http::request::Parts};

use tinyquiz_common::{QuizError, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// Caller identified by a valid `Authorization: Bearer` token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| QuizError::Auth("Access denied. No token provided.".to_string()))?;

        let claims = state.tokens.verify(token).map_err(QuizError::from)?;

        Ok(Self {
            user_id: claims.user_id,
        })
    }
}
