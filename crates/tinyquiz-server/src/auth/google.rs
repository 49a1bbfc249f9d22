//! Google OAuth 2.0 authorization-code flow.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::instrument;

use tinyquiz_common::{AuthProvider, QuizError, User, UserId};

use crate::config::GoogleConfig;
use crate::store::{normalize_email, QuizStore};

const HTTP_TIMEOUT_SECS: u64 = 15;

/// Profile fields read from the userinfo endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    /// Stable Google account id
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct GoogleOAuth {
    config: GoogleConfig,
    client: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(config: GoogleConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to build Google HTTP client")?;

        Ok(Self { config, client })
    }

    /// Configured callback, or the default path under `public_base`
    pub fn callback_url(&self, public_base: &str) -> String {
        self.config
            .callback_url
            .clone()
            .unwrap_or_else(|| format!("{}/api/auth/google/callback", public_base.trim_end_matches('/')))
    }

    /// Consent screen URL requesting the `profile` and `email` scopes
    pub fn authorize_url(&self, state: &str, callback_url: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.config.auth_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(callback_url),
            urlencoding::encode("profile email"),
            urlencoding::encode(state),
        )
    }

    /// Trade an authorization code for the signed-in user's profile
    #[instrument(skip(self, code))]
    pub async fn exchange(&self, code: &str, callback_url: &str) -> Result<GoogleProfile, QuizError> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", callback_url),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| QuizError::Upstream(format!("Google token exchange failed: {e}")))?;

        if !response.status().is_success() {
            return Err(QuizError::Upstream(format!(
                "Google token exchange returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| QuizError::Upstream(format!("Invalid Google token response: {e}")))?;

        let response = self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| QuizError::Upstream(format!("Google profile fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(QuizError::Upstream(format!(
                "Google profile fetch returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| QuizError::Upstream(format!("Invalid Google profile: {e}")))
    }
}

/// Find the account for a Google profile: by Google id, then by email
/// (linking it), else create a Google-only account
pub async fn resolve_user(store: &dyn QuizStore, profile: GoogleProfile) -> Result<User, QuizError> {
    if let Some(mut user) = store.user_by_google_id(&profile.sub).await? {
        user.name = profile.name;
        user.profile_picture = profile.picture;
        store.update_user(&user).await?;
        return Ok(user);
    }

    let email = profile
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| QuizError::Auth("Google account has no email address".to_string()))?;

    if let Some(mut user) = store.user_by_email(&email).await? {
        user.google_id = Some(profile.sub);
        user.name = profile.name;
        user.profile_picture = profile.picture;
        user.provider = AuthProvider::Google;
        store.update_user(&user).await?;
        tracing::info!(user_id = %user.id, "Linked Google account to existing user");
        return Ok(user);
    }

    let user = User {
        id: UserId::new(),
        email,
        password_hash: None,
        google_id: Some(profile.sub),
        name: profile.name,
        profile_picture: profile.picture,
        provider: AuthProvider::Google,
        created_at: chrono::Utc::now(),
    };
    store.insert_user(&user).await?;
    tracing::info!(user_id = %user.id, "Created Google user");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oauth(base: &str) -> GoogleOAuth {
        GoogleOAuth::new(GoogleConfig {
            client_id: "client-123".into(),
            client_secret: "shh".into(),
            callback_url: None,
            auth_url: format!("{base}/auth"),
            token_url: format!("{base}/token"),
            userinfo_url: format!("{base}/userinfo"),
        })
        .unwrap()
    }

    fn profile(sub: &str, email: &str) -> GoogleProfile {
        GoogleProfile {
            sub: sub.into(),
            email: Some(email.into()),
            name: Some("Ada".into()),
            picture: None,
        }
    }

    #[test]
    fn test_authorize_url() {
        let oauth = oauth("https://accounts.example");
        let callback = oauth.callback_url("http://localhost:5000/");
        assert_eq!(callback, "http://localhost:5000/api/auth/google/callback");

        let url = oauth.authorize_url("st4te", &callback);
        assert!(url.starts_with("https://accounts.example/auth?response_type=code&client_id=client-123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A5000%2Fapi%2Fauth%2Fgoogle%2Fcallback"));
        assert!(url.contains("scope=profile%20email"));
        assert!(url.ends_with("state=st4te"));
    }

    #[tokio::test]
    async fn test_exchange_code_for_profile() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.token",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("Authorization", "Bearer ya29.token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "10769150350006150715113082367",
                "email": "ada@example.com",
                "name": "Ada Lovelace",
                "picture": "https://example.com/ada.png"
            })))
            .mount(&server)
            .await;

        let profile = oauth(&server.uri())
            .exchange("abc", "http://localhost/cb")
            .await
            .unwrap();
        assert_eq!(profile.sub, "10769150350006150715113082367");
        assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn test_rejected_code_is_upstream_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid_grant"})))
            .mount(&server)
            .await;

        let err = oauth(&server.uri()).exchange("bad", "http://localhost/cb").await.unwrap_err();
        assert!(matches!(err, QuizError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_resolve_links_existing_email() {
        let store = MemoryStore::new();
        let local = User {
            id: UserId::new(),
            email: "ada@example.com".into(),
            password_hash: Some("hash".into()),
            google_id: None,
            name: None,
            profile_picture: None,
            provider: AuthProvider::Local,
            created_at: chrono::Utc::now(),
        };
        store.insert_user(&local).await.unwrap();

        let linked = resolve_user(&store, profile("g-1", "Ada@Example.com")).await.unwrap();
        assert_eq!(linked.id, local.id);
        assert_eq!(linked.provider, AuthProvider::Google);
        assert!(linked.password_hash.is_some());

        let again = resolve_user(&store, profile("g-1", "other@example.com")).await.unwrap();
        assert_eq!(again.id, local.id);
    }

    #[tokio::test]
    async fn test_resolve_creates_google_user() {
        let store = MemoryStore::new();
        let user = resolve_user(&store, profile("g-2", "new@example.com")).await.unwrap();
        assert_eq!(user.provider, AuthProvider::Google);
        assert!(user.password_hash.is_none());
        assert!(store.user_by_google_id("g-2").await.unwrap().is_some());
    }
}
