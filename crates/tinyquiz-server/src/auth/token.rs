//! Signed bearer tokens.
//!
//! Token format: base64(user_id:expiry:signature), where the signature is
//! ed25519 over `user_id:expiry`.
//!
//! - Tokens carry their own expiry (7 days by default)
//! - Only this server's signing key can issue them
//! - A key loaded from `auth.signing_key_path` survives restarts; the
//!   ephemeral fallback invalidates all tokens on restart

use anyhow::{Context, Result, bail};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;

use tinyquiz_common::{QuizError, UserId};

use crate::config::AuthConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid token")]
    Malformed,

    #[error("Invalid token")]
    BadSignature,

    #[error("Token expired")]
    Expired,
}

impl From<TokenError> for QuizError {
    fn from(err: TokenError) -> Self {
        QuizError::Auth(err.to_string())
    }
}

/// Verified token contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: UserId,
}

/// Issues and validates bearer tokens
pub struct TokenService {
    token_ttl_secs: u64,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let signing_key = if let Some(ref path) = config.signing_key_path {
            let key_bytes = std::fs::read(path).context("Failed to read signing key file")?;

            if key_bytes.len() != 32 {
                bail!("Invalid signing key length (expected 32 bytes)");
            }

            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(&key_bytes);
            SigningKey::from_bytes(&bytes)
        } else {
            use rand_core::OsRng;
            tracing::warn!("Using ephemeral token signing key (tokens invalidated on restart)");
            SigningKey::generate(&mut OsRng)
        };

        Ok(Self {
            token_ttl_secs: config.token_ttl_secs,
            verifying_key: signing_key.verifying_key(),
            signing_key,
        })
    }

    pub fn issue(&self, user_id: &UserId) -> String {
        self.issue_at(user_id, chrono::Utc::now().timestamp())
    }

    fn issue_at(&self, user_id: &UserId, now: i64) -> String {
        let expiry = now + self.token_ttl_secs as i64;
        let payload = format!("{}:{}", user_id, expiry);
        let signature = self.signing_key.sign(payload.as_bytes());

        let token = format!("{}:{}", payload, URL_SAFE_NO_PAD.encode(signature.to_bytes()));

        tracing::debug!(user_id = %user_id, expiry = expiry, "Issued auth token");

        URL_SAFE_NO_PAD.encode(token.as_bytes())
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<TokenClaims, TokenError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| TokenError::Malformed)?;
        let token_str = String::from_utf8(decoded).map_err(|_| TokenError::Malformed)?;

        // Parse: user_id:expiry:signature
        let parts: Vec<&str> = token_str.split(':').collect();
        let [user_id, expiry, sig_b64] = parts.as_slice() else {
            return Err(TokenError::Malformed);
        };

        let user_id = UserId::parse(user_id).map_err(|_| TokenError::Malformed)?;
        let expiry: i64 = expiry.parse().map_err(|_| TokenError::Malformed)?;

        let sig_bytes = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::Malformed)?;
        let sig_array: [u8; 64] = sig_bytes
            .as_slice()
            .try_into()
            .map_err(|_| TokenError::Malformed)?;
        let signature = Signature::from_bytes(&sig_array);

        let payload = format!("{}:{}", user_id, expiry);
        self.verifying_key
            .verify(payload.as_bytes(), &signature)
            .map_err(|_| TokenError::BadSignature)?;

        if expiry < now {
            return Err(TokenError::Expired);
        }

        Ok(TokenClaims { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&AuthConfig::default()).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let service = service();
        let user = UserId::new();
        let claims = service.verify(&service.issue(&user)).unwrap();
        assert_eq!(claims.user_id, user);
    }

    #[test]
    fn test_expired_token() {
        let service = service();
        let user = UserId::new();
        let token = service.issue_at(&user, 1_000);
        assert_eq!(service.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let token = service().issue(&UserId::new());
        assert_eq!(service().verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let service = service();
        let token = service.issue(&UserId::new());
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&token).unwrap()).unwrap();
        let sig = decoded.rsplit(':').next().unwrap();
        let forged = format!("{}:{}:{}", UserId::new(), i64::MAX, sig);
        let forged = URL_SAFE_NO_PAD.encode(forged.as_bytes());
        assert_eq!(service.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_garbage_rejected() {
        let service = service();
        assert_eq!(service.verify("not a token!"), Err(TokenError::Malformed));
        let three_parts = URL_SAFE_NO_PAD.encode("a:b");
        assert_eq!(service.verify(&three_parts), Err(TokenError::Malformed));
    }
}
