//! Configuration management for the TinyQuiz server.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use tinyquiz_common::constants::{
    DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_FRONTEND_URL, DEFAULT_LISTEN_ADDR,
    DEFAULT_PROVIDER_TIMEOUT_SECS, DEFAULT_REDIS_URL, DEFAULT_TOKEN_TTL_SECS,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Storage backend
    #[serde(default)]
    pub storage: StorageBackend,

    /// Controls whether internal error details reach clients
    #[serde(default)]
    pub environment: Environment,

    /// Base URL of the web frontend (share links, OAuth redirects)
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Public base URL of this API; derived from the Host header when unset
    #[serde(default)]
    pub public_url: Option<String>,

    /// Allowed CORS origins (empty = any origin)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Upper bound on a single request, generation included
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Log every HTTP request
    #[serde(default = "default_true")]
    pub enable_request_logging: bool,

    /// Expiry sweep configuration
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Token issuance configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Google OAuth client (disabled when absent)
    #[serde(default)]
    pub google: Option<GoogleConfig>,

    /// Upstream AI providers
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Redis,
    /// Process-local store; data is lost on restart
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// Expiry sweep configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Seconds between sweeps
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
        }
    }
}

/// Token issuance configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Token validity in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// 32-byte ed25519 secret key file; an ephemeral key is used when unset
    #[serde(default)]
    pub signing_key_path: Option<String>,

    /// bcrypt cost for new password hashes
    #[serde(default = "default_password_cost")]
    pub password_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: default_token_ttl(),
            signing_key_path: None,
            password_cost: default_password_cost(),
        }
    }
}

/// Google OAuth client credentials
#[derive(Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Absolute callback URL registered with Google
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default = "default_google_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_google_token_url")]
    pub token_url: String,
    #[serde(default = "default_google_userinfo_url")]
    pub userinfo_url: String,
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

/// Both upstream providers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini: ProviderSettings,
    #[serde(default)]
    pub nvidia: ProviderSettings,
}

/// Settings for one upstream provider; available iff `api_key` is set
#[derive(Clone, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: None,
            timeout_secs: default_provider_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

// Default value functions
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_frontend_url() -> String { DEFAULT_FRONTEND_URL.to_string() }
fn default_request_timeout() -> u64 { 60 }
fn default_true() -> bool { true }
fn default_cleanup_interval() -> u64 { DEFAULT_CLEANUP_INTERVAL_SECS }
fn default_token_ttl() -> u64 { DEFAULT_TOKEN_TTL_SECS }
fn default_password_cost() -> u32 { bcrypt::DEFAULT_COST }
fn default_provider_timeout() -> u64 { DEFAULT_PROVIDER_TIMEOUT_SECS }
fn default_max_tokens() -> u32 { 2048 }
fn default_temperature() -> f64 { 0.7 }
fn default_google_auth_url() -> String { "https://accounts.google.com/o/oauth2/v2/auth".to_string() }
fn default_google_token_url() -> String { "https://oauth2.googleapis.com/token".to_string() }
fn default_google_userinfo_url() -> String { "https://www.googleapis.com/oauth2/v3/userinfo".to_string() }

impl AppConfig {
    /// Load configuration from file and `TINYQUIZ__*` variables, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut builder = config::Config::builder();

        if Path::new(config_path).exists() {
            builder = builder.add_source(config::File::with_name(config_path));
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("TINYQUIZ")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors_origins")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load config")?;

        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to parse config")?;

        // Apply CLI overrides
        if let Some(ref redis_url) = args.redis_url {
            config.redis_url = redis_url.clone();
        }
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(ref frontend_url) = args.frontend_url {
            config.frontend_url = frontend_url.clone();
        }
        if let Some(ref key) = args.gemini_api_key {
            config.providers.gemini.api_key = Some(key.clone());
        }
        if let Some(ref key) = args.nvidia_api_key {
            config.providers.nvidia.api_key = Some(key.clone());
        }
        if args.memory_store {
            config.storage = StorageBackend::Memory;
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            listen_addr: default_listen_addr(),
            storage: StorageBackend::default(),
            environment: Environment::default(),
            frontend_url: default_frontend_url(),
            public_url: None,
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
            enable_request_logging: true,
            cleanup: CleanupConfig::default(),
            auth: AuthConfig::default(),
            google: None,
            providers: ProvidersConfig::default(),
        }
    }
}
