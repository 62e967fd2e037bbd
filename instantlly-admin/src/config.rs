//! Configuration loading for the admin console.
//!
//! Loads configuration from TOML files and/or environment variables using figment.
//!
//! # Configuration Sources (in order of priority, lowest to highest)
//!
//! 1. Default values (from `#[serde(default)]` attributes)
//! 2. TOML config file (if provided)
//! 3. Environment variables (prefix: `INSTANTLLY_`, nested with `__`)
//!
//! # Environment Variable Naming
//!
//! - `INSTANTLLY_BACKEND__BASE_URL` → `backend.base_url`
//! - `INSTANTLLY_BACKEND__ADMIN_KEY` → `backend.admin_key`
//! - `INSTANTLLY_HTTP__LISTEN_ADDR` → `http.listen_addr`
//! - `INSTANTLLY_ADMIN__PASSWORD_HASH` → `admin.password_hash`

use crate::admin::auth::DEFAULT_SESSION_TIMEOUT_SECS;
use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use instantlly_api::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the admin console.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// InstantllyCards REST backend
    pub backend: BackendConfig,

    /// Admin console HTTP listener
    #[serde(default)]
    pub http: HttpConfig,

    /// Operator login
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Backend connection and cold-start recovery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// API base, including the `/api` prefix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Shared secret sent as `x-admin-key`.
    pub admin_key: String,

    /// Timeout for regular API calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for each wake-up health check.
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,

    /// Health checks before giving up on a sleeping backend.
    #[serde(default = "default_wake_attempts")]
    pub wake_attempts: u32,

    /// Pause between failed health checks.
    #[serde(default = "default_wake_retry_delay_secs")]
    pub wake_retry_delay_secs: u64,
}

fn default_base_url() -> String {
    "https://instantlly-cards-backend-6ki0.onrender.com/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_health_timeout_secs() -> u64 {
    90
}

fn default_wake_attempts() -> u32 {
    3
}

fn default_wake_retry_delay_secs() -> u64 {
    5
}

impl BackendConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            health_timeout: Duration::from_secs(self.health_timeout_secs),
            wake_attempts: self.wake_attempts,
            retry_delay: Duration::from_secs(self.wake_retry_delay_secs),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    /// Address to listen on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

/// Operator account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,

    /// Argon2 hash from `instantlly-admin hash-password`.
    #[serde(default)]
    pub password_hash: Option<String>,

    /// Session lifetime in seconds (default: 24 hours)
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password_hash: None,
            session_timeout_secs: default_session_timeout_secs(),
        }
    }
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_session_timeout_secs() -> u64 {
    DEFAULT_SESSION_TIMEOUT_SECS
}

impl AdminConfig {
    /// Session lifetime; must be positive and fit a chrono duration.
    pub fn session_timeout(&self) -> Result<chrono::Duration> {
        let secs = i64::try_from(self.session_timeout_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .and_then(chrono::Duration::try_seconds);
        match secs {
            Some(timeout) => Ok(timeout),
            None => bail!(
                "admin.session_timeout_secs must be a positive number of seconds within range, got {}",
                self.session_timeout_secs
            ),
        }
    }

    /// The password hash, required to serve the console.
    pub fn require_password_hash(&self) -> Result<&str> {
        match self.password_hash.as_deref().map(str::trim) {
            Some(hash) if !hash.is_empty() => Ok(hash),
            _ => bail!(
                "admin.password_hash is not set; generate one with `instantlly-admin hash-password`"
            ),
        }
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables.
    ///
    /// Configuration sources are merged in order (later sources override earlier):
    /// 1. TOML config file (if it exists)
    /// 2. Environment variables (prefix: `INSTANTLLY_`, nested with `__`)
    ///
    /// # Example
    ///
    /// ```bash
    /// # Override the admin key via environment variable
    /// export INSTANTLLY_BACKEND__ADMIN_KEY=s3cret
    /// ```
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = Self::figment(path)
            .extract()
            .with_context(|| format!("Failed to load config from {} and environment", path.display()))?;
        config.admin.session_timeout()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        let mut figment = Figment::new();

        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("INSTANTLLY_").split("__"))
    }

    /// Get the default config file path
    /// - macOS: ~/Library/Application Support/instantlly-admin/config.toml
    /// - Linux: ~/.config/instantlly-admin/config.toml
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("instantlly-admin")
            .join("config.toml")
    }

    /// Get the default data directory (for logs)
    /// - macOS: ~/Library/Application Support/instantlly-admin/
    /// - Linux: ~/.local/share/instantlly-admin/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("instantlly-admin")
    }
}

/// Create a default configuration template
pub fn default_config_template() -> String {
    format!(
        r#"# InstantllyCards Admin Console Configuration

[backend]
base_url = "{base_url}"
# Shared admin key, sent as the x-admin-key header on every request
admin_key = "change-me"

# The backend host puts idle instances to sleep. A request that times out or
# cannot connect triggers a wake-up sequence against <origin>/health and is
# then replayed once.
request_timeout_secs = {request_timeout}
health_timeout_secs = {health_timeout}
wake_attempts = {wake_attempts}
wake_retry_delay_secs = {wake_delay}

[http]
listen_addr = "{listen_addr}"

[admin]
username = "admin"
# Run `instantlly-admin hash-password` and paste the result here
# password_hash = "$argon2id$v=19$..."
session_timeout_secs = {session_timeout}
"#,
        base_url = default_base_url(),
        request_timeout = default_request_timeout_secs(),
        health_timeout = default_health_timeout_secs(),
        wake_attempts = default_wake_attempts(),
        wake_delay = default_wake_retry_delay_secs(),
        listen_addr = default_listen_addr(),
        session_timeout = DEFAULT_SESSION_TIMEOUT_SECS,
    )
}
