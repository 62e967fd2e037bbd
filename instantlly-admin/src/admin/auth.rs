//! Admin authentication: credentials and sessions.
//!
//! The console has a single operator account whose argon2 hash lives in the
//! config file. Sessions are kept in memory and expire a fixed time after
//! login; an expired or missing session sends the browser back to the login
//! page.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Admin session record
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub session_id: String,
    pub username: String,
    /// Login time; the session is valid until `issued_at + timeout`.
    pub issued_at: DateTime<Utc>,
}

/// Identity handed to protected views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub session_id: String,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Result of checking a request's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allowed(AuthContext),
    /// No cookie, or a session id the store does not know.
    Missing,
    /// Session existed but is older than the timeout; it has been removed.
    Expired,
}

impl GuardOutcome {
    pub fn into_context(self) -> Option<AuthContext> {
        match self {
            GuardOutcome::Allowed(ctx) => Some(ctx),
            _ => None,
        }
    }
}

/// In-memory storage for the admin credentials and live sessions.
pub struct AdminAuthStore {
    username: String,
    password_hash: String,
    timeout: Duration,
    sessions: RwLock<HashMap<String, AdminSession>>,
}

impl AdminAuthStore {
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            timeout,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Hash a password using Argon2id.
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Failed to hash password: {e}"))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a stored hash.
    pub fn verify_password(password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Generate a cryptographically secure session ID.
    fn generate_session_id() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect()
    }

    /// Check credentials and open a session stamped with `now`.
    ///
    /// Returns the session ID if authentication succeeds, None otherwise.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Option<String> {
        if username != self.username || !Self::verify_password(password, &self.password_hash) {
            info!(username, "Rejected admin login");
            return None;
        }

        let session_id = Self::generate_session_id();
        self.sessions.write().await.insert(
            session_id.clone(),
            AdminSession {
                session_id: session_id.clone(),
                username: username.to_string(),
                issued_at: now,
            },
        );
        info!(username, "Admin logged in");
        Some(session_id)
    }

    /// Decide whether a request carrying `session_id` may see protected views.
    ///
    /// A session is expired once strictly more than the timeout has elapsed
    /// since login. Expired sessions are dropped from the store.
    pub async fn check(&self, session_id: Option<&str>, now: DateTime<Utc>) -> GuardOutcome {
        let Some(session_id) = session_id.filter(|s| !s.is_empty()) else {
            return GuardOutcome::Missing;
        };

        let session = match self.sessions.read().await.get(session_id) {
            Some(s) => s.clone(),
            None => return GuardOutcome::Missing,
        };

        if now - session.issued_at > self.timeout {
            debug!(username = %session.username, "Admin session expired");
            self.sessions.write().await.remove(session_id);
            return GuardOutcome::Expired;
        }

        GuardOutcome::Allowed(AuthContext {
            expires_at: session.issued_at + self.timeout,
            session_id: session.session_id,
            username: session.username,
            issued_at: session.issued_at,
        })
    }

    /// Delete a session (logout).
    pub async fn delete_session(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// Drop every session past its timeout (background cleanup task).
    pub async fn cleanup_expired_sessions(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| now - s.issued_at <= self.timeout);
        before - sessions.len()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
