//! Client for the InstantllyCards admin REST API.
//!
//! The backend runs on a host that puts idle instances to sleep, so every call
//! goes through [`ApiClient`], which recovers from timeouts and connection
//! failures by waking the server through its health endpoint and replaying the
//! request once. Application errors are returned to the caller untouched.

mod client;
pub mod models;
mod wake;

pub use client::{ApiClient, RequestSpec, ResponseBody};
pub use reqwest::{Method, StatusCode};
pub use wake::{RetryPolicy, WakePhase, WakeUpProgress};

/// Header carrying the shared admin key on every backend call.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request never produced a response (timeout, refused connection, DNS, ...)
    #[error("Backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a non-2xx status. `message` is taken verbatim from the body.
    #[error("{message}")]
    Api { status: StatusCode, message: String },

    /// Every health check attempt failed
    #[error(
        "Server wake-up failed after {attempts} attempt(s): {last_error}. \
         Please ensure the backend is deployed and running."
    )]
    WakeUpFailed { attempts: u32, last_error: String },

    /// Configured base URL is unusable
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    /// Response body did not match the expected shape
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Whether this failure should trigger the wake-up sequence.
    ///
    /// Only failures where no response was obtained qualify; any status code
    /// returned by the backend is an application answer.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// HTTP status for application errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Transport(e) => e.status(),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
