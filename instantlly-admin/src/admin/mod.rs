//! Web administration UI module.
//!
//! Provides:
//! - Operator authentication (argon2 password, in-memory sessions)
//! - Dashboard, user deletion and CSV export routes
//! - Feedback triage routes

pub mod auth;
pub mod middleware;
pub mod routes;
pub mod templates;

pub use auth::{AdminAuthStore, AuthContext, GuardOutcome};
pub use middleware::AdminState;
pub use routes::admin_router;
