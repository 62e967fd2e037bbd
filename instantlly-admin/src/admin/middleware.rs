//! Admin state and constants.

use crate::admin::auth::AdminAuthStore;
use crate::backend::{AdminBackend, WakeStatus};
use std::sync::Arc;

/// Cookie name for the session ID
pub const SESSION_COOKIE: &str = "instantlly_admin_session";

/// State shared by admin routes
pub struct AdminState {
    /// Operator credentials and live sessions
    pub auth_store: AdminAuthStore,
    /// InstantllyCards backend
    pub backend: Arc<dyn AdminBackend>,
    /// Last wake-up progress reported by the client
    pub wake_status: Arc<WakeStatus>,
}
