//! HTTP server for the admin console.

use crate::admin::{AdminState, admin_router};
use anyhow::{Context, Result};
use axum::{Router, response::Redirect, routing::get};
use chrono::Utc;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// How often expired admin sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Build the HTTP router: the admin UI under `/admin`, with the bare
/// paths redirecting to the dashboard.
pub fn http_router(admin_state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/admin/dashboard") }))
        .route("/admin", get(|| async { Redirect::to("/admin/dashboard") }))
        .route("/admin/", get(|| async { Redirect::to("/admin/dashboard") }))
        .nest("/admin", admin_router(admin_state))
}

/// Periodically drop expired sessions so abandoned logins do not pile up.
pub fn spawn_session_sweeper(state: Arc<AdminState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = state.auth_store.cleanup_expired_sessions(Utc::now()).await;
            if removed > 0 {
                debug!("Removed {} expired admin sessions", removed);
            }
        }
    });
}

/// Serve the console on an already-bound listener until `shutdown` resolves.
pub async fn serve_on(
    listener: TcpListener,
    state: Arc<AdminState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr().context("Failed to read listener address")?;
    info!("Admin console listening on http://{}/admin", addr);

    axum::serve(listener, http_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Admin HTTP server failed")
}

/// Bind `listen_addr` and serve until Ctrl-C.
pub async fn run_http_server(listen_addr: SocketAddr, state: Arc<AdminState>) -> Result<()> {
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;

    spawn_session_sweeper(state.clone());

    serve_on(listener, state, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down admin console");
        }
    })
    .await
}
