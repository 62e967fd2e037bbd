//! Admin route handlers.
//!
//! Provides HTTP handlers for the admin UI: login, logout, dashboard, user
//! deletion, CSV exports and feedback triage.

use crate::admin::auth::AuthContext;
use crate::admin::middleware::{AdminState, SESSION_COOKIE};
use crate::admin::templates::{
    BaseContext, ConfirmDeleteTemplate, ConnectionFailedTemplate, DashboardTemplate,
    ErrorTemplate, FeedbackTemplate, LoginTemplate,
};
use crate::dashboard::{
    self, Confirmation, DashboardLoad, DashboardQuery, DeleteOutcome, ExportKind,
};
use crate::feedback::{
    self, FeedbackListing, FeedbackQuery, FeedbackViewState, StatusFilter, UpdateOutcome,
};
use askama::Template;
use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use instantlly_api::models::FeedbackStatus;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Build the admin router.
pub fn admin_router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/login", get(login_page))
        .route("/login", post(login_submit))
        .route("/logout", post(logout))
        .route("/dashboard", get(dashboard))
        .route("/users/{user_id}/delete", get(confirm_delete))
        .route("/users/{user_id}/delete", post(delete_submit))
        .route("/users/{user_id}/contacts/export", get(export_contacts))
        .route("/export/users", get(export_users))
        .route("/export/phones", get(export_phones))
        .route("/feedback", get(feedback_page))
        .route("/feedback/{feedback_id}/status", post(feedback_update))
        .route("/wake-status", get(wake_status))
        .with_state(state)
}

/// Check session and return the caller's identity if authenticated.
async fn check_auth(state: &AdminState, jar: &CookieJar) -> Option<AuthContext> {
    let session_id = jar.get(SESSION_COOKIE).map(|c| c.value());
    state
        .auth_store
        .check(session_id, Utc::now())
        .await
        .into_context()
}

fn render(template: impl Template) -> Response {
    Html(
        template
            .render()
            .unwrap_or_else(|e| format!("Template error: {e}")),
    )
    .into_response()
}

async fn base(state: &AdminState, ctx: &AuthContext, active: &'static str) -> BaseContext {
    BaseContext {
        username: ctx.username.clone(),
        active,
        waking: state.wake_status.latest().await.map(|p| p.message),
    }
}

/// Login page handler.
async fn login_page(State(state): State<Arc<AdminState>>, jar: CookieJar) -> Response {
    if check_auth(&state, &jar).await.is_some() {
        return Redirect::to("/admin/dashboard").into_response();
    }
    render(LoginTemplate { error: None })
}

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

/// Login form submission handler.
async fn login_submit(State(state): State<Arc<AdminState>>, Form(form): Form<LoginForm>) -> Response {
    let Some(session_id) = state
        .auth_store
        .authenticate(&form.username, &form.password, Utc::now())
        .await
    else {
        return render(LoginTemplate {
            error: Some("Invalid username or password".to_string()),
        });
    };

    let cookie = format!(
        "{SESSION_COOKIE}={session_id}; Path=/admin; HttpOnly; SameSite=Strict; Max-Age={}",
        state.auth_store.timeout().num_seconds()
    );

    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/admin/dashboard".to_string()),
            (header::SET_COOKIE, cookie),
        ],
    )
        .into_response()
}

/// Logout handler.
async fn logout(State(state): State<Arc<AdminState>>, jar: CookieJar) -> Response {
    if let Some(ctx) = check_auth(&state, &jar).await {
        state.auth_store.delete_session(&ctx.session_id).await;
        info!(username = %ctx.username, "Admin logged out");
    }

    let cookie = format!("{SESSION_COOKIE}=; Path=/admin; HttpOnly; SameSite=Strict; Max-Age=0");

    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/admin/login".to_string()),
            (header::SET_COOKIE, cookie),
        ],
    )
        .into_response()
}

/// Dashboard handler.
async fn dashboard(
    State(state): State<Arc<AdminState>>,
    jar: CookieJar,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let Some(ctx) = check_auth(&state, &jar).await else {
        return Redirect::to("/admin/login").into_response();
    };

    let load = dashboard::load_dashboard(state.backend.as_ref(), &query).await;
    render_dashboard(base(&state, &ctx, "dashboard").await, load, &query, None)
}

fn render_dashboard(
    base: BaseContext,
    load: DashboardLoad,
    query: &DashboardQuery,
    notice: Option<String>,
) -> Response {
    match load {
        DashboardLoad::Ready(data) => render(DashboardTemplate::new(base, &data, notice)),
        DashboardLoad::Unavailable { error } => (
            StatusCode::SERVICE_UNAVAILABLE,
            render(ConnectionFailedTemplate {
                base,
                error,
                retry_href: format!("/admin/dashboard?{}", query.to_query_string()),
            }),
        )
            .into_response(),
    }
}

/// Deletion parameters; `page` and `search` bring the operator back to the
/// same dashboard page.
#[derive(Deserialize)]
pub struct DeleteParams {
    confirm: Option<String>,
    #[serde(default)]
    name: String,
    page: Option<u32>,
    search: Option<String>,
}

impl DeleteParams {
    fn query(&self) -> DashboardQuery {
        DashboardQuery {
            page: self.page,
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
        }
    }

    fn user_name<'a>(&'a self, user_id: &'a str) -> &'a str {
        if self.name.trim().is_empty() {
            user_id
        } else {
            &self.name
        }
    }
}

/// Deletion confirmation page.
async fn confirm_delete(
    State(state): State<Arc<AdminState>>,
    jar: CookieJar,
    Path(user_id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Response {
    let Some(ctx) = check_auth(&state, &jar).await else {
        return Redirect::to("/admin/login").into_response();
    };

    let query = params.query();
    let user_name = params.user_name(&user_id).to_string();
    render(ConfirmDeleteTemplate {
        base: base(&state, &ctx, "dashboard").await,
        action: format!("/admin/users/{}/delete", urlencoding::encode(&user_id)),
        warning: dashboard::deletion_warning(&user_name),
        user_name,
        page: query.page(),
        search: query.search().to_string(),
    })
}

/// Deletion form submission; "no" goes straight back without touching the backend.
async fn delete_submit(
    State(state): State<Arc<AdminState>>,
    jar: CookieJar,
    Path(user_id): Path<String>,
    Form(params): Form<DeleteParams>,
) -> Response {
    let Some(ctx) = check_auth(&state, &jar).await else {
        return Redirect::to("/admin/login").into_response();
    };

    let query = params.query();
    let outcome = dashboard::delete_user(
        state.backend.as_ref(),
        &user_id,
        params.user_name(&user_id),
        Confirmation::from_form(params.confirm.as_deref()),
        &query,
    )
    .await;

    match outcome {
        DeleteOutcome::Cancelled => {
            Redirect::to(&format!("/admin/dashboard?{}", query.to_query_string())).into_response()
        }
        DeleteOutcome::Deleted { notice, dashboard } => {
            let base = base(&state, &ctx, "dashboard").await;
            render_dashboard(base, dashboard, &query, Some(notice))
        }
        DeleteOutcome::Failed { error } => (
            StatusCode::BAD_GATEWAY,
            render(ErrorTemplate {
                base: base(&state, &ctx, "dashboard").await,
                title: "Failed to delete user. Please try again.".to_string(),
                message: error,
                back_href: format!("/admin/dashboard?{}", query.to_query_string()),
            }),
        )
            .into_response(),
    }
}

async fn export_users(State(state): State<Arc<AdminState>>, jar: CookieJar) -> Response {
    export(&state, &jar, ExportKind::AllUsers).await
}

async fn export_phones(State(state): State<Arc<AdminState>>, jar: CookieJar) -> Response {
    export(&state, &jar, ExportKind::PhoneNumbers).await
}

#[derive(Deserialize)]
pub struct ExportContactsQuery {
    #[serde(default)]
    name: String,
}

async fn export_contacts(
    State(state): State<Arc<AdminState>>,
    jar: CookieJar,
    Path(user_id): Path<String>,
    Query(query): Query<ExportContactsQuery>,
) -> Response {
    let user_name = if query.name.trim().is_empty() {
        user_id.clone()
    } else {
        query.name
    };
    export(&state, &jar, ExportKind::UserContacts { user_id, user_name }).await
}

/// Send a CSV export as a download, or a blocking error page.
async fn export(state: &AdminState, jar: &CookieJar, kind: ExportKind) -> Response {
    let Some(ctx) = check_auth(state, jar).await else {
        return Redirect::to("/admin/login").into_response();
    };

    match dashboard::run_export(state.backend.as_ref(), &kind, Utc::now()).await {
        Ok(csv) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", csv.filename),
                ),
            ],
            csv.bytes,
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            render(ErrorTemplate {
                base: base(&state, &ctx, "dashboard").await,
                title: kind.failure_message().to_string(),
                message: e.to_string(),
                back_href: "/admin/dashboard".to_string(),
            }),
        )
            .into_response(),
    }
}

/// Feedback list handler.
async fn feedback_page(
    State(state): State<Arc<AdminState>>,
    jar: CookieJar,
    Query(query): Query<FeedbackQuery>,
) -> Response {
    let Some(ctx) = check_auth(&state, &jar).await else {
        return Redirect::to("/admin/login").into_response();
    };

    let view = FeedbackViewState::from_query(&query);
    let (listing, error) = match feedback::load_feedback(state.backend.as_ref(), &view).await {
        Ok(listing) => (listing, None),
        Err(e) => (FeedbackListing::default(), Some(e)),
    };
    let base = base(&state, &ctx, "feedback").await;
    render(FeedbackTemplate::new(base, &view, &listing, error, None))
}

#[derive(Deserialize)]
pub struct StatusForm {
    status: String,
    #[serde(default)]
    admin_response: Option<String>,
    #[serde(default)]
    filter: Option<String>,
    page: Option<u32>,
}

/// Status editor submission.
async fn feedback_update(
    State(state): State<Arc<AdminState>>,
    jar: CookieJar,
    Path(feedback_id): Path<String>,
    Form(form): Form<StatusForm>,
) -> Response {
    let Some(ctx) = check_auth(&state, &jar).await else {
        return Redirect::to("/admin/login").into_response();
    };

    let view = FeedbackViewState {
        filter: form
            .filter
            .as_deref()
            .and_then(|f| f.parse::<StatusFilter>().ok())
            .unwrap_or_default(),
        page: form.page.unwrap_or(1).max(1),
        editing: None,
    };

    let outcome = match form.status.parse::<FeedbackStatus>() {
        Ok(status) => {
            feedback::update_status(
                state.backend.as_ref(),
                &view,
                &feedback_id,
                status,
                form.admin_response,
            )
            .await
        }
        Err(e) => {
            warn!(%feedback_id, "Rejected status form: {}", e);
            UpdateOutcome::Rejected { error: e }
        }
    };

    match outcome {
        UpdateOutcome::Updated { listing } => {
            let (listing, error) = match listing {
                Ok(listing) => (listing, None),
                Err(e) => (FeedbackListing::default(), Some(e)),
            };
            render(FeedbackTemplate::new(
                base(&state, &ctx, "feedback").await,
                &view,
                &listing,
                error,
                Some("Feedback updated successfully".to_string()),
            ))
        }
        UpdateOutcome::Rejected { error } => {
            // Keep the editor open so the operator can try again.
            let view = view.open_editor(feedback_id);
            let listing = feedback::load_feedback(state.backend.as_ref(), &view)
                .await
                .unwrap_or_default();
            render(FeedbackTemplate::new(
                base(&state, &ctx, "feedback").await,
                &view,
                &listing,
                Some(error),
                None,
            ))
        }
    }
}

/// Latest wake-up progress as JSON, `null` when the backend never slept.
async fn wake_status(State(state): State<Arc<AdminState>>, jar: CookieJar) -> Response {
    if check_auth(&state, &jar).await.is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(state.wake_status.latest().await).into_response()
}
