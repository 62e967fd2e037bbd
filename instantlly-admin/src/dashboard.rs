//! Dashboard view: platform stats, user growth, the user table, deletion and
//! CSV exports.

use crate::backend::AdminBackend;
use chrono::{DateTime, Utc};
use instantlly_api::models::{GrowthPoint, StatsSummary, User, UserPage};
use serde::Deserialize;
use tracing::{error, info, warn};

/// Users shown per page.
pub const USERS_PER_PAGE: u32 = 50;

/// Days covered by the growth chart.
pub const GROWTH_WINDOW_DAYS: u32 = 30;

/// Dashboard query string: `?page=2&search=asha`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct DashboardQuery {
    pub page: Option<u32>,
    pub search: Option<String>,
}

impl DashboardQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn search(&self) -> &str {
        self.search.as_deref().map(str::trim).unwrap_or("")
    }

    /// A new search always starts again from the first page.
    pub fn with_search(&self, search: impl Into<String>) -> Self {
        Self {
            page: Some(1),
            search: Some(search.into()),
        }
    }

    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page: Some(page.max(1)),
            search: self.search.clone(),
        }
    }

    /// Query string for links back to this view, without the leading `?`.
    pub fn to_query_string(&self) -> String {
        let mut qs = format!("page={}", self.page());
        if !self.search().is_empty() {
            qs.push_str("&search=");
            qs.push_str(&urlencoding::encode(self.search()));
        }
        qs
    }
}

/// Everything the dashboard page shows.
#[derive(Debug, Clone)]
pub struct DashboardData {
    pub stats: StatsSummary,
    pub growth: Vec<GrowthPoint>,
    pub users: Vec<User>,
    pub page: u32,
    pub total_pages: u32,
    pub search: String,
}

#[derive(Debug, Clone)]
pub enum DashboardLoad {
    Ready(DashboardData),
    /// Stats could not be loaded; the page offers a retry instead.
    Unavailable { error: String },
}

/// Fetch stats, growth and one page of users concurrently.
///
/// Growth and user failures degrade to empty sections. Without stats the
/// backend is considered unreachable.
pub async fn load_dashboard(backend: &dyn AdminBackend, query: &DashboardQuery) -> DashboardLoad {
    let page = query.page();
    let search = query.search();

    let (stats, growth, users) = tokio::join!(
        backend.stats(),
        backend.user_growth(GROWTH_WINDOW_DAYS),
        backend.users(page, USERS_PER_PAGE, search),
    );

    let growth = growth.unwrap_or_else(|e| {
        error!("Failed to fetch user growth: {}", e);
        Vec::new()
    });

    let users = users.unwrap_or_else(|e| {
        error!(page, search, "Failed to fetch users: {}", e);
        UserPage::default()
    });

    match stats {
        Ok(stats) => DashboardLoad::Ready(DashboardData {
            stats,
            growth,
            users: users.users,
            page,
            total_pages: users.pagination.total_pages.max(1),
            search: search.to_string(),
        }),
        Err(e) => {
            error!("Failed to fetch stats: {}", e);
            DashboardLoad::Unavailable {
                error: e.to_string(),
            }
        }
    }
}

/// Operator's answer on the deletion confirmation page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

impl Confirmation {
    pub fn from_form(value: Option<&str>) -> Self {
        match value {
            Some("yes") => Confirmation::Confirmed,
            _ => Confirmation::Declined,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DeleteOutcome {
    /// Declined; nothing was sent to the backend.
    Cancelled,
    /// Deleted; the dashboard was reloaded afterwards.
    Deleted { notice: String, dashboard: DashboardLoad },
    Failed { error: String },
}

/// Warning shown before deleting a user.
pub fn deletion_warning(user_name: &str) -> Vec<String> {
    vec![
        format!("Are you sure you want to delete user \"{user_name}\"?"),
        "This will permanently delete:".to_string(),
        "The user account".to_string(),
        "All their cards".to_string(),
        "All their contacts".to_string(),
        "All their messages".to_string(),
        "All their notifications".to_string(),
        "All related data".to_string(),
        "This action CANNOT be undone!".to_string(),
    ]
}

/// Delete a user once confirmed, then reload users and stats.
pub async fn delete_user(
    backend: &dyn AdminBackend,
    user_id: &str,
    user_name: &str,
    confirmation: Confirmation,
    query: &DashboardQuery,
) -> DeleteOutcome {
    if confirmation == Confirmation::Declined {
        return DeleteOutcome::Cancelled;
    }

    if let Err(e) = backend.delete_user(user_id).await {
        error!(user_id, "Failed to delete user: {}", e);
        return DeleteOutcome::Failed {
            error: e.to_string(),
        };
    }
    info!(user_id, user_name, "Deleted user");

    DeleteOutcome::Deleted {
        notice: format!("User \"{user_name}\" has been deleted successfully!"),
        dashboard: load_dashboard(backend, query).await,
    }
}

/// CSV export offered by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportKind {
    AllUsers,
    PhoneNumbers,
    UserContacts { user_id: String, user_name: String },
}

impl ExportKind {
    /// Download name, stamped with milliseconds since the epoch.
    pub fn filename(&self, now: DateTime<Utc>) -> String {
        let stamp = now.timestamp_millis();
        match self {
            ExportKind::AllUsers => format!("users-{stamp}.csv"),
            ExportKind::PhoneNumbers => format!("phone-numbers-{stamp}.csv"),
            ExportKind::UserContacts { user_name, .. } => {
                format!("{}-contacts-{stamp}.csv", filename_safe(user_name))
            }
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            ExportKind::AllUsers => "Failed to export users. Please try again.",
            ExportKind::PhoneNumbers => "Failed to export phone numbers. Please try again.",
            ExportKind::UserContacts { .. } => "Failed to export contacts. Please try again.",
        }
    }
}

/// A finished export ready to be sent as a download.
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub async fn run_export(
    backend: &dyn AdminBackend,
    kind: &ExportKind,
    now: DateTime<Utc>,
) -> instantlly_api::Result<CsvExport> {
    let bytes = match kind {
        ExportKind::AllUsers => backend.export_users().await,
        ExportKind::PhoneNumbers => backend.export_phones().await,
        ExportKind::UserContacts { user_id, .. } => backend.export_user_contacts(user_id).await,
    }
    .inspect_err(|e| warn!(?kind, "Export failed: {}", e))?;

    info!(?kind, bytes = bytes.len(), "Export ready");
    Ok(CsvExport {
        filename: kind.filename(now),
        bytes,
    })
}

/// Keep a user-supplied name usable inside a Content-Disposition header.
fn filename_safe(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '"' | '/' | '\\' | ';' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{FakeBackend, user};
    use chrono::TimeZone;

    #[test]
    fn test_search_resets_page() {
        let query = DashboardQuery {
            page: Some(4),
            search: Some("old".to_string()),
        };
        let next = query.with_search("asha");
        assert_eq!(next.page(), 1);
        assert_eq!(next.search(), "asha");
        assert_eq!(query.with_page(0).page(), 1);
    }

    #[test]
    fn test_query_string_encodes_search() {
        let query = DashboardQuery::default().with_search("a b&c");
        assert_eq!(query.to_query_string(), "page=1&search=a%20b%26c");
        assert_eq!(DashboardQuery::default().to_query_string(), "page=1");
    }

    #[tokio::test]
    async fn test_load_fetches_all_three_sections() {
        let backend = FakeBackend::with_users(vec![user("1", "Asha"), user("2", "Ravi")]);
        let query = DashboardQuery {
            page: Some(2),
            search: Some("Asha".to_string()),
        };

        let DashboardLoad::Ready(data) = load_dashboard(&backend, &query).await else {
            panic!("dashboard should load");
        };
        assert_eq!(data.users.len(), 1);
        assert_eq!(data.page, 2);
        assert_eq!(data.total_pages, 3);
        assert_eq!(data.growth.len(), 2);

        let calls = backend.calls();
        assert!(calls.contains(&"stats".to_string()));
        assert!(calls.contains(&"growth days=30".to_string()));
        assert!(calls.contains(&"users page=2 limit=50 search=Asha".to_string()));
    }

    #[tokio::test]
    async fn test_stats_failure_makes_dashboard_unavailable() {
        let backend = FakeBackend {
            fail_stats: true,
            ..Default::default()
        };
        match load_dashboard(&backend, &DashboardQuery::default()).await {
            DashboardLoad::Unavailable { error } => assert_eq!(error, "Stats unavailable"),
            DashboardLoad::Ready(_) => panic!("expected the retry prompt"),
        }
    }

    #[tokio::test]
    async fn test_growth_and_user_failures_render_empty() {
        let backend = FakeBackend {
            fail_growth: true,
            fail_users: true,
            ..FakeBackend::with_users(vec![user("1", "Asha")])
        };
        let DashboardLoad::Ready(data) = load_dashboard(&backend, &DashboardQuery::default()).await
        else {
            panic!("stats succeeded, dashboard should render");
        };
        assert!(data.growth.is_empty());
        assert!(data.users.is_empty());
        assert_eq!(data.total_pages, 1);
    }

    #[tokio::test]
    async fn test_declined_delete_makes_no_call() {
        let backend = FakeBackend::with_users(vec![user("1", "Asha")]);
        let outcome = delete_user(
            &backend,
            "1",
            "Asha",
            Confirmation::Declined,
            &DashboardQuery::default(),
        )
        .await;
        assert!(matches!(outcome, DeleteOutcome::Cancelled));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_delete_refetches_after_deleting() {
        let backend = FakeBackend::with_users(vec![user("1", "Asha"), user("2", "Ravi")]);
        let outcome = delete_user(
            &backend,
            "1",
            "Asha",
            Confirmation::Confirmed,
            &DashboardQuery::default(),
        )
        .await;

        let DeleteOutcome::Deleted { notice, dashboard } = outcome else {
            panic!("delete should succeed");
        };
        assert_eq!(notice, "User \"Asha\" has been deleted successfully!");
        let DashboardLoad::Ready(data) = dashboard else {
            panic!("dashboard should reload");
        };
        assert_eq!(data.users.len(), 1);
        assert_eq!(data.stats.total_users, 1);

        let calls = backend.calls();
        assert_eq!(calls[0], "delete 1");
        assert!(calls[1..].contains(&"stats".to_string()));
        assert!(calls[1..].iter().any(|c| c.starts_with("users ")));
    }

    #[tokio::test]
    async fn test_failed_delete_skips_refetch() {
        let backend = FakeBackend {
            fail_delete: true,
            ..FakeBackend::with_users(vec![user("1", "Asha")])
        };
        let outcome = delete_user(
            &backend,
            "1",
            "Asha",
            Confirmation::Confirmed,
            &DashboardQuery::default(),
        )
        .await;
        assert!(matches!(outcome, DeleteOutcome::Failed { .. }));
        assert_eq!(backend.calls(), vec!["delete 1".to_string()]);
    }

    #[test]
    fn test_confirmation_from_form() {
        assert_eq!(Confirmation::from_form(Some("yes")), Confirmation::Confirmed);
        assert_eq!(Confirmation::from_form(Some("no")), Confirmation::Declined);
        assert_eq!(Confirmation::from_form(None), Confirmation::Declined);
    }

    #[test]
    fn test_export_filenames() {
        let now = Utc.timestamp_millis_opt(1_717_000_000_123).unwrap();
        assert_eq!(ExportKind::AllUsers.filename(now), "users-1717000000123.csv");
        assert_eq!(
            ExportKind::PhoneNumbers.filename(now),
            "phone-numbers-1717000000123.csv"
        );
        let contacts = ExportKind::UserContacts {
            user_id: "42".to_string(),
            user_name: "Asha \"AK\" Kumar".to_string(),
        };
        assert_eq!(
            contacts.filename(now),
            "Asha _AK_ Kumar-contacts-1717000000123.csv"
        );
    }

    #[tokio::test]
    async fn test_export_uses_matching_endpoint() {
        let backend = FakeBackend::default();
        let now = Utc::now();
        let kind = ExportKind::UserContacts {
            user_id: "42".to_string(),
            user_name: "Asha".to_string(),
        };
        let export = run_export(&backend, &kind, now).await.unwrap();
        assert!(export.filename.starts_with("Asha-contacts-"));
        assert_eq!(backend.calls(), vec!["export contacts 42".to_string()]);
    }

    #[tokio::test]
    async fn test_export_failure_is_returned() {
        let backend = FakeBackend {
            fail_exports: true,
            ..Default::default()
        };
        let err = run_export(&backend, &ExportKind::PhoneNumbers, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Export failed");
    }
}
