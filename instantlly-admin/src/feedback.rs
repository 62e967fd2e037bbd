//! Feedback view: filtered, paginated list with a single-record status editor.

use crate::backend::AdminBackend;
use instantlly_api::models::{Feedback, FeedbackStatus};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::{error, info};

/// Records shown per page.
pub const FEEDBACK_PER_PAGE: u32 = 20;

/// Status filter of the list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(FeedbackStatus),
}

impl StatusFilter {
    pub const CHOICES: [StatusFilter; 5] = [
        StatusFilter::All,
        StatusFilter::Only(FeedbackStatus::Pending),
        StatusFilter::Only(FeedbackStatus::InProgress),
        StatusFilter::Only(FeedbackStatus::Resolved),
        StatusFilter::Only(FeedbackStatus::Closed),
    ];

    pub fn status(&self) -> Option<FeedbackStatus> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Only(s) => Some(*s),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Only(s) => s.as_str(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusFilter::All => "All",
            StatusFilter::Only(FeedbackStatus::Pending) => "Pending",
            StatusFilter::Only(FeedbackStatus::InProgress) => "In Progress",
            StatusFilter::Only(FeedbackStatus::Resolved) => "Resolved",
            StatusFilter::Only(FeedbackStatus::Closed) => "Closed",
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(StatusFilter::All),
            other => other.parse().map(StatusFilter::Only),
        }
    }
}

/// Feedback query string: `?status=pending&page=2&edit=<id>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub edit: Option<String>,
}

/// What the feedback page is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackViewState {
    pub filter: StatusFilter,
    pub page: u32,
    /// Record whose editor is open; at most one.
    pub editing: Option<String>,
}

impl Default for FeedbackViewState {
    fn default() -> Self {
        Self {
            filter: StatusFilter::All,
            page: 1,
            editing: None,
        }
    }
}

impl FeedbackViewState {
    /// Unknown filters fall back to "all".
    pub fn from_query(query: &FeedbackQuery) -> Self {
        Self {
            filter: query
                .status
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            page: query.page.unwrap_or(1).max(1),
            editing: query.edit.clone().filter(|id| !id.is_empty()),
        }
    }

    /// A filter change goes back to page 1 and closes any editor.
    pub fn with_filter(&self, filter: StatusFilter) -> Self {
        Self {
            filter,
            page: 1,
            editing: None,
        }
    }

    pub fn with_page(&self, page: u32) -> Self {
        Self {
            filter: self.filter,
            page: page.max(1),
            editing: None,
        }
    }

    /// Opening an editor replaces whichever one was open.
    pub fn open_editor(&self, feedback_id: impl Into<String>) -> Self {
        Self {
            editing: Some(feedback_id.into()),
            ..self.clone()
        }
    }

    pub fn close_editor(&self) -> Self {
        Self {
            editing: None,
            ..self.clone()
        }
    }

    pub fn is_editing(&self, feedback_id: &str) -> bool {
        self.editing.as_deref() == Some(feedback_id)
    }

    /// Link back to the feedback page in this state.
    pub fn href(&self) -> String {
        let mut href = format!("/admin/feedback?status={}&page={}", self.filter, self.page);
        if let Some(id) = &self.editing {
            href.push_str("&edit=");
            href.push_str(&urlencoding::encode(id));
        }
        href
    }
}

/// One page of feedback plus the summary counters.
#[derive(Debug, Clone, Default)]
pub struct FeedbackListing {
    pub items: Vec<Feedback>,
    /// Backend total for the current filter.
    pub total: u64,
    pub total_pages: u32,
    pub pending_on_page: usize,
    pub in_progress_on_page: usize,
    pub resolved_on_page: usize,
}

impl FeedbackListing {
    fn new(items: Vec<Feedback>, total: u64, total_pages: u32) -> Self {
        let count = |status| items.iter().filter(|f| f.status == status).count();
        Self {
            pending_on_page: count(FeedbackStatus::Pending),
            in_progress_on_page: count(FeedbackStatus::InProgress),
            resolved_on_page: count(FeedbackStatus::Resolved),
            items,
            total,
            total_pages: total_pages.max(1),
        }
    }
}

pub async fn load_feedback(
    backend: &dyn AdminBackend,
    state: &FeedbackViewState,
) -> Result<FeedbackListing, String> {
    match backend
        .feedback(state.page, FEEDBACK_PER_PAGE, state.filter.status())
        .await
    {
        Ok(page) if page.success => Ok(FeedbackListing::new(
            page.data,
            page.pagination.total,
            page.pagination.pages,
        )),
        Ok(_) => Err("Failed to fetch feedbacks".to_string()),
        Err(e) => {
            error!(filter = %state.filter, page = state.page, "Failed to fetch feedback: {}", e);
            Err(e.to_string())
        }
    }
}

/// Result of submitting the status editor.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// The backend accepted the change. `listing` is the reloaded page, or
    /// the error from reloading it.
    Updated {
        listing: Result<FeedbackListing, String>,
    },
    /// The backend refused the change; nothing was reloaded.
    Rejected { error: String },
}

/// Change one record's status, then reload the list.
///
/// The list is only refetched after the backend accepted the change. Blank
/// responses are not sent.
pub async fn update_status(
    backend: &dyn AdminBackend,
    state: &FeedbackViewState,
    feedback_id: &str,
    status: FeedbackStatus,
    admin_response: Option<String>,
) -> UpdateOutcome {
    let admin_response = admin_response
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    match backend
        .update_feedback_status(feedback_id, status, admin_response)
        .await
    {
        Ok(ack) if ack.success => {
            info!(feedback_id, %status, "Updated feedback status");
        }
        Ok(ack) => {
            return UpdateOutcome::Rejected {
                error: ack
                    .message
                    .unwrap_or_else(|| "Failed to update feedback".to_string()),
            };
        }
        Err(e) => {
            error!(feedback_id, %status, "Failed to update feedback: {}", e);
            return UpdateOutcome::Rejected {
                error: e.to_string(),
            };
        }
    }

    UpdateOutcome::Updated {
        listing: load_feedback(backend, state).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{FakeBackend, feedback};

    #[test]
    fn test_filter_parsing() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!("".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!(
            "in-progress".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(FeedbackStatus::InProgress)
        );
        assert!("archived".parse::<StatusFilter>().is_err());
        for filter in StatusFilter::CHOICES {
            assert_eq!(filter.as_str().parse::<StatusFilter>().unwrap(), filter);
        }
    }

    #[test]
    fn test_state_from_query() {
        let state = FeedbackViewState::from_query(&FeedbackQuery {
            status: Some("bogus".to_string()),
            page: Some(0),
            edit: Some(String::new()),
        });
        assert_eq!(state, FeedbackViewState {
            filter: StatusFilter::All,
            page: 1,
            editing: None,
        });
    }

    #[test]
    fn test_filter_change_resets_page_and_editor() {
        let state = FeedbackViewState {
            filter: StatusFilter::All,
            page: 3,
            editing: Some("f1".to_string()),
        };
        let next = state.with_filter(StatusFilter::Only(FeedbackStatus::Resolved));
        assert_eq!(next.page, 1);
        assert_eq!(next.editing, None);
        assert_eq!(next.filter.status(), Some(FeedbackStatus::Resolved));
    }

    #[test]
    fn test_single_editor_open() {
        let state = FeedbackViewState::default().open_editor("a").open_editor("b");
        assert!(state.is_editing("b"));
        assert!(!state.is_editing("a"));
        assert!(!state.close_editor().is_editing("b"));
    }

    #[test]
    fn test_href() {
        let state = FeedbackViewState {
            filter: StatusFilter::Only(FeedbackStatus::Pending),
            page: 2,
            editing: Some("abc".to_string()),
        };
        assert_eq!(state.href(), "/admin/feedback?status=pending&page=2&edit=abc");
    }

    #[tokio::test]
    async fn test_load_counts_statuses_on_page() {
        let backend = FakeBackend::with_feedback(vec![
            feedback("a", FeedbackStatus::Pending, None),
            feedback("b", FeedbackStatus::Pending, Some(4)),
            feedback("c", FeedbackStatus::Resolved, Some(5)),
            feedback("d", FeedbackStatus::Closed, Some(1)),
        ]);
        let listing = load_feedback(&backend, &FeedbackViewState::default())
            .await
            .unwrap();
        assert_eq!(listing.total, 4);
        assert_eq!(listing.pending_on_page, 2);
        assert_eq!(listing.in_progress_on_page, 0);
        assert_eq!(listing.resolved_on_page, 1);
        assert_eq!(backend.calls(), vec!["feedback page=1 limit=20 status=all".to_string()]);
    }

    #[tokio::test]
    async fn test_update_then_refetch() {
        let backend = FakeBackend::with_feedback(vec![feedback("a", FeedbackStatus::Pending, None)]);
        let state = FeedbackViewState {
            filter: StatusFilter::All,
            page: 1,
            editing: Some("a".to_string()),
        };
        let UpdateOutcome::Updated { listing } = update_status(
            &backend,
            &state.close_editor(),
            "a",
            FeedbackStatus::Resolved,
            Some("  Fixed in 2.1  ".to_string()),
        )
        .await
        else {
            panic!("update should be accepted");
        };
        let listing = listing.unwrap();

        assert_eq!(listing.items[0].status, FeedbackStatus::Resolved);
        assert_eq!(listing.items[0].admin_response.as_deref(), Some("Fixed in 2.1"));
        assert_eq!(backend.calls(), vec![
            "update a status=resolved response=Fixed in 2.1".to_string(),
            "feedback page=1 limit=20 status=all".to_string(),
        ]);
    }

    #[tokio::test]
    async fn test_blank_response_is_not_sent() {
        let backend = FakeBackend::with_feedback(vec![feedback("a", FeedbackStatus::Pending, None)]);
        update_status(
            &backend,
            &FeedbackViewState::default(),
            "a",
            FeedbackStatus::Closed,
            Some("   ".to_string()),
        )
        .await;
        assert_eq!(backend.calls()[0], "update a status=closed response=-");
    }

    #[tokio::test]
    async fn test_rejected_update_skips_refetch() {
        let backend = FakeBackend {
            reject_status_update: true,
            ..FakeBackend::with_feedback(vec![feedback("a", FeedbackStatus::Pending, None)])
        };
        let outcome = update_status(
            &backend,
            &FeedbackViewState::default(),
            "a",
            FeedbackStatus::InProgress,
            None,
        )
        .await;
        assert!(matches!(
            outcome,
            UpdateOutcome::Rejected { ref error } if error == "Feedback is locked"
        ));
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_accepted_update_survives_failed_refetch() {
        let backend = FakeBackend {
            fail_feedback: true,
            ..FakeBackend::with_feedback(vec![feedback("a", FeedbackStatus::Pending, None)])
        };
        let outcome = update_status(
            &backend,
            &FeedbackViewState::default(),
            "a",
            FeedbackStatus::Resolved,
            None,
        )
        .await;
        let UpdateOutcome::Updated { listing } = outcome else {
            panic!("update should be accepted");
        };
        assert_eq!(listing.unwrap_err(), "Feedback unavailable");
        assert_eq!(backend.calls().len(), 2);
    }
}
