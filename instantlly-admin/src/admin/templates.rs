//! Askama templates for the admin UI.

use crate::dashboard::{DashboardData, DashboardQuery};
use crate::feedback::{FeedbackListing, FeedbackViewState, StatusFilter};
use askama::Template;
use chrono::{DateTime, Utc};
use instantlly_api::models::{Feedback, FeedbackStatus, GrowthPoint, RatingDisplay, User};

/// Base data available to all templates
pub struct BaseContext {
    pub username: String,
    /// Navigation entry to highlight: "dashboard" or "feedback".
    pub active: &'static str,
    /// Message of the wake-up attempt in flight, if any.
    pub waking: Option<String>,
}

/// Login page template
#[derive(Template)]
#[template(path = "admin/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
}

/// Shown instead of the dashboard when stats cannot be loaded
#[derive(Template)]
#[template(path = "admin/connection_failed.html")]
pub struct ConnectionFailedTemplate {
    pub base: BaseContext,
    pub error: String,
    pub retry_href: String,
}

/// Blocking error page with a way back
#[derive(Template)]
#[template(path = "admin/error.html")]
pub struct ErrorTemplate {
    pub base: BaseContext,
    pub title: String,
    pub message: String,
    pub back_href: String,
}

/// Deletion confirmation page
#[derive(Template)]
#[template(path = "admin/confirm_delete.html")]
pub struct ConfirmDeleteTemplate {
    pub base: BaseContext,
    /// Form target, with the user id already encoded.
    pub action: String,
    pub user_name: String,
    pub warning: Vec<String>,
    pub page: u32,
    pub search: String,
}

/// Stat card on the dashboard
pub struct StatCard {
    pub title: &'static str,
    pub value: String,
    pub detail: Option<String>,
}

/// 30-day growth chart, pre-scaled to a 600x160 viewBox
pub struct GrowthChart {
    pub points: String,
    pub first_date: String,
    pub last_date: String,
    pub peak: u64,
    pub total: u64,
}

impl GrowthChart {
    const WIDTH: f64 = 600.0;
    const HEIGHT: f64 = 160.0;

    pub fn new(growth: &[GrowthPoint]) -> Option<Self> {
        let first = growth.first()?;
        let last = growth.last()?;
        let peak = growth.iter().map(|p| p.count).max().unwrap_or(0);
        let step = if growth.len() > 1 {
            Self::WIDTH / (growth.len() - 1) as f64
        } else {
            0.0
        };
        let points = growth
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let y = if peak == 0 {
                    Self::HEIGHT
                } else {
                    Self::HEIGHT - (p.count as f64 / peak as f64) * Self::HEIGHT
                };
                format!("{:.1},{:.1}", i as f64 * step, y)
            })
            .collect::<Vec<_>>()
            .join(" ");
        Some(Self {
            points,
            first_date: first.date.clone(),
            last_date: last.date.clone(),
            peak,
            total: growth.iter().map(|p| p.count).sum(),
        })
    }
}

/// User table row
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub initial: String,
    pub picture: Option<String>,
    pub about: String,
    pub phone: String,
    pub joined: String,
    pub cards: u64,
    pub messages: u64,
    pub contacts: u64,
    pub delete_href: String,
    pub contacts_export_href: String,
}

impl UserRow {
    pub fn new(user: &User, back: &DashboardQuery) -> Self {
        let id = urlencoding::encode(&user.id).into_owned();
        let name = user.display_name().to_string();
        Self {
            delete_href: format!(
                "/admin/users/{id}/delete?name={}&{}",
                urlencoding::encode(&name),
                back.to_query_string()
            ),
            contacts_export_href: format!(
                "/admin/users/{id}/contacts/export?name={}",
                urlencoding::encode(&name)
            ),
            id: user.id.clone(),
            initial: user.initial(),
            picture: user.profile_picture.clone(),
            about: user.about_preview(),
            phone: user.phone.clone(),
            joined: short_date(&user.created_at),
            cards: user.stats.cards,
            messages: user.stats.messages,
            contacts: user.stats.contacts,
            name,
        }
    }
}

/// Dashboard page template
#[derive(Template)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub base: BaseContext,
    pub notice: Option<String>,
    pub cards: Vec<StatCard>,
    pub chart: Option<GrowthChart>,
    pub users: Vec<UserRow>,
    pub search: String,
    pub page: u32,
    pub total_pages: u32,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
}

impl DashboardTemplate {
    pub fn new(base: BaseContext, data: &DashboardData, notice: Option<String>) -> Self {
        let query = DashboardQuery {
            page: Some(data.page),
            search: Some(data.search.clone()).filter(|s| !s.is_empty()),
        };
        let stats = &data.stats;
        let cards = vec![
            StatCard {
                title: "Total Users",
                value: format_count(stats.total_users),
                detail: None,
            },
            StatCard {
                title: "Total Cards",
                value: format_count(stats.total_cards),
                detail: None,
            },
            StatCard {
                title: "Total Messages",
                value: format_count(stats.total_messages),
                detail: None,
            },
            StatCard {
                title: "Total Groups",
                value: format_count(stats.total_groups),
                detail: None,
            },
            StatCard {
                title: "App Downloads",
                value: format_count(stats.downloads()),
                detail: Some(stats.downloads_trend().to_string()),
            },
            StatCard {
                title: "Installed Audience",
                value: format_count(stats.active_users()),
                detail: Some("Active devices".to_string()),
            },
        ];
        let page_href = |page: u32| format!("/admin/dashboard?{}", query.with_page(page).to_query_string());

        Self {
            base,
            notice,
            cards,
            chart: GrowthChart::new(&data.growth),
            users: data.users.iter().map(|u| UserRow::new(u, &query)).collect(),
            search: data.search.clone(),
            page: data.page,
            total_pages: data.total_pages,
            prev_href: (data.page > 1).then(|| page_href(data.page - 1)),
            next_href: (data.page < data.total_pages).then(|| page_href(data.page + 1)),
        }
    }
}

/// Filter tab on the feedback page
pub struct FilterTab {
    pub label: &'static str,
    pub href: String,
    pub active: bool,
}

/// Status choice inside the editor
pub struct StatusOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Feedback card
pub struct FeedbackRow {
    pub id: String,
    pub subject: String,
    pub status_label: &'static str,
    pub badge_class: &'static str,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub created: String,
    /// None renders "No rating"; otherwise one CSS class per star, filled first.
    pub stars: Option<Vec<&'static str>>,
    pub message: String,
    pub admin_response: Option<String>,
    pub responded_at: Option<String>,
    pub editing: bool,
    /// Editor form target, with the id already encoded.
    pub action: String,
    pub edit_href: String,
    pub cancel_href: String,
    pub options: Vec<StatusOption>,
}

impl FeedbackRow {
    pub fn new(item: &Feedback, state: &FeedbackViewState) -> Self {
        let stars = match item.rating_display() {
            RatingDisplay::NoRating => None,
            RatingDisplay::Stars { filled, empty } => Some(
                std::iter::repeat_n("star-filled", filled as usize)
                    .chain(std::iter::repeat_n("star-empty", empty as usize))
                    .collect(),
            ),
        };
        Self {
            id: item.id.clone(),
            subject: item.subject.clone(),
            status_label: item.status.label(),
            badge_class: item.status.badge_class(),
            name: item.name.clone(),
            phone: item.phone.clone(),
            email: item.email.clone(),
            created: long_date(&item.created_at),
            stars,
            message: item.message.clone(),
            admin_response: item.admin_response.clone(),
            responded_at: item.responded_at.as_ref().map(long_date),
            editing: state.is_editing(&item.id),
            action: format!("/admin/feedback/{}/status", urlencoding::encode(&item.id)),
            edit_href: state.open_editor(item.id.clone()).href(),
            cancel_href: state.close_editor().href(),
            options: FeedbackStatus::EDITOR_TARGETS
                .iter()
                .map(|s| StatusOption {
                    value: s.as_str(),
                    label: s.label(),
                })
                .collect(),
        }
    }
}

/// Feedback page template
#[derive(Template)]
#[template(path = "admin/feedback.html")]
pub struct FeedbackTemplate {
    pub base: BaseContext,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub tabs: Vec<FilterTab>,
    pub filter: &'static str,
    pub total: u64,
    pub pending: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub items: Vec<FeedbackRow>,
    pub page: u32,
    pub total_pages: u32,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
}

impl FeedbackTemplate {
    pub fn new(
        base: BaseContext,
        state: &FeedbackViewState,
        listing: &FeedbackListing,
        error: Option<String>,
        notice: Option<String>,
    ) -> Self {
        let tabs = StatusFilter::CHOICES
            .iter()
            .map(|f| FilterTab {
                label: f.label(),
                href: state.with_filter(*f).href(),
                active: *f == state.filter,
            })
            .collect();
        Self {
            base,
            error,
            notice,
            tabs,
            filter: state.filter.as_str(),
            total: listing.total,
            pending: listing.pending_on_page,
            in_progress: listing.in_progress_on_page,
            resolved: listing.resolved_on_page,
            items: listing
                .items
                .iter()
                .map(|item| FeedbackRow::new(item, state))
                .collect(),
            page: state.page,
            total_pages: listing.total_pages,
            prev_href: (state.page > 1).then(|| state.with_page(state.page - 1).href()),
            next_href: (state.page < listing.total_pages)
                .then(|| state.with_page(state.page + 1).href()),
        }
    }
}

/// `1234567` -> `1,234,567`
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn short_date(at: &DateTime<Utc>) -> String {
    at.format("%m/%d/%y").to_string()
}

fn long_date(at: &DateTime<Utc>) -> String {
    at.format("%b %-d, %Y, %I:%M %p").to_string()
}
