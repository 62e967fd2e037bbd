//! Records returned by the InstantllyCards backend.
//!
//! These mirror the backend's JSON bodies. The backend owns every invariant;
//! the only local behavior is filling display defaults for optional fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Registered application user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    /// Free-text bio
    #[serde(default)]
    pub about: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub stats: UserStats,
}

/// Per-user activity counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStats {
    #[serde(default)]
    pub cards: u64,
    #[serde(default)]
    pub messages: u64,
    #[serde(default)]
    pub contacts: u64,
}

impl User {
    /// Rewrite a backend-relative upload path (`/uploads/...`) into an
    /// absolute URL on the backend origin. Other values are left untouched.
    pub fn with_absolute_picture(mut self, origin: &str) -> Self {
        if let Some(pic) = &self.profile_picture
            && pic.starts_with("/uploads")
        {
            self.profile_picture = Some(format!("{}{}", origin.trim_end_matches('/'), pic));
        }
        self
    }

    /// Name to show in prompts and filenames, falling back to the phone number.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.phone
        } else {
            &self.name
        }
    }

    /// First letter of the name, upper-cased, for the avatar placeholder.
    pub fn initial(&self) -> String {
        self.name
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default()
    }

    /// Bio shortened to 20 characters, or "Available" when empty.
    pub fn about_preview(&self) -> String {
        match self.about.as_deref() {
            Some(about) if !about.is_empty() => {
                if about.chars().count() > 20 {
                    let short: String = about.chars().take(20).collect();
                    format!("{short}...")
                } else {
                    about.to_string()
                }
            }
            _ => "Available".to_string(),
        }
    }
}

/// Pagination block shared by list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default = "default_page")]
    pub total_pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: None,
            total: None,
            total_pages: 1,
        }
    }
}

fn default_page() -> u32 {
    1
}

/// One page of users from `admin/users`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPage {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Aggregate counters from `admin/stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub total_cards: u64,
    #[serde(default)]
    pub total_messages: u64,
    #[serde(default)]
    pub total_groups: u64,
    #[serde(default)]
    pub total_downloads: Option<u64>,
    #[serde(default)]
    pub installed_audience: Option<u64>,
    #[serde(default)]
    pub downloads_trend: Option<String>,
}

const FALLBACK_DOWNLOADS: u64 = 118;
const FALLBACK_INSTALLED_AUDIENCE: u64 = 87;
const FALLBACK_DOWNLOADS_TREND: &str = "+742.9% vs previous 30 days";

impl StatsSummary {
    /// Download count, with the store-reported figure used when the backend has none.
    pub fn downloads(&self) -> u64 {
        match self.total_downloads {
            Some(n) if n > 0 => n,
            _ => FALLBACK_DOWNLOADS,
        }
    }

    pub fn active_users(&self) -> u64 {
        match self.installed_audience {
            Some(n) if n > 0 => n,
            _ => FALLBACK_INSTALLED_AUDIENCE,
        }
    }

    pub fn downloads_trend(&self) -> &str {
        match self.downloads_trend.as_deref() {
            Some(trend) if !trend.is_empty() => trend,
            _ => FALLBACK_DOWNLOADS_TREND,
        }
    }
}

/// New-user count for one day bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthPoint {
    #[serde(rename = "_id")]
    pub date: String,
    #[serde(default)]
    pub count: u64,
}

/// Lifecycle status of a feedback record.
///
/// The backend validates transitions; any status may be requested from any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedbackStatus {
    Pending,
    InProgress,
    Resolved,
    Closed,
}

impl FeedbackStatus {
    pub const ALL: [FeedbackStatus; 4] = [
        FeedbackStatus::Pending,
        FeedbackStatus::InProgress,
        FeedbackStatus::Resolved,
        FeedbackStatus::Closed,
    ];

    /// Targets offered by the status editor, regardless of the current status.
    pub const EDITOR_TARGETS: [FeedbackStatus; 3] = [
        FeedbackStatus::InProgress,
        FeedbackStatus::Resolved,
        FeedbackStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::Pending => "pending",
            FeedbackStatus::InProgress => "in-progress",
            FeedbackStatus::Resolved => "resolved",
            FeedbackStatus::Closed => "closed",
        }
    }

    /// Human label ("in progress" rather than "in-progress").
    pub fn label(&self) -> &'static str {
        match self {
            FeedbackStatus::Pending => "pending",
            FeedbackStatus::InProgress => "in progress",
            FeedbackStatus::Resolved => "resolved",
            FeedbackStatus::Closed => "closed",
        }
    }

    /// CSS class for the status badge.
    pub fn badge_class(&self) -> &'static str {
        match self {
            FeedbackStatus::Pending => "badge-pending",
            FeedbackStatus::InProgress => "badge-in-progress",
            FeedbackStatus::Resolved => "badge-resolved",
            FeedbackStatus::Closed => "badge-closed",
        }
    }
}

impl fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FeedbackStatus::Pending),
            "in-progress" => Ok(FeedbackStatus::InProgress),
            "resolved" => Ok(FeedbackStatus::Resolved),
            "closed" => Ok(FeedbackStatus::Closed),
            other => Err(format!("Unknown feedback status: {other}")),
        }
    }
}

/// User-submitted feedback record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub rating: Option<u8>,
    pub status: FeedbackStatus,
    #[serde(default)]
    pub admin_response: Option<String>,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a rating should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingDisplay {
    NoRating,
    Stars { filled: u8, empty: u8 },
}

impl Feedback {
    pub fn rating_display(&self) -> RatingDisplay {
        match self.rating {
            None | Some(0) => RatingDisplay::NoRating,
            Some(r) => {
                let filled = r.min(5);
                RatingDisplay::Stars {
                    filled,
                    empty: 5 - filled,
                }
            }
        }
    }
}

/// Pagination block of the feedback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackPagination {
    #[serde(default)]
    pub total: u64,
    #[serde(default = "default_page")]
    pub pages: u32,
    #[serde(default = "default_page")]
    pub page: u32,
}

impl Default for FeedbackPagination {
    fn default() -> Self {
        Self {
            total: 0,
            pages: 1,
            page: 1,
        }
    }
}

/// Envelope returned by `feedback/all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackPage {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Vec<Feedback>,
    #[serde(default)]
    pub pagination: FeedbackPagination,
}

/// Body of `PATCH feedback/{id}/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: FeedbackStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_response: Option<String>,
}

/// Generic `{ success, message }` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of the health endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_json(picture: &str) -> String {
        format!(
            r#"{{"_id":"u1","name":"asha","phone":"+911234","profilePicture":"{picture}",
                "createdAt":"2025-01-02T03:04:05Z","stats":{{"cards":3,"messages":7,"contacts":12}}}}"#
        )
    }

    #[test]
    fn test_user_deserialize_and_absolute_picture() {
        let user: User = serde_json::from_str(&user_json("/uploads/profiles/a.png")).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.stats.contacts, 12);

        let user = user.with_absolute_picture("https://backend.example.com/");
        assert_eq!(
            user.profile_picture.as_deref(),
            Some("https://backend.example.com/uploads/profiles/a.png")
        );
    }

    #[test]
    fn test_absolute_picture_leaves_external_urls() {
        let user: User = serde_json::from_str(&user_json("https://cdn.example.com/a.png")).unwrap();
        let user = user.with_absolute_picture("https://backend.example.com");
        assert_eq!(user.profile_picture.as_deref(), Some("https://cdn.example.com/a.png"));
    }

    #[test]
    fn test_user_missing_stats_default_to_zero() {
        let user: User = serde_json::from_str(
            r#"{"_id":"u2","name":"","phone":"555","createdAt":"2025-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        assert_eq!(user.stats.cards, 0);
        assert_eq!(user.display_name(), "555");
        assert_eq!(user.about_preview(), "Available");
    }

    #[test]
    fn test_about_preview_truncates() {
        let mut user: User = serde_json::from_str(&user_json("")).unwrap();
        user.about = Some("Designer and weekend photographer".to_string());
        assert_eq!(user.about_preview(), "Designer and weekend...");
    }

    #[test]
    fn test_feedback_status_strings() {
        for status in FeedbackStatus::ALL {
            assert_eq!(status.as_str().parse::<FeedbackStatus>().unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&FeedbackStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert!("open".parse::<FeedbackStatus>().is_err());
    }

    #[test]
    fn test_stats_fallbacks() {
        let stats: StatsSummary =
            serde_json::from_str(r#"{"totalUsers":10,"totalCards":4,"totalMessages":2,"totalGroups":1}"#)
                .unwrap();
        assert_eq!(stats.downloads(), 118);
        assert_eq!(stats.active_users(), 87);
        assert_eq!(stats.downloads_trend(), "+742.9% vs previous 30 days");
    }

    #[test]
    fn test_rating_display() {
        let mut feedback: Feedback = serde_json::from_str(
            r#"{"_id":"f1","name":"n","phone":"p","subject":"s","message":"m","status":"pending",
                "createdAt":"2025-01-02T03:04:05Z","updatedAt":"2025-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        assert_eq!(feedback.rating_display(), RatingDisplay::NoRating);

        feedback.rating = Some(4);
        assert_eq!(
            feedback.rating_display(),
            RatingDisplay::Stars { filled: 4, empty: 1 }
        );
    }

    #[test]
    fn test_status_update_omits_empty_response() {
        let update = StatusUpdate {
            status: FeedbackStatus::Resolved,
            admin_response: None,
        };
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"status":"resolved"}"#
        );
    }
}
