//! Seam between the admin views and the InstantllyCards backend.
//!
//! Views talk to an [`AdminBackend`] trait object so they can be exercised
//! against an in-memory backend in tests; production uses [`ApiClient`].

use async_trait::async_trait;
use instantlly_api::models::{
    Ack, FeedbackPage, FeedbackStatus, GrowthPoint, StatsSummary, UserPage,
};
use instantlly_api::{ApiClient, WakeUpProgress};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

pub type ApiResult<T> = instantlly_api::Result<T>;

/// Backend operations needed by the admin console.
#[async_trait]
pub trait AdminBackend: Send + Sync {
    async fn stats(&self) -> ApiResult<StatsSummary>;

    async fn users(&self, page: u32, limit: u32, search: &str) -> ApiResult<UserPage>;

    async fn user_growth(&self, days: u32) -> ApiResult<Vec<GrowthPoint>>;

    async fn delete_user(&self, user_id: &str) -> ApiResult<()>;

    async fn export_users(&self) -> ApiResult<Vec<u8>>;

    async fn export_phones(&self) -> ApiResult<Vec<u8>>;

    async fn export_user_contacts(&self, user_id: &str) -> ApiResult<Vec<u8>>;

    async fn feedback(
        &self,
        page: u32,
        limit: u32,
        status: Option<FeedbackStatus>,
    ) -> ApiResult<FeedbackPage>;

    async fn update_feedback_status(
        &self,
        feedback_id: &str,
        status: FeedbackStatus,
        admin_response: Option<String>,
    ) -> ApiResult<Ack>;
}

#[async_trait]
impl AdminBackend for ApiClient {
    async fn stats(&self) -> ApiResult<StatsSummary> {
        ApiClient::stats(self).await
    }

    async fn users(&self, page: u32, limit: u32, search: &str) -> ApiResult<UserPage> {
        ApiClient::users(self, page, limit, search).await
    }

    async fn user_growth(&self, days: u32) -> ApiResult<Vec<GrowthPoint>> {
        ApiClient::user_growth(self, days).await
    }

    async fn delete_user(&self, user_id: &str) -> ApiResult<()> {
        ApiClient::delete_user(self, user_id).await.map(|_| ())
    }

    async fn export_users(&self) -> ApiResult<Vec<u8>> {
        ApiClient::export_users(self).await
    }

    async fn export_phones(&self) -> ApiResult<Vec<u8>> {
        ApiClient::export_phones(self).await
    }

    async fn export_user_contacts(&self, user_id: &str) -> ApiResult<Vec<u8>> {
        ApiClient::export_user_contacts(self, user_id).await
    }

    async fn feedback(
        &self,
        page: u32,
        limit: u32,
        status: Option<FeedbackStatus>,
    ) -> ApiResult<FeedbackPage> {
        ApiClient::feedback(self, page, limit, status).await
    }

    async fn update_feedback_status(
        &self,
        feedback_id: &str,
        status: FeedbackStatus,
        admin_response: Option<String>,
    ) -> ApiResult<Ack> {
        ApiClient::update_feedback_status(self, feedback_id, status, admin_response).await
    }
}

/// Progress of the wake-up sequence in flight, for the "waking up" indicator.
#[derive(Default)]
pub struct WakeStatus {
    latest: RwLock<Option<WakeUpProgress>>,
}

impl WakeStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last attempt of a running sequence; `None` when the backend is not
    /// being woken up.
    pub async fn latest(&self) -> Option<WakeUpProgress> {
        self.latest.read().await.clone()
    }

    /// A finished sequence (ready or failed) clears the indicator.
    pub async fn record(&self, progress: WakeUpProgress) {
        let mut latest = self.latest.write().await;
        *latest = if progress.phase.is_finished() {
            None
        } else {
            Some(progress)
        };
    }

    /// Follow a client's progress stream until the client is dropped.
    pub fn follow(self: &Arc<Self>, mut rx: broadcast::Receiver<WakeUpProgress>) {
        let status = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(progress) => {
                        info!(
                            phase = ?progress.phase,
                            attempt = progress.attempt,
                            max_attempts = progress.max_attempts,
                            "{}",
                            progress.message
                        );
                        status.record(progress).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Wake-up progress listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instantlly_api::WakePhase;

    fn progress(phase: WakePhase, attempt: u32) -> WakeUpProgress {
        WakeUpProgress {
            phase,
            message: format!("attempt {attempt}"),
            attempt,
            max_attempts: 3,
        }
    }

    #[tokio::test]
    async fn test_finished_sequence_clears_indicator() {
        let status = WakeStatus::new();
        status.record(progress(WakePhase::Waking, 1)).await;
        status.record(progress(WakePhase::Waking, 2)).await;
        assert_eq!(status.latest().await.map(|p| p.attempt), Some(2));

        status.record(progress(WakePhase::Ready, 2)).await;
        assert!(status.latest().await.is_none());

        status.record(progress(WakePhase::Waking, 1)).await;
        status.record(progress(WakePhase::Failed, 3)).await;
        assert!(status.latest().await.is_none());
    }

    #[tokio::test]
    async fn test_follow_tracks_broadcast_stream() {
        let status = Arc::new(WakeStatus::new());
        let (tx, rx) = broadcast::channel(4);
        status.follow(rx);

        tx.send(progress(WakePhase::Waking, 1)).unwrap();
        drop(tx);
        // The follower exits once the channel closes.
        for _ in 0..50 {
            if status.latest().await.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(status.latest().await.map(|p| p.attempt), Some(1));
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory backend that records every call.

    use super::*;
    use chrono::{TimeZone, Utc};
    use instantlly_api::models::{Feedback, FeedbackPagination, Pagination, User, UserStats};
    use instantlly_api::{Error, StatusCode};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeBackend {
        pub calls: Mutex<Vec<String>>,
        pub users: Mutex<Vec<User>>,
        pub feedback: Mutex<Vec<Feedback>>,
        pub fail_stats: bool,
        pub fail_users: bool,
        pub fail_growth: bool,
        pub fail_delete: bool,
        pub fail_exports: bool,
        pub fail_feedback: bool,
        pub reject_status_update: bool,
    }

    fn app_error(message: &str) -> Error {
        Error::Api {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
        }
    }

    pub fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            name: name.to_string(),
            phone: format!("+91{id}"),
            email: None,
            profile_picture: None,
            about: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap(),
            stats: UserStats {
                cards: 1,
                messages: 2,
                contacts: 3,
            },
        }
    }

    pub fn feedback(id: &str, status: FeedbackStatus, rating: Option<u8>) -> Feedback {
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap();
        Feedback {
            id: id.to_string(),
            name: "Meera".to_string(),
            phone: "+919811111111".to_string(),
            email: None,
            subject: format!("Subject {id}"),
            message: "The share button does nothing".to_string(),
            rating,
            status,
            admin_response: None,
            responded_at: None,
            created_at: at,
            updated_at: at,
        }
    }

    impl FakeBackend {
        pub fn with_users(users: Vec<User>) -> Self {
            Self {
                users: Mutex::new(users),
                ..Default::default()
            }
        }

        pub fn with_feedback(items: Vec<Feedback>) -> Self {
            Self {
                feedback: Mutex::new(items),
                ..Default::default()
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AdminBackend for FakeBackend {
        async fn stats(&self) -> ApiResult<StatsSummary> {
            self.record("stats".to_string());
            if self.fail_stats {
                return Err(app_error("Stats unavailable"));
            }
            Ok(StatsSummary {
                total_users: self.users.lock().unwrap().len() as u64,
                total_cards: 1200,
                total_messages: 5400,
                total_groups: 12,
                ..Default::default()
            })
        }

        async fn users(&self, page: u32, limit: u32, search: &str) -> ApiResult<UserPage> {
            self.record(format!("users page={page} limit={limit} search={search}"));
            if self.fail_users {
                return Err(app_error("Users unavailable"));
            }
            let users: Vec<User> = self
                .users
                .lock()
                .unwrap()
                .iter()
                .filter(|u| search.is_empty() || u.name.contains(search))
                .cloned()
                .collect();
            Ok(UserPage {
                users,
                pagination: Pagination {
                    page,
                    total_pages: 3,
                    ..Default::default()
                },
            })
        }

        async fn user_growth(&self, days: u32) -> ApiResult<Vec<GrowthPoint>> {
            self.record(format!("growth days={days}"));
            if self.fail_growth {
                return Err(app_error("Growth unavailable"));
            }
            Ok(vec![
                GrowthPoint {
                    date: "2025-03-01".to_string(),
                    count: 4,
                },
                GrowthPoint {
                    date: "2025-03-02".to_string(),
                    count: 9,
                },
            ])
        }

        async fn delete_user(&self, user_id: &str) -> ApiResult<()> {
            self.record(format!("delete {user_id}"));
            if self.fail_delete {
                return Err(app_error("Cannot delete user"));
            }
            self.users.lock().unwrap().retain(|u| u.id != user_id);
            Ok(())
        }

        async fn export_users(&self) -> ApiResult<Vec<u8>> {
            self.record("export users".to_string());
            if self.fail_exports {
                return Err(app_error("Export failed"));
            }
            Ok(b"name,phone\nAsha,+911\n".to_vec())
        }

        async fn export_phones(&self) -> ApiResult<Vec<u8>> {
            self.record("export phones".to_string());
            if self.fail_exports {
                return Err(app_error("Export failed"));
            }
            Ok(b"phone\n+911\n".to_vec())
        }

        async fn export_user_contacts(&self, user_id: &str) -> ApiResult<Vec<u8>> {
            self.record(format!("export contacts {user_id}"));
            if self.fail_exports {
                return Err(app_error("Export failed"));
            }
            Ok(b"name,phone\n".to_vec())
        }

        async fn feedback(
            &self,
            page: u32,
            limit: u32,
            status: Option<FeedbackStatus>,
        ) -> ApiResult<FeedbackPage> {
            let filter = status.map(|s| s.as_str()).unwrap_or("all");
            self.record(format!("feedback page={page} limit={limit} status={filter}"));
            if self.fail_feedback {
                return Err(app_error("Feedback unavailable"));
            }
            let data: Vec<Feedback> = self
                .feedback
                .lock()
                .unwrap()
                .iter()
                .filter(|f| status.is_none_or(|s| f.status == s))
                .cloned()
                .collect();
            Ok(FeedbackPage {
                success: true,
                pagination: FeedbackPagination {
                    total: data.len() as u64,
                    pages: 2,
                    page,
                },
                data,
            })
        }

        async fn update_feedback_status(
            &self,
            feedback_id: &str,
            status: FeedbackStatus,
            admin_response: Option<String>,
        ) -> ApiResult<Ack> {
            self.record(format!(
                "update {feedback_id} status={status} response={}",
                admin_response.as_deref().unwrap_or("-")
            ));
            if self.reject_status_update {
                return Ok(Ack {
                    success: false,
                    message: Some("Feedback is locked".to_string()),
                });
            }
            if let Some(item) = self
                .feedback
                .lock()
                .unwrap()
                .iter_mut()
                .find(|f| f.id == feedback_id)
            {
                item.status = status;
                item.admin_response = admin_response;
            }
            Ok(Ack {
                success: true,
                message: None,
            })
        }
    }
}
