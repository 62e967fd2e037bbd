use crate::models::{
    Ack, FeedbackPage, FeedbackStatus, GrowthPoint, StatsSummary, StatusUpdate, UserPage,
};
use crate::wake::{RetryPolicy, WakeUpProgress};
use crate::{ADMIN_KEY_HEADER, Error, Result};
use reqwest::{Client, IntoUrl, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

/// Buffered progress events per subscriber before old ones are dropped.
const PROGRESS_CHANNEL_CAPACITY: usize = 16;

/// A replayable description of one backend call.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    /// Path relative to the API base, e.g. `admin/stats`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// Backend client with admin-key injection and cold-start recovery.
pub struct ApiClient {
    client: Client,
    base_url: Url,
    health_url: Url,
    origin: String,
    admin_key: String,
    policy: RetryPolicy,
    progress: broadcast::Sender<WakeUpProgress>,
}

impl ApiClient {
    /// Create a client for the API rooted at `base_url` (e.g. `https://host/api`).
    pub fn new<T: IntoUrl, K: ToString>(
        base_url: T,
        admin_key: K,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let mut base_url = base_url
            .into_url()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(base_url.to_string()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let origin = backend_origin(&base_url);
        let health_url = Url::parse(&format!("{origin}/health"))
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let client = Client::builder().build()?;
        let (progress, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url,
            health_url,
            origin,
            admin_key: admin_key.to_string(),
            policy,
            progress,
        })
    }

    /// Subscribe to wake-up progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<WakeUpProgress> {
        self.progress.subscribe()
    }

    /// Backend origin without the API suffix; uploads are served from here.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn health_url(&self) -> &Url {
        &self.health_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn publish(&self, progress: WakeUpProgress) {
        debug!(attempt = progress.attempt, "{}", progress.message);
        // No subscribers is fine.
        let _ = self.progress.send(progress);
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
    }

    /// Send one attempt and read the whole body, so body timeouts count as transport failures.
    async fn attempt(&self, spec: &RequestSpec) -> Result<ResponseBody> {
        let url = self.endpoint(&spec.path)?;
        let mut request = self
            .client
            .request(spec.method.clone(), url)
            .header(ADMIN_KEY_HEADER, &self.admin_key)
            .timeout(self.policy.request_timeout);
        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await?;

        if status.is_success() {
            Ok(ResponseBody {
                bytes: bytes.to_vec(),
                content_type,
            })
        } else {
            let message = error_message(status, &bytes);
            error!(method = %spec.method, path = %spec.path, %status, "Backend returned an error: {message}");
            Err(Error::Api { status, message })
        }
    }

    /// Run a request, waking the backend and replaying once on transport failure.
    pub async fn execute(&self, spec: &RequestSpec) -> Result<ResponseBody> {
        match self.attempt(spec).await {
            Ok(body) => Ok(body),
            Err(e) if e.is_retryable() => {
                warn!(
                    method = %spec.method,
                    path = %spec.path,
                    error = %e,
                    "Initial request failed, attempting to wake up server"
                );
                self.wake_up().await?;
                self.attempt(spec).await
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, spec: &RequestSpec) -> Result<T> {
        let body = self.execute(spec).await?;
        Ok(serde_json::from_slice(&body.bytes)?)
    }

    pub async fn send_json<T: DeserializeOwned>(&self, spec: &RequestSpec) -> Result<T> {
        self.get_json(spec).await
    }

    pub async fn get_bytes(&self, spec: &RequestSpec) -> Result<Vec<u8>> {
        Ok(self.execute(spec).await?.bytes)
    }

    pub async fn delete(&self, path: impl Into<String>) -> Result<Ack> {
        let body = self.execute(&RequestSpec::new(Method::DELETE, path)).await?;
        if body.bytes.is_empty() {
            return Ok(Ack {
                success: true,
                message: None,
            });
        }
        match serde_json::from_slice(&body.bytes) {
            Ok(ack) => Ok(ack),
            Err(e) => {
                debug!(error = %e, "Delete answered without an acknowledgement body");
                Ok(Ack {
                    success: true,
                    message: None,
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Admin endpoints
    // ------------------------------------------------------------------

    pub async fn stats(&self) -> Result<StatsSummary> {
        self.get_json(&RequestSpec::get("admin/stats")).await
    }

    /// One page of users; picture paths come back absolute.
    pub async fn users(&self, page: u32, limit: u32, search: &str) -> Result<UserPage> {
        let mut spec = RequestSpec::get("admin/users")
            .query("page", page)
            .query("limit", limit);
        if !search.is_empty() {
            spec = spec.query("search", search);
        }
        let mut users: UserPage = self.get_json(&spec).await?;
        users.users = users
            .users
            .into_iter()
            .map(|u| u.with_absolute_picture(&self.origin))
            .collect();
        Ok(users)
    }

    pub async fn user_growth(&self, days: u32) -> Result<Vec<GrowthPoint>> {
        let mut points: Vec<GrowthPoint> = self
            .get_json(&RequestSpec::get("admin/analytics/user-growth").query("days", days))
            .await?;
        points.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(points)
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<Ack> {
        self.delete(format!("admin/users/{}", urlencoding::encode(user_id)))
            .await
    }

    pub async fn export_users(&self) -> Result<Vec<u8>> {
        self.get_bytes(&RequestSpec::get("admin/users/export")).await
    }

    pub async fn export_phones(&self) -> Result<Vec<u8>> {
        self.get_bytes(&RequestSpec::get("admin/users/export-phones"))
            .await
    }

    pub async fn export_user_contacts(&self, user_id: &str) -> Result<Vec<u8>> {
        let path = format!(
            "admin/users/{}/contacts/export",
            urlencoding::encode(user_id)
        );
        self.get_bytes(&RequestSpec::get(path)).await
    }

    // ------------------------------------------------------------------
    // Feedback endpoints
    // ------------------------------------------------------------------

    pub async fn feedback(
        &self,
        page: u32,
        limit: u32,
        status: Option<FeedbackStatus>,
    ) -> Result<FeedbackPage> {
        let mut spec = RequestSpec::get("feedback/all")
            .query("page", page)
            .query("limit", limit);
        if let Some(status) = status {
            spec = spec.query("status", status);
        }
        self.get_json(&spec).await
    }

    pub async fn update_feedback_status(
        &self,
        feedback_id: &str,
        status: FeedbackStatus,
        admin_response: Option<String>,
    ) -> Result<Ack> {
        let update = StatusUpdate {
            status,
            admin_response: admin_response.filter(|r| !r.trim().is_empty()),
        };
        let spec = RequestSpec::new(
            Method::PATCH,
            format!("feedback/{}/status", urlencoding::encode(feedback_id)),
        )
        .json(&update)?;
        self.send_json(&spec).await
    }
}

/// Body of a successful response.
#[derive(Debug, Clone)]
pub struct ResponseBody {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Strip a trailing `/api` segment and any trailing slash from the base URL.
fn backend_origin(base_url: &Url) -> String {
    let base = base_url.as_str().trim_end_matches('/');
    base.strip_suffix("/api").unwrap_or(base).to_string()
}

/// Pull a human-readable message out of an error body.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if !text.is_empty() {
        return text;
    }
    format!(
        "Request failed with status {}",
        status.canonical_reason().unwrap_or(status.as_str())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, "key", RetryPolicy::default()).unwrap()
    }

    #[test]
    fn test_health_url_strips_api_suffix() {
        let c = client("https://cards.example.com/api");
        assert_eq!(c.health_url().as_str(), "https://cards.example.com/health");
        assert_eq!(c.origin(), "https://cards.example.com");
        assert_eq!(c.base_url().as_str(), "https://cards.example.com/api/");

        let c = client("https://cards.example.com/api/");
        assert_eq!(c.health_url().as_str(), "https://cards.example.com/health");
    }

    #[test]
    fn test_health_url_without_api_suffix() {
        let c = client("http://127.0.0.1:8080");
        assert_eq!(c.health_url().as_str(), "http://127.0.0.1:8080/health");
    }

    #[test]
    fn test_endpoint_join() {
        let c = client("https://cards.example.com/api");
        assert_eq!(
            c.endpoint("admin/stats").unwrap().as_str(),
            "https://cards.example.com/api/admin/stats"
        );
        assert_eq!(
            c.endpoint("/feedback/all").unwrap().as_str(),
            "https://cards.example.com/api/feedback/all"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url", "key", RetryPolicy::default()).is_err());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, br#"{"message":"User not found"}"#),
            "User not found"
        );
        assert_eq!(
            error_message(StatusCode::FORBIDDEN, br#"{"error":"Invalid admin key"}"#),
            "Invalid admin key"
        );
        assert_eq!(error_message(StatusCode::BAD_REQUEST, b"bad input"), "bad input");
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, b""),
            "Request failed with status Not Found"
        );
    }
}
