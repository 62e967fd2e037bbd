//! Cold-start recovery: ping the health endpoint until the backend answers.

use crate::client::ApiClient;
use crate::models::HealthStatus;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeouts and attempt counts for requests and the wake-up sequence.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Timeout for regular API calls.
    pub request_timeout: Duration,
    /// Timeout for each health check; a sleeping instance can take 50+ seconds to boot.
    pub health_timeout: Duration,
    /// Number of health check attempts before giving up.
    pub wake_attempts: u32,
    /// Fixed pause between failed health checks.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(90),
            wake_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Where a wake-up sequence stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakePhase {
    Waking,
    Ready,
    Failed,
}

impl WakePhase {
    /// Ready and Failed end the sequence.
    pub fn is_finished(&self) -> bool {
        !matches!(self, WakePhase::Waking)
    }
}

/// Progress event published while the backend is being woken up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeUpProgress {
    pub phase: WakePhase,
    pub message: String,
    pub attempt: u32,
    pub max_attempts: u32,
}

impl ApiClient {
    /// Wake the backend by polling its health endpoint.
    ///
    /// Any response below 500 counts as awake and stops the sequence at once.
    /// Failed attempts are separated by the policy's fixed delay; there is no
    /// delay after the last one.
    pub async fn wake_up(&self) -> Result<()> {
        let policy = self.policy();
        let max_attempts = policy.wake_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            self.publish(WakeUpProgress {
                phase: WakePhase::Waking,
                message: format!("Waking up server... (Attempt {attempt}/{max_attempts})"),
                attempt,
                max_attempts,
            });

            let result = self
                .http()
                .get(self.health_url().clone())
                .timeout(policy.health_timeout)
                .send()
                .await;

            match result {
                Ok(resp) if !resp.status().is_server_error() => {
                    let status = resp.status();
                    match resp.json::<HealthStatus>().await {
                        Ok(health) => debug!(%status, ready = health.ok, "Health check answered"),
                        Err(e) => debug!(%status, error = %e, "Health check body is not a health status"),
                    }
                    info!(attempt, "Backend is awake");
                    self.publish(WakeUpProgress {
                        phase: WakePhase::Ready,
                        message: "Server is ready!".to_string(),
                        attempt,
                        max_attempts,
                    });
                    return Ok(());
                }
                Ok(resp) => {
                    last_error = format!("health check returned HTTP {}", resp.status());
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            warn!(attempt, max_attempts, error = %last_error, "Health check attempt failed");

            if attempt < max_attempts {
                tokio::time::sleep(policy.retry_delay).await;
            }
        }

        self.publish(WakeUpProgress {
            phase: WakePhase::Failed,
            message: format!("Server did not wake up after {max_attempts} attempt(s)"),
            attempt: max_attempts,
            max_attempts,
        });
        Err(Error::WakeUpFailed {
            attempts: max_attempts,
            last_error,
        })
    }

    /// Single health check with the regular request timeout, no recovery.
    pub async fn health(&self) -> Result<HealthStatus> {
        let resp = self
            .http()
            .get(self.health_url().clone())
            .timeout(self.policy().request_timeout)
            .send()
            .await?;
        let status = resp.status();
        if status.is_server_error() {
            return Err(Error::Api {
                status,
                message: format!("Health check failed with HTTP {status}"),
            });
        }
        let body = resp.bytes().await?;
        match serde_json::from_slice(&body) {
            Ok(health) => Ok(health),
            Err(e) => {
                debug!(%status, error = %e, "Health body is not JSON, reporting not ready");
                Ok(HealthStatus::default())
            }
        }
    }
}
