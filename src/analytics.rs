//! Best-effort usage logging to the Supabase `namewise_analytics` table.
//!
//! [`AnalyticsLogger::log_analysis`] hands the event to a detached task and
//! returns at once. A failed insert is logged and counted, then forgotten.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::metrics::ANALYTICS_FAILURES;
use crate::models::AnalyticsSource;

const TABLE_PATH: &str = "/rest/v1/namewise_analytics";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AnalyticsEvent {
    pub source: AnalyticsSource,
    pub detected_origin: Option<String>,
    pub confidence: Option<String>,
    #[serde(rename = "ip_hash")]
    pub client_hash: String,
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("analytics sink not configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("sink returned status {0}")]
    Status(reqwest::StatusCode),
}

// Short stable hash so raw addresses never leave the gateway
pub fn hash_client(client_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(client_key.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..16].to_string()
}

#[derive(Clone)]
pub struct AnalyticsLogger {
    client: reqwest::Client,
    url: Option<String>,
    key: Option<String>,
    timeout: Duration, // bounds how long a detached insert can live
}

impl AnalyticsLogger {
    pub fn new(
        client: reqwest::Client,
        url: Option<String>,
        key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            url: url.map(|u| u.trim_end_matches('/').to_string()),
            key,
            timeout,
        }
    }

    /// Fire-and-forget. The returned handle is only for tests; callers drop it.
    pub fn log_analysis(&self, event: AnalyticsEvent) -> JoinHandle<()> {
        let logger = self.clone();
        tokio::spawn(async move {
            match logger.send(&event).await {
                Ok(()) => debug!(source = ?event.source, "analytics event recorded"),
                Err(AnalyticsError::NotConfigured) => {
                    warn!("analytics sink not configured, skipping event")
                }
                Err(e) => {
                    ANALYTICS_FAILURES.inc();
                    warn!(error = %e, "failed to log analytics event");
                }
            }
        })
    }

    pub async fn send(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        let (url, key) = match (self.url.as_deref(), self.key.as_deref()) {
            (Some(url), Some(key)) if !key.is_empty() => (url, key),
            _ => return Err(AnalyticsError::NotConfigured),
        };

        let res = self
            .client
            .post(format!("{url}{TABLE_PATH}"))
            .header("apikey", key)
            .bearer_auth(key)
            .header("Prefer", "return=minimal")
            .timeout(self.timeout)
            .json(event)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(AnalyticsError::Status(res.status()));
        }
        Ok(())
    }
}
