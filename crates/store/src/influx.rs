//! InfluxDB v2 line-protocol client.
//!
//! Thin HTTP wrapper over `/api/v2/write`: joined lines in, classified
//! [`WriteError`] out. The classification is what the writer's retry policy
//! keys on: credentials and missing buckets are unfixable by retrying.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info};

use sentinel_core::{InfluxConfig, TimeSeriesStore, WriteError};

pub struct InfluxStore {
    client: reqwest::Client,
    url: String,
    org: String,
    token: String,
}

impl InfluxStore {
    /// Connects the client and probes store reachability.
    ///
    /// Writers are only started against a store that answered the health
    /// probe; an unreachable or misconfigured store is a startup failure.
    ///
    /// # Errors
    /// Returns an error if the health endpoint cannot be reached or answers
    /// with a non-success status.
    pub async fn connect(config: &InfluxConfig) -> anyhow::Result<Self> {
        let store = Self {
            client: reqwest::Client::new(),
            url: config.url.trim_end_matches('/').to_string(),
            org: config.org.clone(),
            token: config.token.clone(),
        };

        let health_url = format!("{}/health", store.url);
        let response = store.client.get(&health_url).send().await?;
        anyhow::ensure!(
            response.status().is_success(),
            "store health probe failed with status {}",
            response.status()
        );

        info!(url = %store.url, "Persistence store reachable");
        Ok(store)
    }

    fn write_url(&self, bucket: &str) -> String {
        format!(
            "{}/api/v2/write?org={}&bucket={bucket}&precision=ns",
            self.url, self.org
        )
    }
}

/// Maps an HTTP status onto the retry taxonomy.
fn classify_status(status: StatusCode, bucket: &str) -> Option<WriteError> {
    if status.is_success() {
        return None;
    }
    Some(match status.as_u16() {
        401 | 403 => WriteError::Unauthorized(format!("status {status}")),
        404 => WriteError::BucketNotFound(bucket.to_string()),
        _ => WriteError::Retryable(format!("status {status}")),
    })
}

#[async_trait]
impl TimeSeriesStore for InfluxStore {
    async fn write_batch(&self, bucket: &str, lines: &[String]) -> Result<(), WriteError> {
        if lines.is_empty() {
            return Ok(());
        }

        let body = lines.join("\n");
        let response = self
            .client
            .post(self.write_url(bucket))
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| WriteError::Retryable(e.to_string()))?;

        match classify_status(response.status(), bucket) {
            None => {
                debug!(bucket, points = lines.len(), "Batch written");
                Ok(())
            }
            Some(err) => Err(err),
        }
    }

    async fn close(&self) {
        // reqwest clients release their pools on drop
        info!("Persistence store client closed");
    }
}
