//! Batching writer: one unit per (queue, bucket).
//!
//! Drains its queue into a local batch and flushes on whichever trigger
//! fires first: batch size or batch age. The queue poll uses a short timeout
//! so the age trigger is checked even when the queue is idle. Flush failures
//! are classified: fatal ones abandon the batch immediately and loudly,
//! retryable ones back off exponentially up to a cap, then the batch is
//! dropped; bounded memory over perfect delivery.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use sentinel_core::{AppConfig, QueueItem, ShutdownToken, TimeSeriesStore};

/// How long one queue poll waits before re-checking the age trigger.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub bucket: String,
    pub max_batch_points: usize,
    pub flush_interval: Duration,
    /// Retries of an identical batch after the first failed attempt.
    pub max_retries: u32,
    /// Backoff base; the delay doubles per attempt.
    pub retry_base: Duration,
}

impl WriterConfig {
    #[must_use]
    pub fn from_app(config: &AppConfig, bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            max_batch_points: config.pipeline.max_batch_points,
            flush_interval: Duration::from_secs(config.pipeline.flush_interval_secs),
            max_retries: config.pipeline.max_write_retries,
            retry_base: Duration::from_millis(config.pipeline.write_retry_base_ms),
        }
    }
}

/// One writer unit. The receiver sits behind a mutex so a supervised restart
/// can re-enter `run` without rebuilding the queue.
pub struct Writer {
    name: String,
    config: WriterConfig,
    store: Arc<dyn TimeSeriesStore>,
    rx: Mutex<mpsc::Receiver<QueueItem>>,
}

impl Writer {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        config: WriterConfig,
        store: Arc<dyn TimeSeriesStore>,
        rx: mpsc::Receiver<QueueItem>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            store,
            rx: Mutex::new(rx),
        }
    }

    /// Runs the drain loop until shutdown (or queue closure), then performs
    /// one final flush of everything still buffered or immediately pending.
    ///
    /// # Errors
    /// Currently always returns `Ok`; store failures are absorbed by the
    /// flush policy rather than crashing the unit.
    pub async fn run(&self, shutdown: ShutdownToken) -> Result<()> {
        let mut rx = self.rx.lock().await;
        let mut batch: Vec<String> = Vec::with_capacity(self.config.max_batch_points);
        let mut last_flush = Instant::now();
        info!(writer = %self.name, bucket = %self.config.bucket, "Writer started");

        loop {
            if shutdown.is_set() {
                break;
            }

            match timeout(POLL_TIMEOUT, rx.recv()).await {
                Ok(Some(item)) => {
                    append_item(&mut batch, item);
                    if batch.len() >= self.config.max_batch_points {
                        self.flush(&mut batch).await;
                        last_flush = Instant::now();
                    }
                }
                Ok(None) => {
                    debug!(writer = %self.name, "Queue closed");
                    break;
                }
                Err(_) => {} // poll timeout; fall through to the age check
            }

            if !batch.is_empty() && last_flush.elapsed() >= self.config.flush_interval {
                self.flush(&mut batch).await;
                last_flush = Instant::now();
            }
        }

        // Take what already sits in the queue, then one final flush. New
        // pushes are no longer accepted past this point.
        while let Ok(item) = rx.try_recv() {
            append_item(&mut batch, item);
        }
        if !batch.is_empty() {
            info!(writer = %self.name, points = batch.len(), "Final flush");
            self.flush(&mut batch).await;
        }

        info!(writer = %self.name, "Writer stopped");
        Ok(())
    }

    /// Flushes one batch, retrying retryable failures with exponential
    /// backoff. The batch is cleared whatever the outcome.
    async fn flush(&self, batch: &mut Vec<String>) {
        let mut attempt = 0u32;
        loop {
            match self.store.write_batch(&self.config.bucket, batch).await {
                Ok(()) => {
                    debug!(writer = %self.name, points = batch.len(), "Batch flushed");
                    batch.clear();
                    return;
                }
                Err(e) if e.is_fatal() => {
                    error!(
                        writer = %self.name,
                        bucket = %self.config.bucket,
                        points = batch.len(),
                        error = %e,
                        "Fatal store error, abandoning batch"
                    );
                    batch.clear();
                    return;
                }
                Err(e) => {
                    if attempt >= self.config.max_retries {
                        error!(
                            writer = %self.name,
                            points = batch.len(),
                            retries = self.config.max_retries,
                            error = %e,
                            "Write retries exhausted, dropping batch"
                        );
                        batch.clear();
                        return;
                    }
                    let delay = self.config.retry_base * 2u32.saturating_pow(attempt);
                    warn!(
                        writer = %self.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retryable store error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn append_item(batch: &mut Vec<String>, item: QueueItem) {
    match item {
        QueueItem::Line(line) => batch.push(line),
        QueueItem::Lines(lines) => batch.extend(lines),
    }
}
