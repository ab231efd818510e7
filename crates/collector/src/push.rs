//! Bounded-retry queue push.
//!
//! The feed loop must never block indefinitely behind a slow writer: a full
//! queue is retried a fixed number of times with a fixed delay, then the item
//! is dropped and counted. Bounded memory wins over perfect delivery.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use sentinel_core::QueueItem;

/// Pushes `item` onto `tx`, retrying a full queue up to `max_retries` times
/// with `retry_delay` between attempts.
///
/// Returns `true` if the item was enqueued. On final failure the item is
/// discarded, `dropped` is incremented, and a warning names the stream. The
/// call never blocks longer than `max_retries * retry_delay`.
pub async fn push_with_retry(
    tx: &mpsc::Sender<QueueItem>,
    mut item: QueueItem,
    max_retries: u32,
    retry_delay: Duration,
    dropped: &AtomicU64,
    stream: &str,
) -> bool {
    let mut attempts_left = max_retries;
    loop {
        match tx.try_send(item) {
            Ok(()) => return true,
            Err(mpsc::error::TrySendError::Full(returned)) => {
                if attempts_left == 0 {
                    let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(
                        stream,
                        retries = max_retries,
                        dropped_total = total,
                        "Queue full after bounded retries, dropping item"
                    );
                    return false;
                }
                attempts_left -= 1;
                item = returned;
                tokio::time::sleep(retry_delay).await;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Writer is gone; shutdown is in progress
                debug!(stream, "Queue closed, discarding item");
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_push_succeeds_with_capacity() {
        let (tx, mut rx) = mpsc::channel(4);
        let dropped = AtomicU64::new(0);

        let ok = push_with_retry(
            &tx,
            QueueItem::Line("a".to_string()),
            3,
            Duration::from_millis(10),
            &dropped,
            "trades",
        )
        .await;

        assert!(ok);
        assert_eq!(dropped.load(Ordering::Relaxed), 0);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_full_queue_drops_after_bounded_retries() {
        let (tx, _rx) = mpsc::channel(1);
        tx.try_send(QueueItem::Line("occupant".to_string())).unwrap();
        let dropped = AtomicU64::new(0);

        let retries = 3;
        let delay = Duration::from_millis(20);
        let start = Instant::now();
        let ok = push_with_retry(
            &tx,
            QueueItem::Line("overflow".to_string()),
            retries,
            delay,
            &dropped,
            "trades",
        )
        .await;
        let elapsed = start.elapsed();

        assert!(!ok);
        assert_eq!(dropped.load(Ordering::Relaxed), 1);
        // Exactly `retries` sleeps, and not unboundedly more
        assert!(elapsed >= delay * retries);
        assert!(elapsed < delay * (retries + 2));
    }

    #[tokio::test]
    async fn test_retry_succeeds_when_consumer_drains() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send(QueueItem::Line("occupant".to_string())).unwrap();
        let dropped = AtomicU64::new(0);

        let drainer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            rx.recv().await
        });

        let ok = push_with_retry(
            &tx,
            QueueItem::Line("waiting".to_string()),
            10,
            Duration::from_millis(20),
            &dropped,
            "book",
        )
        .await;

        assert!(ok);
        assert_eq!(dropped.load(Ordering::Relaxed), 0);
        drainer.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_queue_discards_quietly() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let dropped = AtomicU64::new(0);

        let ok = push_with_retry(
            &tx,
            QueueItem::Line("late".to_string()),
            3,
            Duration::from_millis(5),
            &dropped,
            "trades",
        )
        .await;

        assert!(!ok);
        // Closed-on-shutdown is not backpressure; the drop counter stays put
        assert_eq!(dropped.load(Ordering::Relaxed), 0);
    }
}
