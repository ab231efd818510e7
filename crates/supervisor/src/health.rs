//! Periodic health reporting.
//!
//! Emits one structured snapshot per interval: queue depths for each wire
//! queue and cumulative collect/drop counters per symbol. Depth is derived
//! from the sender side so the reporter never competes with the writers for
//! the receivers.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::info;

use sentinel_collector::CollectorCounters;
use sentinel_core::{QueueItem, ShutdownToken, SupervisorConfig};

use crate::restart::UnitState;

/// Observes one queue's occupancy through a sender handle.
pub struct QueueGauge {
    pub name: &'static str,
    tx: mpsc::Sender<QueueItem>,
}

impl QueueGauge {
    #[must_use]
    pub fn new(name: &'static str, tx: mpsc::Sender<QueueItem>) -> Self {
        Self { name, tx }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

pub struct HealthReporter {
    interval: Duration,
    gauges: Vec<QueueGauge>,
    collectors: Vec<(String, Arc<CollectorCounters>)>,
    units: Vec<(String, watch::Receiver<UnitState>)>,
}

impl HealthReporter {
    #[must_use]
    pub fn new(
        config: &SupervisorConfig,
        gauges: Vec<QueueGauge>,
        collectors: Vec<(String, Arc<CollectorCounters>)>,
        units: Vec<(String, watch::Receiver<UnitState>)>,
    ) -> Self {
        Self {
            interval: Duration::from_secs(config.health_interval_secs),
            gauges,
            collectors,
            units,
        }
    }

    pub async fn run(self, shutdown: ShutdownToken) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // Skip the immediate first tick; report after one full interval
        tick.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = tick.tick() => self.report(),
            }
        }
    }

    fn report(&self) {
        for (name, state) in &self.units {
            info!(unit = %name, state = state.borrow().as_str(), "Unit health");
        }
        for gauge in &self.gauges {
            info!(queue = gauge.name, depth = gauge.depth(), "Queue health");
        }
        for (symbol, counters) in &self.collectors {
            info!(
                symbol = %symbol,
                trades = counters.trades_collected.load(Ordering::Relaxed),
                books = counters.books_collected.load(Ordering::Relaxed),
                trades_dropped = counters.trades_dropped.load(Ordering::Relaxed),
                books_dropped = counters.books_dropped.load(Ordering::Relaxed),
                raw_dropped = counters.raw_dropped.load(Ordering::Relaxed),
                "Collector health"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gauge_tracks_queue_occupancy() {
        let (tx, mut rx) = mpsc::channel(8);
        let gauge = QueueGauge::new("trades", tx.clone());
        assert_eq!(gauge.depth(), 0);

        tx.send(QueueItem::Line("a v=1 1".to_string())).await.unwrap();
        tx.send(QueueItem::Line("b v=2 2".to_string())).await.unwrap();
        assert_eq!(gauge.depth(), 2);

        rx.recv().await.unwrap();
        assert_eq!(gauge.depth(), 1);
    }

    #[tokio::test]
    async fn test_reporter_stops_on_shutdown() {
        let config = SupervisorConfig {
            restart_backoff_secs: vec![1],
            stable_uptime_secs: 60,
            health_interval_secs: 60,
            shutdown_grace_secs: 1,
        };
        let reporter = HealthReporter::new(&config, Vec::new(), Vec::new(), Vec::new());
        let shutdown = ShutdownToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(reporter.run(token));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reporter must exit promptly")
            .unwrap();
    }
}
