//! Pipeline orchestration.
//!
//! The supervisor owns the wire queues and the lifecycle of every unit:
//! writers start first so queues drain from the moment collectors connect,
//! one collector runs per configured symbol, and a health reporter snapshots
//! the whole pipeline. Shutdown is cooperative with a bounded grace period,
//! after which stragglers are cancelled outright.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use sentinel_collector::{Collector, CollectorConfig, CollectorCounters};
use sentinel_core::{
    AppConfig, FeedConnector, QueueItem, ShutdownToken, StreamKind, TimeSeriesStore,
};
use sentinel_store::{Writer, WriterConfig};

use crate::health::{HealthReporter, QueueGauge};
use crate::restart::{supervise, RestartPolicy, UnitState};

pub struct Supervisor {
    config: AppConfig,
    connector: Arc<dyn FeedConnector>,
    store: Arc<dyn TimeSeriesStore>,
}

impl Supervisor {
    #[must_use]
    pub fn new(
        config: AppConfig,
        connector: Arc<dyn FeedConnector>,
        store: Arc<dyn TimeSeriesStore>,
    ) -> Self {
        Self {
            config,
            connector,
            store,
        }
    }

    /// Runs the pipeline until a signal, the configured duration, or an
    /// escalated unit failure stops it.
    ///
    /// # Errors
    /// Returns an error when no collector could be configured.
    pub async fn run(self, shutdown: ShutdownToken) -> Result<()> {
        anyhow::ensure!(
            !self.config.exchange.symbols.is_empty(),
            "no symbols configured"
        );
        let descriptor = self.connector.descriptor();
        anyhow::ensure!(
            descriptor.supports(StreamKind::Trades) && descriptor.supports(StreamKind::OrderBook),
            "venue {} does not serve both trade and order book streams",
            descriptor.exchange
        );

        let capacity = self.config.pipeline.queue_capacity;
        let (trade_tx, trade_rx) = mpsc::channel::<QueueItem>(capacity);
        let (book_tx, book_rx) = mpsc::channel::<QueueItem>(capacity);
        let raw = self
            .config
            .encoding
            .raw_book
            .then(|| mpsc::channel::<QueueItem>(capacity));

        let policy = RestartPolicy::from_app(&self.config.supervisor);
        let mut units: JoinSet<()> = JoinSet::new();
        let mut unit_states: Vec<(String, watch::Receiver<UnitState>)> = Vec::new();

        // Writers first, so every queue has a consumer before the first
        // collector connects.
        self.spawn_writer(
            &mut units,
            &mut unit_states,
            &policy,
            &shutdown,
            "writer-trades",
            &self.config.influx.trades_bucket,
            trade_rx,
        );
        self.spawn_writer(
            &mut units,
            &mut unit_states,
            &policy,
            &shutdown,
            "writer-book",
            &self.config.influx.book_bucket,
            book_rx,
        );
        let raw_tx = raw.map(|(tx, rx)| {
            self.spawn_writer(
                &mut units,
                &mut unit_states,
                &policy,
                &shutdown,
                "writer-raw-book",
                &self.config.influx.raw_book_bucket,
                rx,
            );
            tx
        });

        let mut collector_counters = Vec::new();
        for symbol in &self.config.exchange.symbols {
            let counters = Arc::new(CollectorCounters::default());
            collector_counters.push((symbol.clone(), counters.clone()));
            self.spawn_collector(
                &mut units,
                &mut unit_states,
                &policy,
                &shutdown,
                symbol.clone(),
                trade_tx.clone(),
                book_tx.clone(),
                raw_tx.clone(),
                counters,
            );
        }

        let mut gauges = vec![
            QueueGauge::new("trades", trade_tx.clone()),
            QueueGauge::new("order_book", book_tx.clone()),
        ];
        if let Some(tx) = &raw_tx {
            gauges.push(QueueGauge::new("raw_order_book", tx.clone()));
        }
        let reporter =
            HealthReporter::new(&self.config.supervisor, gauges, collector_counters, unit_states);
        let reporter_shutdown = shutdown.clone();
        units.spawn(reporter.run(reporter_shutdown));

        info!(
            symbols = self.config.exchange.symbols.len(),
            raw_book = raw_tx.is_some(),
            "Pipeline started"
        );

        self.wait_for_stop(&shutdown).await;
        shutdown.trigger();

        self.drain(units).await;
        self.store.close().await;
        info!("Pipeline stopped");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_writer(
        &self,
        units: &mut JoinSet<()>,
        unit_states: &mut Vec<(String, watch::Receiver<UnitState>)>,
        policy: &RestartPolicy,
        shutdown: &ShutdownToken,
        name: &'static str,
        bucket: &str,
        rx: mpsc::Receiver<QueueItem>,
    ) {
        let writer = Arc::new(Writer::new(
            name,
            WriterConfig::from_app(&self.config, bucket),
            self.store.clone(),
            rx,
        ));
        let (state_tx, state_rx) = watch::channel(UnitState::Starting);
        unit_states.push((name.to_string(), state_rx));
        let policy = policy.clone();
        let shutdown = shutdown.clone();
        units.spawn(async move {
            let unit_shutdown = shutdown.clone();
            let outcome = supervise(name, &policy, shutdown, state_tx, move || {
                let writer = writer.clone();
                let token = unit_shutdown.clone();
                async move { writer.run(token).await }
            })
            .await;
            if let Err(e) = outcome {
                error!(unit = name, error = %e, "Unit terminated");
            }
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_collector(
        &self,
        units: &mut JoinSet<()>,
        unit_states: &mut Vec<(String, watch::Receiver<UnitState>)>,
        policy: &RestartPolicy,
        shutdown: &ShutdownToken,
        symbol: String,
        trade_tx: mpsc::Sender<QueueItem>,
        book_tx: mpsc::Sender<QueueItem>,
        raw_tx: Option<mpsc::Sender<QueueItem>>,
        counters: Arc<CollectorCounters>,
    ) {
        let config = CollectorConfig::from_app(&self.config, symbol.clone());
        let connector = self.connector.clone();
        let (state_tx, state_rx) = watch::channel(UnitState::Starting);
        unit_states.push((format!("collector-{symbol}"), state_rx));
        let policy = policy.clone();
        let shutdown = shutdown.clone();
        units.spawn(async move {
            let name = format!("collector-{symbol}");
            let unit_shutdown = shutdown.clone();
            let outcome = supervise(&name, &policy, shutdown, state_tx, move || {
                let connector = connector.clone();
                let config = config.clone();
                let symbol = symbol.clone();
                let trade_tx = trade_tx.clone();
                let book_tx = book_tx.clone();
                let raw_tx = raw_tx.clone();
                let counters = counters.clone();
                let token = unit_shutdown.clone();
                async move {
                    // A fresh connection per attempt; stale sockets never
                    // survive a restart.
                    let feed = connector.connect(&symbol).await?;
                    Collector::new(config, feed, trade_tx, book_tx, raw_tx, counters)
                        .run(token)
                        .await
                }
            })
            .await;
            if let Err(e) = outcome {
                error!(unit = %name, error = %e, "Unit terminated");
            }
        });
    }

    /// Blocks until one of the stop conditions fires: SIGINT, the configured
    /// run duration, or a shutdown triggered elsewhere (escalation).
    async fn wait_for_stop(&self, shutdown: &ShutdownToken) {
        let deadline = async {
            match self.config.exchange.run_duration_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            () = shutdown.cancelled() => {
                warn!("Shutdown escalated by a supervised unit");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
            }
            () = deadline => {
                info!(
                    secs = self.config.exchange.run_duration_secs,
                    "Run duration elapsed, shutting down"
                );
            }
        }
    }

    /// Waits for units to exit cooperatively, then cancels anything still
    /// running once the grace period lapses.
    async fn drain(&self, mut units: JoinSet<()>) {
        let grace = Duration::from_secs(self.config.supervisor.shutdown_grace_secs);
        let all_done = async {
            while let Some(joined) = units.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Unit task panicked or was cancelled");
                }
            }
        };

        if tokio::time::timeout(grace, all_done).await.is_err() {
            warn!(
                grace_secs = grace.as_secs(),
                remaining = units.len(),
                "Grace period elapsed, cancelling remaining units"
            );
            units.abort_all();
            while units.join_next().await.is_some() {}
        }
    }
}
