//! Per-symbol collection unit.
//!
//! Owns one exchange feed and converts its events into wire lines: trades go
//! to the trade queue, book snapshots to the binned book queue and optionally
//! the raw book queue. The binned and raw streams are independent so a burst
//! in one cannot starve the other. Restart-on-crash belongs to the
//! supervisor; this unit reports failures by returning them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use sentinel_core::{
    AppConfig, ExchangeFeed, FeedEvent, OrderBookSnapshot, QueueItem, ShutdownToken, TradeRecord,
};
use sentinel_encoder::{encode_binned_book, encode_raw_book, encode_trade};

use crate::gap::{GapAudit, SequenceCheck};
use crate::push::push_with_retry;

/// Per-collector tuning, derived from the application config.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub symbol: String,
    /// Minimum interval between emitted book snapshots.
    pub book_cadence: Duration,
    pub bin_width_bps: f64,
    pub max_bins_per_side: i32,
    pub raw_book_depth: usize,
    pub max_queue_retries: u32,
    pub queue_retry_delay: Duration,
}

impl CollectorConfig {
    /// Builds the per-symbol view of the application config.
    #[must_use]
    pub fn from_app(config: &AppConfig, symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            book_cadence: Duration::from_millis(config.exchange.book_cadence_ms),
            bin_width_bps: config.encoding.bin_width_bps,
            max_bins_per_side: config.encoding.max_bins_per_side,
            raw_book_depth: config.encoding.raw_book_depth,
            max_queue_retries: config.pipeline.max_queue_retries,
            queue_retry_delay: Duration::from_millis(config.pipeline.queue_retry_delay_ms),
        }
    }
}

/// Cumulative per-stream statistics, shared with the health reporter.
#[derive(Debug, Default)]
pub struct CollectorCounters {
    pub trades_collected: AtomicU64,
    pub books_collected: AtomicU64,
    pub trades_dropped: AtomicU64,
    pub books_dropped: AtomicU64,
    pub raw_dropped: AtomicU64,
}

/// One collection unit for one (exchange, symbol).
pub struct Collector {
    config: CollectorConfig,
    feed: Box<dyn ExchangeFeed>,
    trade_tx: mpsc::Sender<QueueItem>,
    book_tx: mpsc::Sender<QueueItem>,
    raw_tx: Option<mpsc::Sender<QueueItem>>,
    audit: GapAudit,
    last_book_emit_ns: Option<i64>,
    counters: Arc<CollectorCounters>,
}

impl Collector {
    #[must_use]
    pub fn new(
        config: CollectorConfig,
        feed: Box<dyn ExchangeFeed>,
        trade_tx: mpsc::Sender<QueueItem>,
        book_tx: mpsc::Sender<QueueItem>,
        raw_tx: Option<mpsc::Sender<QueueItem>>,
        counters: Arc<CollectorCounters>,
    ) -> Self {
        Self {
            config,
            feed,
            trade_tx,
            book_tx,
            raw_tx,
            audit: GapAudit::new(),
            last_book_emit_ns: None,
            counters,
        }
    }

    /// Runs the collection loop until shutdown or a feed failure.
    ///
    /// # Errors
    /// Returns an error when the feed fails or ends while the process is
    /// still running; the supervisor decides whether to restart.
    pub async fn run(mut self, shutdown: ShutdownToken) -> Result<()> {
        info!(symbol = %self.config.symbol, "Collector started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                event = self.feed.next_event() => match event {
                    Ok(Some(FeedEvent::Trade(trade))) => self.handle_trade(trade).await,
                    Ok(Some(FeedEvent::Book(book))) => self.handle_book(book).await,
                    Ok(None) => {
                        if shutdown.is_set() {
                            break;
                        }
                        anyhow::bail!("feed ended for {}", self.config.symbol);
                    }
                    Err(e) => {
                        return Err(e.context(format!("feed error for {}", self.config.symbol)));
                    }
                },
            }
        }

        if let Err(e) = self.feed.close().await {
            warn!(symbol = %self.config.symbol, error = %e, "Feed close failed");
        }
        info!(symbol = %self.config.symbol, "Collector stopped");
        Ok(())
    }

    async fn handle_trade(&mut self, trade: TradeRecord) {
        let line = encode_trade(&trade).to_line();
        self.counters.trades_collected.fetch_add(1, Ordering::Relaxed);

        push_with_retry(
            &self.trade_tx,
            QueueItem::Line(line),
            self.config.max_queue_retries,
            self.config.queue_retry_delay,
            &self.counters.trades_dropped,
            "trades",
        )
        .await;
    }

    async fn handle_book(&mut self, book: OrderBookSnapshot) {
        // Audit every sequenced event, including ones the cadence throttle
        // will skip, so gap coverage is complete.
        if let Some(sequence) = book.sequence {
            match self.audit.observe(sequence) {
                SequenceCheck::First => {
                    debug!(symbol = %self.config.symbol, sequence, "First book sequence");
                }
                SequenceCheck::InOrder => {}
                SequenceCheck::Gap { missed } => {
                    warn!(
                        symbol = %self.config.symbol,
                        sequence,
                        missed,
                        "Sequence gap in book stream, continuing without resync"
                    );
                }
                SequenceCheck::Stale { last } => {
                    error!(
                        symbol = %self.config.symbol,
                        sequence,
                        last,
                        "Stale or out-of-order book sequence"
                    );
                }
            }
        }

        if book.has_empty_side() {
            debug!(symbol = %self.config.symbol, "Dropping one-sided book snapshot");
            return;
        }

        if let Some(last) = self.last_book_emit_ns {
            let cadence_ns = i64::try_from(self.config.book_cadence.as_nanos()).unwrap_or(i64::MAX);
            if book.timestamp_ns - last < cadence_ns {
                return;
            }
        }
        self.last_book_emit_ns = Some(book.timestamp_ns);

        let binned: Vec<String> = encode_binned_book(
            &book,
            self.config.bin_width_bps,
            self.config.max_bins_per_side,
        )
        .iter()
        .map(sentinel_encoder::Point::to_line)
        .collect();

        if binned.is_empty() {
            // Zero mid price; nothing encodable
            return;
        }
        self.counters.books_collected.fetch_add(1, Ordering::Relaxed);

        push_with_retry(
            &self.book_tx,
            QueueItem::Lines(binned),
            self.config.max_queue_retries,
            self.config.queue_retry_delay,
            &self.counters.books_dropped,
            "order_book",
        )
        .await;

        if let Some(raw_tx) = &self.raw_tx {
            let raw: Vec<String> = encode_raw_book(&book, self.config.raw_book_depth)
                .iter()
                .map(sentinel_encoder::Point::to_line)
                .collect();

            push_with_retry(
                raw_tx,
                QueueItem::Lines(raw),
                self.config.max_queue_retries,
                self.config.queue_retry_delay,
                &self.counters.raw_dropped,
                "raw_order_book",
            )
            .await;
        }
    }
}
