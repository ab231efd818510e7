use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    pub encoding: EncodingConfig,
    pub pipeline: PipelineConfig,
    pub supervisor: SupervisorConfig,
    pub influx: InfluxConfig,
}

/// Upstream connection and collection cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Venue identifier (selects the feed adapter).
    pub id: String,
    pub ws_url: String,
    /// Canonical symbols, e.g. "BTC/USDT". One collector per symbol.
    pub symbols: Vec<String>,
    /// Minimum interval between emitted book snapshots, per symbol.
    pub book_cadence_ms: u64,
    /// Total run duration in seconds; absent means run until signalled.
    pub run_duration_secs: Option<u64>,
}

/// Encoder parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Width of one order book bin in basis points.
    pub bin_width_bps: f64,
    /// Bins per side (N); every snapshot emits exactly 2N+1 binned lines.
    pub max_bins_per_side: i32,
    /// Capture raw top-N levels alongside the binned representation.
    pub raw_book: bool,
    /// Levels per side for the raw representation.
    pub raw_book_depth: usize,
}

/// Queue, batching, and write-retry tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    /// Retries for a full queue before the item is dropped and counted.
    pub max_queue_retries: u32,
    pub queue_retry_delay_ms: u64,
    /// Flush as soon as a batch reaches this many points.
    pub max_batch_points: usize,
    /// Flush at least this often, even when the batch is small.
    pub flush_interval_secs: u64,
    /// Retries of an identical batch on retryable store failures.
    pub max_write_retries: u32,
    /// Base for the exponential write backoff (delay = base * 2^attempt).
    pub write_retry_base_ms: u64,
}

/// Restart policy and observability cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Ordered restart delays; exhausting it escalates to global shutdown.
    pub restart_backoff_secs: Vec<u64>,
    /// Uptime after which a unit's restart budget resets.
    pub stable_uptime_secs: u64,
    pub health_interval_secs: u64,
    /// Grace period for cooperative unit exit before cancellation.
    pub shutdown_grace_secs: u64,
}

/// Persistence store endpoint. The token comes from the environment
/// (`SENTINEL_INFLUX__TOKEN`), never from a checked-in file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    pub url: String,
    pub org: String,
    #[serde(default)]
    pub token: String,
    pub trades_bucket: String,
    pub book_bucket: String,
    pub raw_book_bucket: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig {
                id: "binance".to_string(),
                ws_url: "wss://fstream.binance.com".to_string(),
                symbols: vec!["BTC/USDT".to_string()],
                book_cadence_ms: 1000,
                run_duration_secs: None,
            },
            encoding: EncodingConfig {
                bin_width_bps: 5.0,
                max_bins_per_side: 5,
                raw_book: false,
                raw_book_depth: 10,
            },
            pipeline: PipelineConfig {
                queue_capacity: 1000,
                max_queue_retries: 3,
                queue_retry_delay_ms: 100,
                max_batch_points: 5000,
                flush_interval_secs: 5,
                max_write_retries: 3,
                write_retry_base_ms: 500,
            },
            supervisor: SupervisorConfig {
                restart_backoff_secs: vec![1, 2, 5, 10],
                stable_uptime_secs: 60,
                health_interval_secs: 30,
                shutdown_grace_secs: 10,
            },
            influx: InfluxConfig {
                url: "http://localhost:8086".to_string(),
                org: "sentinel".to_string(),
                token: String::new(),
                trades_bucket: "trades".to_string(),
                book_bucket: "order_book".to_string(),
                raw_book_bucket: "raw_order_book".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.exchange.id, "binance");
        assert_eq!(config.encoding.max_bins_per_side, 5);
        assert!((config.encoding.bin_width_bps - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.pipeline.max_batch_points, 5000);
        assert_eq!(config.supervisor.restart_backoff_secs, vec![1, 2, 5, 10]);
        assert!(config.influx.token.is_empty());
    }
}
