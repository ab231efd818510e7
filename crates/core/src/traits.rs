use crate::error::WriteError;
use crate::events::FeedEvent;
use anyhow::Result;
use async_trait::async_trait;

/// Stream kinds a venue can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Trades,
    OrderBook,
}

/// Capability descriptor for one exchange connection.
///
/// Injected into collectors instead of any runtime inspection of the concrete
/// client: it names the venue, the stream kinds it serves, and the symbol
/// transforms between the canonical form (`BTC/USDT`), the venue's stream
/// naming, and the persisted tag value.
#[derive(Debug, Clone)]
pub struct VenueDescriptor {
    pub exchange: String,
    pub has_trades: bool,
    pub has_order_book: bool,
}

impl VenueDescriptor {
    #[must_use]
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            has_trades: true,
            has_order_book: true,
        }
    }

    /// True when the venue serves the given stream kind.
    #[must_use]
    pub fn supports(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Trades => self.has_trades,
            StreamKind::OrderBook => self.has_order_book,
        }
    }

    /// Symbol as the venue names its streams: lowercase, separator stripped.
    #[must_use]
    pub fn stream_symbol(&self, symbol: &str) -> String {
        symbol.replace('/', "").to_lowercase()
    }

    /// Symbol as persisted in tag values. Tag values never contain `/`.
    #[must_use]
    pub fn tag_symbol(&self, symbol: &str) -> String {
        symbol.replace('/', "-")
    }
}

/// Upstream capability: a subscribed market-data connection for one symbol.
///
/// `next_event` yields normalized events in venue delivery order. Transport
/// failures surface as errors so the caller's restart policy can observe
/// them; `Ok(None)` means the venue closed the stream.
#[async_trait]
pub trait ExchangeFeed: Send {
    async fn next_event(&mut self) -> Result<Option<FeedEvent>>;

    /// Gracefully closes the connection. Called exactly once, on shutdown.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for per-symbol feeds, owned by the supervisor.
///
/// A fresh feed is connected on every (re)start of a collector unit.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    fn descriptor(&self) -> &VenueDescriptor;

    /// Connects and subscribes trade + order book streams for `symbol`.
    ///
    /// # Errors
    /// Returns an error if the connection or subscription fails, or the
    /// symbol is not served by this venue.
    async fn connect(&self, symbol: &str) -> Result<Box<dyn ExchangeFeed>>;
}

/// Downstream capability: a line-protocol time-series store.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Persists one batch of wire lines into `bucket`.
    ///
    /// # Errors
    /// Returns a classified [`WriteError`]; fatal variants must not be retried.
    async fn write_batch(&self, bucket: &str, lines: &[String]) -> Result<(), WriteError>;

    /// Releases the client. Called exactly once, during supervised shutdown.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_symbol_transforms() {
        let venue = VenueDescriptor::new("binance");
        assert_eq!(venue.stream_symbol("BTC/USDT"), "btcusdt");
        assert_eq!(venue.tag_symbol("BTC/USDT"), "BTC-USDT");
        assert_eq!(venue.tag_symbol("BTCUSDT"), "BTCUSDT");
    }

    #[test]
    fn test_descriptor_supports() {
        let mut venue = VenueDescriptor::new("binance");
        assert!(venue.supports(StreamKind::Trades));
        assert!(venue.supports(StreamKind::OrderBook));

        venue.has_order_book = false;
        assert!(!venue.supports(StreamKind::OrderBook));
    }
}
