use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Lowercase tag value for the wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// One executed trade from the venue feed.
///
/// Immutable once constructed; consumed exactly once by the encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub exchange: String,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub trade_id: String,
    pub timestamp_ns: i64,
}

/// One price level on a single book side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub size: f64,
}

impl PriceLevel {
    #[must_use]
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }
}

/// One order book state from the venue feed.
///
/// `bids` are best-first descending, `asks` best-first ascending. A snapshot
/// with an empty side carries no computable mid price and is dropped before
/// encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub exchange: String,
    pub symbol: String,
    pub timestamp_ns: i64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    /// Venue update sequence number, where the venue provides one.
    pub sequence: Option<i64>,
}

impl OrderBookSnapshot {
    /// Best (highest) bid price, if the bid side is non-empty.
    #[must_use]
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    /// Best (lowest) ask price, if the ask side is non-empty.
    #[must_use]
    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// True when either side is empty.
    #[must_use]
    pub fn has_empty_side(&self) -> bool {
        self.bids.is_empty() || self.asks.is_empty()
    }
}

/// Normalized event delivered by an exchange feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FeedEvent {
    Trade(TradeRecord),
    Book(OrderBookSnapshot),
}

/// One entry on a collector -> writer queue.
///
/// A trade encodes to a single wire line; a book snapshot encodes to a list.
/// The writer flattens both shapes into its batch.
#[derive(Debug, Clone)]
pub enum QueueItem {
    Line(String),
    Lines(Vec<String>),
}

impl QueueItem {
    /// Number of wire lines this item contributes to a batch.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            QueueItem::Line(_) => 1,
            QueueItem::Lines(lines) => lines.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Current wall clock in nanoseconds since the epoch.
#[must_use]
pub fn now_ns() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_as_str() {
        assert_eq!(Side::Buy.as_str(), "buy");
        assert_eq!(Side::Sell.as_str(), "sell");
    }

    #[test]
    fn test_snapshot_best_prices() {
        let snap = OrderBookSnapshot {
            exchange: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            timestamp_ns: 0,
            bids: vec![PriceLevel::new(2998.0, 0.5), PriceLevel::new(2997.0, 1.0)],
            asks: vec![PriceLevel::new(3002.0, 0.3), PriceLevel::new(3003.0, 0.8)],
            sequence: Some(42),
        };

        assert_eq!(snap.best_bid(), Some(2998.0));
        assert_eq!(snap.best_ask(), Some(3002.0));
        assert!(!snap.has_empty_side());
    }

    #[test]
    fn test_snapshot_empty_side() {
        let snap = OrderBookSnapshot {
            exchange: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            timestamp_ns: 0,
            bids: Vec::new(),
            asks: vec![PriceLevel::new(3002.0, 0.3)],
            sequence: None,
        };

        assert!(snap.has_empty_side());
        assert_eq!(snap.best_bid(), None);
    }

    #[test]
    fn test_queue_item_len() {
        assert_eq!(QueueItem::Line("a".to_string()).len(), 1);
        let lines = QueueItem::Lines(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(lines.len(), 2);
        assert!(!lines.is_empty());
        assert!(QueueItem::Lines(Vec::new()).is_empty());
    }
}
