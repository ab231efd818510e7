//! Event-to-point encoding.
//!
//! Pure functions with no shared state; safe to call concurrently from every
//! collector. Three measurements are produced:
//!
//! - `trades`: one point per trade
//! - `order_book`: fixed-cardinality binned depth, exactly `2N+1` points per
//!   snapshot regardless of book sparsity
//! - `raw_order_book`: optional top-N levels per side, not padded
//!
//! `side` and the bin/level index are tags so each line is its own series;
//! points at one timestamp never collapse into each other.

use std::collections::BTreeMap;

use sentinel_core::{OrderBookSnapshot, PriceLevel, TradeRecord};

use crate::line::Point;

/// Symbol form used in tag values. Tag values never contain `/`.
#[must_use]
pub fn tag_symbol(symbol: &str) -> String {
    symbol.replace('/', "-")
}

/// Encodes one trade into a `trades` point.
#[must_use]
pub fn encode_trade(record: &TradeRecord) -> Point {
    Point::new("trades", record.timestamp_ns)
        .tag("exchange", record.exchange.clone())
        .tag("symbol", tag_symbol(&record.symbol))
        .tag("side", record.side.as_str())
        .field_str("trade_id", &record.trade_id)
        .field_float("price", record.price)
        .field_fixed("size", record.size, 8)
}

/// Encodes one snapshot into its fixed-cardinality binned representation.
///
/// Every level's distance from mid price is bucketed into a basis-point bin
/// index clamped to `[-max_bins_per_side, max_bins_per_side]`; bids and asks
/// share one accumulator, so a level from either side that rounds to index 0
/// lands in the neutral `mid` bin. One point is emitted per index, zero bins
/// included, giving exactly `2N+1` points.
///
/// Returns an empty vector when either side is empty or the mid price is
/// zero: no mid price means no bin geometry.
#[must_use]
pub fn encode_binned_book(
    snapshot: &OrderBookSnapshot,
    bin_width_bps: f64,
    max_bins_per_side: i32,
) -> Vec<Point> {
    let (Some(best_bid), Some(best_ask)) = (snapshot.best_bid(), snapshot.best_ask()) else {
        return Vec::new();
    };

    let mid_price = (best_bid + best_ask) / 2.0;
    if mid_price == 0.0 {
        return Vec::new();
    }

    let mut binned: BTreeMap<i32, f64> = BTreeMap::new();
    for level in snapshot.bids.iter().chain(snapshot.asks.iter()) {
        let index = bin_index(level.price, mid_price, bin_width_bps, max_bins_per_side);
        *binned.entry(index).or_insert(0.0) += level.size;
    }

    let symbol = tag_symbol(&snapshot.symbol);
    (-max_bins_per_side..=max_bins_per_side)
        .map(|index| {
            let side = match index {
                i if i < 0 => "bid",
                0 => "mid",
                _ => "ask",
            };
            let total_qty = binned.get(&index).copied().unwrap_or(0.0);

            let mut point = Point::new("order_book", snapshot.timestamp_ns)
                .tag("exchange", snapshot.exchange.clone())
                .tag("symbol", symbol.clone())
                .tag("side", side)
                .tag("bps_offset", index.to_string())
                .field_fixed("total_qty", total_qty, 8)
                .field_fixed("mid_price", mid_price, 2);
            if let Some(sequence) = snapshot.sequence {
                point = point.field_int("sequence", sequence);
            }
            point
        })
        .collect()
}

/// Encodes the top `top_n` levels per side, best first, without padding.
#[must_use]
pub fn encode_raw_book(snapshot: &OrderBookSnapshot, top_n: usize) -> Vec<Point> {
    let symbol = tag_symbol(&snapshot.symbol);
    let mut points = Vec::with_capacity(top_n * 2);

    let mut encode_side = |side: &'static str, levels: &[PriceLevel]| {
        for (index, level) in levels.iter().take(top_n).enumerate() {
            let mut point = Point::new("raw_order_book", snapshot.timestamp_ns)
                .tag("exchange", snapshot.exchange.clone())
                .tag("symbol", symbol.clone())
                .tag("side", side)
                .tag("level", index.to_string())
                .field_float("price", level.price)
                .field_fixed("amount", level.size, 8);
            if let Some(sequence) = snapshot.sequence {
                point = point.field_int("sequence", sequence);
            }
            points.push(point);
        }
    };

    encode_side("bid", &snapshot.bids);
    encode_side("ask", &snapshot.asks);
    points
}

/// Basis-point bin index for one price relative to mid, clamped to the
/// configured range.
fn bin_index(price: f64, mid_price: f64, bin_width_bps: f64, max_bins_per_side: i32) -> i32 {
    let offset_bps = (price - mid_price) / mid_price * 10_000.0;
    let index = (offset_bps / bin_width_bps).round();
    index.clamp(f64::from(-max_bins_per_side), f64::from(max_bins_per_side)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::Side;

    fn snapshot(bids: Vec<(f64, f64)>, asks: Vec<(f64, f64)>) -> OrderBookSnapshot {
        OrderBookSnapshot {
            exchange: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            timestamp_ns: 1_700_000_000_000_000_000,
            bids: bids.into_iter().map(|(p, s)| PriceLevel::new(p, s)).collect(),
            asks: asks.into_iter().map(|(p, s)| PriceLevel::new(p, s)).collect(),
            sequence: Some(99),
        }
    }

    #[test]
    fn test_trade_encoding() {
        let record = TradeRecord {
            exchange: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            side: Side::Sell,
            price: 3000.5,
            size: 0.25,
            trade_id: "t-1".to_string(),
            timestamp_ns: 123,
        };

        let point = encode_trade(&record);
        assert_eq!(point.measurement(), "trades");
        assert_eq!(point.tag_value("symbol"), Some("BTC-USDT"));
        assert_eq!(point.tag_value("side"), Some("sell"));
        assert_eq!(point.field_value("trade_id"), Some("\"t-1\""));
        assert_eq!(point.field_value("size"), Some("0.25000000"));
        assert_eq!(point.timestamp_ns(), 123);
    }

    #[test]
    fn test_binned_book_fixed_cardinality() {
        // Sparse book: two levels total, yet 2N+1 lines always come out.
        let snap = snapshot(vec![(2999.0, 1.0)], vec![(3001.0, 2.0)]);

        for n in [1, 3, 5, 8] {
            let points = encode_binned_book(&snap, 5.0, n);
            assert_eq!(points.len(), (2 * n + 1) as usize, "N = {n}");
        }
    }

    #[test]
    fn test_binned_book_literal_case() {
        let snap = snapshot(
            vec![(2998.0, 0.5), (2997.0, 1.0)],
            vec![(3002.0, 0.3), (3003.0, 0.8)],
        );
        let points = encode_binned_book(&snap, 5.0, 5);
        assert_eq!(points.len(), 11);

        let at = |index: i32| {
            points
                .iter()
                .find(|p| p.tag_value("bps_offset") == Some(index.to_string().as_str()))
                .expect("bin present")
        };

        // mid = 3000.0: 2998.0 is -6.67 bps -> index -1; 3002.0 -> +1
        assert_eq!(at(-1).tag_value("side"), Some("bid"));
        assert_eq!(at(-1).field_value("total_qty"), Some("0.50000000"));
        assert_eq!(at(1).tag_value("side"), Some("ask"));
        assert_eq!(at(1).field_value("total_qty"), Some("0.30000000"));
        assert_eq!(at(-2).field_value("total_qty"), Some("1.00000000"));
        assert_eq!(at(2).field_value("total_qty"), Some("0.80000000"));

        let mid = at(0);
        assert_eq!(mid.tag_value("side"), Some("mid"));
        assert_eq!(mid.field_value("total_qty"), Some("0.00000000"));
        assert_eq!(mid.field_value("mid_price"), Some("3000.00"));
        assert_eq!(mid.field_value("sequence"), Some("99i"));
    }

    #[test]
    fn test_binned_book_rejects_empty_side() {
        let no_bids = snapshot(vec![], vec![(3001.0, 1.0)]);
        let no_asks = snapshot(vec![(2999.0, 1.0)], vec![]);

        assert!(encode_binned_book(&no_bids, 5.0, 5).is_empty());
        assert!(encode_binned_book(&no_asks, 5.0, 5).is_empty());
    }

    #[test]
    fn test_binned_book_clamps_far_levels() {
        // 2000.0 is thousands of bps away; it must land in the edge bin.
        let snap = snapshot(vec![(2999.0, 1.0), (2000.0, 4.0)], vec![(3001.0, 1.0)]);
        let points = encode_binned_book(&snap, 5.0, 5);

        let edge = points
            .iter()
            .find(|p| p.tag_value("bps_offset") == Some("-5"))
            .expect("edge bin");
        assert_eq!(edge.field_value("total_qty"), Some("4.00000000"));
    }

    #[test]
    fn test_binned_book_merges_sides_at_shared_index() {
        // Both touch prices round to index 0: their sizes accumulate in the
        // single mid bin rather than being kept apart per side.
        let snap = snapshot(vec![(3000.0, 1.5)], vec![(3000.2, 2.5)]);
        let points = encode_binned_book(&snap, 5.0, 5);

        let mid = points
            .iter()
            .find(|p| p.tag_value("bps_offset") == Some("0"))
            .expect("mid bin");
        assert_eq!(mid.field_value("total_qty"), Some("4.00000000"));
    }

    #[test]
    fn test_raw_book_top_n_bounded() {
        let snap = snapshot(
            vec![(2999.0, 1.0), (2998.0, 2.0), (2997.0, 3.0)],
            vec![(3001.0, 1.0)],
        );

        let points = encode_raw_book(&snap, 2);
        let bids: Vec<_> = points
            .iter()
            .filter(|p| p.tag_value("side") == Some("bid"))
            .collect();
        let asks: Vec<_> = points
            .iter()
            .filter(|p| p.tag_value("side") == Some("ask"))
            .collect();

        // min(top_n, available) per side, no padding
        assert_eq!(bids.len(), 2);
        assert_eq!(asks.len(), 1);
        assert_eq!(bids[0].tag_value("level"), Some("0"));
        assert_eq!(bids[1].tag_value("level"), Some("1"));
        assert_eq!(bids[1].field_value("amount"), Some("2.00000000"));
        assert_eq!(asks[0].field_value("price"), Some("3001"));
    }

    #[test]
    fn test_raw_book_omits_sequence_when_absent() {
        let mut snap = snapshot(vec![(2999.0, 1.0)], vec![(3001.0, 1.0)]);
        snap.sequence = None;

        let points = encode_raw_book(&snap, 1);
        assert!(points.iter().all(|p| p.field_value("sequence").is_none()));
    }
}
