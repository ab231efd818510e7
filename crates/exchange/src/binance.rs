//! Binance futures combined-stream feed.
//!
//! One WebSocket per symbol carries both the trade stream and the 20-level
//! depth stream (`<sym>@trade` / `<sym>@depth20@100ms`). Venue messages are
//! normalized into [`FeedEvent`]s; malformed frames are logged and skipped,
//! transport failures surface to the caller so the supervisor's restart
//! policy sees them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use sentinel_core::{
    ExchangeFeed, FeedConnector, FeedEvent, OrderBookSnapshot, PriceLevel, Side, StreamKind,
    TradeRecord, VenueDescriptor,
};

/// Combined-stream envelope: `{"stream": "...", "data": {...}}`.
#[derive(Debug, Deserialize)]
struct StreamWrapper {
    stream: String,
    data: serde_json::Value,
}

/// Binance trade stream payload.
#[derive(Debug, Deserialize)]
struct TradeMsg {
    /// Trade time (ms)
    #[serde(rename = "T")]
    trade_time: i64,
    /// Trade id
    #[serde(rename = "t")]
    trade_id: i64,
    /// Price
    #[serde(rename = "p")]
    price: String,
    /// Quantity
    #[serde(rename = "q")]
    quantity: String,
    /// Buyer is the maker (aggressor sold)
    #[serde(rename = "m")]
    is_buyer_maker: bool,
}

/// Binance 20-level depth payload.
#[derive(Debug, Deserialize)]
struct DepthMsg {
    /// Event time (ms)
    #[serde(rename = "E")]
    event_time: i64,
    /// Final update id in this event
    #[serde(rename = "u")]
    last_update_id: i64,
    /// Bids (price, quantity), best first
    #[serde(rename = "b")]
    bids: Vec<[String; 2]>,
    /// Asks (price, quantity), best first
    #[serde(rename = "a")]
    asks: Vec<[String; 2]>,
}

/// Normalizes one combined-stream text frame.
///
/// `None` for control frames (subscription acks), unknown streams, and
/// malformed payloads; those are transient conditions, logged and skipped.
fn parse_frame(exchange: &str, symbol: &str, text: &str) -> Option<FeedEvent> {
    let wrapper: StreamWrapper = match serde_json::from_str(text) {
        Ok(w) => w,
        Err(_) => {
            debug!(frame = text, "Ignoring non-data frame");
            return None;
        }
    };

    let result = if wrapper.stream.ends_with("@trade") {
        parse_trade(exchange, symbol, wrapper.data)
    } else if wrapper.stream.contains("@depth") {
        parse_depth(exchange, symbol, wrapper.data)
    } else {
        debug!(stream = %wrapper.stream, "Ignoring unknown stream");
        return None;
    };

    match result {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(stream = %wrapper.stream, error = %e, "Dropping malformed venue message");
            None
        }
    }
}

fn parse_trade(exchange: &str, symbol: &str, data: serde_json::Value) -> Result<FeedEvent> {
    let msg: TradeMsg = serde_json::from_value(data).context("trade payload")?;
    let side = if msg.is_buyer_maker { Side::Sell } else { Side::Buy };

    Ok(FeedEvent::Trade(TradeRecord {
        exchange: exchange.to_string(),
        symbol: symbol.to_string(),
        side,
        price: msg.price.parse().context("trade price")?,
        size: msg.quantity.parse().context("trade quantity")?,
        trade_id: msg.trade_id.to_string(),
        timestamp_ns: msg.trade_time * 1_000_000,
    }))
}

fn parse_depth(exchange: &str, symbol: &str, data: serde_json::Value) -> Result<FeedEvent> {
    let msg: DepthMsg = serde_json::from_value(data).context("depth payload")?;

    Ok(FeedEvent::Book(OrderBookSnapshot {
        exchange: exchange.to_string(),
        symbol: symbol.to_string(),
        timestamp_ns: msg.event_time * 1_000_000,
        bids: parse_levels(&msg.bids)?,
        asks: parse_levels(&msg.asks)?,
        sequence: Some(msg.last_update_id),
    }))
}

fn parse_levels(levels: &[[String; 2]]) -> Result<Vec<PriceLevel>> {
    levels
        .iter()
        .map(|[price, qty]| {
            Ok(PriceLevel::new(
                price.parse().context("level price")?,
                qty.parse().context("level quantity")?,
            ))
        })
        .collect()
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connected, subscribed feed for one symbol.
pub struct BinanceFeed {
    stream: WsStream,
    exchange: String,
    /// Canonical symbol carried on emitted records, e.g. "BTC/USDT".
    symbol: String,
}

#[async_trait]
impl ExchangeFeed for BinanceFeed {
    async fn next_event(&mut self) -> Result<Option<FeedEvent>> {
        while let Some(msg) = self.stream.next().await {
            match msg? {
                Message::Text(text) => {
                    if let Some(event) = parse_frame(&self.exchange, &self.symbol, &text) {
                        return Ok(Some(event));
                    }
                }
                Message::Ping(payload) => {
                    self.stream.send(Message::Pong(payload)).await?;
                }
                Message::Close(_) => {
                    info!(symbol = %self.symbol, "Venue closed the stream");
                    return Ok(None);
                }
                _ => {}
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Connects per-symbol [`BinanceFeed`]s.
pub struct BinanceConnector {
    ws_url: String,
    descriptor: VenueDescriptor,
}

impl BinanceConnector {
    #[must_use]
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            descriptor: VenueDescriptor::new("binance"),
        }
    }

    fn combined_stream_url(&self, symbol: &str) -> String {
        let stream_symbol = self.descriptor.stream_symbol(symbol);
        format!(
            "{}/stream?streams={stream_symbol}@trade/{stream_symbol}@depth20@100ms",
            self.ws_url
        )
    }
}

#[async_trait]
impl FeedConnector for BinanceConnector {
    fn descriptor(&self) -> &VenueDescriptor {
        &self.descriptor
    }

    async fn connect(&self, symbol: &str) -> Result<Box<dyn ExchangeFeed>> {
        if !self.descriptor.supports(StreamKind::Trades)
            || !self.descriptor.supports(StreamKind::OrderBook)
        {
            anyhow::bail!(
                "venue {} does not serve both stream kinds",
                self.descriptor.exchange
            );
        }

        let url = self.combined_stream_url(symbol);
        debug!(url = %url, "Connecting combined stream");

        let (stream, response) = connect_async(&url)
            .await
            .with_context(|| format!("failed to connect feed for {symbol}"))?;
        info!(symbol, status = %response.status(), "Feed connected");

        Ok(Box::new(BinanceFeed {
            stream,
            exchange: self.descriptor.exchange.clone(),
            symbol: symbol.to_string(),
        }))
    }
}
