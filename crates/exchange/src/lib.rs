pub mod binance;

pub use binance::{BinanceConnector, BinanceFeed};
