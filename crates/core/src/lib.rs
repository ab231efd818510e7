pub mod config;
pub mod config_loader;
pub mod error;
pub mod events;
pub mod shutdown;
pub mod traits;

pub use config::{
    AppConfig, EncodingConfig, ExchangeConfig, InfluxConfig, PipelineConfig, SupervisorConfig,
};
pub use config_loader::ConfigLoader;
pub use error::WriteError;
pub use events::{
    now_ns, FeedEvent, OrderBookSnapshot, PriceLevel, QueueItem, Side, TradeRecord,
};
pub use shutdown::ShutdownToken;
pub use traits::{ExchangeFeed, FeedConnector, StreamKind, TimeSeriesStore, VenueDescriptor};
