pub mod collector;
pub mod gap;
pub mod push;

pub use collector::{Collector, CollectorConfig, CollectorCounters};
pub use gap::{GapAudit, SequenceCheck};
pub use push::push_with_retry;
