//! Persistence layer: the HTTP line-protocol store client and the batching
//! writers that drain the pipeline queues into it.

pub mod influx;
pub mod writer;

pub use influx::InfluxStore;
pub use writer::{Writer, WriterConfig};
