pub mod line;
pub mod schema;

pub use line::Point;
pub use schema::{encode_binned_book, encode_raw_book, encode_trade, tag_symbol};
