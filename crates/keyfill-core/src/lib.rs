pub mod config;
pub mod error;
pub mod types;

pub use error::{KeyfillError, KeyfillResult};
pub use types::{fmt_bytes, parse_size, BlockRange};
