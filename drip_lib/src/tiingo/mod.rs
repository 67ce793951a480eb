//! Tiingo REST provider for daily end-of-day prices and IEX intraday bars.
//!
//! Selected with `provider: tiingo`. Requires an API token, read from
//! `TIINGO_API_KEY`.

pub mod client;
pub mod error;
pub mod types;

pub use client::TiingoClient;
pub use error::TiingoError;
