//! The ticker-mention pipeline.
//!
//! A scan computes a lookback [`window::TimeWindow`], pages through the search
//! API with [`driver::PaginationDriver`], turns every title into a set of
//! tickers with [`extract::TickerExtractor`] and persists the resulting
//! [`mention::TickerMention`] rows with [`output`]. [`pipeline::run_scan`]
//! wires all of it from a loaded configuration.
pub mod driver;
pub mod extract;
pub mod mention;
pub mod output;
pub mod pipeline;
pub mod reference;
pub mod retry;
pub mod tally;
pub mod window;

pub use driver::{PaginationDriver, ScanError, ScanFailure, ScanOutcome, StopReason};
pub use extract::{extract_tickers, ExtractOptions, TickerExtractor};
pub use mention::TickerMention;
pub use pipeline::{run_scan, ScanReport};
pub use reference::{ReferenceData, ReferenceError};
pub use retry::{Backoff, RetryPolicy};
pub use tally::{top_mentions, TickerCount};
pub use window::TimeWindow;
