//! Pushshift Reddit submission search.
//!
//! `client` wraps the shared HTTP client with the Pushshift query vocabulary,
//! `types` holds the response envelope and the per-record submission model.
pub mod client;
pub mod types;

pub use client::{PostSource, PushshiftApi, SearchError, SearchFilters};
pub use types::{SearchResponse, Submission};
