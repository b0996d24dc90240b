//! Social network search clients used by cashtag.
//!
//! Only the Pushshift Reddit search is implemented. The client issues exactly
//! one request per call; paging and retrying belong to the caller.
pub mod pushshift;
