//! Types and helpers shared by every cashtag crate.
//!
//! Kept deliberately small so the HTTP, config and scan crates can all depend
//! on it without dragging in each other.
//!
//! - [`observability`]: one-shot `tracing` initialisation for binaries and tests
//! - [`CashtagError`] and [`Result`]: the error surface crossing crate lines
//! - [`SortDirection`]: result ordering understood by the search API
//!
//! ```rust
//! use cashtag_common::CashtagError;
//!
//! let err = CashtagError::Config("page_size must be positive".into());
//! assert_eq!(err.to_string(), "Configuration error: page_size must be positive");
//! ```

use serde::{Deserialize, Serialize};

pub mod observability;

/// Ordering requested from the search API.
///
/// The pagination cursor only advances correctly with [`SortDirection::Asc`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Boxed error kept as the `source` of a [`CashtagError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that cross crate boundaries inside the workspace.
#[derive(thiserror::Error, Debug)]
pub enum CashtagError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reference listings (tickers or stopwords) could not be loaded.
    #[error("Reference data error")]
    Reference(#[source] BoxError),

    /// The scan could not finish.
    #[error("Scan error")]
    Scan(#[source] BoxError),

    /// Persisting the mentions failed.
    #[error("Output error")]
    Output(#[source] BoxError),
}

/// Convenient alias for results that use [`CashtagError`].
pub type Result<T> = std::result::Result<T, CashtagError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn wrapped_errors_keep_their_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "nasdaqlisted.txt missing");
        let err = CashtagError::Reference(Box::new(io));
        assert_eq!(err.to_string(), "Reference data error");
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("nasdaqlisted.txt missing"));
    }

    #[test]
    fn sort_direction_wire_names() {
        assert_eq!(SortDirection::default().as_str(), "asc");
        assert_eq!(SortDirection::Desc.as_str(), "desc");
    }
}
