//! Exchange listings and stopwords, loaded once per run.
//!
//! Listings are the pipe-delimited Nasdaq Trader symbol directories
//! (`nasdaqlisted.txt` keyed by `Symbol`, `otherlisted.txt` keyed by
//! `ACT Symbol`), each ending with a `File Creation Time` trailer. A source is
//! either an `http(s)` URL or a local path. Any failure here is fatal: without
//! the listings no ticker can be validated.
use cashtag_config::ReferenceConfig;
use cashtag_http::{HttpClient, HttpError, RequestOpts};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const SYMBOL_COLUMNS: [&str; 3] = ["Symbol", "ACT Symbol", "NASDAQ Symbol"];
const ETF_COLUMN: &str = "ETF";
const TRAILER_PREFIX: &str = "File Creation Time";

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to download listing {location}: {error}")]
    Fetch {
        location: String,
        #[source]
        error: HttpError,
    },
    #[error("failed to read {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("listing {location} is malformed: {reason}")]
    Malformed { location: String, reason: String },
    #[error("listing {location} contained no symbols")]
    Empty { location: String },
}

/// Valid tickers and domain stopwords, both uppercase. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceData {
    valid: HashSet<String>,
    stopwords: HashSet<String>,
}

impl ReferenceData {
    pub fn new<V, W, S, T>(valid: V, stopwords: W) -> Self
    where
        V: IntoIterator<Item = S>,
        W: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            valid: normalize(valid),
            stopwords: normalize(stopwords),
        }
    }

    pub fn valid_tickers(&self) -> &HashSet<String> {
        &self.valid
    }

    pub fn stopwords(&self) -> &HashSet<String> {
        &self.stopwords
    }

    /// Download or read every configured listing plus the stopword sources.
    pub async fn load(cfg: &ReferenceConfig) -> Result<Self, ReferenceError> {
        let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
        let mut valid: Vec<String> = Vec::new();

        for location in cfg.listings.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            let text = read_source(location, timeout).await?;
            let symbols = parse_listing(location, &text, cfg.include_etfs)?;
            tracing::info!(location, symbols = symbols.len(), "reference.listing.loaded");
            valid.extend(symbols);
        }

        let mut stopwords = cfg.stopwords.clone();
        if let Some(path) = &cfg.stopwords_file {
            let text = read_file(path).await?;
            stopwords.extend(parse_stopwords(&text));
        }

        let data = Self::new(valid, stopwords);
        tracing::info!(
            valid = data.valid.len(),
            stopwords = data.stopwords.len(),
            "reference.ready"
        );
        Ok(data)
    }
}

fn normalize<I, S>(items: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Symbols from one pipe-delimited directory, ETFs dropped unless `include_etfs`.
pub fn parse_listing(
    location: &str,
    text: &str,
    include_etfs: bool,
) -> Result<Vec<String>, ReferenceError> {
    let malformed = |reason: String| ReferenceError::Malformed {
        location: location.to_string(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(|e| malformed(e.to_string()))?.clone();
    let symbol_idx = headers
        .iter()
        .position(|h| SYMBOL_COLUMNS.contains(&h))
        .ok_or_else(|| malformed(format!("no symbol column in header {:?}", headers)))?;
    let etf_idx = headers.iter().position(|h| h == ETF_COLUMN);

    let mut symbols = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| malformed(e.to_string()))?;
        let Some(symbol) = record.get(symbol_idx) else {
            continue;
        };
        if symbol.is_empty() || symbol.starts_with(TRAILER_PREFIX) {
            continue;
        }
        let is_etf = etf_idx.and_then(|i| record.get(i)) == Some("Y");
        if is_etf && !include_etfs {
            continue;
        }
        symbols.push(symbol.to_ascii_uppercase());
    }

    if symbols.is_empty() {
        return Err(ReferenceError::Empty {
            location: location.to_string(),
        });
    }
    Ok(symbols)
}

/// One stopword per line; blank lines and `#` comments are ignored.
pub fn parse_stopwords(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_uppercase)
        .collect()
}

async fn read_source(location: &str, timeout: Duration) -> Result<String, ReferenceError> {
    let remote = Url::parse(location)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"));
    let Some(url) = remote else {
        return read_file(Path::new(location)).await;
    };

    let fetch_err = |error: HttpError| ReferenceError::Fetch {
        location: location.to_string(),
        error,
    };
    let client = HttpClient::new(url.as_str())
        .map_err(fetch_err)?
        .with_timeout(timeout);
    client
        .get_text(
            url.as_str(),
            RequestOpts {
                allow_absolute: true,
                ..Default::default()
            },
        )
        .await
        .map_err(fetch_err)
}

async fn read_file(path: &Path) -> Result<String, ReferenceError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|error| ReferenceError::Io {
            path: path.to_path_buf(),
            error,
        })
}
