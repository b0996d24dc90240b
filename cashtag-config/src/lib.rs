//! Loader for `cashtag.yaml` with environment overlays.
//!
//! Precedence, lowest first: built-in defaults, the YAML file (optional or
//! required), inline YAML snippets, then `CASHTAG__SECTION__KEY` environment
//! variables. String values may reference `${VAR}`; those are expanded after
//! merging, recursively up to a fixed depth. The merged tree is validated
//! before it is handed out.
//!
//! ```yaml
//! search:
//!   subreddit: wallstreetbets
//!   page_size: 100
//! window:
//!   lookback_days: 7
//! retry:
//!   max_attempts: 10
//!   delay_ms: 5000
//!   backoff: fixed
//! reference:
//!   listings:
//!     - http://ftp.nasdaqtrader.com/dynamic/SymDir/nasdaqlisted.txt
//!   stopwords_file: ./stopwords.txt
//! output:
//!   dir: ./data/raw
//! ```
use cashtag_common::SortDirection;
use cashtag_common::observability::LogFormat;
use config::{Config, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub use config::ConfigError;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Largest page the search API is asked for.
pub const MAX_PAGE_SIZE: u32 = 1000;

pub const NASDAQ_LISTED_URL: &str = "http://ftp.nasdaqtrader.com/dynamic/SymDir/nasdaqlisted.txt";
pub const OTHER_LISTED_URL: &str = "http://ftp.nasdaqtrader.com/dynamic/SymDir/otherlisted.txt";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CashtagConfig {
    pub search: SearchConfig,
    pub window: WindowConfig,
    pub retry: RetryConfig,
    pub reference: ReferenceConfig,
    pub extract: ExtractConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Where and how submissions are searched.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub endpoint: String,
    pub subreddit: String,
    /// Field the API sorts on (`sort_type`).
    pub sort_field: String,
    pub sort_direction: SortDirection,
    pub fields: Vec<String>,
    /// Optional free-text query (`q`).
    pub query: Option<String>,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub auth_token: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.pushshift.io".into(),
            endpoint: "reddit/search/submission/".into(),
            subreddit: "wallstreetbets".into(),
            sort_field: "created_utc".into(),
            sort_direction: SortDirection::Asc,
            fields: vec!["created_utc".into(), "title".into()],
            query: None,
            page_size: 100,
            timeout_secs: 30,
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub lookback_days: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { lookback_days: 7 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// Retry budget for failed page requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub backoff: BackoffKind,
    /// Ceiling for exponential delays.
    pub max_delay_ms: u64,
    pub max_elapsed_secs: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_ms: 5_000,
            backoff: BackoffKind::Fixed,
            max_delay_ms: 60_000,
            max_elapsed_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Pipe-delimited symbol directories: `http(s)` URLs or local paths.
    pub listings: Vec<String>,
    pub include_etfs: bool,
    pub stopwords: Vec<String>,
    pub stopwords_file: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            listings: vec![NASDAQ_LISTED_URL.into(), OTHER_LISTED_URL.into()],
            include_etfs: false,
            stopwords: default_stopwords(),
            stopwords_file: None,
            timeout_secs: 30,
        }
    }
}

/// Listed symbols that show up in titles as ordinary words or slang.
fn default_stopwords() -> Vec<String> {
    [
        "ALL", "AND", "ANY", "ARE", "ATH", "BEST", "BIG", "CAN", "CASH", "CEO", "CFO", "DD",
        "EDIT", "EPS", "ETF", "EVER", "FOR", "FREE", "FUN", "GAIN", "GOOD", "HOLD", "HUGE",
        "IMO", "IPO", "JUST", "LIFE", "LMAO", "LOSS", "LOVE", "MOON", "NEW", "NEXT", "NOW",
        "ONE", "OPEN", "OUT", "PLAY", "POST", "REAL", "RIP", "SAY", "SEC", "SEE", "TELL", "THE",
        "TRUE", "TWO", "USA", "WELL", "WISH", "WOW", "WSB", "YOLO", "YOU",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Also accept `#TAG` as a cash tag (older behaviour, off by default).
    pub hash_prefix: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Full output path; overrides the window-derived file name.
    pub path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data").join("raw"),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub stderr: bool,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::Text,
            stderr: true,
            filter: "info".into(),
        }
    }
}

impl CashtagConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::Message(msg));

        if self.window.lookback_days == 0 {
            return fail("window.lookback_days must be at least 1".into());
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.search.page_size) {
            return fail(format!(
                "search.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.search.page_size
            ));
        }
        if self.search.subreddit.trim().is_empty() {
            return fail("search.subreddit must not be empty".into());
        }
        if self.retry.max_attempts == 0 {
            return fail("retry.max_attempts must be at least 1".into());
        }
        if self.reference.listings.iter().all(|l| l.trim().is_empty()) {
            return fail("reference.listings needs at least one source".into());
        }
        Ok(())
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => break,
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder over the `config` crate wiring (YAML + env overrides).
pub struct CashtagConfigLoader {
    files: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for CashtagConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CashtagConfigLoader {
    /// Start from defaults; `CASHTAG__`-prefixed environment variables are
    /// layered on top of whatever sources are added.
    ///
    /// ```
    /// use cashtag_config::CashtagConfigLoader;
    ///
    /// let cfg = CashtagConfigLoader::new()
    ///     .with_yaml_str("search:\n  subreddit: stocks\n  page_size: 50")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.search.subreddit, "stocks");
    /// assert_eq!(cfg.search.page_size, 50);
    /// assert_eq!(cfg.window.lookback_days, 7);
    /// ```
    pub fn new() -> Self {
        Self {
            files: Config::builder(),
        }
    }

    /// Attach a file that must exist; the format is inferred from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files = self
            .files
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when missing, so env-only deployments work.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files = self
            .files
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet (tests, CLI).
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.files = self
            .files
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge every source, expand `${VAR}` placeholders, deserialize and validate.
    ///
    /// ```
    /// use cashtag_config::CashtagConfigLoader;
    ///
    /// let err = CashtagConfigLoader::new()
    ///     .with_yaml_str("window:\n  lookback_days: 0")
    ///     .load()
    ///     .unwrap_err();
    /// assert!(err.to_string().contains("lookback_days"));
    /// ```
    pub fn load(self) -> Result<CashtagConfig, ConfigError> {
        let cfg = self
            .files
            .add_source(
                Environment::with_prefix("CASHTAG")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: CashtagConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.validate()?;
        Ok(typed)
    }
}
