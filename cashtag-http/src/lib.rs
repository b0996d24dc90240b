//! Minimal HTTP client with safe logging and an optional retry budget.
//!
//! - Request options: auth, query params, timeout, retries, absolute URLs
//! - Sensitive query params and bearer tokens never reach the logs
//! - Retries transport failures, 429 and 5xx with exponential backoff and
//!   `Retry-After` support, up to the per-request budget (zero disables it)
//! - Raw request/response logging under target `http.raw` when
//!   `CASHTAG_HTTP_RAW=1`
//!
//! ```no_run
//! # async fn demo() -> Result<(), cashtag_http::HttpError> {
//! let client = cashtag_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", cashtag_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

const RAW_ENV: &str = "CASHTAG_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;
const BASE_BACKOFF_MS: u64 = 200;

fn raw_enabled() -> bool {
    matches!(
        std::env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}")]
    Api { status: StatusCode, message: String },
}

/// Authentication attached to a single request.
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// `Authorization: Bearer <token>`
    Bearer(&'a str),
}

/// Per-request tuning knobs.
///
/// ```
/// use cashtag_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(0),
///     query: Some(vec![("after", "1700000000".into())]),
///     ..Default::default()
/// };
/// assert_eq!(opts.retries, Some(0));
/// assert!(!opts.allow_absolute);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
    /// If true and `path` is an absolute URL, use it as-is (ignore base).
    pub allow_absolute: bool,
}

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use cashtag_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.pushshift.io")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("cashtag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let (req_id, bytes) = self.send(Method::GET, path, &opts).await?;
        serde_json::from_slice::<T>(&bytes).map_err(|e| {
            let snippet = snip_body(&bytes);
            tracing::warn!(
                req_id=%req_id,
                serde_line=e.line(),
                serde_col=e.column(),
                serde_err=%e,
                body_snippet=%snippet,
                "http.response.decode_error"
            );
            HttpError::Decode(e.to_string(), snippet)
        })
    }

    /// GET a plain-text body (e.g. a pipe-delimited listing).
    pub async fn get_text(&self, path: &str, opts: RequestOpts<'_>) -> Result<String, HttpError> {
        let (req_id, bytes) = self.send(Method::GET, path, &opts).await?;
        String::from_utf8(bytes).map_err(|e| {
            tracing::warn!(req_id=%req_id, error=%e, "http.response.not_utf8");
            HttpError::Decode(e.to_string(), String::new())
        })
    }

    fn resolve(&self, path: &str, allow_absolute: bool) -> Result<Url, HttpError> {
        if allow_absolute {
            if let Ok(abs) = Url::parse(path) {
                return Ok(abs);
            }
        }
        self.base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        opts: &RequestOpts<'_>,
    ) -> Result<(String, Vec<u8>), HttpError> {
        let url = self.resolve(path, opts.allow_absolute)?;
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let redacted_q = redact_query(opts.query.as_deref().unwrap_or_default());
        let auth_kind = match &opts.auth {
            Some(Auth::Bearer(_)) => "bearer",
            None => "none",
        };

        let mut attempt = 0usize;
        loop {
            let mut rb = self.inner.request(method.clone(), url.clone()).timeout(timeout);
            if let Some(q) = &opts.query {
                let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
                rb = rb.query(&pairs);
            }
            if let Some(Auth::Bearer(tok)) = &opts.auth {
                rb = rb.bearer_auth(sanitize_token(tok)?);
            }

            let req_id = next_request_id();
            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                method=%method,
                host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                query=?redacted_q,
                timeout_ms=timeout.as_millis() as u64,
                auth_kind,
                "http.request.start"
            );
            if raw_enabled() {
                tracing::debug!(
                    target: "http.raw",
                    %req_id,
                    query=?redacted_q,
                    url=%url.path(),
                    "request"
                );
            }

            let started = Instant::now();
            let fetched = match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let headers = resp.headers().clone();
                    resp.bytes().await.map(|b| (status, headers, b.to_vec()))
                }
                Err(err) => Err(err),
            };

            let (status, headers, bytes) = match fetched {
                Ok(parts) => parts,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id=%req_id, attempt, message=%message, "http.network_error");
                    return Err(HttpError::Network(message));
                }
            };

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=started.elapsed().as_millis() as u64,
                body_len=bytes.len(),
                "http.response.headers"
            );
            if raw_enabled() {
                let cut = bytes.len().min(RAW_MAX_BODY);
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    %status,
                    body=%String::from_utf8_lossy(&bytes[..cut]),
                    truncated=bytes.len() > RAW_MAX_BODY,
                    "response"
                );
            }

            if status.is_success() {
                return Ok((req_id, bytes));
            }

            let message = extract_error_message(&bytes);
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < max_retries {
                attempt += 1;
                let delay = match retry_after_secs(&headers) {
                    Some(secs) => Duration::from_secs(secs),
                    None if status == StatusCode::TOO_MANY_REQUESTS => {
                        backoff(attempt).max(Duration::from_millis(1100))
                    }
                    None => backoff(attempt),
                };
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    message=%message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(req_id=%req_id, %status, message=%message, "http.error");
            return Err(HttpError::Api { status, message });
        }
    }
}

fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(16) as u32;
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(1u64 << shift))
}

fn next_request_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(1);
    format!("r{:06x}", NEXT.fetch_add(1, Ordering::Relaxed))
}

fn is_secret_param(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "access_token" | "authorization" | "auth" | "key" | "api_key" | "token" | "secret"
    )
}

fn redact_query(q: &[(&str, Cow<'_, str>)]) -> Vec<(String, String)> {
    q.iter()
        .map(|(k, v)| {
            let shown = if is_secret_param(k) {
                "<redacted>".to_string()
            } else {
                v.to_string()
            };
            ((*k).to_string(), shown)
        })
        .collect()
}

fn extract_error_message(body: &[u8]) -> String {
    // {"detail": "..."} (Pushshift/FastAPI) or {"message": "..."} or {"error": "..."}
    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        detail: Option<serde_json::Value>,
        #[serde(default)]
        message: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        match m.detail {
            Some(serde_json::Value::String(s)) if !s.is_empty() => return s,
            Some(other) if !other.is_null() => return other.to_string(),
            _ => {}
        }
        if !m.message.is_empty() {
            return m.message;
        }
        if !m.error.is_empty() {
            return m.error;
        }
    }
    snip_body(body)
}

fn retry_after_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > SNIPPET_MAX {
        let mut cut = SNIPPET_MAX;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}

fn sanitize_token(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if s.is_empty() {
        return Err(HttpError::Build("bearer token is empty".into()));
    }
    if !s.is_ascii() || s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "bearer token contains non-ASCII or control characters".into(),
        ));
    }
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(2), Duration::from_millis(400));
        assert_eq!(backoff(4), Duration::from_millis(1600));
    }

    #[test]
    fn secret_query_params_are_redacted() {
        let q = vec![("api_key", Cow::from("s3cr3t")), ("after", Cow::from("42"))];
        let shown = redact_query(&q);
        assert_eq!(shown[0], ("api_key".to_string(), "<redacted>".to_string()));
        assert_eq!(shown[1], ("after".to_string(), "42".to_string()));
    }

    #[test]
    fn error_message_prefers_detail() {
        assert_eq!(
            extract_error_message(br#"{"detail":"Not authenticated"}"#),
            "Not authenticated"
        );
        assert_eq!(extract_error_message(br#"{"error":"slow down"}"#), "slow down");
        assert_eq!(extract_error_message(b"Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn token_is_trimmed_and_validated() {
        assert_eq!(sanitize_token(" 'abc def' ").unwrap(), "abcdef");
        assert!(sanitize_token("   ").is_err());
        assert!(sanitize_token("tök").is_err());
    }
}
