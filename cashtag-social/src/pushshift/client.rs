//! Thin wrapper around the Pushshift search endpoint.
//!
//! One call, one request: the HTTP layer is invoked with a zero retry budget
//! and every failure is classified so the pagination driver can decide what
//! to retry.
use crate::pushshift::types::SearchResponse;
use async_trait::async_trait;
use cashtag_common::SortDirection;
use cashtag_http::{Auth, HttpClient, HttpError, RequestOpts};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.pushshift.io";
pub const SUBMISSION_ENDPOINT: &str = "reddit/search/submission/";

/// Fields the pipeline cannot work without; always requested.
const REQUIRED_FIELDS: [&str; 2] = ["created_utc", "title"];

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Network(String),
    #[error("search response could not be decoded: {0}")]
    Decode(String),
    #[error("search request is invalid: {0}")]
    InvalidRequest(String),
}

impl SearchError {
    /// Whether trying the same request again can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Decode(_))
    }
}

impl From<HttpError> for SearchError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Network(_) | HttpError::Api { .. } => Self::Network(e.to_string()),
            HttpError::Decode(..) => Self::Decode(e.to_string()),
            HttpError::Url(_) | HttpError::Build(_) => Self::InvalidRequest(e.to_string()),
        }
    }
}

/// What to ask the remote service for. Changes the response, never local logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilters {
    pub subreddit: String,
    pub sort_field: String,
    pub sort_direction: SortDirection,
    pub requested_fields: BTreeSet<String>,
    pub query: Option<String>,
}

impl SearchFilters {
    pub fn new(subreddit: impl Into<String>) -> Self {
        Self {
            subreddit: subreddit.into(),
            sort_field: "created_utc".into(),
            sort_direction: SortDirection::Asc,
            requested_fields: REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
            query: None,
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_fields.extend(
            fields
                .into_iter()
                .map(Into::into)
                .map(|f: String| f.trim().to_string())
                .filter(|f| !f.is_empty()),
        );
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_field = field.into();
        self.sort_direction = direction;
        self
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.trim().is_empty());
        self
    }

    /// Comma-joined `fields` parameter; the required fields are always present.
    pub fn fields_param(&self) -> String {
        let mut fields = self.requested_fields.clone();
        fields.extend(REQUIRED_FIELDS.iter().map(|f| f.to_string()));
        fields.into_iter().collect::<Vec<_>>().join(",")
    }

    fn to_query(&self, after: i64, page_size: u32) -> Vec<(&'static str, Cow<'_, str>)> {
        let mut params: Vec<(&'static str, Cow<'_, str>)> = vec![
            ("subreddit", Cow::Borrowed(self.subreddit.as_str())),
            ("size", page_size.to_string().into()),
            ("after", after.to_string().into()),
            ("fields", self.fields_param().into()),
            ("sort", Cow::Borrowed(self.sort_direction.as_str())),
            ("sort_type", Cow::Borrowed(self.sort_field.as_str())),
            ("metadata", Cow::Borrowed("false")),
        ];
        if let Some(q) = &self.query {
            params.push(("q", Cow::Borrowed(q.as_str())));
        }
        params
    }
}

/// A bounded, cursor-addressed source of submissions.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Fetch up to `page_size` records created strictly after `after`.
    async fn fetch(
        &self,
        after: i64,
        page_size: u32,
        filters: &SearchFilters,
    ) -> Result<SearchResponse, SearchError>;
}

#[derive(Clone)]
pub struct PushshiftApi {
    http: HttpClient,
    endpoint: String,
    auth_token: Option<String>,
}

impl PushshiftApi {
    pub fn new(base_url: &str) -> Result<Self, SearchError> {
        let http = HttpClient::new(base_url)?;
        Ok(Self {
            http,
            endpoint: SUBMISSION_ENDPOINT.to_string(),
            auth_token: None,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Issue one search request starting at cursor `after`.
    pub async fn search(
        &self,
        after: i64,
        page_size: u32,
        filters: &SearchFilters,
    ) -> Result<SearchResponse, SearchError> {
        let auth = self.auth_token.as_deref().map(Auth::Bearer);
        let resp: SearchResponse = self
            .http
            .get_json(
                &self.endpoint,
                RequestOpts {
                    auth,
                    query: Some(filters.to_query(after, page_size)),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await?;

        tracing::debug!(
            subreddit=%filters.subreddit,
            after,
            page_size,
            received=resp.len(),
            "pushshift.search.page"
        );
        Ok(resp)
    }
}

#[async_trait]
impl PostSource for PushshiftApi {
    async fn fetch(
        &self,
        after: i64,
        page_size: u32,
        filters: &SearchFilters,
    ) -> Result<SearchResponse, SearchError> {
        self.search(after, page_size, filters).await
    }
}
