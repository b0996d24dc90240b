//! Cursor-based pagination over a [`PostSource`].
//!
//! The driver asks for posts newer than the cursor, extracts tickers from each
//! title, moves the cursor to the newest timestamp of the page and stops at
//! the first page shorter than requested. Transient failures are retried per
//! [`RetryPolicy`] with the cursor unchanged.
use crate::extract::TickerExtractor;
use crate::mention::TickerMention;
use crate::retry::RetryPolicy;
use cashtag_social::pushshift::{PostSource, SearchError, SearchFilters, SearchResponse};
use chrono::DateTime;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("giving up after {attempts} attempts at cursor {cursor}: {source}")]
    RetriesExhausted {
        attempts: u32,
        cursor: i64,
        source: SearchError,
    },
    #[error("search failed at cursor {cursor}: {source}")]
    Search { cursor: i64, source: SearchError },
    #[error("full page did not advance past cursor {cursor}")]
    Stalled { cursor: i64 },
}

/// A scan that stopped on an error, with everything collected before it.
#[derive(Debug, Error)]
#[error(
    "scan stopped after {} pages with {} mentions",
    .partial.pages,
    .partial.mentions.len()
)]
pub struct ScanFailure {
    #[source]
    pub error: ScanError,
    pub partial: Box<ScanOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A page came back shorter than requested.
    LastPage,
    Cancelled,
}

/// Mentions in retrieval order plus what it took to collect them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub mentions: Vec<TickerMention>,
    pub pages: u64,
    pub requests: u64,
    pub posts_seen: u64,
    pub posts_skipped: u64,
    pub cursor: i64,
    pub stop: StopReason,
}

impl ScanOutcome {
    fn starting_at(cursor: i64) -> Self {
        Self {
            mentions: Vec::new(),
            pages: 0,
            requests: 0,
            posts_seen: 0,
            posts_skipped: 0,
            cursor,
            stop: StopReason::LastPage,
        }
    }
}

pub struct PaginationDriver {
    source: Arc<dyn PostSource>,
    extractor: TickerExtractor,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl PaginationDriver {
    pub fn new(source: Arc<dyn PostSource>, extractor: TickerExtractor) -> Self {
        Self {
            source,
            extractor,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Page forward from `start` (epoch seconds) until a short page or
    /// cancellation. On error the rows gathered so far travel in the failure.
    pub async fn run(
        &self,
        start: i64,
        page_size: u32,
        filters: &SearchFilters,
    ) -> Result<ScanOutcome, ScanFailure> {
        let mut outcome = ScanOutcome::starting_at(start);
        match self.advance(&mut outcome, page_size, filters).await {
            Ok(()) => Ok(outcome),
            Err(error) => Err(ScanFailure {
                error,
                partial: Box::new(outcome),
            }),
        }
    }

    async fn advance(
        &self,
        outcome: &mut ScanOutcome,
        page_size: u32,
        filters: &SearchFilters,
    ) -> Result<(), ScanError> {
        let start = outcome.cursor;
        tracing::info!(
            start,
            page_size,
            subreddit = %filters.subreddit,
            "scan.start"
        );

        loop {
            let cursor = outcome.cursor;
            let fetched = self.fetch_page(cursor, page_size, filters, outcome).await?;
            let Some(page) = fetched else {
                outcome.stop = StopReason::Cancelled;
                break;
            };

            let returned = page.len();
            let (rows, newest) = self.collect_page(&page, outcome);
            outcome.pages += 1;
            outcome.posts_seen += returned as u64;
            let added = rows.len();
            outcome.mentions.extend(rows);
            tracing::info!(
                page = outcome.pages,
                cursor,
                returned,
                mentions = added,
                total = outcome.mentions.len(),
                "scan.page"
            );

            if returned < page_size as usize {
                outcome.stop = StopReason::LastPage;
                break;
            }
            match newest {
                Some(next) if next > cursor => outcome.cursor = next,
                _ => {
                    tracing::error!(cursor, returned, "scan.stalled");
                    return Err(ScanError::Stalled { cursor });
                }
            }
        }

        tracing::info!(
            pages = outcome.pages,
            requests = outcome.requests,
            posts = outcome.posts_seen,
            skipped = outcome.posts_skipped,
            mentions = outcome.mentions.len(),
            stop = ?outcome.stop,
            "scan.finished"
        );
        Ok(())
    }

    // `None` means the token fired before a page arrived.
    async fn fetch_page(
        &self,
        cursor: i64,
        page_size: u32,
        filters: &SearchFilters,
        outcome: &mut ScanOutcome,
    ) -> Result<Option<SearchResponse>, ScanError> {
        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(cursor, "scan.cancelled");
                return Ok(None);
            }
            attempts += 1;
            outcome.requests += 1;

            let err = match self.source.fetch(cursor, page_size, filters).await {
                Ok(page) => return Ok(Some(page)),
                Err(err) => err,
            };
            if !err.is_transient() {
                tracing::error!(cursor, error = %err, "scan.request.fatal");
                return Err(ScanError::Search { cursor, source: err });
            }
            if !self.retry.allows_retry(attempts, started.elapsed()) {
                tracing::error!(cursor, attempts, error = %err, "scan.retries_exhausted");
                return Err(ScanError::RetriesExhausted {
                    attempts,
                    cursor,
                    source: err,
                });
            }

            let delay = self.retry.delay_for(attempts);
            tracing::warn!(
                cursor,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "scan.retrying"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!(cursor, "scan.cancelled");
                    return Ok(None);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn collect_page(
        &self,
        page: &SearchResponse,
        outcome: &mut ScanOutcome,
    ) -> (Vec<TickerMention>, Option<i64>) {
        let mut rows = Vec::new();
        let mut newest: Option<i64> = None;
        for (index, record) in page.submissions().enumerate() {
            let post = match record {
                Ok(post) => post,
                Err(error) => {
                    outcome.posts_skipped += 1;
                    tracing::debug!(index, %error, "scan.post.malformed");
                    continue;
                }
            };
            let Some(created) = DateTime::from_timestamp(post.created_utc, 0) else {
                outcome.posts_skipped += 1;
                tracing::debug!(
                    index,
                    created_utc = post.created_utc,
                    "scan.post.bad_timestamp"
                );
                continue;
            };
            newest = newest.max(Some(post.created_utc));
            for ticker in self.extractor.extract(&post.title) {
                rows.push(TickerMention::new(created, ticker));
            }
        }
        (rows, newest)
    }
}
