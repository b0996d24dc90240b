//! One complete scan driven by a [`CashtagConfig`].
use crate::driver::{PaginationDriver, ScanOutcome};
use crate::extract::{ExtractOptions, TickerExtractor};
use crate::output::{default_output_path, write_mentions};
use crate::reference::ReferenceData;
use crate::retry::RetryPolicy;
use crate::tally::{top_mentions, TickerCount};
use crate::window::TimeWindow;
use cashtag_common::{CashtagError, Result};
use cashtag_config::{CashtagConfig, SearchConfig};
use cashtag_social::pushshift::{PushshiftApi, SearchFilters};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How many tickers a report ranks.
pub const TOP_LIMIT: usize = 20;

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub window: TimeWindow,
    pub outcome: ScanOutcome,
    pub output_path: PathBuf,
    pub top: Vec<TickerCount>,
}

pub fn search_filters(cfg: &SearchConfig) -> SearchFilters {
    SearchFilters::new(cfg.subreddit.clone())
        .with_sort(cfg.sort_field.clone(), cfg.sort_direction)
        .with_fields(cfg.fields.iter().cloned())
        .with_query(cfg.query.clone())
}

/// Load reference data, page through the lookback window ending at `now` and
/// write the mentions. A cancelled scan still writes what it collected, and so
/// does a failed one when it got that far.
pub async fn run_scan(
    cfg: &CashtagConfig,
    now: DateTime<Utc>,
    cancel: CancellationToken,
) -> Result<ScanReport> {
    let window = TimeWindow::lookback(cfg.window.lookback_days, now);
    let output_path = cfg
        .output
        .path
        .clone()
        .unwrap_or_else(|| default_output_path(&cfg.output.dir, &window));

    let reference = ReferenceData::load(&cfg.reference)
        .await
        .map_err(|e| CashtagError::Reference(Box::new(e)))?;
    let extractor = TickerExtractor::new(Arc::new(reference)).with_options(ExtractOptions {
        hash_prefix: cfg.extract.hash_prefix,
    });

    let api = PushshiftApi::new(&cfg.search.base_url)
        .map_err(|e| CashtagError::Config(format!("search.base_url: {e}")))?
        .with_endpoint(cfg.search.endpoint.clone())
        .with_timeout(Duration::from_secs(cfg.search.timeout_secs.max(1)))
        .with_auth_token(cfg.search.auth_token.clone());
    let driver = PaginationDriver::new(Arc::new(api), extractor)
        .with_retry(RetryPolicy::from(&cfg.retry))
        .with_cancellation(cancel);

    tracing::info!(
        start = %window.start,
        end = %window.end,
        output = %output_path.display(),
        "pipeline.start"
    );
    let filters = search_filters(&cfg.search);
    let outcome = match driver
        .run(window.start_epoch(), cfg.search.page_size, &filters)
        .await
    {
        Ok(outcome) => outcome,
        Err(failure) => {
            keep_partial(&output_path, &failure.partial);
            return Err(CashtagError::Scan(Box::new(failure)));
        }
    };

    write_mentions(&output_path, &outcome.mentions)
        .map_err(|e| CashtagError::Output(Box::new(e)))?;

    let top = top_mentions(&outcome.mentions, TOP_LIMIT);
    for (rank, count) in top.iter().enumerate() {
        tracing::info!(
            rank = rank + 1,
            ticker = %count.ticker,
            mentions = count.mentions,
            "pipeline.top"
        );
    }

    Ok(ScanReport {
        window,
        outcome,
        output_path,
        top,
    })
}

fn keep_partial(path: &Path, partial: &ScanOutcome) {
    if partial.mentions.is_empty() {
        return;
    }
    match write_mentions(path, &partial.mentions) {
        Ok(()) => tracing::warn!(
            path = %path.display(),
            rows = partial.mentions.len(),
            "pipeline.partial_written"
        ),
        Err(error) => tracing::error!(%error, "pipeline.partial_lost"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashtag_common::SortDirection;

    #[test]
    fn filters_follow_search_config() {
        let cfg = SearchConfig {
            subreddit: "stocks".into(),
            sort_direction: SortDirection::Asc,
            query: Some("GME".into()),
            ..SearchConfig::default()
        };
        let filters = search_filters(&cfg);
        assert_eq!(filters.subreddit, "stocks");
        assert_eq!(filters.sort_field, "created_utc");
        assert_eq!(filters.query.as_deref(), Some("GME"));
        assert_eq!(filters.fields_param(), "created_utc,title");
    }
}
