use async_trait::async_trait;
use cashtag_scan::{
    PaginationDriver, ReferenceData, RetryPolicy, ScanError, StopReason, TickerExtractor,
};
use cashtag_social::pushshift::{PostSource, SearchError, SearchFilters, SearchResponse};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const START: i64 = 1_612_137_600; // 2021-02-01T00:00:00Z

/// Replays canned pages and remembers every cursor it was asked for.
#[derive(Default)]
struct ScriptedSource {
    replies: Mutex<VecDeque<Result<SearchResponse, SearchError>>>,
    cursors: Mutex<Vec<i64>>,
}

impl ScriptedSource {
    fn new(replies: Vec<Result<SearchResponse, SearchError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            cursors: Mutex::default(),
        })
    }

    fn cursors(&self) -> Vec<i64> {
        self.cursors.lock().unwrap().clone()
    }
}

#[async_trait]
impl PostSource for ScriptedSource {
    async fn fetch(
        &self,
        after: i64,
        _page_size: u32,
        _filters: &SearchFilters,
    ) -> Result<SearchResponse, SearchError> {
        self.cursors.lock().unwrap().push(after);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SearchResponse::default()))
    }
}

fn page(posts: impl IntoIterator<Item = Value>) -> Result<SearchResponse, SearchError> {
    Ok(SearchResponse {
        data: posts.into_iter().collect(),
    })
}

fn post(created_utc: i64, title: &str) -> Value {
    json!({ "created_utc": created_utc, "title": title })
}

fn driver(source: Arc<ScriptedSource>) -> PaginationDriver {
    let reference = ReferenceData::new(["GME", "AMC", "BB", "NOK"], ["YOLO"]);
    PaginationDriver::new(source, TickerExtractor::new(Arc::new(reference)))
        .with_retry(RetryPolicy::fixed(3, Duration::from_millis(5)))
}

fn filters() -> SearchFilters {
    SearchFilters::new("wallstreetbets")
}

#[tokio::test]
async fn two_pages_one_hundred_plus_three() {
    let first = page((1..=100).map(|i| post(START + i, "$GME to the moon")));
    let second = page([
        post(START + 200, "$AMC is next"),
        post(START + 201, "nothing to see"),
        post(START + 202, "i like the stock"),
    ]);
    let source = ScriptedSource::new(vec![first, second]);

    let outcome = driver(source.clone()).run(START, 100, &filters()).await.unwrap();

    let gme = outcome.mentions.iter().filter(|m| m.ticker == "GME").count();
    let amc = outcome.mentions.iter().filter(|m| m.ticker == "AMC").count();
    assert_eq!((gme, amc), (100, 1));
    assert_eq!(outcome.mentions.len(), 101);
    assert_eq!(outcome.requests, 2);
    assert_eq!(outcome.pages, 2);
    assert_eq!(outcome.posts_seen, 103);
    assert_eq!(outcome.stop, StopReason::LastPage);
    assert_eq!(source.cursors(), vec![START, START + 100]);
}

#[tokio::test]
async fn empty_first_page_finishes_immediately() {
    let source = ScriptedSource::new(vec![page([])]);
    let outcome = driver(source.clone()).run(START, 100, &filters()).await.unwrap();
    assert!(outcome.mentions.is_empty());
    assert_eq!(outcome.requests, 1);
    assert_eq!(outcome.cursor, START);
    assert_eq!(outcome.stop, StopReason::LastPage);
}

#[tokio::test]
async fn cursor_moves_to_newest_post_and_never_back() {
    // Newest timestamp is in the middle of the page.
    let first = page([
        post(START + 10, "$GME"),
        post(START + 30, "$AMC"),
        post(START + 20, "$BB"),
    ]);
    let second = page([
        post(START + 40, "$NOK"),
        post(START + 35, "$GME"),
        post(START + 31, "x"),
    ]);
    let third = page([post(START + 50, "$GME")]);
    let source = ScriptedSource::new(vec![first, second, third]);

    let outcome = driver(source.clone()).run(START, 3, &filters()).await.unwrap();

    let cursors = source.cursors();
    assert_eq!(cursors, vec![START, START + 30, START + 40]);
    assert!(cursors.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(outcome.cursor, START + 40);
    assert_eq!(outcome.mentions.len(), 6);
}

#[tokio::test]
async fn mentions_keep_retrieval_order_and_post_timestamp() {
    let source = ScriptedSource::new(vec![page([
        post(START + 5, "GME and $AMC"),
        post(START + 9, "BB"),
    ])]);
    let outcome = driver(source).run(START, 10, &filters()).await.unwrap();
    let rows: Vec<_> = outcome
        .mentions
        .iter()
        .map(|m| (m.created_utc.timestamp(), m.ticker.as_str()))
        .collect();
    assert_eq!(rows, vec![(START + 5, "AMC"), (START + 5, "GME"), (START + 9, "BB")]);
}

#[tokio::test]
async fn transient_failures_are_retried_with_the_same_cursor() {
    let source = ScriptedSource::new(vec![
        Err(SearchError::Network("503 Service Unavailable".into())),
        Err(SearchError::Decode("expected value at line 1".into())),
        page([post(START + 1, "$GME")]),
    ]);
    let outcome = driver(source.clone()).run(START, 100, &filters()).await.unwrap();
    assert_eq!(outcome.requests, 3);
    assert_eq!(outcome.pages, 1);
    assert_eq!(outcome.mentions.len(), 1);
    assert_eq!(source.cursors(), vec![START, START, START]);
}

#[tokio::test]
async fn exhausted_retries_are_fatal() {
    let source = ScriptedSource::new(
        (0..5)
            .map(|_| Err(SearchError::Network("connection reset".into())))
            .collect(),
    );
    let failure = driver(source.clone())
        .run(START, 100, &filters())
        .await
        .unwrap_err();
    match failure.error {
        ScanError::RetriesExhausted {
            attempts,
            cursor,
            source: SearchError::Network(_),
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(cursor, START);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(source.cursors().len(), 3);
}

#[tokio::test]
async fn failed_scan_hands_back_rows_already_collected() {
    let mut replies = vec![page([post(START + 1, "$GME"), post(START + 2, "$AMC")])];
    replies.extend((0..3).map(|_| Err(SearchError::Network("connection reset".into()))));
    let source = ScriptedSource::new(replies);

    let failure = driver(source).run(START, 2, &filters()).await.unwrap_err();

    assert!(matches!(
        failure.error,
        ScanError::RetriesExhausted { cursor, .. } if cursor == START + 2
    ));
    let tickers: Vec<_> = failure
        .partial
        .mentions
        .iter()
        .map(|m| m.ticker.as_str())
        .collect();
    assert_eq!(tickers, vec!["GME", "AMC"]);
    assert_eq!(failure.partial.pages, 1);
    assert_eq!(failure.partial.requests, 4);
}

#[tokio::test]
async fn invalid_request_is_not_retried() {
    let source = ScriptedSource::new(vec![Err(SearchError::InvalidRequest(
        "bad url".into(),
    ))]);
    let failure = driver(source.clone())
        .run(START, 100, &filters())
        .await
        .unwrap_err();
    assert!(matches!(failure.error, ScanError::Search { cursor: START, .. }));
    assert!(failure.partial.mentions.is_empty());
    assert_eq!(source.cursors().len(), 1);
}

#[tokio::test]
async fn full_page_that_does_not_advance_is_a_stall() {
    let source = ScriptedSource::new(vec![page([
        post(START, "$GME"),
        post(START - 5, "$AMC"),
    ])]);
    let failure = driver(source).run(START, 2, &filters()).await.unwrap_err();
    assert!(matches!(failure.error, ScanError::Stalled { cursor: START }));
    assert_eq!(failure.partial.mentions.len(), 2);
}

#[tokio::test]
async fn malformed_records_are_skipped_but_count_toward_page_length() {
    let source = ScriptedSource::new(vec![
        page([
            post(START + 1, "$GME"),
            json!({ "created_utc": START + 2 }),
            json!({ "title": "$AMC", "created_utc": "soon" }),
        ]),
        page([post(START + 3, "$BB")]),
    ]);
    let outcome = driver(source.clone()).run(START, 3, &filters()).await.unwrap();
    assert_eq!(outcome.posts_skipped, 2);
    assert_eq!(outcome.posts_seen, 4);
    assert_eq!(outcome.requests, 2);
    let tickers: Vec<_> = outcome.mentions.iter().map(|m| m.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["GME", "BB"]);
}

#[tokio::test]
async fn cancelled_before_start_issues_no_request() {
    let token = CancellationToken::new();
    token.cancel();
    let source = ScriptedSource::new(vec![page([post(START + 1, "$GME")])]);
    let outcome = driver(source.clone())
        .with_cancellation(token)
        .run(START, 100, &filters())
        .await
        .unwrap();
    assert_eq!(outcome.stop, StopReason::Cancelled);
    assert_eq!(outcome.requests, 0);
    assert!(source.cursors().is_empty());
}

#[tokio::test]
async fn cancellation_during_backoff_keeps_collected_rows() {
    let token = CancellationToken::new();
    let source = ScriptedSource::new(vec![
        page([post(START + 1, "$GME"), post(START + 2, "$AMC")]),
        Err(SearchError::Network("503".into())),
    ]);
    let driver = driver(source.clone())
        .with_retry(RetryPolicy::fixed(10, Duration::from_secs(3600)))
        .with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });
    let filters = filters();
    let outcome = tokio::time::timeout(Duration::from_secs(5), driver.run(START, 2, &filters))
        .await
        .expect("cancellation must interrupt the backoff")
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(outcome.stop, StopReason::Cancelled);
    assert_eq!(outcome.mentions.len(), 2);
    assert_eq!(outcome.requests, 2);
    assert_eq!(outcome.cursor, START + 2);
}
