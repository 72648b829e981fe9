//! Chart feed integration tests against a scripted bar source
//!
//! Run with: cargo test -p tally-charts --test test_charts -- --nocapture
//!
//! The scripted source answers the initial history fetch and then each
//! poll in turn, recording the requested windows, so the last-seen
//! tracking and teardown behavior are observable from the outside.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tally_charts::{BarSource, ChartFeed, ChartFeedConfig, SharedSeries};
use tally_core::{Bar, Interval, TallyError, TallyResult};

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(100);
const POLL: Duration = Duration::from_millis(10);

fn bar(time: i64, close: Decimal) -> Bar {
    Bar {
        time,
        open: close,
        high: close,
        low: close,
        close,
        volume: dec!(100),
    }
}

/// Scripted source: the first response answers the history fetch, the
/// rest answer polls in order; once exhausted every poll returns no
/// bars. Requested windows are recorded for assertions.
struct ScriptedSource {
    responses: Mutex<VecDeque<TallyResult<Vec<Bar>>>>,
    requests: Mutex<Vec<(i64, i64)>>,
}

impl ScriptedSource {
    fn new(responses: Vec<TallyResult<Vec<Bar>>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<(i64, i64)> {
        self.requests.lock().unwrap().clone()
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl BarSource for ScriptedSource {
    async fn fetch_bars(
        &self,
        _market: &str,
        _interval: Interval,
        start_ms: i64,
        end_ms: i64,
    ) -> TallyResult<Vec<Bar>> {
        self.requests.lock().unwrap().push((start_ms, end_ms));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

async fn wait_until(what: &str, mut satisfied: impl FnMut() -> bool) {
    let start = tokio::time::Instant::now();
    while !satisfied() {
        if start.elapsed() > WAIT {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn test_config() -> ChartFeedConfig {
    let mut config = ChartFeedConfig::new("ELECTION2028_USDC", Interval::OneMinute);
    config.poll_interval = POLL;
    config
}

#[tokio::test]
async fn history_loads_sorted_regardless_of_arrival_order() {
    let source = ScriptedSource::new(vec![Ok(vec![
        bar(2_000, dec!(0.46)),
        bar(1_000, dec!(0.45)),
    ])]);
    let series = SharedSeries::new();

    // A slow poll keeps this test about the initial load only.
    let mut config = test_config();
    config.poll_interval = Duration::from_secs(3600);
    let feed = ChartFeed::start(source, Arc::new(series.clone()), config)
        .await
        .unwrap();

    let times: Vec<i64> = series.snapshot().iter().map(|b| b.time).collect();
    assert_eq!(times, vec![1_000, 2_000]);

    let closes: Vec<Decimal> = series.snapshot().iter().map(|b| b.close).collect();
    assert_eq!(closes, vec![dec!(0.45), dec!(0.46)]);

    feed.shutdown().await;
}

#[tokio::test]
async fn failed_history_fetch_fails_start() {
    let source = ScriptedSource::new(vec![Err(TallyError::network("connection refused"))]);
    let series = SharedSeries::new();

    let result = ChartFeed::start(source, Arc::new(series.clone()), test_config()).await;
    assert!(matches!(result, Err(TallyError::Network(_))));
    assert!(series.is_empty());
}

#[tokio::test]
async fn polls_amend_then_roll_over_while_surviving_errors() {
    let source = ScriptedSource::new(vec![
        // History: one bar at t=1000.
        Ok(vec![bar(1_000, dec!(0.45))]),
        // Same period: amend, do not advance.
        Ok(vec![bar(1_000, dec!(0.48))]),
        // A failed poll must not kill the loop.
        Err(TallyError::network("connection refused")),
        // New period: append and advance.
        Ok(vec![bar(2_000, dec!(0.46))]),
    ]);
    let series = SharedSeries::new();

    let feed = ChartFeed::start(
        Arc::clone(&source) as Arc<dyn BarSource>,
        Arc::new(series.clone()),
        test_config(),
    )
    .await
    .unwrap();

    // The amendment lands on the existing bar.
    wait_until("the amendment", || series.last_close() == Some(dec!(0.48))).await;
    assert_eq!(series.len(), 1);

    // The error is skipped and the new period appends a second bar.
    wait_until("the new period", || series.len() == 2).await;
    assert_eq!(series.last_close(), Some(dec!(0.46)));

    // Only the new period advanced the window: polls up to and
    // including the rollover started at 1001, later ones at 2001.
    wait_until("a post-rollover poll", || {
        source.requests().last().map(|(start, _)| *start) == Some(2_001)
    })
    .await;
    let requests = source.requests();
    assert_eq!(requests[1].0, 1_001);
    assert_eq!(requests[2].0, 1_001);
    assert_eq!(requests[3].0, 1_001);
    for (start, _) in &requests[4..] {
        assert_eq!(*start, 2_001);
    }

    feed.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_polling() {
    let source = ScriptedSource::new(vec![Ok(vec![bar(1_000, dec!(0.45))])]);
    let series = SharedSeries::new();

    let feed = ChartFeed::start(
        Arc::clone(&source) as Arc<dyn BarSource>,
        Arc::new(series),
        test_config(),
    )
    .await
    .unwrap();

    wait_until("a few polls", || source.request_count() >= 3).await;
    feed.shutdown().await;

    let after = source.request_count();
    tokio::time::sleep(QUIET).await;
    assert_eq!(source.request_count(), after);
}

#[tokio::test]
async fn dropping_the_handle_cancels_the_poll_task() {
    let source = ScriptedSource::new(vec![Ok(vec![bar(1_000, dec!(0.45))])]);
    let series = SharedSeries::new();

    let feed = ChartFeed::start(
        Arc::clone(&source) as Arc<dyn BarSource>,
        Arc::new(series),
        test_config(),
    )
    .await
    .unwrap();

    wait_until("a few polls", || source.request_count() >= 3).await;
    drop(feed);

    // The cancel is synchronous but the task may be mid-tick; give it
    // one tick to notice, then the count must settle.
    tokio::time::sleep(POLL * 2).await;
    let after = source.request_count();
    tokio::time::sleep(QUIET).await;
    assert_eq!(source.request_count(), after);
}
