//! Polling chart feed
//!
//! One feed serves a single (market, interval) pair: it loads the
//! interval's lookback of history into the surface, then polls for
//! bars newer than the last-seen timestamp and pushes incremental
//! updates. The poll task runs under a cancellation token owned by the
//! feed handle, so teardown never leaves an orphaned timer behind.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tally_core::{Bar, Interval, TallyResult};

use crate::series::{BarUpdate, ChartSurface};
use crate::source::BarSource;

/// How often the feed polls for new bars
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for one chart feed
#[derive(Debug, Clone)]
pub struct ChartFeedConfig {
    /// Market symbol to chart
    pub market: String,
    /// Candle interval; also decides the initial lookback window
    pub interval: Interval,
    /// Delay between incremental polls
    pub poll_interval: Duration,
}

impl ChartFeedConfig {
    pub fn new(market: impl Into<String>, interval: Interval) -> Self {
        Self {
            market: market.into(),
            interval,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Handle to a running chart feed. Dropping it cancels the poll task.
pub struct ChartFeed {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ChartFeed {
    /// Load the interval's lookback of history into the surface, then
    /// spawn the poll task. Fails when the initial history fetch fails;
    /// poll failures afterwards are logged and skipped.
    pub async fn start(
        source: Arc<dyn BarSource>,
        surface: Arc<dyn ChartSurface>,
        config: ChartFeedConfig,
    ) -> TallyResult<Self> {
        let now = Utc::now().timestamp_millis();
        let start = now - config.interval.lookback().num_milliseconds();

        let history = source
            .fetch_bars(&config.market, config.interval, start, now)
            .await?;
        // With no history yet, polling starts from "now".
        let last_seen = history.last().map(|bar| bar.time).unwrap_or(now);
        info!(
            "[Chart] Loaded {} bar(s) for {} @ {}",
            history.len(),
            config.market,
            config.interval
        );
        surface.reset(history);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            source,
            surface,
            config,
            last_seen,
            cancel.clone(),
        ));

        Ok(Self {
            cancel,
            task: Some(task),
        })
    }

    /// Cancel the poll task and wait for it to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ChartFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Poll for bars strictly newer than `last_seen` until cancelled.
/// Fetch errors are logged and the next tick proceeds normally.
async fn poll_loop(
    source: Arc<dyn BarSource>,
    surface: Arc<dyn ChartSurface>,
    config: ChartFeedConfig,
    mut last_seen: i64,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // interval() fires immediately; the first poll should come one
    // period after the history load.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("[Chart] Feed for {} cancelled", config.market);
                return;
            }
            _ = ticker.tick() => {
                let now = Utc::now().timestamp_millis();
                let bars = match source
                    .fetch_bars(&config.market, config.interval, last_seen + 1, now)
                    .await
                {
                    Ok(bars) => bars,
                    Err(e) => {
                        warn!("[Chart] Poll failed for {}: {}", config.market, e);
                        continue;
                    }
                };

                if let Some((update, tracked)) = incremental_update(last_seen, &bars) {
                    surface.apply(&update);
                    last_seen = tracked;
                }
            }
        }
    }
}

/// Decide what one poll response means. The latest returned bar either
/// opens a new period (timestamp strictly greater than last seen) or
/// amends the in-progress one (equal); only a new period advances the
/// tracked timestamp. Returns the update to push and the timestamp to
/// track afterwards, or None when no bars came back.
fn incremental_update(last_seen: i64, bars: &[Bar]) -> Option<(BarUpdate, i64)> {
    let latest = bars.iter().max_by_key(|bar| bar.time)?;

    let new_candle_initiated = latest.time > last_seen;
    let update = BarUpdate {
        time: latest.time,
        close: latest.close,
        volume: latest.volume,
        new_candle_initiated,
    };
    let tracked = if new_candle_initiated {
        latest.time
    } else {
        last_seen
    };

    Some((update, tracked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(time: i64, close: rust_decimal::Decimal) -> Bar {
        Bar {
            time,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(10),
        }
    }

    #[test]
    fn empty_poll_response_produces_nothing() {
        assert!(incremental_update(1_000, &[]).is_none());
    }

    #[test]
    fn equal_timestamp_amends_without_advancing() {
        let (update, tracked) =
            incremental_update(1_000, &[bar(1_000, dec!(0.47))]).unwrap();

        assert!(!update.new_candle_initiated);
        assert_eq!(update.time, 1_000);
        assert_eq!(update.close, dec!(0.47));
        assert_eq!(tracked, 1_000);
    }

    #[test]
    fn greater_timestamp_opens_a_period_and_advances() {
        let (update, tracked) =
            incremental_update(1_000, &[bar(1_000, dec!(0.45)), bar(2_000, dec!(0.46))])
                .unwrap();

        assert!(update.new_candle_initiated);
        assert_eq!(update.time, 2_000);
        assert_eq!(update.close, dec!(0.46));
        assert_eq!(tracked, 2_000);
    }

    #[test]
    fn latest_bar_wins_regardless_of_response_order() {
        let (update, _) =
            incremental_update(1_000, &[bar(3_000, dec!(0.48)), bar(2_000, dec!(0.46))])
                .unwrap();
        assert_eq!(update.time, 3_000);
        assert_eq!(update.close, dec!(0.48));
    }
}
