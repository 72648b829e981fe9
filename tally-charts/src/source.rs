//! Bar sources for the chart feed
//!
//! [`BarSource`] is the async seam between the feed and wherever bars
//! come from; production uses the exchange klines endpoint, tests
//! script responses in memory.

use async_trait::async_trait;
use tracing::warn;

use tally_core::{Bar, Interval, TallyResult};
use tally_exchange::ExchangeClient;

/// Where the chart feed gets its bars
#[async_trait]
pub trait BarSource: Send + Sync {
    /// Fetch bars whose period falls within `[start_ms, end_ms]`,
    /// normalized and sorted ascending by timestamp
    async fn fetch_bars(
        &self,
        market: &str,
        interval: Interval,
        start_ms: i64,
        end_ms: i64,
    ) -> TallyResult<Vec<Bar>>;
}

#[async_trait]
impl BarSource for ExchangeClient {
    async fn fetch_bars(
        &self,
        market: &str,
        interval: Interval,
        start_ms: i64,
        end_ms: i64,
    ) -> TallyResult<Vec<Bar>> {
        let klines = self.get_klines(market, interval, start_ms, end_ms).await?;

        let total = klines.len();
        let mut bars: Vec<Bar> = klines.iter().filter_map(|kline| kline.to_bar()).collect();
        if bars.len() < total {
            warn!(
                "Skipped {} unusable kline row(s) for {}",
                total - bars.len(),
                market
            );
        }

        bars.sort_by_key(|bar| bar.time);
        Ok(bars)
    }
}
