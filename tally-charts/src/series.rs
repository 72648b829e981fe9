//! Candle series and the chart surface abstraction

use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use tally_core::Bar;

/// Incremental update pushed to a surface by the feed
#[derive(Debug, Clone, PartialEq)]
pub struct BarUpdate {
    /// Period timestamp (epoch milliseconds)
    pub time: i64,
    /// Latest close for the period
    pub close: Decimal,
    /// Latest cumulative volume for the period
    pub volume: Decimal,
    /// True when this update opens a new period rather than amending
    /// the in-progress bar
    pub new_candle_initiated: bool,
}

/// A rendering endpoint fed by the chart pipeline
pub trait ChartSurface: Send + Sync {
    /// Replace the whole series with freshly fetched history
    fn reset(&self, history: Vec<Bar>);

    /// Apply one incremental update
    fn apply(&self, update: &BarUpdate);
}

/// In-memory candle series, ordered by timestamp ascending
#[derive(Debug, Clone, Default)]
pub struct CandleSeries {
    bars: Vec<Bar>,
}

impl CandleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from fetched history, sorting ascending by
    /// timestamp regardless of the order the bars arrived in
    pub fn from_history(mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|bar| bar.time);
        Self { bars }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Apply one update: a new period appends a bar seeded from its
    /// close, an amendment rewrites the in-progress bar's close, volume,
    /// and high/low bounds
    pub fn apply(&mut self, update: &BarUpdate) {
        if update.new_candle_initiated || self.bars.is_empty() {
            self.bars.push(Bar {
                time: update.time,
                open: update.close,
                high: update.close,
                low: update.close,
                close: update.close,
                volume: update.volume,
            });
            return;
        }

        if let Some(last) = self.bars.last_mut() {
            if update.close > last.high {
                last.high = update.close;
            }
            if update.close < last.low {
                last.low = update.close;
            }
            last.close = update.close;
            last.volume = update.volume;
        }
    }
}

/// Cloneable headless surface backed by a shared [`CandleSeries`]
#[derive(Debug, Clone, Default)]
pub struct SharedSeries {
    inner: Arc<Mutex<CandleSeries>>,
}

impl SharedSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current bars
    pub fn snapshot(&self) -> Vec<Bar> {
        self.inner.lock().bars().to_vec()
    }

    /// Close of the most recent bar, when any
    pub fn last_close(&self) -> Option<Decimal> {
        self.inner.lock().last().map(|bar| bar.close)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl ChartSurface for SharedSeries {
    fn reset(&self, history: Vec<Bar>) {
        *self.inner.lock() = CandleSeries::from_history(history);
    }

    fn apply(&self, update: &BarUpdate) {
        self.inner.lock().apply(update);
    }
}
