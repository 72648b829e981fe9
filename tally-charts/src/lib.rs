//! Chart data pipeline for the Tally trading console
//!
//! Maintains a continuously updating candle series for one
//! (market, interval) pair: historical bars are fetched once over HTTP
//! and loaded into a rendering surface, then a cancellable poll task
//! merges incremental bars into the in-progress candle or opens a new
//! one as periods roll over.

pub mod feed;
pub mod series;
pub mod source;

pub use feed::{ChartFeed, ChartFeedConfig, DEFAULT_POLL_INTERVAL};
pub use series::{BarUpdate, CandleSeries, ChartSurface, SharedSeries};
pub use source::BarSource;
