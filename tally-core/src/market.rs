//! Market data structures for the exchange

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Status of a prediction market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    /// Market is open for trading
    Ongoing,
    /// Market has been resolved with a final outcome
    Resolved,
}

impl Default for MarketStatus {
    fn default() -> Self {
        MarketStatus::Ongoing
    }
}

/// A tradeable prediction market as served by the exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    /// Unique market symbol (e.g., "ELECTION2028_USDC")
    pub name: String,

    /// Human-readable description of the market question
    pub description: String,

    /// Outcome asset being traded
    pub base_asset: String,

    /// Settlement currency
    pub quote_asset: String,

    /// When trading opened
    pub start_time: DateTime<Utc>,

    /// When the market resolves
    pub end_time: DateTime<Utc>,

    /// Current status
    #[serde(default)]
    pub status: MarketStatus,
}

impl Market {
    /// Check if this market is currently tradeable
    pub fn is_live(&self) -> bool {
        self.status == MarketStatus::Ongoing
    }
}

// ============================================================================
// Trade Types
// ============================================================================

/// Side of a fill (from the taker's perspective)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    /// Taker bought the outcome
    Buy,
    /// Taker sold the outcome
    Sell,
}

/// A single fill, as pushed on the trade room and returned by the
/// trades endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeFill {
    /// Fill ID
    pub id: String,

    /// Settlement currency of the fill
    pub currency_code: String,

    /// Price at which the fill occurred (0.00 - 1.00)
    pub price: Decimal,

    /// Quantity traded
    pub quantity: Decimal,

    /// Notional volume (price * quantity)
    pub volume: Decimal,

    /// When the fill occurred
    pub time: DateTime<Utc>,

    /// Taker side
    pub side: TradeSide,
}

// ============================================================================
// Depth Types
// ============================================================================

/// A single price level of the order book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthLevel {
    /// Price (0.00 - 1.00 representing probability)
    pub price: Decimal,
    /// Total size resting at this level
    pub size: Decimal,
}

impl DepthLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Aggregated order book depth, levels in the order served by the
/// exchange (bids best-first descending, asks best-first ascending)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Depth {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

impl Depth {
    /// Get the best bid price
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Get the best ask price
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Calculate the spread (best ask - best bid)
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Calculate the mid price
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            _ => None,
        }
    }
}

// ============================================================================
// Candle Types
// ============================================================================

/// Time interval for candles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    /// 1 minute candles
    #[serde(rename = "1m")]
    OneMinute,
    /// 1 hour candles
    #[serde(rename = "1h")]
    OneHour,
    /// 1 day candles
    #[serde(rename = "1d")]
    OneDay,
    /// 1 week candles
    #[serde(rename = "1w")]
    OneWeek,
}

impl Interval {
    /// Wire representation of the interval
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::OneHour => "1h",
            Interval::OneDay => "1d",
            Interval::OneWeek => "1w",
        }
    }

    /// Get the interval duration in seconds
    pub fn to_seconds(&self) -> u64 {
        match self {
            Interval::OneMinute => 60,
            Interval::OneHour => 3_600,
            Interval::OneDay => 86_400,
            Interval::OneWeek => 604_800,
        }
    }

    /// How far back the initial candle history reaches for this interval
    pub fn lookback(&self) -> chrono::Duration {
        match self {
            Interval::OneMinute => chrono::Duration::hours(1),
            Interval::OneHour => chrono::Duration::days(7),
            Interval::OneDay => chrono::Duration::days(180),
            Interval::OneWeek => chrono::Duration::days(730),
        }
    }

    /// Parse from string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Interval::OneMinute),
            "1h" => Some(Interval::OneHour),
            "1d" => Some(Interval::OneDay),
            "1w" => Some(Interval::OneWeek),
            _ => None,
        }
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval::OneHour
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single OHLCV bar, keyed by its period timestamp in epoch
/// milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Period timestamp (epoch milliseconds)
    pub time: i64,
    /// Opening price
    pub open: Decimal,
    /// Highest price during the period
    pub high: Decimal,
    /// Lowest price during the period
    pub low: Decimal,
    /// Closing price
    pub close: Decimal,
    /// Trading volume during the period
    pub volume: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn interval_round_trips_wire_strings() {
        for s in ["1m", "1h", "1d", "1w"] {
            let interval = Interval::from_str(s).unwrap();
            assert_eq!(interval.as_str(), s);
        }
        assert!(Interval::from_str("5m").is_none());
    }

    #[test]
    fn interval_lookbacks() {
        assert_eq!(Interval::OneMinute.lookback(), chrono::Duration::hours(1));
        assert_eq!(Interval::OneHour.lookback(), chrono::Duration::days(7));
        assert_eq!(Interval::OneDay.lookback(), chrono::Duration::days(180));
        assert_eq!(Interval::OneWeek.lookback(), chrono::Duration::days(730));
    }

    #[test]
    fn depth_spread_and_mid() {
        let depth = Depth {
            bids: vec![DepthLevel::new(dec!(0.44), dec!(100))],
            asks: vec![DepthLevel::new(dec!(0.46), dec!(50))],
        };
        assert_eq!(depth.spread(), Some(dec!(0.02)));
        assert_eq!(depth.mid_price(), Some(dec!(0.45)));
        assert_eq!(Depth::default().spread(), None);
    }

    #[test]
    fn trade_fill_parses_numeric_and_iso_fields() {
        let json = r#"{
            "id": "1",
            "currency_code": "USDC",
            "price": 0.45,
            "quantity": 100,
            "volume": 45,
            "time": "2024-01-15T10:30:00Z",
            "side": "buy"
        }"#;
        let fill: TradeFill = serde_json::from_str(json).unwrap();
        assert_eq!(fill.price, dec!(0.45));
        assert_eq!(fill.side, TradeSide::Buy);
        assert_eq!(fill.time.timestamp(), 1_705_314_600);
    }
}
