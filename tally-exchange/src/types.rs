//! Exchange API request and response types
//!
//! These types mirror the gateway's REST JSON exactly and are converted
//! to tally-core types for use in the application.

use chrono::DateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::{Bar, DepthPayload, TradeFill};

/// Epoch values below this are seconds, not milliseconds
const EPOCH_MILLIS_THRESHOLD: i64 = 10_000_000_000;

// ============================================================================
// Market Data Types
// ============================================================================

/// Response from GET /api/v1/depth
#[derive(Debug, Clone, Deserialize)]
pub struct DepthResponse {
    pub payload: DepthPayload,
}

/// Response from GET /api/v1/trades
#[derive(Debug, Clone, Deserialize)]
pub struct TradesResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<TradeFill>,
}

/// A kline timestamp as the gateway sends it: epoch milliseconds,
/// epoch seconds, a stringified epoch, or an ISO-8601 date
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KlineTime {
    Epoch(i64),
    Text(String),
}

impl KlineTime {
    /// Normalize to epoch milliseconds. Returns None when the value is
    /// neither a date nor a number.
    pub fn to_millis(&self) -> Option<i64> {
        match self {
            KlineTime::Epoch(value) => Some(normalize_epoch(*value)),
            KlineTime::Text(text) => {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                    Some(parsed.timestamp_millis())
                } else {
                    text.parse::<i64>().ok().map(normalize_epoch)
                }
            }
        }
    }
}

fn normalize_epoch(value: i64) -> i64 {
    if value < EPOCH_MILLIS_THRESHOLD {
        value * 1000
    } else {
        value
    }
}

/// A single kline from GET /api/v1/klines
///
/// All numeric fields arrive as strings; open/high/low may be missing
/// on sparse candles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KLine {
    #[serde(default)]
    pub open: Option<String>,

    #[serde(default)]
    pub high: Option<String>,

    #[serde(default)]
    pub low: Option<String>,

    pub close: String,

    pub volume: String,

    /// Volume in the quote asset
    #[serde(rename = "quoteVolume", default)]
    pub quote_volume: Option<String>,

    /// Number of trades in the window
    #[serde(default)]
    pub trades: Option<String>,

    /// Window start
    #[serde(default)]
    pub start: Option<KlineTime>,

    /// Window end; this is the bar's timestamp
    pub end: KlineTime,
}

impl KLine {
    /// Convert to a chart bar. Returns None when the timestamp or the
    /// close is unusable; a missing open/high/low falls back to the
    /// close, an unparsable volume to zero.
    pub fn to_bar(&self) -> Option<Bar> {
        let time = self.end.to_millis()?;
        let close: Decimal = self.close.parse().ok()?;
        let field_or_close = |field: &Option<String>| {
            field
                .as_deref()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(close)
        };

        Some(Bar {
            time,
            open: field_or_close(&self.open),
            high: field_or_close(&self.high),
            low: field_or_close(&self.low),
            close,
            volume: self.volume.parse().unwrap_or(Decimal::ZERO),
        })
    }
}

// ============================================================================
// Order Types
// ============================================================================

/// Order side in exchange terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Bid,
    Ask,
}

/// Request body for POST /api/v1/order/quote
///
/// Quantities go over the wire as JSON numbers, not strings.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteRequest {
    pub market: String,
    pub order_type: String,
    pub side: OrderSide,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
}

impl QuoteRequest {
    /// Quote a spot market order
    pub fn spot(market: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            market: market.into(),
            order_type: "Spot".to_string(),
            side,
            quantity,
        }
    }
}

/// Response from POST /api/v1/order/quote
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteResponse {
    pub payload: QuotePayload,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Quote payload; prices arrive as decimal strings
#[derive(Debug, Clone, Deserialize)]
pub struct QuotePayload {
    pub avg_price: Decimal,
    pub quantity: Decimal,
    pub total_cost: Decimal,
}

/// Request body for POST /api/v1/order/create
///
/// A missing price means a market order; the field is omitted rather
/// than sent as null.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub market: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    pub side: OrderSide,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Decimal>,
}

impl OrderRequest {
    /// Market order: filled at whatever the book gives
    pub fn market(
        user_id: impl Into<String>,
        market: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            market: market.into(),
            quantity,
            side,
            price: None,
        }
    }

    /// Limit order resting at the given price
    pub fn limit(
        user_id: impl Into<String>,
        market: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            market: market.into(),
            quantity,
            side,
            price: Some(price),
        }
    }
}

/// Response from POST /api/v1/order/create
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub payload: OrderPayload,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Fill summary for a placed order
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPayload {
    pub order_id: String,
    pub filled_qty: Decimal,
    pub remaining_qty: Decimal,
}
