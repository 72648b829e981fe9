//! Wire protocol for the realtime market data socket
//!
//! The client sends control requests to the gateway; the gateway pushes
//! room-tagged envelopes whose `data` field is a JSON-encoded payload
//! string with a schema decided by the room kind.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::{Depth, DepthLevel, TradeFill};
use crate::room::{Room, RoomKind};

// ============================================================================
// Client -> Server Messages
// ============================================================================

/// Room reference carried by control requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomPayload {
    pub room: String,
}

/// Control requests sent from the client to the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ClientRequest {
    /// Start receiving pushes for a room
    Subscribe { payload: RoomPayload },
    /// Stop receiving pushes for a room
    Unsubscribe { payload: RoomPayload },
}

impl ClientRequest {
    pub fn subscribe(room: &Room) -> Self {
        ClientRequest::Subscribe {
            payload: RoomPayload {
                room: room.to_string(),
            },
        }
    }

    pub fn unsubscribe(room: &Room) -> Self {
        ClientRequest::Unsubscribe {
            payload: RoomPayload {
                room: room.to_string(),
            },
        }
    }
}

// ============================================================================
// Server -> Client Messages
// ============================================================================

/// Outer wire message pushed by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Wire form of the room this message belongs to
    pub room: String,
    /// JSON-encoded payload string
    pub data: String,
}

/// Raw (price, size) level as pushed on the wire, string numerics
pub type RawLevel = (String, String);

/// Payload pushed on depth rooms
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepthPayload {
    #[serde(default)]
    pub bids: Vec<RawLevel>,
    #[serde(default)]
    pub asks: Vec<RawLevel>,
}

impl DepthPayload {
    /// Parse the string levels into a typed depth snapshot, skipping
    /// levels whose numerics do not parse
    pub fn to_depth(&self) -> Depth {
        fn parse_levels(raw: &[RawLevel]) -> Vec<DepthLevel> {
            raw.iter()
                .filter_map(|(price, size)| {
                    match (price.parse::<Decimal>(), size.parse::<Decimal>()) {
                        (Ok(price), Ok(size)) => Some(DepthLevel::new(price, size)),
                        _ => None,
                    }
                })
                .collect()
        }

        Depth {
            bids: parse_levels(&self.bids),
            asks: parse_levels(&self.asks),
        }
    }
}

/// Payload pushed on ticker rooms: `{"data":{"p":"0.45",...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerPayload {
    pub data: TickerData,
}

/// Inner ticker fields (single-letter keys on the wire)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerData {
    /// Last traded price
    pub p: String,
    /// Market symbol, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
    /// Last traded quantity, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

impl TickerData {
    /// Last price as a decimal, if it parses
    pub fn last_price(&self) -> Option<Decimal> {
        self.p.parse().ok()
    }
}

/// A parsed room payload, tagged by its kind
#[derive(Debug, Clone)]
pub enum RoomUpdate {
    Depth(DepthPayload),
    Trade(TradeFill),
    Ticker(TickerPayload),
}

impl RoomUpdate {
    /// Parse an envelope `data` string for the given room kind
    pub fn parse(kind: RoomKind, data: &str) -> serde_json::Result<Self> {
        let update = match kind {
            RoomKind::Depth => RoomUpdate::Depth(serde_json::from_str(data)?),
            RoomKind::Trade => RoomUpdate::Trade(serde_json::from_str(data)?),
            RoomKind::Ticker => RoomUpdate::Ticker(serde_json::from_str(data)?),
        };
        Ok(update)
    }

    /// The room kind this payload belongs to
    pub fn kind(&self) -> RoomKind {
        match self {
            RoomUpdate::Depth(_) => RoomKind::Depth,
            RoomUpdate::Trade(_) => RoomKind::Trade,
            RoomUpdate::Ticker(_) => RoomKind::Ticker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn control_requests_match_gateway_contract() {
        let room = Room::depth("ELECTION2028_USDC");

        let subscribe = serde_json::to_value(ClientRequest::subscribe(&room)).unwrap();
        assert_eq!(
            subscribe,
            json!({"type": "SUBSCRIBE", "payload": {"room": "depth@ELECTION2028_USDC"}})
        );

        let unsubscribe = serde_json::to_value(ClientRequest::unsubscribe(&room)).unwrap();
        assert_eq!(
            unsubscribe,
            json!({"type": "UNSUBSCRIBE", "payload": {"room": "depth@ELECTION2028_USDC"}})
        );
    }

    #[test]
    fn envelope_data_parses_by_kind() {
        let raw = r#"{"room":"ticker@ELECTION2028_USDC","data":"{\"data\":{\"p\":\"0.45\"}}"}"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        let room: Room = envelope.room.parse().unwrap();

        let update = RoomUpdate::parse(room.kind, &envelope.data).unwrap();
        match update {
            RoomUpdate::Ticker(ticker) => {
                assert_eq!(ticker.data.last_price(), Some(dec!(0.45)));
            }
            other => panic!("expected ticker update, got {:?}", other.kind()),
        }
    }

    #[test]
    fn depth_payload_skips_unparsable_levels() {
        let payload: DepthPayload = serde_json::from_str(
            r#"{"bids":[["0.45","1000"],["oops","1"]],"asks":[["0.46","500"]]}"#,
        )
        .unwrap();

        let depth = payload.to_depth();
        assert_eq!(depth.bids.len(), 1);
        assert_eq!(depth.best_bid(), Some(dec!(0.45)));
        assert_eq!(depth.best_ask(), Some(dec!(0.46)));
    }

    #[test]
    fn trade_payload_is_a_fill_record() {
        let data = r#"{
            "id": "42",
            "currency_code": "USDC",
            "price": 0.46,
            "quantity": 25,
            "volume": 11.5,
            "time": "2024-01-15T10:31:00Z",
            "side": "sell"
        }"#;
        let update = RoomUpdate::parse(RoomKind::Trade, data).unwrap();
        assert_eq!(update.kind(), RoomKind::Trade);
    }

    #[test]
    fn malformed_payload_is_an_error_not_a_panic() {
        assert!(RoomUpdate::parse(RoomKind::Depth, "not json").is_err());
        assert!(RoomUpdate::parse(RoomKind::Ticker, "{\"nope\":1}").is_err());
    }
}
