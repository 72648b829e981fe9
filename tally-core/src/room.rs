//! Room identifiers for the realtime socket protocol
//!
//! A room names one (data kind, market) channel. The wire form is
//! `<kind>@<market>`, e.g. `depth@ELECTION2028_USDC`; the kind decides
//! the payload schema pushed on that room.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TallyError;

/// The kind of data pushed on a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    /// Order book depth snapshots
    Depth,
    /// Individual fills
    Trade,
    /// Last-price ticker updates
    Ticker,
}

impl RoomKind {
    /// Wire prefix for the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomKind::Depth => "depth",
            RoomKind::Trade => "trade",
            RoomKind::Ticker => "ticker",
        }
    }

    /// Parse the wire prefix
    pub fn from_prefix(s: &str) -> Option<Self> {
        match s {
            "depth" => Some(RoomKind::Depth),
            "trade" => Some(RoomKind::Trade),
            "ticker" => Some(RoomKind::Ticker),
            _ => None,
        }
    }
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One subscribable (kind, market) channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Room {
    pub kind: RoomKind,
    pub market: String,
}

impl Room {
    pub fn new(kind: RoomKind, market: impl Into<String>) -> Self {
        Self {
            kind,
            market: market.into(),
        }
    }

    /// Depth room for a market
    pub fn depth(market: impl Into<String>) -> Self {
        Self::new(RoomKind::Depth, market)
    }

    /// Trade room for a market
    pub fn trade(market: impl Into<String>) -> Self {
        Self::new(RoomKind::Trade, market)
    }

    /// Ticker room for a market
    pub fn ticker(market: impl Into<String>) -> Self {
        Self::new(RoomKind::Ticker, market)
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.market)
    }
}

impl FromStr for Room {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, market) = s
            .split_once('@')
            .ok_or_else(|| TallyError::parse(format!("room without kind separator: {}", s)))?;
        let kind = RoomKind::from_prefix(prefix)
            .ok_or_else(|| TallyError::parse(format!("unknown room kind: {}", prefix)))?;
        if market.is_empty() {
            return Err(TallyError::parse(format!("room without market: {}", s)));
        }
        Ok(Room::new(kind, market))
    }
}
