//! Core types for the Tally trading console
//!
//! This crate defines the shared data structures used across the console,
//! including markets, candles, realtime room identifiers, and the socket
//! wire protocol spoken with the exchange gateway.

pub mod error;
pub mod market;
pub mod room;
pub mod ws;

pub use error::{TallyError, TallyResult};
pub use market::{
    Bar, Depth, DepthLevel, Interval, Market, MarketStatus, TradeFill, TradeSide,
};
pub use room::{Room, RoomKind};
pub use ws::{
    ClientRequest, DepthPayload, Envelope, RawLevel, RoomPayload, RoomUpdate, TickerData,
    TickerPayload,
};
