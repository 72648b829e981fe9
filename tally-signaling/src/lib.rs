//! Realtime signaling layer for the Tally trading console
//!
//! A single reconnecting WebSocket connection multiplexes market-data
//! rooms (depth, trades, ticker) to any number of in-process consumers.
//! Consumers register callbacks per room and subscribe/unsubscribe at
//! will; the connection task keeps the subscription set alive across
//! reconnects with exponential backoff.

pub mod backoff;
pub mod manager;
pub mod registry;

pub use backoff::Backoff;
pub use manager::{ConnectionState, SignalingConfig, SignalingManager, DEFAULT_WS_URL};
pub use registry::{CallbackId, CallbackRegistry, RoomCallback};
