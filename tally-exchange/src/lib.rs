//! Exchange REST client for the Tally trading console
//!
//! Wraps the gateway's public REST API: market listings, order book
//! depth, trade history, klines, and the order endpoints (quote and
//! create). Responses are converted into `tally-core` domain types.

pub mod client;
pub mod types;

pub use client::{ExchangeClient, DEFAULT_API_URL};
pub use types::{
    DepthResponse, KLine, KlineTime, OrderPayload, OrderRequest, OrderResponse, OrderSide,
    QuotePayload, QuoteRequest, QuoteResponse, TradesResponse,
};
