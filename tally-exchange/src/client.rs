//! Exchange API client
//!
//! Provides methods for the gateway's public REST API.

use crate::types::{
    DepthResponse, KLine, OrderRequest, OrderResponse, QuoteRequest, QuoteResponse, TradesResponse,
};
use reqwest::Client;
use std::time::Duration;
use tally_core::{Depth, Interval, Market, TallyError, TallyResult, TradeFill};
use tracing::{debug, instrument};

/// Default base URL for the exchange REST API
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Exchange API client
#[derive(Clone)]
pub struct ExchangeClient {
    client: Client,
    base_url: String,
}

impl ExchangeClient {
    /// Create a new client against the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List all markets
    #[instrument(skip(self))]
    pub async fn get_markets(&self) -> TallyResult<Vec<Market>> {
        let url = format!("{}/api/v1/markets", self.base_url);

        debug!("Fetching markets from: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TallyError::network(format!("Failed to fetch markets: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TallyError::api(format!(
                "Exchange API error ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TallyError::parse(format!("Failed to parse markets response: {}", e)))
    }

    /// Get a single market by its base asset. The exchange has no
    /// per-market endpoint, so this filters the full listing; trailing
    /// underscores in the symbol are ignored.
    #[instrument(skip(self))]
    pub async fn get_market(&self, symbol: &str) -> TallyResult<Market> {
        let want = symbol.trim_end_matches('_');
        let markets = self.get_markets().await?;

        markets
            .into_iter()
            .find(|market| market.base_asset == want)
            .ok_or_else(|| TallyError::not_found(format!("Market not found: {}", symbol)))
    }

    // ========================================================================
    // Order Book Methods
    // ========================================================================

    /// Get the order book depth for a market
    #[instrument(skip(self))]
    pub async fn get_depth(&self, symbol: &str) -> TallyResult<Depth> {
        let url = format!("{}/api/v1/depth?symbol={}", self.base_url, symbol);

        debug!("Fetching depth for: {}", symbol);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TallyError::network(format!("Failed to fetch depth: {}", e)))?;

        if response.status().as_u16() == 404 {
            return Err(TallyError::not_found(format!(
                "Market not found: {}",
                symbol
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TallyError::api(format!(
                "Exchange API error ({}): {}",
                status, body
            )));
        }

        let depth_response: DepthResponse = response
            .json()
            .await
            .map_err(|e| TallyError::parse(format!("Failed to parse depth response: {}", e)))?;

        Ok(depth_response.payload.to_depth())
    }

    // ========================================================================
    // Trade History Methods
    // ========================================================================

    /// Get recent trades for a market
    #[instrument(skip(self))]
    pub async fn get_trades(
        &self,
        symbol: &str,
        limit: Option<u32>,
    ) -> TallyResult<Vec<TradeFill>> {
        let mut url = format!("{}/api/v1/trades?symbol={}", self.base_url, symbol);
        if let Some(l) = limit {
            url.push_str(&format!("&limit={}", l));
        }

        debug!("Fetching trades for: {}", symbol);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TallyError::network(format!("Failed to fetch trades: {}", e)))?;

        if response.status().as_u16() == 404 {
            return Err(TallyError::not_found(format!(
                "Market not found: {}",
                symbol
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TallyError::api(format!(
                "Exchange API error ({}): {}",
                status, body
            )));
        }

        let trades_response: TradesResponse = response
            .json()
            .await
            .map_err(|e| TallyError::parse(format!("Failed to parse trades response: {}", e)))?;

        if !trades_response.success {
            return Err(TallyError::api(format!(
                "Trades request rejected for {}",
                symbol
            )));
        }

        Ok(trades_response.data)
    }

    // ========================================================================
    // Kline Methods
    // ========================================================================

    /// Get klines for a market over a window of epoch milliseconds
    #[instrument(skip(self))]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: Interval,
        start_time: i64,
        end_time: i64,
    ) -> TallyResult<Vec<KLine>> {
        let url = format!(
            "{}/api/v1/klines?symbol={}&interval={}&startTime={}&endTime={}",
            self.base_url, symbol, interval, start_time, end_time
        );

        debug!("Fetching {} klines for: {}", interval, symbol);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TallyError::network(format!("Failed to fetch klines: {}", e)))?;

        if response.status().as_u16() == 404 {
            return Err(TallyError::not_found(format!(
                "Market not found: {}",
                symbol
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TallyError::api(format!(
                "Exchange API error ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TallyError::parse(format!("Failed to parse klines response: {}", e)))
    }

    // ========================================================================
    // Order Methods
    // ========================================================================

    /// Quote a market order without placing it
    #[instrument(skip(self, request))]
    pub async fn quote(&self, request: &QuoteRequest) -> TallyResult<QuoteResponse> {
        let url = format!("{}/api/v1/order/quote", self.base_url);

        debug!("Requesting quote for: {}", request.market);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TallyError::network(format!("Failed to request quote: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TallyError::api(format!(
                "Exchange API error ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TallyError::parse(format!("Failed to parse quote response: {}", e)))
    }

    /// Place an order
    #[instrument(skip(self, request))]
    pub async fn create_order(&self, request: &OrderRequest) -> TallyResult<OrderResponse> {
        let url = format!("{}/api/v1/order/create", self.base_url);

        debug!(
            "Placing {:?} order on {} for {}",
            request.side, request.market, request.quantity
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TallyError::network(format!("Failed to place order: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TallyError::api(format!(
                "Exchange API error ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TallyError::parse(format!("Failed to parse order response: {}", e)))
    }
}

impl Default for ExchangeClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl std::fmt::Debug for ExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}
