//! Tally trading console
//!
//! Composition root: loads configuration, wires the exchange client,
//! the signaling manager, and a chart feed for one market, and streams
//! live market data to the log until Ctrl-C.

mod settings;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tally_charts::{ChartFeed, ChartFeedConfig, SharedSeries};
use tally_core::{Interval, Room, RoomUpdate};
use tally_exchange::ExchangeClient;
use tally_signaling::{SignalingConfig, SignalingManager};

use settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env, if present
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: failed to load .env: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    info!("Starting Tally trading console");
    info!("Exchange API: {}", settings.api_url);
    info!("Gateway: {}", settings.ws_url);
    info!(
        "Solana: {} (rpc {}, program {})",
        settings.network, settings.rpc_url, settings.program_id
    );

    let exchange = ExchangeClient::new(settings.api_url.clone());

    // Market from the command line, else the first one the exchange lists.
    let market = match std::env::args().nth(1) {
        Some(symbol) => symbol,
        None => {
            let markets = exchange.get_markets().await?;
            let first = markets
                .first()
                .ok_or_else(|| anyhow::anyhow!("exchange lists no markets"))?;
            info!("No market given, defaulting to {}", first.name);
            first.name.clone()
        }
    };

    let manager = SignalingManager::connect(SignalingConfig {
        url: settings.ws_url.clone(),
        ..SignalingConfig::default()
    });

    let depth_room = Room::depth(&market);
    let trade_room = Room::trade(&market);
    let ticker_room = Room::ticker(&market);

    // Live log consumers, one per room kind.
    let depth_cb = manager.register_callback(depth_room.clone(), |update| {
        if let RoomUpdate::Depth(payload) = update {
            let depth = payload.to_depth();
            if let (Some(bid), Some(ask)) = (depth.best_bid(), depth.best_ask()) {
                info!("[Depth] best bid {} / best ask {}", bid, ask);
            }
        }
    });
    let trade_cb = manager.register_callback(trade_room.clone(), |update| {
        if let RoomUpdate::Trade(fill) = update {
            info!("[Trade] {:?} {} @ {}", fill.side, fill.quantity, fill.price);
        }
    });
    let ticker_cb = manager.register_callback(ticker_room.clone(), |update| {
        if let RoomUpdate::Ticker(ticker) = update {
            if let Some(price) = ticker.data.last_price() {
                info!("[Ticker] last price {}", price);
            }
        }
    });

    manager.subscribe(depth_room.clone()).await?;
    manager.subscribe(trade_room.clone()).await?;
    manager.subscribe(ticker_room.clone()).await?;

    // Candle series for the default interval, kept current by polling.
    let series = SharedSeries::new();
    let feed = match ChartFeed::start(
        Arc::new(exchange.clone()),
        Arc::new(series.clone()),
        ChartFeedConfig::new(market.clone(), Interval::default()),
    )
    .await
    {
        Ok(feed) => {
            info!("Chart series primed with {} bar(s)", series.len());
            Some(feed)
        }
        Err(e) => {
            warn!("Chart feed unavailable for {}: {}", market, e);
            None
        }
    };

    info!("Streaming {} market data; press Ctrl-C to stop", market);
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    manager.deregister_callback(&depth_room, depth_cb);
    manager.deregister_callback(&trade_room, trade_cb);
    manager.deregister_callback(&ticker_room, ticker_cb);
    manager.unsubscribe(depth_room).await?;
    manager.unsubscribe(trade_room).await?;
    manager.unsubscribe(ticker_room).await?;
    if let Some(feed) = feed {
        feed.shutdown().await;
    }

    Ok(())
}
