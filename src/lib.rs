//! Options Market Data Handler Library
//!
//! This crate ingests order book and index price streams from an options
//! venue over WebSocket and keeps the latest snapshot of each in memory for
//! downstream readers.

use std::collections::HashMap;
use std::sync::Arc;

pub mod catalog;
pub mod config;
pub mod error;
pub mod index;
pub mod metrics;
pub mod orderbook;
pub mod parser;
pub mod websocket;

pub use catalog::InstrumentCatalog;
pub use config::Config;
pub use error::{MarketDataError, Result};
pub use index::{IndexPrice, IndexPriceStore};
pub use metrics::DispatchMetrics;
pub use orderbook::{Order, OrderBookSnapshot, OrderBookStore, Side};
pub use parser::{DecodeError, ParsedMessage};
pub use websocket::{
    Connector, StreamDispatcher, SubscriptionManager, Transport, WebSocketConnector, WebSocketManager,
};

/// In-memory market state written by the dispatcher and read by consumers
#[derive(Debug, Default)]
pub struct MarketState {
    pub order_books: OrderBookStore,
    pub index_prices: IndexPriceStore,
}

impl MarketState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_order_book(&self, instrument: &str) -> Option<Arc<OrderBookSnapshot>> {
        self.order_books.get(instrument).await
    }

    pub async fn get_index_price(&self, asset: &str) -> Option<IndexPrice> {
        self.index_prices.get(asset).await
    }

    /// Every stored order book, copied at one point in time
    pub async fn order_books(&self) -> HashMap<String, Arc<OrderBookSnapshot>> {
        self.order_books.snapshot_all().await
    }

    /// Every stored index price, copied at one point in time
    pub async fn index_prices(&self) -> HashMap<String, IndexPrice> {
        self.index_prices.snapshot_all().await
    }

    /// Order books of every instrument on one underlying asset
    pub async fn order_books_for_asset(&self, asset: &str) -> Vec<Arc<OrderBookSnapshot>> {
        self.order_books.snapshot_for_asset(asset).await
    }
}

/// Application state shared across components
pub struct AppState {
    pub market: Arc<MarketState>,
    pub metrics: DispatchMetrics,
    pub config: Arc<Config>,
}
