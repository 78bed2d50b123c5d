//! Index price store
//!
//! Latest index price per underlying asset.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Index price tick for one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPrice {
    pub asset: String,
    pub price: Decimal,
}

/// Asset -> latest index price
#[derive(Debug, Default)]
pub struct IndexPriceStore {
    prices: RwLock<HashMap<String, IndexPrice>>,
}

impl IndexPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the price for the tick's asset, returning the previous one
    pub async fn put(&self, price: IndexPrice) -> Option<IndexPrice> {
        let mut prices = self.prices.write().await;
        prices.insert(price.asset.clone(), price)
    }

    pub async fn get(&self, asset: &str) -> Option<IndexPrice> {
        self.prices.read().await.get(asset).cloned()
    }

    /// Point-in-time copy of every stored price
    pub async fn snapshot_all(&self) -> HashMap<String, IndexPrice> {
        self.prices.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.prices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.prices.read().await.is_empty()
    }
}
