//! Order book store
//!
//! Owns the latest snapshot for every instrument. One writer (the stream
//! dispatcher) replaces entries while any number of readers query them.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::book::asset_of;
use super::OrderBookSnapshot;

/// Instrument -> latest order book snapshot
#[derive(Debug, Default)]
pub struct OrderBookStore {
    books: RwLock<HashMap<String, Arc<OrderBookSnapshot>>>,
}

impl OrderBookStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot for the snapshot's instrument
    ///
    /// Returns the snapshot that was replaced, if any.
    pub async fn put(&self, snapshot: OrderBookSnapshot) -> Option<Arc<OrderBookSnapshot>> {
        let snapshot = Arc::new(snapshot);
        let mut books = self.books.write().await;
        books.insert(snapshot.instrument.clone(), snapshot)
    }

    /// Get the snapshot for one instrument
    pub async fn get(&self, instrument: &str) -> Option<Arc<OrderBookSnapshot>> {
        self.books.read().await.get(instrument).cloned()
    }

    /// Point-in-time copy of every stored snapshot
    pub async fn snapshot_all(&self) -> HashMap<String, Arc<OrderBookSnapshot>> {
        self.books.read().await.clone()
    }

    /// Point-in-time copy of the snapshots whose instrument belongs to `asset`
    pub async fn snapshot_for_asset(&self, asset: &str) -> Vec<Arc<OrderBookSnapshot>> {
        self.books
            .read()
            .await
            .iter()
            .filter(|(instrument, _)| asset_of(instrument) == asset)
            .map(|(_, book)| book.clone())
            .collect()
    }

    /// Get list of instruments being tracked
    pub async fn instruments(&self) -> Vec<String> {
        self.books.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.books.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.books.read().await.is_empty()
    }
}
