//! Subscription requests
//!
//! Order book channels go out in bounded batches with a pause between frames
//! so that subscribing hundreds of instruments does not burst the connection.

use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::Transport;
use crate::error::Result;
use crate::parser::{INDEX_PREFIX, ORDERBOOK_PREFIX};

/// Outbound `{"op": "subscribe", "data": [...]}` frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    pub op: &'static str,
    pub data: Vec<String>,
}

impl SubscribeRequest {
    pub fn subscribe(channels: Vec<String>) -> Self {
        Self {
            op: "subscribe",
            data: channels,
        }
    }

    /// Split channels into requests of at most `batch_size`, preserving order
    pub fn batches(channels: &[String], batch_size: usize) -> Vec<Self> {
        channels
            .chunks(batch_size.max(1))
            .map(|chunk| Self::subscribe(chunk.to_vec()))
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

pub fn orderbook_channels(instruments: &[String]) -> Vec<String> {
    instruments
        .iter()
        .map(|i| format!("{ORDERBOOK_PREFIX}{i}"))
        .collect()
}

pub fn index_channels(assets: &[String]) -> Vec<String> {
    assets.iter().map(|a| format!("{INDEX_PREFIX}{a}")).collect()
}

/// Builds and paces subscribe frames
#[derive(Debug, Clone)]
pub struct SubscriptionManager {
    batch_size: usize,
    pacing: Duration,
}

impl SubscriptionManager {
    pub fn new(batch_size: usize, pacing: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pacing,
        }
    }

    /// Subscribe to the order book channel of every instrument.
    ///
    /// Returns the number of frames written. The first write error aborts
    /// the remaining batches.
    pub async fn subscribe_order_books<T: Transport>(
        &self,
        transport: &mut T,
        instruments: &[String],
    ) -> Result<usize> {
        if instruments.is_empty() {
            warn!("No instruments to subscribe");
            return Ok(0);
        }

        let batches = SubscribeRequest::batches(&orderbook_channels(instruments), self.batch_size);
        let total = batches.len();

        for (i, request) in batches.into_iter().enumerate() {
            if i > 0 && !self.pacing.is_zero() {
                sleep(self.pacing).await;
            }
            debug!(batch = i + 1, of = total, channels = request.data.len(), "Subscribing order books");
            transport.send_text(request.to_json()?).await?;
        }

        info!(instruments = instruments.len(), frames = total, "Order book subscriptions sent");
        Ok(total)
    }

    /// Subscribe to the index channel of every asset in a single frame
    pub async fn subscribe_indices<T: Transport>(
        &self,
        transport: &mut T,
        assets: &[String],
    ) -> Result<usize> {
        if assets.is_empty() {
            warn!("No assets to subscribe");
            return Ok(0);
        }

        let request = SubscribeRequest::subscribe(index_channels(assets));
        transport.send_text(request.to_json()?).await?;

        info!(assets = ?assets, "Index subscriptions sent");
        Ok(1)
    }
}
