//! Stream dispatcher
//!
//! Single consumer of the venue stream and sole writer into the stores.
//! Frames are decoded before any store lock is taken.

use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, trace, warn};

use super::Transport;
use crate::error::Result;
use crate::metrics::DispatchMetrics;
use crate::parser::{DecodeError, ParsedMessage};
use crate::MarketState;

/// What happened to one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    OrderBookUpdated { instrument: String },
    IndexUpdated { asset: String },
    Ignored { channel: String },
    Discarded(DecodeError),
}

pub struct StreamDispatcher {
    market: Arc<MarketState>,
    metrics: DispatchMetrics,
}

impl StreamDispatcher {
    pub fn new(market: Arc<MarketState>, metrics: DispatchMetrics) -> Self {
        Self { market, metrics }
    }

    pub fn market(&self) -> &Arc<MarketState> {
        &self.market
    }

    /// Decode one frame and apply it to the matching store
    pub async fn handle_frame(&self, raw: &str) -> Dispatch {
        self.metrics.frames.inc();

        let parsed = match ParsedMessage::parse(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, reason = e.reason(), "Discarding frame");
                self.metrics.discarded.with_label_values(&[e.reason()]).inc();
                return Dispatch::Discarded(e);
            }
        };

        match parsed {
            ParsedMessage::OrderBook(snapshot) => {
                let instrument = snapshot.instrument.clone();
                trace!(
                    instrument = %instrument,
                    bids = snapshot.bids.len(),
                    asks = snapshot.asks.len(),
                    last_updated = snapshot.last_updated,
                    "Order book snapshot"
                );
                self.market.order_books.put(snapshot).await;
                self.metrics.applied.with_label_values(&["orderbook"]).inc();
                Dispatch::OrderBookUpdated { instrument }
            }
            ParsedMessage::Index(price) => {
                let asset = price.asset.clone();
                trace!(asset = %asset, price = %price.price, "Index price");
                self.market.index_prices.put(price).await;
                self.metrics.applied.with_label_values(&["index"]).inc();
                Dispatch::IndexUpdated { asset }
            }
            ParsedMessage::Ignored(channel) => {
                debug!(channel = %channel, "Ignoring untracked channel");
                Dispatch::Ignored { channel }
            }
        }
    }

    /// Receive and dispatch frames until `deadline`.
    ///
    /// Returns `Ok(())` once the deadline passes. A receive error ends the
    /// loop and is returned to the caller.
    pub async fn run<T: Transport>(&self, transport: &mut T, deadline: Instant) -> Result<()> {
        info!("Stream dispatcher started");

        loop {
            match timeout_at(deadline, transport.recv()).await {
                Ok(Ok(Some(text))) => {
                    self.handle_frame(&text).await;
                }
                Ok(Ok(None)) => continue,
                Ok(Err(e)) => {
                    error!(error = %e, "Stream receive failed");
                    return Err(e);
                }
                Err(_) => {
                    info!("Session deadline reached, stopping dispatcher");
                    return Ok(());
                }
            }
        }
    }
}
