//! Read helpers on order book snapshots

use rust_decimal::Decimal;

use super::{Order, OrderBookSnapshot, Side};

impl OrderBookSnapshot {
    /// Orders on one side
    pub fn side(&self, side: Side) -> &[Order] {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    /// Top bid as delivered (first entry, no re-sorting)
    pub fn best_bid(&self) -> Option<&Order> {
        self.bids.first()
    }

    /// Top ask as delivered (first entry, no re-sorting)
    pub fn best_ask(&self) -> Option<&Order> {
        self.asks.first()
    }

    /// Get mid price
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::from(2)),
            _ => None,
        }
    }

    /// Absolute spread between top ask and top bid
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Underlying asset, taken from the first `-`-delimited field of the instrument name
    pub fn asset(&self) -> &str {
        asset_of(&self.instrument)
    }
}

/// First `-`-delimited field of an instrument identifier
pub(crate) fn asset_of(instrument: &str) -> &str {
    instrument.split('-').next().unwrap_or(instrument)
}
