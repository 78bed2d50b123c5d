//! Order book module
//!
//! Holds the latest full order book snapshot per instrument. Updates replace
//! the stored snapshot wholesale; nothing is merged level by level.

mod book;
mod store;

pub use store::OrderBookStore;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Field name carrying this side in the venue payload
    pub fn field(self) -> &'static str {
        match self {
            Side::Bid => "bids",
            Side::Ask => "asks",
        }
    }
}

/// A single resting order as delivered by the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub price: Decimal,
    pub amount: Decimal,
    pub implied_volatility: Decimal,
}

/// Full order book state for one instrument
///
/// Bids and asks keep the order the venue sent them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub instrument: String,
    pub bids: Vec<Order>,
    pub asks: Vec<Order>,
    pub last_updated: i64,
}
