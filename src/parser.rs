//! Parser module for venue WebSocket messages
//!
//! Inbound frames are `{"channel": ..., "data": {...}}` envelopes whose payload
//! shape depends on the channel. Each channel kind is decoded into a typed
//! message here so that no untyped JSON leaves this module.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use crate::index::IndexPrice;
use crate::orderbook::{Order, OrderBookSnapshot, Side};

/// Channel prefix for order book subscriptions
pub const ORDERBOOK_PREFIX: &str = "orderbook:";
/// Channel prefix for index price subscriptions
pub const INDEX_PREFIX: &str = "index:";

/// Reasons a single inbound frame could not be applied.
///
/// None of these end the stream; the frame is logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid envelope: {0}")]
    Envelope(String),

    #[error("malformed order: {0}")]
    MalformedOrder(String),

    #[error("missing or non-string field `{0}`")]
    MissingField(&'static str),

    #[error("`{0}` is not an object")]
    NotAnObject(&'static str),

    #[error("invalid channel `{0}`")]
    InvalidChannel(String),

    #[error("update carries neither bids nor asks")]
    NoBookSide,

    #[error("no book side could be decoded ({0})")]
    AllSidesFailed(String),

    #[error("invalid last_updated timestamp `{0}`")]
    InvalidTimestamp(String),

    #[error("invalid index price `{0}`")]
    InvalidPrice(String),
}

impl DecodeError {
    /// Short label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            DecodeError::Envelope(_) => "envelope",
            DecodeError::MalformedOrder(_) => "malformed_order",
            DecodeError::MissingField(_) => "missing_field",
            DecodeError::NotAnObject(_) => "not_an_object",
            DecodeError::InvalidChannel(_) => "invalid_channel",
            DecodeError::NoBookSide => "no_book_side",
            DecodeError::AllSidesFailed(_) => "all_sides_failed",
            DecodeError::InvalidTimestamp(_) => "invalid_timestamp",
            DecodeError::InvalidPrice(_) => "invalid_price",
        }
    }
}

/// Outer wrapper of every inbound frame
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Channel name, e.g. `orderbook:ETH-27DEC24-3000-C` or `index:ETH`
    pub channel: String,

    /// Channel-specific payload
    pub data: Value,
}

impl Envelope {
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(raw).map_err(|e| DecodeError::Envelope(e.to_string()))
    }
}

/// Channel families the dispatcher routes on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind<'a> {
    OrderBook,
    Index { asset: &'a str },
    Other,
}

impl<'a> ChannelKind<'a> {
    pub fn classify(channel: &'a str) -> Self {
        if channel.contains("orderbook") {
            ChannelKind::OrderBook
        } else if channel.contains("index") {
            ChannelKind::Index {
                asset: channel.strip_prefix(INDEX_PREFIX).unwrap_or(channel),
            }
        } else {
            ChannelKind::Other
        }
    }
}

/// Parsed WebSocket message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedMessage {
    OrderBook(OrderBookSnapshot),
    Index(IndexPrice),
    /// Channel the handler does not track
    Ignored(String),
}

impl ParsedMessage {
    /// Parse a raw WebSocket message
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        let envelope = Envelope::parse(raw)?;
        Self::from_envelope(&envelope)
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, DecodeError> {
        match ChannelKind::classify(&envelope.channel) {
            ChannelKind::OrderBook => decode_order_book(&envelope.data).map(ParsedMessage::OrderBook),
            ChannelKind::Index { asset } => {
                if asset.is_empty() {
                    return Err(DecodeError::InvalidChannel(envelope.channel.clone()));
                }
                decode_index(asset, &envelope.data).map(ParsedMessage::Index)
            }
            ChannelKind::Other => Ok(ParsedMessage::Ignored(envelope.channel.clone())),
        }
    }
}

/// Decode one `[price, amount, iv]` wire tuple
pub fn decode_order(value: &Value) -> Result<Order, DecodeError> {
    let fields = value
        .as_array()
        .ok_or_else(|| DecodeError::MalformedOrder(format!("expected an array, got {value}")))?;

    let [price, amount, iv] = fields.as_slice() else {
        return Err(DecodeError::MalformedOrder(format!(
            "expected 3 elements, got {}",
            fields.len()
        )));
    };

    Ok(Order {
        price: decimal_element(price, "price")?,
        amount: decimal_element(amount, "amount")?,
        implied_volatility: decimal_element(iv, "iv")?,
    })
}

/// Decode a list of order tuples; any bad element fails the whole list
pub fn decode_orders(value: &Value) -> Result<Vec<Order>, DecodeError> {
    value
        .as_array()
        .ok_or_else(|| DecodeError::MalformedOrder("order list is not an array".to_string()))?
        .iter()
        .map(decode_order)
        .collect()
}

/// Parse a venue numeric string, accepting plain and scientific notation
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn decimal_element(value: &Value, name: &str) -> Result<Decimal, DecodeError> {
    let s = value
        .as_str()
        .ok_or_else(|| DecodeError::MalformedOrder(format!("{name} is not a string: {value}")))?;
    parse_decimal(s)
        .ok_or_else(|| DecodeError::MalformedOrder(format!("{name} is not numeric: {s:?}")))
}

fn string_field<'a>(data: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, DecodeError> {
    data.get(field)
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingField(field))
}

/// Decode an order book payload into a full snapshot.
///
/// A side that is absent or not a list counts as empty. A side that is a list
/// but fails to decode is dropped with a warning, unless no present side
/// decodes at all, in which case the whole update is rejected.
fn decode_order_book(data: &Value) -> Result<OrderBookSnapshot, DecodeError> {
    let data = data.as_object().ok_or(DecodeError::NotAnObject("data"))?;

    let instrument = string_field(data, "instrument_name")?;
    let last_updated_raw = string_field(data, "last_updated")?;

    let bids_raw = data.get(Side::Bid.field()).filter(|v| v.is_array());
    let asks_raw = data.get(Side::Ask.field()).filter(|v| v.is_array());
    if bids_raw.is_none() && asks_raw.is_none() {
        return Err(DecodeError::NoBookSide);
    }

    let last_updated = last_updated_raw
        .parse::<i64>()
        .map_err(|_| DecodeError::InvalidTimestamp(last_updated_raw.to_string()))?;

    let bids = bids_raw.map(decode_orders);
    let asks = asks_raw.map(decode_orders);

    let (bids, asks) = match (bids, asks) {
        (Some(Err(bids)), Some(Err(asks))) => {
            return Err(DecodeError::AllSidesFailed(format!("bids: {bids}; asks: {asks}")));
        }
        (Some(Err(bids)), None) => {
            return Err(DecodeError::AllSidesFailed(format!("bids: {bids}")));
        }
        (None, Some(Err(asks))) => {
            return Err(DecodeError::AllSidesFailed(format!("asks: {asks}")));
        }
        (bids, asks) => (
            side_or_empty(instrument, Side::Bid, bids),
            side_or_empty(instrument, Side::Ask, asks),
        ),
    };

    Ok(OrderBookSnapshot {
        instrument: instrument.to_string(),
        bids,
        asks,
        last_updated,
    })
}

fn side_or_empty(
    instrument: &str,
    side: Side,
    decoded: Option<Result<Vec<Order>, DecodeError>>,
) -> Vec<Order> {
    match decoded {
        Some(Ok(orders)) => orders,
        Some(Err(e)) => {
            warn!(instrument = %instrument, side = side.field(), error = %e, "Dropping undecodable book side");
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn decode_index(asset: &str, data: &Value) -> Result<IndexPrice, DecodeError> {
    let data = data.as_object().ok_or(DecodeError::NotAnObject("data"))?;
    let raw = string_field(data, "price")?;
    let price = parse_decimal(raw).ok_or_else(|| DecodeError::InvalidPrice(raw.to_string()))?;

    Ok(IndexPrice {
        asset: asset.to_string(),
        price,
    })
}
