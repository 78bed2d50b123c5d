//! WebSocket module for venue stream management

mod client;
mod dispatcher;
mod manager;
mod subscription;

pub use client::{WebSocketClient, WebSocketConnector};
pub use dispatcher::{Dispatch, StreamDispatcher};
pub use manager::WebSocketManager;
pub use subscription::{index_channels, orderbook_channels, SubscribeRequest, SubscriptionManager};

use std::future::Future;

use crate::error::Result;

/// Bidirectional text-frame connection to the venue
pub trait Transport: Send {
    /// Write one text frame. Writes complete in call order.
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<()>> + Send;

    /// Receive the next frame.
    ///
    /// `Ok(None)` means a control frame arrived and there is no data to
    /// dispatch. An error means the connection is unusable.
    fn recv(&mut self) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Close the connection, gracefully if the peer cooperates
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens fresh transports for the session manager
pub trait Connector: Send + Sync {
    type Transport: Transport;

    fn connect(&self) -> impl Future<Output = Result<Self::Transport>> + Send;
}
