//! WebSocket client for the venue stream
//!
//! Handles connection, frame writes, message reception and shutdown.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use super::{Connector, Transport};
use crate::error::{MarketDataError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket client for a single connection
pub struct WebSocketClient {
    stream: Option<WsStream>,
    endpoint: String,
    close_timeout: Duration,
}

impl WebSocketClient {
    /// Create a new WebSocket client
    pub fn new(endpoint: &str, close_timeout: Duration) -> Self {
        Self {
            stream: None,
            endpoint: endpoint.to_string(),
            close_timeout,
        }
    }

    /// Connect to the WebSocket endpoint
    pub async fn connect(&mut self, connect_timeout: Duration) -> Result<()> {
        info!(url = %self.endpoint, "Connecting to venue WebSocket");

        let (ws_stream, response) = timeout(connect_timeout, connect_async(self.endpoint.as_str()))
            .await
            .map_err(|_| MarketDataError::ConnectionTimeout)?
            .map_err(|e| {
                MarketDataError::WebSocketConnection(format!("Failed to connect: {}", e))
            })?;

        info!(status = ?response.status(), "WebSocket connected");
        self.stream = Some(ws_stream);

        Ok(())
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream_mut(&mut self) -> Result<&mut WsStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| MarketDataError::WebSocketConnection("Not connected".to_string()))
    }
}

/// Connects [`WebSocketClient`]s to a fixed endpoint
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    endpoint: String,
    connect_timeout: Duration,
    close_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(endpoint: &str, connect_timeout: Duration, close_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            connect_timeout,
            close_timeout,
        }
    }
}

impl Connector for WebSocketConnector {
    type Transport = WebSocketClient;

    async fn connect(&self) -> Result<WebSocketClient> {
        let mut client = WebSocketClient::new(&self.endpoint, self.close_timeout);
        client.connect(self.connect_timeout).await?;
        Ok(client)
    }
}

impl Transport for WebSocketClient {
    async fn send_text(&mut self, text: String) -> Result<()> {
        let stream = self.stream_mut()?;
        if let Err(e) = stream.send(Message::Text(text)).await {
            error!(error = %e, "WebSocket write failed");
            self.stream = None;
            return Err(MarketDataError::Subscription(e.to_string()));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        let stream = self.stream_mut()?;

        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!(len = text.len(), "Received text message");
                Ok(Some(text))
            }
            Some(Ok(Message::Binary(data))) => {
                // Convert binary to text if needed
                let text = String::from_utf8_lossy(&data).to_string();
                Ok(Some(text))
            }
            Some(Ok(Message::Ping(data))) => {
                debug!("Received ping, sending pong");
                if let Err(e) = stream.send(Message::Pong(data)).await {
                    warn!(error = %e, "Failed to answer ping");
                }
                Ok(None)
            }
            Some(Ok(Message::Pong(_))) => {
                debug!("Received pong");
                Ok(None)
            }
            Some(Ok(Message::Close(frame))) => {
                warn!(frame = ?frame, "Received close frame");
                self.stream = None;
                Err(MarketDataError::WebSocketConnection(
                    "Connection closed".to_string(),
                ))
            }
            Some(Ok(Message::Frame(_))) => Ok(None),
            Some(Err(e)) => {
                error!(error = %e, "WebSocket error");
                self.stream = None;
                Err(MarketDataError::WebSocketMessage(e.to_string()))
            }
            None => {
                warn!("WebSocket stream ended");
                self.stream = None;
                Err(MarketDataError::WebSocketConnection(
                    "Stream ended".to_string(),
                ))
            }
        }
    }

    /// Send a close frame and wait for the peer to finish the handshake.
    /// Falls back to dropping the socket after `close_timeout`.
    async fn close(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };

        let graceful = timeout(self.close_timeout, async {
            stream.close(None).await?;
            while let Some(msg) = stream.next().await {
                if let Message::Close(_) = msg? {
                    break;
                }
            }
            Ok::<_, tokio_tungstenite::tungstenite::Error>(())
        })
        .await;

        match graceful {
            Ok(Ok(())) => info!("WebSocket closed"),
            Ok(Err(e)) => warn!(error = %e, "Graceful close failed, dropping connection"),
            Err(_) => warn!(
                timeout_ms = self.close_timeout.as_millis() as u64,
                "Graceful close timed out, dropping connection"
            ),
        }
    }
}
