//! WebSocket session manager
//!
//! Supervises the stream: connects, replays subscriptions, runs the dispatcher
//! and reconnects with backoff until the overall session deadline.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{error, info, warn};

use super::{Connector, StreamDispatcher, SubscriptionManager, Transport, WebSocketConnector};
use crate::error::{MarketDataError, Result};
use crate::AppState;

/// Maximum backoff delay in milliseconds (60 seconds)
const MAX_BACKOFF_MS: u64 = 60_000;

/// Manages the venue connection with automatic reconnection
pub struct WebSocketManager<C: Connector = WebSocketConnector> {
    state: Arc<AppState>,
    connector: C,
    dispatcher: StreamDispatcher,
    subscriptions: SubscriptionManager,
    instruments: Vec<String>,
    reconnect_attempts: u32,
}

impl WebSocketManager {
    /// Create a manager that will subscribe `instruments` and the configured assets
    pub fn new(state: Arc<AppState>, instruments: Vec<String>) -> Self {
        let connector = WebSocketConnector::new(
            &state.config.ws_endpoint,
            state.config.connect_timeout(),
            state.config.close_timeout(),
        );
        Self::with_connector(state, instruments, connector)
    }
}

impl<C: Connector> WebSocketManager<C> {
    /// Create a manager that opens its connections through `connector`
    pub fn with_connector(state: Arc<AppState>, instruments: Vec<String>, connector: C) -> Self {
        let dispatcher = StreamDispatcher::new(state.market.clone(), state.metrics.clone());
        let subscriptions = SubscriptionManager::new(
            state.config.subscribe_batch_size,
            state.config.subscribe_pacing(),
        );

        Self {
            state,
            connector,
            dispatcher,
            subscriptions,
            instruments,
            reconnect_attempts: 0,
        }
    }

    /// Run until the session deadline, reconnecting after transport failures
    pub async fn run(&mut self) -> Result<()> {
        let config = self.state.config.clone();
        let deadline = Instant::now() + config.session_timeout();

        info!(
            instruments = self.instruments.len(),
            assets = ?config.assets,
            session_secs = config.session_timeout_secs,
            "Starting WebSocket manager"
        );

        loop {
            if Instant::now() >= deadline {
                info!("Session deadline reached");
                return Ok(());
            }

            match self.connect_and_process(deadline).await {
                Ok(()) => {
                    info!("Ingestion session finished");
                    return Ok(());
                }
                Err(e) => {
                    error!(error = %e, "WebSocket session failed");
                    self.reconnect_attempts += 1;

                    if self.reconnect_attempts > config.max_reconnect_attempts {
                        error!(
                            attempts = self.reconnect_attempts,
                            "Giving up on venue connection"
                        );
                        return Err(MarketDataError::MaxReconnectAttemptsExceeded);
                    }

                    let delay = backoff_delay(config.reconnect_delay_ms, self.reconnect_attempts);
                    warn!(
                        attempt = self.reconnect_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting after error..."
                    );
                    sleep_until(deadline.min(Instant::now() + delay)).await;
                }
            }
        }
    }

    /// Open a fresh connection and replay every subscription on it
    pub async fn reconnect_and_resubscribe(&self) -> Result<C::Transport> {
        let mut transport = self.connector.connect().await?;

        if let Err(e) = self.subscribe_all(&mut transport).await {
            transport.close().await;
            return Err(e);
        }

        Ok(transport)
    }

    /// Send order book subscriptions followed by index subscriptions
    pub async fn subscribe_all<T: Transport>(&self, transport: &mut T) -> Result<()> {
        self.subscriptions
            .subscribe_order_books(transport, &self.instruments)
            .await?;
        self.subscriptions
            .subscribe_indices(transport, &self.state.config.assets)
            .await?;
        Ok(())
    }

    /// Dispatch frames from `transport` until the deadline or a receive
    /// failure, then close the transport
    pub async fn process<T: Transport>(&self, transport: &mut T, deadline: Instant) -> Result<()> {
        let result = self.dispatcher.run(transport, deadline).await;
        transport.close().await;
        result
    }

    async fn connect_and_process(&mut self, deadline: Instant) -> Result<()> {
        let mut transport = match timeout_at(deadline, self.connector.connect()).await {
            Ok(transport) => transport?,
            Err(_) => {
                info!("Session deadline reached while connecting");
                return Ok(());
            }
        };

        match timeout_at(deadline, self.subscribe_all(&mut transport)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                transport.close().await;
                return Err(e);
            }
            Err(_) => {
                info!("Session deadline reached while subscribing");
                transport.close().await;
                return Ok(());
            }
        }

        self.reconnect_attempts = 0;
        info!("WebSocket connected and subscribed, resetting reconnect counter");

        self.process(&mut transport, deadline).await
    }
}

/// Exponential backoff capped at MAX_BACKOFF_MS
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let delay = base_ms.saturating_mul(2u64.pow(attempt.min(6)));
    Duration::from_millis(delay.min(MAX_BACKOFF_MS))
}
