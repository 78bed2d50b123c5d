//! Configuration module for the market data handler

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Underlying assets to track (e.g., ["ETH", "BTC"])
    pub assets: Vec<String>,

    /// WebSocket endpoint for the venue stream
    pub ws_endpoint: String,

    /// REST API endpoint for the instrument catalog
    pub rest_endpoint: String,

    /// Maximum number of channels per subscribe frame
    pub subscribe_batch_size: usize,

    /// Delay between consecutive subscribe frames
    pub subscribe_pacing_ms: u64,

    /// Overall ingestion deadline
    pub session_timeout_secs: u64,

    /// How long a graceful close may take before the socket is dropped
    pub close_timeout_ms: u64,

    /// WebSocket connect timeout
    pub connect_timeout_secs: u64,

    /// Reconnection settings
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,

    /// Port for the health and metrics server
    pub health_port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let assets: Vec<String> = env::var("ASSETS")
            .unwrap_or_else(|_| defaults.assets.join(","))
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        if assets.is_empty() {
            anyhow::bail!("ASSETS must name at least one underlying asset");
        }

        Ok(Self {
            assets,
            ws_endpoint: env::var("WS_ENDPOINT").unwrap_or(defaults.ws_endpoint),
            rest_endpoint: env::var("REST_ENDPOINT").unwrap_or(defaults.rest_endpoint),
            subscribe_batch_size: env_or("SUBSCRIBE_BATCH_SIZE", defaults.subscribe_batch_size),
            subscribe_pacing_ms: env_or("SUBSCRIBE_PACING_MS", defaults.subscribe_pacing_ms),
            session_timeout_secs: env_or("SESSION_TIMEOUT_SECS", defaults.session_timeout_secs),
            close_timeout_ms: env_or("CLOSE_TIMEOUT_MS", defaults.close_timeout_ms),
            connect_timeout_secs: env_or("CONNECT_TIMEOUT_SECS", defaults.connect_timeout_secs),
            reconnect_delay_ms: env_or("RECONNECT_DELAY_MS", defaults.reconnect_delay_ms),
            max_reconnect_attempts: env_or(
                "MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
            health_port: env_or("HEALTH_PORT", defaults.health_port),
        })
    }

    pub fn subscribe_pacing(&self) -> Duration {
        Duration::from_millis(self.subscribe_pacing_ms)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Read an environment variable, falling back to `default` when unset or unparsable
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets: vec!["ETH".to_string()],
            ws_endpoint: "wss://ws.aevo.xyz".to_string(),
            rest_endpoint: "https://api.aevo.xyz".to_string(),
            subscribe_batch_size: 20,
            subscribe_pacing_ms: 100,
            session_timeout_secs: 20 * 60,
            close_timeout_ms: 2000,
            connect_timeout_secs: 10,
            reconnect_delay_ms: 1000,
            max_reconnect_attempts: 10,
            health_port: 9090,
        }
    }
}
