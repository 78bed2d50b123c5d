//! Prometheus counters for the stream dispatcher

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

use crate::error::Result;

/// Dispatcher counters, registered on their own registry
#[derive(Clone)]
pub struct DispatchMetrics {
    registry: Registry,
    pub frames: IntCounter,
    pub applied: IntCounterVec,
    pub discarded: IntCounterVec,
}

impl DispatchMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let frames = IntCounter::new("market_data_frames_total", "Data frames received")?;
        let applied = IntCounterVec::new(
            Opts::new(
                "market_data_updates_applied_total",
                "Updates written to a store",
            ),
            &["kind"],
        )?;
        let discarded = IntCounterVec::new(
            Opts::new(
                "market_data_updates_discarded_total",
                "Frames dropped because they could not be decoded",
            ),
            &["reason"],
        )?;

        registry.register(Box::new(frames.clone()))?;
        registry.register(Box::new(applied.clone()))?;
        registry.register(Box::new(discarded.clone()))?;

        Ok(Self {
            registry,
            frames,
            applied,
            discarded,
        })
    }

    /// Render the registry in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        use prometheus::{Encoder, TextEncoder};

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::error::MarketDataError::SerializationError(e.to_string()))
    }
}
