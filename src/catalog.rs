//! Instrument catalog client
//!
//! One-shot REST lookup of the option markets listed for an underlying asset.

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::error::{MarketDataError, Result};

/// Market record returned by the catalog endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Market {
    pub instrument_name: String,
    pub is_active: bool,

    #[serde(default)]
    pub instrument_id: Option<String>,
    #[serde(default)]
    pub instrument_type: Option<String>,
    #[serde(default)]
    pub underlying_asset: Option<String>,
    #[serde(default)]
    pub quote_asset: Option<String>,
    #[serde(default)]
    pub option_type: Option<String>,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub strike: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub mark_price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub index_price: Option<Decimal>,
}

/// Names of the active instruments, in catalog order
pub fn active_instruments(markets: &[Market]) -> Vec<String> {
    markets
        .iter()
        .filter(|m| m.is_active)
        .map(|m| m.instrument_name.clone())
        .collect()
}

/// REST client for the venue's market listing
pub struct InstrumentCatalog {
    client: reqwest::Client,
    rest_endpoint: String,
}

impl InstrumentCatalog {
    pub fn new(rest_endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            rest_endpoint: rest_endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch every option market listed for `asset`
    pub async fn fetch_markets(&self, asset: &str) -> Result<Vec<Market>> {
        let url = format!("{}/markets", self.rest_endpoint);

        info!(asset = %asset, url = %url, "Fetching instrument catalog");

        let response = self
            .client
            .get(&url)
            .query(&[("asset", asset), ("instrument_type", "OPTION")])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MarketDataError::RestApiError(format!(
                "catalog request for {} returned {}",
                asset,
                response.status()
            )));
        }

        Ok(response.json::<Vec<Market>>().await?)
    }

    /// Fetch the active instruments of every asset
    pub async fn fetch_active_instruments(&self, assets: &[String]) -> Result<Vec<String>> {
        let mut instruments = Vec::new();

        for asset in assets {
            let markets = self.fetch_markets(asset).await?;
            let active = active_instruments(&markets);
            info!(
                asset = %asset,
                listed = markets.len(),
                active = active.len(),
                "Instrument catalog loaded"
            );
            instruments.extend(active);
        }

        Ok(instruments)
    }
}
