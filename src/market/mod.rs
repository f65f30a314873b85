//! Market data collaborators
//!
//! The engine consumes forecasts and live prices through two traits so the
//! recomputer can run against the ML forecast service, a JSON snapshot, or
//! test doubles.

#[cfg(test)]
mod tests;

use crate::error::Result;
use crate::types::AssetForecast;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Supplies expected return and volatility estimates per asset
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    /// Forecasts for `symbols`; symbols that cannot be forecast are omitted
    async fn forecasts(&self, symbols: &[String]) -> Result<HashMap<String, AssetForecast>>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Resolves the latest known price of an asset
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceLookup: Send + Sync {
    /// `None` when the price is unavailable
    async fn latest_price(&self, symbol: &str) -> Result<Option<Decimal>>;
}

/// Market data snapshot file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub forecasts: Vec<AssetForecast>,
    /// Live prices overriding forecast prices
    #[serde(default)]
    pub prices: HashMap<String, Decimal>,
}

/// In-memory market data
#[derive(Debug, Clone, Default)]
pub struct StaticMarketData {
    forecasts: HashMap<String, AssetForecast>,
    prices: HashMap<String, Decimal>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forecasts double as price source through their `current_price`
    pub fn from_forecasts(forecasts: impl IntoIterator<Item = AssetForecast>) -> Self {
        let mut data = Self::new();
        for f in forecasts {
            data.insert_forecast(f);
        }
        data
    }

    pub fn from_snapshot(snapshot: MarketSnapshot) -> Self {
        let mut data = Self::from_forecasts(snapshot.forecasts);
        data.prices.extend(snapshot.prices);
        data
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: MarketSnapshot = serde_json::from_str(&raw)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Newer forecasts supersede older ones for the same symbol
    pub fn insert_forecast(&mut self, forecast: AssetForecast) {
        self.prices
            .insert(forecast.symbol.clone(), forecast.current_price);
        self.forecasts.insert(forecast.symbol.clone(), forecast);
    }

    pub fn set_price(&mut self, symbol: &str, price: Decimal) {
        self.prices.insert(symbol.to_string(), price);
    }

    pub fn remove_price(&mut self, symbol: &str) {
        self.prices.remove(symbol);
    }

    /// Forecasts sorted by symbol
    pub fn all_forecasts(&self) -> Vec<AssetForecast> {
        let mut all: Vec<AssetForecast> = self.forecasts.values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }
}

#[async_trait]
impl ForecastProvider for StaticMarketData {
    async fn forecasts(&self, symbols: &[String]) -> Result<HashMap<String, AssetForecast>> {
        Ok(symbols
            .iter()
            .filter_map(|s| self.forecasts.get(s).map(|f| (s.clone(), f.clone())))
            .collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[async_trait]
impl PriceLookup for StaticMarketData {
    async fn latest_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        Ok(self.prices.get(symbol).copied())
    }
}
