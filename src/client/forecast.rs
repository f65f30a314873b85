//! HTTP client for the ML forecast service
//!
//! Each symbol is analysed by `GET {base_url}/api/v1/forecast/{symbol}`; the
//! response carries the current price, the annualized return forecast and a
//! GARCH volatility estimate.

use crate::config::ForecastConfig;
use crate::error::{EngineError, Result};
use crate::market::{ForecastProvider, PriceLookup};
use crate::types::AssetForecast;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long a fetched analysis serves as the symbol's latest price
const PRICE_REUSE_WINDOW: Duration = Duration::from_secs(60);

/// Forecast service client
///
/// Prices are taken from the same analysis as the forecast: a symbol
/// analysed within [`PRICE_REUSE_WINDOW`] is valued without a second request.
#[derive(Clone)]
pub struct HttpForecastClient {
    http: Client,
    base_url: String,
    max_concurrency: usize,
    recent: Arc<Mutex<HashMap<String, (AssetForecast, Instant)>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GarchResult {
    pub annualized_volatility: f64,
}

/// Subset of the service's stock-analysis response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnalysisResponse {
    pub symbol: String,
    pub current_price: f64,
    pub annualized_return: f64,
    pub garch_result: GarchResult,
}

impl AnalysisResponse {
    /// Convert to a forecast, rejecting values the allocator cannot use
    pub(crate) fn into_forecast(self) -> Result<AssetForecast> {
        let volatility = self.garch_result.annualized_volatility;
        if !volatility.is_finite() || volatility <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "forecast for {} has unusable volatility {}",
                self.symbol, volatility
            )));
        }
        if !self.annualized_return.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "forecast for {} has non-finite return",
                self.symbol
            )));
        }

        let price = Decimal::from_f64(self.current_price)
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| {
                EngineError::InvalidInput(format!(
                    "forecast for {} has invalid price {}",
                    self.symbol, self.current_price
                ))
            })?;

        Ok(AssetForecast {
            symbol: self.symbol,
            current_price: price,
            expected_return: self.annualized_return,
            annualized_volatility: volatility,
        })
    }
}

impl HttpForecastClient {
    pub fn new(config: &ForecastConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_concurrency: config.max_concurrency.max(1),
            recent: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn remember(&self, forecast: &AssetForecast) {
        self.recent
            .lock()
            .insert(forecast.symbol.clone(), (forecast.clone(), Instant::now()));
    }

    fn recent_price(&self, symbol: &str) -> Option<Decimal> {
        self.recent
            .lock()
            .get(symbol)
            .filter(|(_, fetched_at)| fetched_at.elapsed() < PRICE_REUSE_WINDOW)
            .map(|(forecast, _)| forecast.current_price)
    }

    fn forecast_url(&self, symbol: &str) -> String {
        format!("{}/api/v1/forecast/{}", self.base_url, symbol)
    }

    /// Fetch one symbol; `None` when the service has no data for it
    pub async fn fetch(&self, symbol: &str) -> Result<Option<AssetForecast>> {
        let url = self.forecast_url(symbol);
        debug!("Fetching forecast: {}", url);

        let resp = self.http.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: AnalysisResponse = resp.error_for_status()?.json().await?;
        body.into_forecast().map(Some)
    }
}

#[async_trait]
impl ForecastProvider for HttpForecastClient {
    async fn forecasts(&self, symbols: &[String]) -> Result<HashMap<String, AssetForecast>> {
        let results: Vec<(String, Result<Option<AssetForecast>>)> = stream::iter(symbols.to_vec())
            .map(|symbol| async move {
                let result = self.fetch(&symbol).await;
                (symbol, result)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut forecasts = HashMap::with_capacity(results.len());
        let mut transport_error = None;
        for (symbol, result) in results {
            match result {
                Ok(Some(forecast)) => {
                    self.remember(&forecast);
                    forecasts.insert(symbol, forecast);
                }
                Ok(None) => warn!("No forecast available for {}", symbol),
                Err(e @ EngineError::Http(_)) => {
                    warn!("Forecast for {} failed: {}", symbol, e);
                    transport_error.get_or_insert(e);
                }
                Err(e) => warn!("Forecast for {} failed: {}", symbol, e),
            }
        }

        // Service unreachable for the whole batch
        if forecasts.is_empty() {
            if let Some(e) = transport_error {
                return Err(e);
            }
        }

        debug!("Resolved {}/{} forecasts", forecasts.len(), symbols.len());
        Ok(forecasts)
    }

    fn name(&self) -> &str {
        "ml-service"
    }
}

#[async_trait]
impl PriceLookup for HttpForecastClient {
    async fn latest_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        if let Some(price) = self.recent_price(symbol) {
            return Ok(Some(price));
        }

        let forecast = self.fetch(symbol).await?;
        if let Some(f) = &forecast {
            self.remember(f);
        }
        Ok(forecast.map(|f| f.current_price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config(base_url: &str) -> ForecastConfig {
        ForecastConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
            max_concurrency: 0,
        }
    }

    #[test]
    fn test_parse_analysis_response() {
        let body = r#"{
            "symbol": "SCOM",
            "timestamp": "2025-01-01T00:00:00+00:00",
            "lstm_result": {"prediction": 17.9, "prediction_scaled": 0.4, "price_range": {}, "execution_time": 0.1},
            "garch_result": {
                "forecasted_variance_1d": 0.0001,
                "forecasted_volatility_1d": 0.01,
                "annualized_volatility": 0.1587,
                "execution_time": 0.2
            },
            "current_price": 17.25,
            "expected_return_1d": 0.001,
            "annualized_return": 0.2863,
            "sharpe_ratio": 1.49,
            "total_execution_time": 0.4
        }"#;

        let resp: AnalysisResponse = serde_json::from_str(body).unwrap();
        let forecast = resp.into_forecast().unwrap();

        assert_eq!(forecast.symbol, "SCOM");
        assert_eq!(forecast.current_price, dec!(17.25));
        assert_eq!(forecast.expected_return, 0.2863);
        assert_eq!(forecast.annualized_volatility, 0.1587);
    }

    #[test]
    fn test_unusable_forecasts_are_rejected() {
        let zero_vol = AnalysisResponse {
            symbol: "AAA".into(),
            current_price: 10.0,
            annualized_return: 0.1,
            garch_result: GarchResult { annualized_volatility: 0.0 },
        };
        assert!(matches!(zero_vol.into_forecast(), Err(EngineError::InvalidInput(_))));

        let zero_price = AnalysisResponse {
            symbol: "AAA".into(),
            current_price: 0.0,
            annualized_return: 0.1,
            garch_result: GarchResult { annualized_volatility: 0.2 },
        };
        assert!(matches!(zero_price.into_forecast(), Err(EngineError::InvalidInput(_))));

        let nan_return = AnalysisResponse {
            symbol: "AAA".into(),
            current_price: 10.0,
            annualized_return: f64::NAN,
            garch_result: GarchResult { annualized_volatility: 0.2 },
        };
        assert!(nan_return.into_forecast().is_err());
    }

    #[test]
    fn test_forecast_url() {
        let client = HttpForecastClient::new(&config("http://localhost:8000/")).unwrap();
        assert_eq!(
            client.forecast_url("EQTY"),
            "http://localhost:8000/api/v1/forecast/EQTY"
        );
        assert_eq!(client.max_concurrency, 1);
        assert_eq!(client.name(), "ml-service");
    }

    const UNREACHABLE: &str = "http://127.0.0.1:1";

    #[tokio::test]
    async fn test_unreachable_service_is_an_error() {
        let client = HttpForecastClient::new(&config(UNREACHABLE)).unwrap();
        let symbols = vec!["AAA".to_string(), "BBB".to_string()];

        let err = client.forecasts(&symbols).await.unwrap_err();
        assert!(matches!(err, EngineError::Http(_)));
        assert!(client.latest_price("AAA").await.is_err());
    }

    #[tokio::test]
    async fn test_latest_price_reuses_recent_analysis() {
        let client = HttpForecastClient::new(&config(UNREACHABLE)).unwrap();
        client.remember(&AssetForecast::new("SCOM", dec!(17.25), 0.2, 0.15));

        // Served from the batch's analysis; the service is never contacted
        assert_eq!(client.latest_price("SCOM").await.unwrap(), Some(dec!(17.25)));
        assert!(client.latest_price("EQTY").await.is_err());
    }
}
