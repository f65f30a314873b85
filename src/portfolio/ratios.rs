//! Ratio mathematics over per-asset forecasts
//!
//! All functions are pure. Empty inputs and zero volatility produce 0
//! rather than an error.

use crate::types::{AssetForecast, WeightedAsset};
use serde::{Deserialize, Serialize};

/// Downside deviation approximated as a fraction of total volatility.
// TODO: replace with a true downside deviation once historical return
// series are part of the forecast payload.
pub const DOWNSIDE_VOLATILITY_FACTOR: f64 = 0.7;

/// Anything carrying an expected return and a volatility
pub trait ReturnSource {
    fn expected_return(&self) -> f64;
    fn volatility(&self) -> f64;
}

impl ReturnSource for AssetForecast {
    fn expected_return(&self) -> f64 {
        self.expected_return
    }

    fn volatility(&self) -> f64 {
        self.annualized_volatility
    }
}

impl ReturnSource for WeightedAsset {
    fn expected_return(&self) -> f64 {
        self.expected_return
    }

    fn volatility(&self) -> f64 {
        self.volatility
    }
}

impl ReturnSource for (f64, f64) {
    fn expected_return(&self) -> f64 {
        self.0
    }

    fn volatility(&self) -> f64 {
        self.1
    }
}

/// Arithmetic mean of expected returns
pub fn mean_return<R: ReturnSource>(records: &[R]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|r| r.expected_return()).sum::<f64>() / records.len() as f64
}

/// Arithmetic mean of volatilities
pub fn mean_volatility<R: ReturnSource>(records: &[R]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|r| r.volatility()).sum::<f64>() / records.len() as f64
}

/// Excess return per unit of volatility
pub fn sharpe_ratio(mean_return: f64, mean_volatility: f64, risk_free_rate: f64) -> f64 {
    if mean_volatility == 0.0 {
        return 0.0;
    }
    (mean_return - risk_free_rate) / mean_volatility
}

/// Sharpe with volatility scaled by [`DOWNSIDE_VOLATILITY_FACTOR`]
pub fn sortino_ratio(mean_return: f64, mean_volatility: f64, risk_free_rate: f64) -> f64 {
    let downside = mean_volatility * DOWNSIDE_VOLATILITY_FACTOR;
    if downside == 0.0 {
        return 0.0;
    }
    (mean_return - risk_free_rate) / downside
}

/// Magnitude of the worst negative expected return, 0 if none is negative
pub fn max_drawdown<R: ReturnSource>(records: &[R]) -> f64 {
    let worst = records
        .iter()
        .map(|r| r.expected_return())
        .fold(f64::INFINITY, f64::min);
    worst.min(0.0).abs()
}

/// Portfolio performance summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub mean_return: f64,
    pub mean_volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
}

impl PortfolioStats {
    pub fn compute<R: ReturnSource>(records: &[R], risk_free_rate: f64) -> Self {
        let mean_return = mean_return(records);
        let mean_volatility = mean_volatility(records);

        Self {
            mean_return,
            mean_volatility,
            sharpe_ratio: sharpe_ratio(mean_return, mean_volatility, risk_free_rate),
            sortino_ratio: sortino_ratio(mean_return, mean_volatility, risk_free_rate),
            max_drawdown: max_drawdown(records),
        }
    }
}
