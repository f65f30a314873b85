//! Portfolio-level metrics from an allocation set

use super::allocator::{AllocationInput, WeightAllocator};
use super::ratios::sharpe_ratio;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::types::{
    Allocation, AssetForecast, HoldingValue, MarketDataWarning, MissingData, PortfolioAggregate,
    WeightedAsset,
};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Decimal places kept for holding values
const VALUE_SCALE: u32 = 2;

/// Result of a metrics computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub aggregate: PortfolioAggregate,
    /// One row per allocation, in allocation order
    pub holdings: Vec<HoldingValue>,
    /// Items degraded to a zero contribution
    pub warnings: Vec<MarketDataWarning>,
}

impl MetricsReport {
    pub fn empty() -> Self {
        Self {
            aggregate: PortfolioAggregate::zeroed(),
            holdings: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Equal weights over `symbols`, in input order
pub fn normalize_weights(symbols: &[String]) -> Result<Vec<Allocation>> {
    let mut seen = HashSet::with_capacity(symbols.len());
    for symbol in symbols {
        if symbol.trim().is_empty() {
            return Err(EngineError::InvalidInput("empty asset symbol".into()));
        }
        if !seen.insert(symbol.as_str()) {
            return Err(EngineError::InvalidInput(format!("duplicate symbol {}", symbol)));
        }
    }

    if symbols.is_empty() {
        return Ok(Vec::new());
    }

    let weight = 1.0 / symbols.len() as f64;
    Ok(symbols.iter().map(|s| Allocation::new(s, weight)).collect())
}

/// Regime-dependent target weights for a forecast set
pub fn optimize_portfolio_weights(
    forecasts: &[AssetForecast],
    config: &EngineConfig,
) -> Result<Vec<WeightedAsset>> {
    let inputs: Vec<AllocationInput> = forecasts.iter().map(AllocationInput::from).collect();
    WeightAllocator::new(config).allocate(&inputs)
}

/// Check the weight-sum invariant without renormalizing
pub fn validate_allocations(allocations: &[Allocation], tolerance: f64) -> Result<()> {
    if allocations.is_empty() {
        return Ok(());
    }

    let mut seen = HashSet::with_capacity(allocations.len());
    let mut total = 0.0;
    for a in allocations {
        if !seen.insert(a.asset_symbol.as_str()) {
            return Err(EngineError::InvalidInput(format!(
                "duplicate allocation for {}",
                a.asset_symbol
            )));
        }
        if !a.weight.is_finite() || !(0.0..=1.0).contains(&a.weight) {
            return Err(EngineError::InvalidInput(format!(
                "weight for {} must be within [0, 1], got {}",
                a.asset_symbol, a.weight
            )));
        }
        total += a.weight;
    }

    if (total - 1.0).abs() > tolerance {
        return Err(EngineError::InvalidInput(format!(
            "allocation weights sum to {}, expected 1",
            total
        )));
    }

    Ok(())
}

/// Compute the aggregate and per-holding values for an allocation set.
///
/// `prices` holds only the symbols whose live price resolved. A holding
/// without a price is valued at 0 and a holding without a forecast
/// contributes nothing to return and volatility; both are reported as
/// warnings instead of failing the whole set.
///
/// Portfolio return and volatility are weighted sums over the holdings
/// (Σw·r, Σw·σ), not the unweighted [`mean_return`]/[`mean_volatility`]
/// of the forecast set, and carry no covariance term. Only the Sharpe
/// ratio is taken from [`sharpe_ratio`].
///
/// [`mean_return`]: super::ratios::mean_return
/// [`mean_volatility`]: super::ratios::mean_volatility
pub fn compute_portfolio_metrics(
    allocations: &[Allocation],
    forecasts: &HashMap<String, AssetForecast>,
    prices: &HashMap<String, Decimal>,
    capital: Decimal,
    config: &EngineConfig,
) -> Result<MetricsReport> {
    if capital < Decimal::ZERO {
        return Err(EngineError::InvalidInput(format!(
            "portfolio capital must not be negative, got {}",
            capital
        )));
    }

    if allocations.is_empty() {
        return Ok(MetricsReport::empty());
    }

    validate_allocations(allocations, config.weight_tolerance)?;

    let mut holdings = Vec::with_capacity(allocations.len());
    let mut warnings = Vec::new();
    let mut total_value = Decimal::ZERO;
    let mut expected_return = 0.0;
    let mut volatility = 0.0;

    for allocation in allocations {
        let symbol = allocation.asset_symbol.as_str();

        let value = if prices.contains_key(symbol) {
            let weight = Decimal::from_f64(allocation.weight).ok_or_else(|| {
                EngineError::InvalidInput(format!("unrepresentable weight for {}", symbol))
            })?;
            (capital * weight).round_dp(VALUE_SCALE)
        } else {
            warnings.push(MarketDataWarning::new(symbol, MissingData::Price));
            Decimal::ZERO
        };

        match forecasts.get(symbol) {
            Some(f) => {
                expected_return += allocation.weight * f.expected_return;
                volatility += allocation.weight * f.annualized_volatility;
            }
            None => warnings.push(MarketDataWarning::new(symbol, MissingData::Forecast)),
        }

        total_value += value;
        holdings.push(HoldingValue {
            asset_symbol: allocation.asset_symbol.clone(),
            weight: allocation.weight,
            value,
        });
    }

    for w in &warnings {
        tracing::warn!(symbol = %w.symbol, kind = %w.kind, "market data unavailable, holding degraded");
    }

    Ok(MetricsReport {
        aggregate: PortfolioAggregate {
            total_value,
            expected_return,
            volatility,
            sharpe_ratio: sharpe_ratio(expected_return, volatility, config.risk_free_rate),
            holdings_count: holdings.len() as u32,
        },
        holdings,
        warnings,
    })
}
