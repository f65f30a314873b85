//! Regime-dependent weight allocation
//!
//! Allocation happens in two independent steps: [`WeightAllocator::classify`]
//! picks an [`AllocationRegime`] from the scored asset set, then
//! [`WeightAllocator::weigh`] applies that regime's weighting formula.
//!
//! ```rust,ignore
//! let allocator = WeightAllocator::new(&EngineConfig::default());
//! let weights = allocator.allocate(&inputs)?;
//! ```

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::types::{AssetForecast, WeightedAsset};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Allocator input row
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationInput {
    pub symbol: String,
    pub expected_return: f64,
    /// Falls back to the configured volatility floor when absent
    pub volatility: Option<f64>,
}

impl AllocationInput {
    pub fn new(symbol: &str, expected_return: f64, volatility: Option<f64>) -> Self {
        Self {
            symbol: symbol.to_string(),
            expected_return,
            volatility,
        }
    }
}

impl From<&AssetForecast> for AllocationInput {
    fn from(f: &AssetForecast) -> Self {
        Self {
            symbol: f.symbol.clone(),
            expected_return: f.expected_return,
            volatility: Some(f.annualized_volatility),
        }
    }
}

/// Asset with resolved volatility and its Sharpe ratio
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAsset {
    pub symbol: String,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

/// Weighting policy selected for a forecast set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationRegime {
    /// Every return below the risk-free rate, or no positive Sharpe:
    /// exponential decay over volatility rank
    Defensive,
    /// No positive Sharpe outside the defensive condition: 1/N
    FallbackEqual,
    /// Weight proportional to a power of the positive Sharpe ratio
    SharpeWeighted,
}

/// Turns (expected return, volatility) pairs into normalized weights
#[derive(Debug, Clone)]
pub struct WeightAllocator {
    risk_free_rate: f64,
    defensive_decay: f64,
    sharpe_exponent: f64,
    volatility_floor: f64,
}

impl WeightAllocator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            risk_free_rate: config.risk_free_rate,
            defensive_decay: config.defensive_decay,
            sharpe_exponent: config.sharpe_exponent,
            volatility_floor: config.volatility_floor,
        }
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    /// Resolve volatilities and compute per-asset Sharpe ratios.
    ///
    /// Volatility must be strictly positive: a zero volatility would make the
    /// Sharpe ratio infinite, so callers floor it before allocating.
    pub fn score(&self, inputs: &[AllocationInput]) -> Result<Vec<ScoredAsset>> {
        if inputs.is_empty() {
            return Err(EngineError::InvalidInput(
                "cannot allocate weights over an empty asset set".into(),
            ));
        }

        let mut seen = HashSet::with_capacity(inputs.len());
        let mut scored = Vec::with_capacity(inputs.len());

        for input in inputs {
            if !seen.insert(input.symbol.as_str()) {
                return Err(EngineError::InvalidInput(format!(
                    "duplicate symbol {}",
                    input.symbol
                )));
            }
            if !input.expected_return.is_finite() {
                return Err(EngineError::InvalidInput(format!(
                    "non-finite expected return for {}",
                    input.symbol
                )));
            }

            let volatility = input.volatility.unwrap_or(self.volatility_floor);
            if !volatility.is_finite() || volatility <= 0.0 {
                return Err(EngineError::InvalidInput(format!(
                    "volatility for {} must be positive, got {}",
                    input.symbol, volatility
                )));
            }

            scored.push(ScoredAsset {
                symbol: input.symbol.clone(),
                expected_return: input.expected_return,
                volatility,
                sharpe_ratio: (input.expected_return - self.risk_free_rate) / volatility,
            });
        }

        Ok(scored)
    }

    /// Pick the weighting regime for a scored set
    pub fn classify(&self, assets: &[ScoredAsset]) -> AllocationRegime {
        let all_below_risk_free = assets
            .iter()
            .all(|a| a.expected_return < self.risk_free_rate);
        let no_positive_sharpe = assets.iter().all(|a| a.sharpe_ratio <= 0.0);

        if all_below_risk_free || no_positive_sharpe {
            AllocationRegime::Defensive
        } else if !assets.iter().any(|a| a.sharpe_ratio > 0.0) {
            AllocationRegime::FallbackEqual
        } else {
            AllocationRegime::SharpeWeighted
        }
    }

    /// Weights for `assets` under `regime`, in input order
    pub fn weigh(&self, regime: AllocationRegime, assets: &[ScoredAsset]) -> Vec<f64> {
        let n = assets.len();
        if n == 0 {
            return Vec::new();
        }

        let raw: Vec<f64> = match regime {
            AllocationRegime::Defensive => {
                // Stable sort: equal volatilities keep input order
                let mut order: Vec<usize> = (0..n).collect();
                order.sort_by(|&a, &b| assets[a].volatility.total_cmp(&assets[b].volatility));

                let mut raw = vec![0.0; n];
                for (rank, &idx) in order.iter().enumerate() {
                    // Floored so a long tail never underflows to a zero weight
                    raw[idx] = (-self.defensive_decay * rank as f64)
                        .exp()
                        .max(f64::MIN_POSITIVE);
                }
                raw
            }
            AllocationRegime::FallbackEqual => vec![1.0; n],
            AllocationRegime::SharpeWeighted => assets
                .iter()
                .map(|a| {
                    if a.sharpe_ratio > 0.0 {
                        a.sharpe_ratio.powf(self.sharpe_exponent)
                    } else {
                        0.0
                    }
                })
                .collect(),
        };

        let total: f64 = raw.iter().sum();
        if total > 0.0 {
            raw.iter().map(|w| w / total).collect()
        } else {
            vec![1.0 / n as f64; n]
        }
    }

    /// Score, classify and weigh in one pass
    pub fn allocate(&self, inputs: &[AllocationInput]) -> Result<Vec<WeightedAsset>> {
        let scored = self.score(inputs)?;
        let regime = self.classify(&scored);
        let weights = self.weigh(regime, &scored);

        tracing::debug!(
            regime = ?regime,
            assets = scored.len(),
            "allocated portfolio weights"
        );

        Ok(scored
            .into_iter()
            .zip(weights)
            .map(|(asset, weight)| WeightedAsset {
                symbol: asset.symbol,
                weight,
                expected_return: asset.expected_return,
                volatility: asset.volatility,
                sharpe_ratio: asset.sharpe_ratio,
            })
            .collect())
    }
}
