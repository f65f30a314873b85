//! Core types for the portfolio engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-asset forecast issued by the forecast provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetForecast {
    pub symbol: String,
    pub current_price: Decimal,
    /// Fractional expected return (0.05 = 5%)
    pub expected_return: f64,
    pub annualized_volatility: f64,
}

impl AssetForecast {
    pub fn new(symbol: &str, current_price: Decimal, expected_return: f64, annualized_volatility: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            current_price,
            expected_return,
            annualized_volatility,
        }
    }
}

/// Target weight of one asset within a portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub asset_symbol: String,
    pub weight: f64,
}

impl Allocation {
    pub fn new(asset_symbol: &str, weight: f64) -> Self {
        Self {
            asset_symbol: asset_symbol.to_string(),
            weight,
        }
    }
}

/// Allocation with its tracked monetary value (the persisted allocation row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingValue {
    pub asset_symbol: String,
    pub weight: f64,
    pub value: Decimal,
}

impl HoldingValue {
    pub fn allocation(&self) -> Allocation {
        Allocation::new(&self.asset_symbol, self.weight)
    }
}

/// Portfolio-level aggregate, always recomputed wholesale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioAggregate {
    pub total_value: Decimal,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub holdings_count: u32,
}

impl PortfolioAggregate {
    /// Aggregate of a portfolio with no holdings
    pub fn zeroed() -> Self {
        Self {
            total_value: Decimal::ZERO,
            expected_return: 0.0,
            volatility: 0.0,
            sharpe_ratio: 0.0,
            holdings_count: 0,
        }
    }

    pub fn is_zeroed(&self) -> bool {
        *self == Self::zeroed()
    }
}

impl Default for PortfolioAggregate {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// One sampled point of the risk/return curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrontierPoint {
    pub target_volatility: f64,
    pub estimated_return: f64,
    pub sharpe_ratio: f64,
}

/// Allocator output row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedAsset {
    pub symbol: String,
    pub weight: f64,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

/// Portfolio lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortfolioStatus {
    /// No allocations, zeroed aggregate
    Draft,
    /// At least one allocation
    Active,
    /// Terminal, aggregate frozen
    Archived,
}

impl PortfolioStatus {
    /// Status implied by a holdings count for a non-archived portfolio
    pub fn for_holdings(count: usize) -> Self {
        if count == 0 {
            PortfolioStatus::Draft
        } else {
            PortfolioStatus::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PortfolioStatus::Draft => "draft",
            PortfolioStatus::Active => "active",
            PortfolioStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for PortfolioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortfolioStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PortfolioStatus::Draft),
            "active" => Ok(PortfolioStatus::Active),
            "archived" => Ok(PortfolioStatus::Archived),
            other => Err(format!("unknown portfolio status: {}", other)),
        }
    }
}

/// Kind of market data that could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingData {
    Price,
    Forecast,
}

impl fmt::Display for MissingData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingData::Price => f.write_str("price"),
            MissingData::Forecast => f.write_str("forecast"),
        }
    }
}

/// Per-symbol warning for an item degraded to a zero contribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDataWarning {
    pub symbol: String,
    pub kind: MissingData,
}

impl MarketDataWarning {
    pub fn new(symbol: &str, kind: MissingData) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind,
        }
    }
}

/// Stored portfolio with its aggregate and allocation rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub id: i64,
    pub name: String,
    pub status: PortfolioStatus,
    /// Capital the weights are applied to
    pub capital: Decimal,
    pub aggregate: PortfolioAggregate,
    pub holdings: Vec<HoldingValue>,
    /// Optimistic concurrency version, bumped on every commit
    pub version: i64,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl PortfolioSnapshot {
    pub fn symbols(&self) -> Vec<String> {
        self.holdings.iter().map(|h| h.asset_symbol.clone()).collect()
    }

    pub fn allocations(&self) -> Vec<Allocation> {
        self.holdings.iter().map(HoldingValue::allocation).collect()
    }

    pub fn holds(&self, symbol: &str) -> bool {
        self.holdings.iter().any(|h| h.asset_symbol == symbol)
    }
}
