//! Row models for the SQLite store

use crate::error::{EngineError, Result};
use crate::types::{HoldingValue, PortfolioAggregate, PortfolioSnapshot, PortfolioStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PortfolioRow {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub capital: String, // Decimal as TEXT
    pub total_value: String,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub holdings_count: i64,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AllocationRow {
    pub asset_symbol: String,
    pub weight: f64,
    pub value: String,
}

/// Portfolio listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub id: i64,
    pub name: String,
    pub status: PortfolioStatus,
    pub total_value: Decimal,
    pub holdings_count: u32,
}

pub(crate) fn parse_decimal(column: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| {
        EngineError::PersistenceFailure(format!("corrupt {} value '{}': {}", column, raw, e))
    })
}

pub(crate) fn parse_status(raw: &str) -> Result<PortfolioStatus> {
    PortfolioStatus::from_str(raw).map_err(EngineError::PersistenceFailure)
}

impl PortfolioRow {
    pub fn aggregate(&self) -> Result<PortfolioAggregate> {
        Ok(PortfolioAggregate {
            total_value: parse_decimal("total_value", &self.total_value)?,
            expected_return: self.expected_return,
            volatility: self.volatility,
            sharpe_ratio: self.sharpe_ratio,
            holdings_count: u32::try_from(self.holdings_count).map_err(|_| {
                EngineError::PersistenceFailure(format!(
                    "corrupt holdings_count {}",
                    self.holdings_count
                ))
            })?,
        })
    }

    pub fn into_snapshot(self, allocations: Vec<AllocationRow>) -> Result<PortfolioSnapshot> {
        let aggregate = self.aggregate()?;
        let holdings = allocations
            .into_iter()
            .map(|a| {
                Ok(HoldingValue {
                    value: parse_decimal("value", &a.value)?,
                    asset_symbol: a.asset_symbol,
                    weight: a.weight,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PortfolioSnapshot {
            id: self.id,
            status: parse_status(&self.status)?,
            capital: parse_decimal("capital", &self.capital)?,
            name: self.name,
            aggregate,
            holdings,
            version: self.version,
            updated_at: self.updated_at,
        })
    }

    pub fn into_summary(self) -> Result<PortfolioSummary> {
        Ok(PortfolioSummary {
            id: self.id,
            status: parse_status(&self.status)?,
            total_value: parse_decimal("total_value", &self.total_value)?,
            holdings_count: self.aggregate()?.holdings_count,
            name: self.name,
        })
    }
}
