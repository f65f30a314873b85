//! Portfolio Optimization & Metrics Engine
//!
//! Turns per-asset return/volatility forecasts into portfolio weights,
//! risk/return curves and persisted portfolio aggregates.
//!
//! ## Architecture
//!
//! ```text
//! ForecastProvider ──→ RatioMath + WeightAllocator ──→ weights
//!        │                         │
//!        │                         └──→ EfficientFrontier (view only)
//!        ↓
//! PriceLookup ──→ PortfolioAggregateRecomputer ──→ PortfolioStore (SQLite)
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod market;
pub mod portfolio;
pub mod recompute;
pub mod storage;
pub mod types;

#[cfg(test)]
mod config_tests;
