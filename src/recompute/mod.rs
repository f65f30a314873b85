//! Portfolio aggregate recomputation
//!
//! Every portfolio mutation (create, add-stock, remove-stock, rebalance, or
//! an explicit allocation replacement) runs as one read-modify-write-commit
//! unit:
//!
//! ```text
//! lock(portfolio) → load → plan allocations → fetch forecasts + prices
//!                 → compute metrics → commit (versioned, transactional)
//! ```
//!
//! Mutations of the same portfolio are serialized by an in-process lock;
//! writers in other processes are caught by the store's version check and
//! retried up to `max_commit_retries` times.

mod locks;

pub use locks::PortfolioLocks;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::market::{ForecastProvider, PriceLookup};
use crate::portfolio::{
    compute_portfolio_metrics, generate_efficient_frontier, normalize_weights,
    optimize_portfolio_weights, validate_allocations, MetricsReport,
};
use crate::storage::{PortfolioStore, PortfolioSummary, RecomputeCommit};
use crate::types::{
    Allocation, AssetForecast, FrontierPoint, HoldingValue, MarketDataWarning, MissingData,
    PortfolioAggregate, PortfolioSnapshot, PortfolioStatus,
};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Result of a committed recompute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputeOutcome {
    pub portfolio_id: i64,
    pub status: PortfolioStatus,
    /// Store version after the commit
    pub version: i64,
    pub aggregate: PortfolioAggregate,
    pub holdings: Vec<HoldingValue>,
    /// Holdings degraded for lack of a price or forecast
    pub warnings: Vec<MarketDataWarning>,
}

impl RecomputeOutcome {
    fn unchanged(snapshot: &PortfolioSnapshot) -> Self {
        Self {
            portfolio_id: snapshot.id,
            status: snapshot.status,
            version: snapshot.version,
            aggregate: snapshot.aggregate.clone(),
            holdings: snapshot.holdings.clone(),
            warnings: Vec::new(),
        }
    }

    /// Committed, but some holdings were degraded
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Allocation-set change requested by a caller
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Caller-normalized allocation set
    Replace(Vec<Allocation>),
    /// Append a symbol and equal-weight the set
    AddStock(String),
    /// Drop a symbol and equal-weight the remainder
    RemoveStock(String),
    /// Keep the stored weights, revalue against current market data
    Refresh,
    /// Regime-dependent weights from current forecasts
    Rebalance,
}

/// Planned allocation set plus forecasts already fetched while planning
struct Plan {
    allocations: Vec<Allocation>,
    forecasts: Option<HashMap<String, AssetForecast>>,
}

/// Recomputes and persists portfolio aggregates
pub struct PortfolioAggregateRecomputer {
    store: Arc<dyn PortfolioStore>,
    forecasts: Arc<dyn ForecastProvider>,
    prices: Arc<dyn PriceLookup>,
    config: EngineConfig,
    locks: PortfolioLocks,
}

impl PortfolioAggregateRecomputer {
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        forecasts: Arc<dyn ForecastProvider>,
        prices: Arc<dyn PriceLookup>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            forecasts,
            prices,
            config,
            locks: PortfolioLocks::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a portfolio; with symbols it starts equal-weighted and Active
    pub async fn create_portfolio(
        &self,
        name: &str,
        capital: Decimal,
        symbols: &[String],
    ) -> Result<RecomputeOutcome> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidInput("portfolio name must not be empty".into()));
        }
        if capital < Decimal::ZERO {
            return Err(EngineError::InvalidInput(format!(
                "portfolio capital must not be negative, got {}",
                capital
            )));
        }
        let allocations = normalize_weights(symbols)?;

        let snapshot = self.store.create_portfolio(name, capital).await?;
        if allocations.is_empty() {
            return Ok(RecomputeOutcome::unchanged(&snapshot));
        }

        self.mutate(snapshot.id, Mutation::Replace(allocations)).await
    }

    /// Apply a caller-normalized allocation set
    pub async fn recompute(&self, portfolio_id: i64, allocations: Vec<Allocation>) -> Result<RecomputeOutcome> {
        self.mutate(portfolio_id, Mutation::Replace(allocations)).await
    }

    /// Recompute the current allocation set against fresh prices and forecasts
    pub async fn refresh(&self, portfolio_id: i64) -> Result<RecomputeOutcome> {
        self.mutate(portfolio_id, Mutation::Refresh).await
    }

    pub async fn add_stock(&self, portfolio_id: i64, symbol: &str) -> Result<RecomputeOutcome> {
        self.mutate(portfolio_id, Mutation::AddStock(symbol.to_string())).await
    }

    pub async fn remove_stock(&self, portfolio_id: i64, symbol: &str) -> Result<RecomputeOutcome> {
        self.mutate(portfolio_id, Mutation::RemoveStock(symbol.to_string())).await
    }

    pub async fn rebalance(&self, portfolio_id: i64) -> Result<RecomputeOutcome> {
        self.mutate(portfolio_id, Mutation::Rebalance).await
    }

    /// Freeze a portfolio; no further recomputation is accepted
    pub async fn archive(&self, portfolio_id: i64) -> Result<PortfolioSnapshot> {
        let _guard = self.locks.acquire(portfolio_id).await;
        let mut attempt = 0;

        loop {
            let snapshot = self.store.load_portfolio(portfolio_id).await?;
            if snapshot.status == PortfolioStatus::Archived {
                return Err(EngineError::PortfolioArchived(portfolio_id));
            }

            match self
                .store
                .set_status(portfolio_id, snapshot.version, PortfolioStatus::Archived)
                .await
            {
                Ok(_) => break,
                Err(e) if e.is_retryable() && attempt < self.config.max_commit_retries => {
                    attempt += 1;
                    tracing::warn!("Archive of portfolio {} conflicted, retry {}", portfolio_id, attempt);
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!("Archived portfolio {}", portfolio_id);
        self.store.load_portfolio(portfolio_id).await
    }

    pub async fn delete_portfolio(&self, portfolio_id: i64) -> Result<()> {
        {
            let _guard = self.locks.acquire(portfolio_id).await;
            self.store.delete_portfolio(portfolio_id).await?;
        }
        self.locks.forget(portfolio_id);
        Ok(())
    }

    pub async fn show(&self, portfolio_id: i64) -> Result<PortfolioSnapshot> {
        self.store.load_portfolio(portfolio_id).await
    }

    pub async fn list(&self) -> Result<Vec<PortfolioSummary>> {
        self.store.list_portfolios().await
    }

    /// Frontier over the forecasts available for a portfolio's holdings
    pub async fn frontier(&self, portfolio_id: i64, num_points: Option<usize>) -> Result<Vec<FrontierPoint>> {
        let snapshot = self.store.load_portfolio(portfolio_id).await?;
        let symbols = snapshot.symbols();
        let by_symbol = self.forecasts.forecasts(&symbols).await?;
        let forecasts: Vec<AssetForecast> = symbols
            .iter()
            .filter_map(|s| by_symbol.get(s).cloned())
            .collect();

        generate_efficient_frontier(
            &forecasts,
            num_points.unwrap_or(self.config.frontier_points),
            self.config.risk_free_rate,
        )
    }

    /// Run one mutation as a serialized, retried read-modify-write
    pub async fn mutate(&self, portfolio_id: i64, mutation: Mutation) -> Result<RecomputeOutcome> {
        let _guard = self.locks.acquire(portfolio_id).await;
        let mut attempt = 0;

        loop {
            let snapshot = self.store.load_portfolio(portfolio_id).await?;
            if snapshot.status == PortfolioStatus::Archived {
                return Err(EngineError::PortfolioArchived(portfolio_id));
            }

            let plan = self.plan(&snapshot, &mutation).await?;
            match self.apply(&snapshot, plan).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_commit_retries => {
                    attempt += 1;
                    tracing::warn!(
                        portfolio_id,
                        attempt,
                        "Recompute lost a commit race, retrying"
                    );
                }
                result => return result,
            }
        }
    }

    async fn plan(&self, snapshot: &PortfolioSnapshot, mutation: &Mutation) -> Result<Plan> {
        let allocations = match mutation {
            Mutation::Replace(allocations) => allocations.clone(),
            Mutation::Refresh => snapshot.allocations(),
            Mutation::AddStock(symbol) => {
                if snapshot.holds(symbol) {
                    return Err(EngineError::InvalidInput(format!(
                        "portfolio {} already holds {}",
                        snapshot.id, symbol
                    )));
                }
                let mut symbols = snapshot.symbols();
                symbols.push(symbol.clone());
                normalize_weights(&symbols)?
            }
            Mutation::RemoveStock(symbol) => {
                if !snapshot.holds(symbol) {
                    return Err(EngineError::InvalidInput(format!(
                        "portfolio {} does not hold {}",
                        snapshot.id, symbol
                    )));
                }
                let remaining: Vec<String> = snapshot
                    .symbols()
                    .into_iter()
                    .filter(|s| s != symbol)
                    .collect();
                normalize_weights(&remaining)?
            }
            Mutation::Rebalance => return self.plan_rebalance(snapshot).await,
        };

        Ok(Plan {
            allocations,
            forecasts: None,
        })
    }

    /// Regime weights over the covered symbols; uncovered symbols keep a zero weight
    async fn plan_rebalance(&self, snapshot: &PortfolioSnapshot) -> Result<Plan> {
        let symbols = snapshot.symbols();
        if symbols.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "portfolio {} has no holdings to rebalance",
                snapshot.id
            )));
        }

        let by_symbol = self.forecasts.forecasts(&symbols).await?;
        let covered: Vec<AssetForecast> = symbols
            .iter()
            .filter_map(|s| by_symbol.get(s).cloned())
            .collect();

        if covered.is_empty() {
            return Err(EngineError::MissingMarketData {
                symbol: symbols.join(","),
                kind: MissingData::Forecast,
            });
        }

        let weighted = optimize_portfolio_weights(&covered, &self.config)?;
        let target: HashMap<&str, f64> = weighted
            .iter()
            .map(|w| (w.symbol.as_str(), w.weight))
            .collect();

        let allocations = symbols
            .iter()
            .map(|s| Allocation::new(s, target.get(s.as_str()).copied().unwrap_or(0.0)))
            .collect();

        Ok(Plan {
            allocations,
            forecasts: Some(by_symbol),
        })
    }

    async fn apply(&self, snapshot: &PortfolioSnapshot, plan: Plan) -> Result<RecomputeOutcome> {
        validate_allocations(&plan.allocations, self.config.weight_tolerance)?;

        let report = if plan.allocations.is_empty() {
            MetricsReport::empty()
        } else {
            let symbols: Vec<String> = plan
                .allocations
                .iter()
                .map(|a| a.asset_symbol.clone())
                .collect();

            let forecasts = match plan.forecasts {
                Some(f) => f,
                None => self.forecasts.forecasts(&symbols).await?,
            };
            let prices = self.resolve_prices(&symbols).await;

            // Nothing resolved: keep the last committed state
            if forecasts.is_empty() && prices.is_empty() {
                return Err(EngineError::MissingMarketData {
                    symbol: symbols.join(","),
                    kind: MissingData::Forecast,
                });
            }

            compute_portfolio_metrics(
                &plan.allocations,
                &forecasts,
                &prices,
                snapshot.capital,
                &self.config,
            )?
        };

        let commit = RecomputeCommit {
            portfolio_id: snapshot.id,
            expected_version: snapshot.version,
            status: PortfolioStatus::for_holdings(report.holdings.len()),
            aggregate: report.aggregate,
            holdings: report.holdings,
        };

        let version = self.store.commit_recompute(&commit).await?;

        tracing::info!(
            "Recomputed portfolio {}: value={} holdings={} sharpe={:.4} ({} warnings)",
            commit.portfolio_id,
            commit.aggregate.total_value,
            commit.aggregate.holdings_count,
            commit.aggregate.sharpe_ratio,
            report.warnings.len()
        );

        Ok(RecomputeOutcome {
            portfolio_id: commit.portfolio_id,
            status: commit.status,
            version,
            aggregate: commit.aggregate,
            holdings: commit.holdings,
            warnings: report.warnings,
        })
    }

    /// Look up live prices concurrently; lookup failures count as unavailable
    async fn resolve_prices(&self, symbols: &[String]) -> HashMap<String, Decimal> {
        let lookups = symbols.iter().map(|s| async move {
            let price = match self.prices.latest_price(s).await {
                Ok(price) => price,
                Err(e) => {
                    tracing::warn!("Price lookup for {} failed: {}", s, e);
                    None
                }
            };
            (s.clone(), price)
        });

        join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(symbol, price)| price.map(|p| (symbol, p)))
            .collect()
    }
}
