//! # Portfolio Optimization Module
//!
//! Pure math layer of the engine:
//! - Ratio mathematics (Sharpe, Sortino, mean return/volatility, max drawdown)
//! - Regime-dependent weight allocation (defensive, equal fallback, Sharpe-weighted)
//! - Sampled efficient frontier
//! - Portfolio-level metrics from an allocation set
//!
//! Nothing in here performs I/O or suspends.
//!
//! ```rust,ignore
//! use portfolio_engine::portfolio::{optimize_portfolio_weights, generate_efficient_frontier};
//!
//! let weights = optimize_portfolio_weights(&forecasts, &config)?;
//! let curve = generate_efficient_frontier(&forecasts, 50, config.risk_free_rate)?;
//! ```

pub mod allocator;
pub mod frontier;
pub mod metrics;
pub mod ratios;


pub use allocator::{AllocationInput, AllocationRegime, ScoredAsset, WeightAllocator};
pub use frontier::{generate_efficient_frontier, EfficientFrontier, FrontierPoints};
pub use metrics::{
    compute_portfolio_metrics, normalize_weights, optimize_portfolio_weights,
    validate_allocations, MetricsReport,
};
pub use ratios::{
    max_drawdown, mean_return, mean_volatility, sharpe_ratio, sortino_ratio, PortfolioStats,
    ReturnSource,
};
