//! Configuration management

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub forecast: Option<ForecastConfig>,
}

/// Optimization and metrics parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Annualized risk-free rate
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Exponential decay per volatility rank in the defensive regime
    #[serde(default = "default_defensive_decay")]
    pub defensive_decay: f64,
    /// Exponent applied to positive Sharpe ratios in the general regime
    #[serde(default = "default_sharpe_exponent")]
    pub sharpe_exponent: f64,
    /// Volatility used when a forecast carries none
    #[serde(default = "default_volatility_floor")]
    pub volatility_floor: f64,
    #[serde(default = "default_frontier_points")]
    pub frontier_points: usize,
    /// Allowed deviation of the weight sum from 1
    #[serde(default = "default_weight_tolerance")]
    pub weight_tolerance: f64,
    #[serde(default = "default_max_commit_retries")]
    pub max_commit_retries: u32,
}

fn default_risk_free_rate() -> f64 { 0.05 }
fn default_defensive_decay() -> f64 { 0.8 }
fn default_sharpe_exponent() -> f64 { 2.0 }
fn default_volatility_floor() -> f64 { 0.1 }
fn default_frontier_points() -> usize { 50 }
fn default_weight_tolerance() -> f64 { 1e-6 }
fn default_max_commit_retries() -> u32 { 3 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: default_risk_free_rate(),
            defensive_decay: default_defensive_decay(),
            sharpe_exponent: default_sharpe_exponent(),
            volatility_floor: default_volatility_floor(),
            frontier_points: default_frontier_points(),
            weight_tolerance: default_weight_tolerance(),
            max_commit_retries: default_max_commit_retries(),
        }
    }
}

impl EngineConfig {
    /// Same parameters with a different risk-free rate
    pub fn with_risk_free_rate(mut self, risk_free_rate: f64) -> Self {
        self.risk_free_rate = risk_free_rate;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.risk_free_rate.is_finite() {
            return Err(EngineError::InvalidInput("risk_free_rate must be finite".into()));
        }
        if !(self.defensive_decay > 0.0) {
            return Err(EngineError::InvalidInput(format!(
                "defensive_decay must be positive, got {}",
                self.defensive_decay
            )));
        }
        if !(self.sharpe_exponent > 0.0) {
            return Err(EngineError::InvalidInput(format!(
                "sharpe_exponent must be positive, got {}",
                self.sharpe_exponent
            )));
        }
        if !(self.volatility_floor > 0.0) {
            return Err(EngineError::InvalidInput(format!(
                "volatility_floor must be positive, got {}",
                self.volatility_floor
            )));
        }
        if self.frontier_points == 0 {
            return Err(EngineError::InvalidInput("frontier_points must be at least 1".into()));
        }
        if !(self.weight_tolerance > 0.0) {
            return Err(EngineError::InvalidInput("weight_tolerance must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String { "portfolio.db".to_string() }
fn default_max_connections() -> u32 { 5 }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// Database path with `~` and environment variables expanded
    pub fn resolved_path(&self) -> String {
        shellexpand::full(&self.path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| self.path.clone())
    }
}

/// External forecast service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Max in-flight requests per batch
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_timeout_secs() -> u64 { 30 }
fn default_max_concurrency() -> usize { 8 }

impl Config {
    /// Load config from an optional TOML file overlaid with `PORTFOLIO__*` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("PORTFOLIO")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.engine.validate()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            database: DatabaseConfig::default(),
            forecast: None,
        }
    }
}
