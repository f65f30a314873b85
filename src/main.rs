//! Portfolio engine CLI
//!
//! Pure optimization commands plus the persisted portfolio lifecycle.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use portfolio_engine::{
    client::HttpForecastClient,
    config::Config,
    market::{ForecastProvider, PriceLookup, StaticMarketData},
    portfolio::{compute_portfolio_metrics, generate_efficient_frontier, optimize_portfolio_weights},
    recompute::PortfolioAggregateRecomputer,
    storage::Database,
    types::{Allocation, AssetForecast},
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "portfolio-engine")]
#[command(about = "Portfolio optimization and metrics engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// JSON market data snapshot; overrides the configured forecast service
    #[arg(long)]
    market_data: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Regime-dependent weights for a set of symbols
    Optimize {
        #[arg(short, long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,
    },
    /// Sample the risk/return curve for symbols or a stored portfolio
    Frontier {
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,
        /// Stored portfolio to use instead of --symbols
        #[arg(long)]
        portfolio: Option<i64>,
        #[arg(short, long)]
        points: Option<usize>,
    },
    /// Metrics for an ad-hoc allocation, e.g. --weights AAA=0.6,BBB=0.4
    Metrics {
        #[arg(short, long, value_delimiter = ',', required = true)]
        weights: Vec<String>,
        #[arg(long)]
        capital: Decimal,
    },
    /// Create a portfolio, equal-weighted over the given symbols
    Create {
        name: String,
        #[arg(long)]
        capital: Decimal,
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,
    },
    /// Add a symbol and re-weight equally
    AddStock { id: i64, symbol: String },
    /// Remove a symbol and re-weight equally
    RemoveStock { id: i64, symbol: String },
    /// Re-weight holdings from current forecasts
    Rebalance { id: i64 },
    /// Revalue holdings at current prices and forecasts
    Refresh { id: i64 },
    /// Freeze a portfolio
    Archive { id: i64 },
    /// Delete a portfolio and its allocations
    Delete { id: i64 },
    /// Show a stored portfolio
    Show { id: i64 },
    /// List stored portfolios
    List,
}

type MarketSources = (Arc<dyn ForecastProvider>, Arc<dyn PriceLookup>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("portfolio_engine=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let (forecasts, prices) = market_sources(&config, cli.market_data.as_deref())?;

    let service = || open_service(&config, forecasts.clone(), prices.clone());

    match cli.command {
        Commands::Optimize { symbols } => {
            let set = resolve_forecasts(forecasts.as_ref(), &symbols).await?;
            print_json(&optimize_portfolio_weights(&set, &config.engine)?)
        }
        Commands::Frontier {
            symbols,
            portfolio: Some(id),
            points,
        } => {
            if !symbols.is_empty() {
                bail!("use either --symbols or --portfolio, not both");
            }
            print_json(&service().await?.frontier(id, points).await?)
        }
        Commands::Frontier {
            symbols,
            portfolio: None,
            points,
        } => {
            let set = resolve_forecasts(forecasts.as_ref(), &symbols).await?;
            let n = points.unwrap_or(config.engine.frontier_points);
            print_json(&generate_efficient_frontier(&set, n, config.engine.risk_free_rate)?)
        }
        Commands::Metrics { weights, capital } => {
            let allocations = parse_weights(&weights)?;
            let symbols: Vec<String> = allocations.iter().map(|a| a.asset_symbol.clone()).collect();

            let by_symbol = forecasts.forecasts(&symbols).await?;
            let mut resolved = HashMap::new();
            for symbol in &symbols {
                if let Some(price) = prices.latest_price(symbol).await? {
                    resolved.insert(symbol.clone(), price);
                }
            }

            let report =
                compute_portfolio_metrics(&allocations, &by_symbol, &resolved, capital, &config.engine)?;
            print_json(&report)
        }
        Commands::Create { name, capital, symbols } => {
            print_json(&service().await?.create_portfolio(&name, capital, &symbols).await?)
        }
        Commands::AddStock { id, symbol } => print_json(&service().await?.add_stock(id, &symbol).await?),
        Commands::RemoveStock { id, symbol } => {
            print_json(&service().await?.remove_stock(id, &symbol).await?)
        }
        Commands::Rebalance { id } => print_json(&service().await?.rebalance(id).await?),
        Commands::Refresh { id } => print_json(&service().await?.refresh(id).await?),
        Commands::Archive { id } => print_json(&service().await?.archive(id).await?),
        Commands::Delete { id } => {
            service().await?.delete_portfolio(id).await?;
            tracing::info!("Deleted portfolio {}", id);
            Ok(())
        }
        Commands::Show { id } => print_json(&service().await?.show(id).await?),
        Commands::List => print_json(&service().await?.list().await?),
    }
}

fn market_sources(config: &Config, snapshot: Option<&str>) -> anyhow::Result<MarketSources> {
    if let Some(path) = snapshot {
        let data = Arc::new(
            StaticMarketData::from_json_file(path)
                .with_context(|| format!("loading market data from {}", path))?,
        );
        tracing::info!("Using market data snapshot {}", path);
        return Ok((data.clone(), data));
    }

    match &config.forecast {
        Some(forecast) => {
            let client = Arc::new(HttpForecastClient::new(forecast)?);
            tracing::info!("Using forecast service at {}", forecast.base_url);
            Ok((client.clone(), client))
        }
        None => bail!("no market data: pass --market-data or configure [forecast]"),
    }
}

async fn open_service(
    config: &Config,
    forecasts: Arc<dyn ForecastProvider>,
    prices: Arc<dyn PriceLookup>,
) -> anyhow::Result<PortfolioAggregateRecomputer> {
    let db = Database::connect_with(&config.database).await?;
    tracing::debug!("Forecasts from {}", forecasts.name());
    Ok(PortfolioAggregateRecomputer::new(
        Arc::new(db),
        forecasts,
        prices,
        config.engine.clone(),
    ))
}

/// Forecasts for `symbols` in the given order; fails if none resolve
async fn resolve_forecasts(
    provider: &dyn ForecastProvider,
    symbols: &[String],
) -> anyhow::Result<Vec<AssetForecast>> {
    let by_symbol = provider.forecasts(symbols).await?;
    let set: Vec<AssetForecast> = symbols
        .iter()
        .filter_map(|s| {
            let f = by_symbol.get(s).cloned();
            if f.is_none() {
                tracing::warn!("No forecast for {}, skipped", s);
            }
            f
        })
        .collect();

    if set.is_empty() {
        bail!("no forecasts available for {}", symbols.join(","));
    }
    Ok(set)
}

fn parse_weights(raw: &[String]) -> anyhow::Result<Vec<Allocation>> {
    raw.iter()
        .map(|pair| {
            let (symbol, weight) = pair
                .split_once('=')
                .with_context(|| format!("expected SYMBOL=WEIGHT, got '{}'", pair))?;
            let weight: f64 = weight
                .trim()
                .parse()
                .with_context(|| format!("bad weight in '{}'", pair))?;
            Ok(Allocation::new(symbol.trim(), weight))
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
