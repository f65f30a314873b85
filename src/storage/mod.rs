//! SQLite persistence for portfolios and their allocations
//!
//! A recompute writes the portfolio aggregate and the full allocation set in
//! one transaction, guarded by an optimistic `version` column.

mod models;

pub use models::{AllocationRow, PortfolioRow, PortfolioSummary};

use crate::config::DatabaseConfig;
use crate::error::{EngineError, Result};
use crate::types::{HoldingValue, PortfolioAggregate, PortfolioSnapshot, PortfolioStatus};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::time::Duration;

/// Full replacement of one portfolio's derived state
#[derive(Debug, Clone, PartialEq)]
pub struct RecomputeCommit {
    pub portfolio_id: i64,
    /// Version the recompute was based on
    pub expected_version: i64,
    pub status: PortfolioStatus,
    pub aggregate: PortfolioAggregate,
    pub holdings: Vec<HoldingValue>,
}

/// Persistence contract used by the recomputer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// Insert a Draft portfolio with a zeroed aggregate
    async fn create_portfolio(&self, name: &str, capital: Decimal) -> Result<PortfolioSnapshot>;

    async fn load_portfolio(&self, id: i64) -> Result<PortfolioSnapshot>;

    /// Atomically replace aggregate and allocations; returns the new version
    async fn commit_recompute(&self, commit: &RecomputeCommit) -> Result<i64>;

    /// Change status without touching the aggregate; returns the new version
    async fn set_status(&self, id: i64, expected_version: i64, status: PortfolioStatus) -> Result<i64>;

    /// Delete a portfolio and, by cascade, its allocations
    async fn delete_portfolio(&self, id: i64) -> Result<()>;

    async fn list_portfolios(&self) -> Result<Vec<PortfolioSummary>>;
}

/// Database handle
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to (or create) the database file and ensure the schema exists
    pub async fn connect(path: &str) -> Result<Self> {
        Self::connect_with(&DatabaseConfig {
            path: path.to_string(),
            ..DatabaseConfig::default()
        })
        .await
    }

    pub async fn connect_with(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(config.resolved_path())
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS portfolios (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'draft',
                capital TEXT NOT NULL,
                total_value TEXT NOT NULL DEFAULT '0',
                expected_return REAL NOT NULL DEFAULT 0,
                volatility REAL NOT NULL DEFAULT 0,
                sharpe_ratio REAL NOT NULL DEFAULT 0,
                holdings_count INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS allocations (
                portfolio_id INTEGER NOT NULL REFERENCES portfolios(id) ON DELETE CASCADE,
                asset_symbol TEXT NOT NULL,
                weight REAL NOT NULL,
                value TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (portfolio_id, asset_symbol)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_allocations_portfolio ON allocations(portfolio_id, position)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn fetch_row(tx: &mut Transaction<'_, Sqlite>, id: i64) -> Result<PortfolioRow> {
        sqlx::query_as::<_, PortfolioRow>(
            r#"
            SELECT id, name, status, capital, total_value, expected_return, volatility,
                   sharpe_ratio, holdings_count, version, updated_at
            FROM portfolios
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(EngineError::PortfolioNotFound(id))
    }

    /// Explain a guarded UPDATE that matched no row, then roll back
    async fn reject_stale_write(
        mut tx: Transaction<'_, Sqlite>,
        id: i64,
    ) -> Result<EngineError> {
        let current: Option<(String,)> = sqlx::query_as("SELECT status FROM portfolios WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.rollback().await?;

        Ok(match current {
            None => EngineError::PortfolioNotFound(id),
            Some((status,)) if status == PortfolioStatus::Archived.as_str() => {
                EngineError::PortfolioArchived(id)
            }
            Some(_) => EngineError::ConcurrencyConflict { portfolio_id: id },
        })
    }
}

#[async_trait]
impl PortfolioStore for Database {
    async fn create_portfolio(&self, name: &str, capital: Decimal) -> Result<PortfolioSnapshot> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO portfolios (name, status, capital, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(PortfolioStatus::Draft.as_str())
        .bind(capital.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::info!("Created portfolio {} ({})", id, name);
        self.load_portfolio(id).await
    }

    async fn load_portfolio(&self, id: i64) -> Result<PortfolioSnapshot> {
        // One read transaction so the row and its allocations share a snapshot
        let mut tx = self.pool.begin().await?;
        let row = Self::fetch_row(&mut tx, id).await?;
        let allocations = sqlx::query_as::<_, AllocationRow>(
            r#"
            SELECT asset_symbol, weight, value
            FROM allocations
            WHERE portfolio_id = ?
            ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        row.into_snapshot(allocations)
    }

    async fn commit_recompute(&self, commit: &RecomputeCommit) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let aggregate = &commit.aggregate;

        let updated = sqlx::query(
            r#"
            UPDATE portfolios
            SET status = ?, total_value = ?, expected_return = ?, volatility = ?,
                sharpe_ratio = ?, holdings_count = ?, version = version + 1, updated_at = ?
            WHERE id = ? AND version = ? AND status != 'archived'
            "#,
        )
        .bind(commit.status.as_str())
        .bind(aggregate.total_value.to_string())
        .bind(aggregate.expected_return)
        .bind(aggregate.volatility)
        .bind(aggregate.sharpe_ratio)
        .bind(i64::from(aggregate.holdings_count))
        .bind(Utc::now())
        .bind(commit.portfolio_id)
        .bind(commit.expected_version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Self::reject_stale_write(tx, commit.portfolio_id).await?);
        }

        sqlx::query("DELETE FROM allocations WHERE portfolio_id = ?")
            .bind(commit.portfolio_id)
            .execute(&mut *tx)
            .await?;

        for (position, holding) in commit.holdings.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO allocations (portfolio_id, asset_symbol, weight, value, position)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(commit.portfolio_id)
            .bind(&holding.asset_symbol)
            .bind(holding.weight)
            .bind(holding.value.to_string())
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        // Dropping `tx` on any error above rolls the whole write back
        tx.commit().await?;

        Ok(commit.expected_version + 1)
    }

    async fn set_status(&self, id: i64, expected_version: i64, status: PortfolioStatus) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE portfolios
            SET status = ?, version = version + 1, updated_at = ?
            WHERE id = ? AND version = ? AND status != 'archived'
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Self::reject_stale_write(tx, id).await?);
        }

        tx.commit().await?;
        Ok(expected_version + 1)
    }

    async fn delete_portfolio(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM portfolios WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::PortfolioNotFound(id));
        }
        Ok(())
    }

    async fn list_portfolios(&self) -> Result<Vec<PortfolioSummary>> {
        let rows = sqlx::query_as::<_, PortfolioRow>(
            r#"
            SELECT id, name, status, capital, total_value, expected_return, volatility,
                   sharpe_ratio, holdings_count, version, updated_at
            FROM portfolios
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PortfolioRow::into_summary).collect()
    }
}
