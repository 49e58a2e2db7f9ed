//! Connection pool bootstrap and migrations.
//!
//! Shape follows the teacher's `indexer::db::connection::Database`: a thin
//! wrapper around `PgPool` with a `migrate()` step driven by embedded SQL
//! files, plus a health check. Every pool configuration knob is read from
//! the caller (`tessera-api::config::Settings`), never from the environment
//! directly, so this crate stays testable without env leakage.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info};

use crate::error::{DbError, Result};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/tessera".to_string(),
            max_connections: 10,
            min_connections: 2,
            connection_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }
}

pub async fn connect(config: &PoolConfig) -> Result<PgPool> {
    info!("connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            error!("failed to connect to database: {e}");
            DbError::Connection(e.to_string())
        })?;
    info!("database connection pool established (max_connections={})", config.max_connections);
    Ok(pool)
}

/// Run the embedded schema migrations in order. Idempotent via `IF NOT
/// EXISTS` guards in the SQL itself, matching the teacher's
/// `include_str!`-driven migration runner.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    let migration_0001 = include_str!("../migrations/0001_init.sql");
    info!("running migration 0001_init.sql");
    sqlx::query(migration_0001)
        .execute(pool)
        .await
        .map_err(|e| DbError::Migration(format!("0001_init.sql: {e}")))?;
    info!("database migrations completed");
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<()> {
    sqlx::query("select 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_config_matches_documented_defaults() {
        let cfg = PoolConfig::default();
        assert_eq!(cfg.max_connections, 10);
        assert_eq!(cfg.min_connections, 2);
    }
}
