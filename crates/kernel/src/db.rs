//! Database connection pool management.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

/// Schema applied on startup. Every statement is `IF NOT EXISTS`.
const SCHEMA: &str = include_str!("../migrations/schema.sql");

/// Create a PostgreSQL connection pool.
pub async fn create_pool(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Create the settings and dashboard tables if they are missing.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    // raw_sql: the schema file holds several statements.
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .context("failed to apply schema")?;

    Ok(())
}

/// Check if the database connection is healthy.
pub async fn check_health(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
