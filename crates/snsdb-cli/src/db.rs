//! Postgres connection and the `db` maintenance commands.

use anyhow::Context;
use snsdb_core::AppConfig;
use snsdb_db::PoolConfig;
use sqlx::PgPool;

/// Open a pool against `DATABASE_URL` with the configured pool limits.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is unset or the connection fails.
pub(crate) async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required for the postgres backend and db commands")?;
    let pool = snsdb_db::connect_pool(url, PoolConfig::from_app_config(config))
        .await
        .context("failed to connect to postgres")?;
    Ok(pool)
}

pub(crate) async fn run_ping(config: &AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    snsdb_db::ping(&pool).await.context("database ping failed")?;
    println!("database ok");
    Ok(())
}

pub(crate) async fn run_migrate(config: &AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let applied = snsdb_db::run_migrations(&pool)
        .await
        .context("failed to apply migrations")?;
    tracing::info!(applied, "migrations complete");
    println!("applied {applied} migration(s)");
    Ok(())
}
