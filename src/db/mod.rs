use anyhow::Context;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::Path;
use std::time::Duration;

use crate::config::Config;

pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool, migrations_dir: &str) -> anyhow::Result<()> {
    let migrator = Migrator::new(Path::new(migrations_dir))
        .await
        .with_context(|| format!("Failed to load migrations from {}", migrations_dir))?;
    migrator.run(pool).await.context("Failed to run migrations")?;

    tracing::info!(migrations_dir = %migrations_dir, "Database migrations completed");
    Ok(())
}
