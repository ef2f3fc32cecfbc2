use crate::config::{Config, IdentityConfig};
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::time::Duration;

const MIN_JWT_SECRET_LEN: usize = 32;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub identity: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.identity
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("Identity Provider:     {}", status(self.identity));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        identity: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {}", e));
    }

    if let Err(e) = validate_identity(&config.identity).await {
        report.identity = false;
        report.errors.push(format!("Identity: {}", e));
    }

    Ok(report)
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.database_max_connections == 0 {
        anyhow::bail!("DATABASE_MAX_CONNECTIONS must be greater than 0");
    }

    url::Url::parse(&config.database_url).context("DATABASE_URL is not a valid URL")?;

    match &config.identity {
        IdentityConfig::Remote { url, .. } => {
            url::Url::parse(url).context("AUTH_URL is not a valid URL")?;
        }
        IdentityConfig::Jwt { secret } => {
            if secret.len() < MIN_JWT_SECRET_LEN {
                anyhow::bail!(
                    "AUTH_JWT_SECRET must be at least {} characters",
                    MIN_JWT_SECRET_LEN
                );
            }
        }
    }

    if config.admin_api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY is not set; admin routes will reject every request");
    }

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_identity(identity: &IdentityConfig) -> Result<()> {
    let IdentityConfig::Remote { url, .. } = identity else {
        return Ok(());
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    // Any HTTP answer proves the provider is reachable; credentials are checked per request.
    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to connect to identity provider")?;

    if response.status().is_server_error() {
        anyhow::bail!("Identity provider returned status: {}", response.status());
    }

    Ok(())
}
