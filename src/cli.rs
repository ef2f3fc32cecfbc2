use clap::{Parser, Subcommand};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::{PostgresOrderRepository, PostgresProductRepository};
use crate::config::{AllowedOrigins, Config, IdentityConfig};
use crate::domain::OrderStatus;
use crate::use_cases::{OrderModeration, StatusChange};

#[derive(Parser)]
#[command(name = "campus-market")]
#[command(about = "Campus Market - order validation and reservation service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Order moderation commands
    #[command(subcommand)]
    Order(OrderCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum OrderCommands {
    /// Move an order to a new status
    SetStatus {
        /// Order UUID
        #[arg(value_name = "ORDER_ID")]
        order_id: Uuid,

        /// Target status (pending, confirmed, shipped, delivered, cancelled)
        #[arg(value_name = "STATUS")]
        status: OrderStatus,

        /// Who made the change
        #[arg(long)]
        actor: Option<String>,

        /// Free-text note stored on the order
        #[arg(long)]
        notes: Option<String>,
    },
}

pub async fn handle_order_set_status(
    pool: &PgPool,
    order_id: Uuid,
    status: OrderStatus,
    actor: Option<String>,
    notes: Option<String>,
) -> anyhow::Result<()> {
    let moderation = OrderModeration::new(
        Arc::new(PostgresOrderRepository::new(pool.clone())),
        Arc::new(PostgresProductRepository::new(pool.clone())),
    );

    let order = moderation
        .change_status(
            order_id,
            StatusChange {
                to: status,
                actor,
                notes,
            },
        )
        .await
        .map_err(|e| anyhow::anyhow!("Order {}: {}", order_id, e))?;

    tracing::info!(order_id = %order.id, status = %order.status, "Order status updated from CLI");
    println!("✓ Order {} is now {}", order.id, order.status);

    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool, &config.migrations_dir).await?;

    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Database Max Connections: {}", config.database_max_connections);
    println!("  Migrations Dir: {}", config.migrations_dir);
    match &config.identity {
        IdentityConfig::Remote { url, anon_key } => {
            println!("  Identity: remote ({})", url);
            println!(
                "  Auth Anon Key: {}",
                anon_key.as_deref().map(mask_secret).unwrap_or_else(|| "<unset>".to_string())
            );
        }
        IdentityConfig::Jwt { secret } => {
            println!("  Identity: local JWT (secret {})", mask_secret(secret));
        }
    }
    println!(
        "  Admin API Key: {}",
        config
            .admin_api_key
            .as_deref()
            .map(mask_secret)
            .unwrap_or_else(|| "<unset, admin routes disabled>".to_string())
    );
    match &config.allowed_origins {
        AllowedOrigins::Any => println!("  CORS Origins: *"),
        AllowedOrigins::List(origins) => println!("  CORS Origins: {}", origins.join(", ")),
    }
    println!("  Log Format: {:?}", config.log_format);

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}**** ({} chars)", visible, secret.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_order_set_status() {
        let id = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "campus-market",
            "order",
            "set-status",
            &id.to_string(),
            "cancelled",
            "--actor",
            "ops@campus.edu",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Order(OrderCommands::SetStatus {
                order_id,
                status,
                actor,
                notes,
            })) => {
                assert_eq!(order_id, id);
                assert_eq!(status, OrderStatus::Cancelled);
                assert_eq!(actor.as_deref(), Some("ops@campus.edu"));
                assert!(notes.is_none());
            }
            _ => panic!("expected order set-status"),
        }
    }

    #[test]
    fn rejects_unknown_status() {
        let result = Cli::try_parse_from([
            "campus-market",
            "order",
            "set-status",
            &Uuid::new_v4().to_string(),
            "refunded",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn masks_database_password() {
        assert_eq!(
            mask_password("postgres://market:hunter2@db:5432/market"),
            "postgres://market:****@db:5432/market"
        );
        assert_eq!(mask_password("postgres://db/market"), "postgres://db/market");
    }

    #[test]
    fn masks_secrets() {
        assert_eq!(mask_secret("abcdefgh"), "abcd**** (8 chars)");
    }
}
