use campus_market::adapters::{PostgresOrderRepository, PostgresProductRepository};
use campus_market::auth::{JwtIdentityVerifier, RemoteIdentityVerifier};
use campus_market::cli::{self, Cli, Commands, DbCommands, OrderCommands};
use campus_market::config::{Config, IdentityConfig, LogFormat};
use campus_market::health::{HealthTarget, PostgresChecker};
use campus_market::ports::IdentityVerifier;
use campus_market::{create_app, db, startup, AppState};

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
        Commands::Order(OrderCommands::SetStatus {
            order_id,
            status,
            actor,
            notes,
        }) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_order_set_status(&pool, order_id, status, actor, notes).await
        }
    }
}

fn init_tracing(format: LogFormat) {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool, &config.migrations_dir).await?;

    let report = startup::validate_environment(&config, &pool).await?;
    report.print();
    if !report.is_valid() {
        anyhow::bail!("Startup validation failed");
    }

    let mut health_targets = vec![HealthTarget {
        name: "postgres",
        critical: true,
        checker: Arc::new(PostgresChecker::new(pool.clone())),
    }];

    let identity: Arc<dyn IdentityVerifier> = match &config.identity {
        IdentityConfig::Remote { url, anon_key } => {
            let verifier = Arc::new(RemoteIdentityVerifier::new(url.clone(), anon_key.clone()));
            health_targets.push(HealthTarget {
                name: "identity_provider",
                critical: false,
                checker: verifier.clone(),
            });
            tracing::info!(auth_url = %url, "Verifying credentials against identity provider");
            verifier as Arc<dyn IdentityVerifier>
        }
        IdentityConfig::Jwt { secret } => {
            tracing::info!("Verifying credentials locally with the shared JWT secret");
            Arc::new(JwtIdentityVerifier::new(secret.as_bytes()))
        }
    };

    let state = AppState::new(
        identity,
        Arc::new(PostgresProductRepository::new(pool.clone())),
        Arc::new(PostgresOrderRepository::new(pool.clone())),
    )
    .with_admin_api_key(config.admin_api_key.clone())
    .with_health_targets(health_targets)
    .with_allowed_origins(config.allowed_origins.clone())
    .with_request_body_logging(config.log_request_body);

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
