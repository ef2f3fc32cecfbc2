use anyhow::Context;
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityConfig {
    /// Ask the identity provider's user endpoint about every credential.
    Remote { url: String, anon_key: Option<String> },
    /// Verify HS256 tokens locally with the provider's shared secret.
    Jwt { secret: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub migrations_dir: String,
    pub identity: IdentityConfig,
    pub admin_api_key: Option<String>,
    pub allowed_origins: AllowedOrigins,
    pub log_format: LogFormat,
    pub log_request_body: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so tests need not touch the process env.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let identity = match non_empty("AUTH_JWT_SECRET") {
            Some(secret) => IdentityConfig::Jwt { secret },
            None => IdentityConfig::Remote {
                url: non_empty("AUTH_URL")
                    .context("AUTH_URL is required when AUTH_JWT_SECRET is not set")?,
                anon_key: non_empty("AUTH_ANON_KEY"),
            },
        };

        Ok(Config {
            server_port: non_empty("SERVER_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: non_empty("DATABASE_URL").context("DATABASE_URL is required")?,
            database_max_connections: non_empty("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            migrations_dir: non_empty("MIGRATIONS_DIR").unwrap_or_else(|| "./migrations".to_string()),
            identity,
            admin_api_key: non_empty("ADMIN_API_KEY"),
            allowed_origins: parse_allowed_origins(
                &non_empty("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| "*".to_string()),
            )?,
            log_format: match non_empty("LOG_FORMAT").as_deref() {
                None | Some("pretty") => LogFormat::Pretty,
                Some("json") => LogFormat::Json,
                Some(other) => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
            },
            log_request_body: non_empty("LOG_REQUEST_BODY")
                .map(|v| v.parse::<bool>())
                .transpose()
                .context("LOG_REQUEST_BODY must be true or false")?
                .unwrap_or(false),
        })
    }
}

fn parse_allowed_origins(raw: &str) -> anyhow::Result<AllowedOrigins> {
    let value = raw.trim();
    if value == "*" {
        return Ok(AllowedOrigins::Any);
    }

    let origins = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            url::Url::parse(entry)
                .map(|_| entry.trim_end_matches('/').to_string())
                .with_context(|| format!("invalid origin '{}'", entry))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    if origins.is_empty() {
        anyhow::bail!("CORS_ALLOWED_ORIGINS must be '*' or a comma-separated list of origins");
    }

    Ok(AllowedOrigins::List(origins))
}
