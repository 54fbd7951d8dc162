//! Application configuration

use anyhow::{Context, Result};
use sqlx::postgres::PgConnectOptions;
use std::str::FromStr;

/// Dashboard origins allowed when `CORS_ALLOWED_ORIGINS` is not set
const DEFAULT_CORS_ORIGINS: [&str; 6] = [
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost:5001",
    "http://127.0.0.1:5001",
    "http://0.0.0.0:5173",
    "http://0.0.0.0:5001",
];

/// Warehouse connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseConfig {
    /// Full `postgres://` connection URL
    Url(String),
    /// Individual connection parts
    Parts {
        host: String,
        port: u16,
        name: String,
        user: String,
        password: Option<String>,
    },
}

impl DatabaseConfig {
    /// Build connect options; the password is passed as-is, no URL escaping needed
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        match self {
            DatabaseConfig::Url(url) => {
                PgConnectOptions::from_str(url).context("Invalid DATABASE_URL")
            }
            DatabaseConfig::Parts {
                host,
                port,
                name,
                user,
                password,
            } => {
                let options = PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .database(name)
                    .username(user);
                Ok(match password {
                    Some(password) => options.password(password),
                    None => options,
                })
            }
        }
    }

    /// Connection description with the password left out
    pub fn describe(&self) -> String {
        match self {
            DatabaseConfig::Url(url) => match url.split_once('@') {
                Some((_, rest)) => format!("postgresql://****@{}", rest),
                None => url.clone(),
            },
            DatabaseConfig::Parts {
                host,
                port,
                name,
                user,
                ..
            } => format!("postgresql://{}:****@{}:{}/{}", user, host, port, name),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Warehouse connection
    pub database: DatabaseConfig,
    /// Maximum pooled warehouse connections
    pub max_connections: u32,
    /// Aggregate queries allowed in flight for the health dashboard
    pub health_query_workers: usize,
    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let is_production = lookup("APP_ENV").as_deref() == Some("production");
        let default_port = if is_production { "8080" } else { "5001" };

        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is required")?;
        let database = if database_url.contains("://") {
            DatabaseConfig::Url(database_url)
        } else {
            DatabaseConfig::Parts {
                host: database_url,
                port: var("DATABASE_PORT", "5432")
                    .parse()
                    .context("Invalid DATABASE_PORT")?,
                name: lookup("DATABASE_NAME").context("DATABASE_NAME is required")?,
                user: lookup("DATABASE_USERNAME").context("DATABASE_USERNAME is required")?,
                password: lookup("DATABASE_PASSWORD"),
            }
        };

        let cors_origins = match lookup("CORS_ALLOWED_ORIGINS") {
            Some(origins) => origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        Ok(Self {
            host: var("HOST", "0.0.0.0"),
            port: var("PORT", default_port).parse().context("Invalid PORT")?,
            database,
            max_connections: var("DATABASE_MAX_CONNECTIONS", "10")
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            health_query_workers: var(
                "HEALTH_QUERY_WORKERS",
                &dq_monitor_core::aggregate::DEFAULT_WORKERS.to_string(),
            )
            .parse()
            .context("Invalid HEALTH_QUERY_WORKERS")?,
            cors_origins,
        })
    }
}
