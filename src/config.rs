use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};

// ---------------------------------------------------------------------------
// StorageBackend
// ---------------------------------------------------------------------------

/// Which storage adapter the services are wired to at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Volatile, process-local storage. Useful for bench setups without a database.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("unknown storage backend: {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    /// `None` only when `storage_backend` is `Memory`.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_connect_timeout: Duration,
    pub server_host: String,
    pub server_port: u16,
    /// Number of most recent temperature readings included in `GET /status`.
    pub status_temperature_count: i64,
    pub history: HistoryLimits,
}

/// Bounds applied to `GET /temperature_history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let storage_backend: StorageBackend = optional("STORAGE_BACKEND", "postgres")
            .parse()
            .context("STORAGE_BACKEND must be `postgres` or `memory`")?;

        let database_url = match storage_backend {
            StorageBackend::Postgres => Some(database_url_from_env()?),
            StorageBackend::Memory => None,
        };

        let history = HistoryLimits {
            default_limit: parse_positive("HISTORY_DEFAULT_LIMIT", "100")?,
            max_limit: parse_positive("HISTORY_MAX_LIMIT", "1000")?,
        };
        if history.default_limit > history.max_limit {
            anyhow::bail!("HISTORY_DEFAULT_LIMIT must not exceed HISTORY_MAX_LIMIT");
        }

        Ok(Self {
            storage_backend,
            database_url,
            db_max_connections: optional("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
            db_connect_timeout: Duration::from_secs(
                optional("DB_CONNECT_TIMEOUT_SECS", "5")
                    .parse()
                    .context("DB_CONNECT_TIMEOUT_SECS must be a positive integer")?,
            ),
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            status_temperature_count: parse_positive("STATUS_TEMPERATURE_COUNT", "8")?,
            history,
        })
    }
}

/// `DATABASE_URL` wins; otherwise the URL is assembled from the `DB_*` parts.
fn database_url_from_env() -> Result<String> {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        return Ok(url);
    }

    let user = required("DB_USER").context("set DATABASE_URL or the DB_* variables")?;
    let pass = required("DB_PASS").context("set DATABASE_URL or the DB_* variables")?;
    let name = required("DB_NAME").context("set DATABASE_URL or the DB_* variables")?;
    let server = optional("DB_SERVER", "localhost");

    Ok(assemble_database_url(&user, &pass, &server, &name))
}

fn assemble_database_url(user: &str, pass: &str, server: &str, name: &str) -> String {
    format!("postgres://{user}:{pass}@{server}/{name}")
}

fn parse_positive(key: &str, default: &str) -> Result<i64> {
    let value: i64 = optional(key, default)
        .parse()
        .with_context(|| format!("{key} must be a positive integer"))?;
    if value < 1 {
        anyhow::bail!("{key} must be a positive integer, got {value}");
    }
    Ok(value)
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
