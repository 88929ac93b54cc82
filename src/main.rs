use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rig_telemetry::{
    api::{self, AppState},
    config::{Config, StorageBackend},
    db::{self, memory::MemoryStore, postgres::PgStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let state = match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let pool =
                db::create_pool(url, config.db_max_connections, config.db_connect_timeout).await?;
            db::run_migrations(&pool).await?;
            info!("Database ready");

            let store = Arc::new(PgStore::new(pool));
            AppState::new(
                store.clone(),
                store,
                config.status_temperature_count,
                config.history,
            )
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; all data is lost on shutdown");
            AppState::with_store(
                MemoryStore::new(),
                config.status_temperature_count,
                config.history,
            )
        }
    };

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on SIGINT or SIGTERM. If a handler cannot be installed that
/// source is skipped and the server keeps running on the other one.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
        "SIGINT"
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
        "SIGTERM"
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    let received = tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    };
    info!(signal = received, "Draining connections before exit");
}
