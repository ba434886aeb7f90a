use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pixxor_api::config::{self, AppConfig};
use pixxor_api::database::{DatabaseManager, MemoryStore, PgStore, Store};
use pixxor_api::storage::{BlobStore, FsBlobStore, MemoryBlobStore};
use pixxor_api::{app, is_development, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pixxor_api=info,tower_http=info")),
        )
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    info!("Starting pixxor API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        bail!("JWT_SECRET must be set outside development");
    }

    let state = AppState::new(open_store(config).await?, open_blobs(config).await?);
    let app = app(state);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("pixxor API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
    if config.database.url.is_none() {
        if !is_development!() {
            bail!("DATABASE_URL is required outside development");
        }
        warn!("DATABASE_URL not set, using the in-memory store (data is lost on restart)");
        return Ok(Arc::new(MemoryStore::default()));
    }

    let pool = DatabaseManager::connect(&config.database).await?;
    let store = PgStore::new(pool);
    store.migrate().await?;
    Ok(Arc::new(store))
}

async fn open_blobs(config: &AppConfig) -> Result<Arc<dyn BlobStore>> {
    match &config.storage.root {
        Some(root) => {
            let blobs = FsBlobStore::open(root)
                .await
                .with_context(|| format!("failed to open storage root {}", root.display()))?;
            info!("Storing files under {}", blobs.root().display());
            Ok(Arc::new(blobs))
        }
        None => {
            warn!("STORAGE_ROOT not set, keeping uploaded files in memory");
            Ok(Arc::new(MemoryBlobStore::new()))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
