use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use marquee_api::{
    api::{create_router, AppState},
    config::{Config, StorageBackend},
    db::{create_redis_client, Cache, KeyValueStore, MemoryStore, RedisStore},
    services::{MovieCatalog, TmdbClient},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("marquee_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn KeyValueStore> = match config.storage_backend {
        StorageBackend::Redis => {
            let client = create_redis_client(&config.redis_url)
                .context("Failed to create Redis client")?;
            Arc::new(RedisStore::new(client))
        }
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    tracing::info!(backend = store.backend(), "Key-value store ready");

    let (cache, cache_handle) = Cache::new(store.clone());
    let catalog: Arc<dyn MovieCatalog> = Arc::new(TmdbClient::new(
        cache,
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
        config.tmdb_image_url.clone(),
        config.catalog_timeout(),
    ));

    let state = AppState::new(catalog, store).with_session_limit(config.max_sessions);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache_handle.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
