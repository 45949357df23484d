use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::db::store::KeyValueStore;
use crate::models::MovieId;

/// Cache keys for catalog responses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Trending(u32),
    Search { query: String, page: u32 },
    MovieDetail(MovieId),
    Recommendations(MovieId),
    Discover(String),
    GenreList,
    Keyword(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Trending(page) => write!(f, "trending:{}", page),
            CacheKey::Search { query, page } => {
                write!(f, "search:{}:{}", query.trim().to_lowercase(), page)
            }
            CacheKey::MovieDetail(id) => write!(f, "movie:{}", id),
            CacheKey::Recommendations(id) => write!(f, "recs:{}", id),
            CacheKey::Discover(signature) => write!(f, "discover:{}", signature),
            CacheKey::GenreList => write!(f, "genres"),
            CacheKey::Keyword(query) => write!(f, "keyword:{}", query.trim().to_lowercase()),
        }
    }
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Read-through cache for catalog responses on top of a key-value store
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn KeyValueStore>,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Signals the writer task to flush queued writes and stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    /// Creates a new Cache and spawns its background writer task
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<dyn KeyValueStore>) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let writer_store = store.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(writer_store, write_rx, shutdown_rx).await;
        });

        let cache = Self { store, write_tx };
        let handle = CacheWriterHandle { shutdown_tx };

        (cache, handle)
    }

    /// Background task that applies queued cache writes
    ///
    /// On shutdown, drains whatever is already queued before exiting.
    async fn cache_writer_task(
        store: Arc<dyn KeyValueStore>,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(backend = store.backend(), "Cache writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    Self::write(store.as_ref(), msg).await;
                }
                _ = shutdown_rx.recv() => {
                    let mut flushed = 0;
                    while let Ok(msg) = write_rx.try_recv() {
                        Self::write(store.as_ref(), msg).await;
                        flushed += 1;
                    }
                    tracing::info!(flushed, "Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write(store: &dyn KeyValueStore, msg: CacheWriteMessage) {
        if let Err(e) = store.set(&msg.key, msg.value, Some(msg.ttl)).await {
            tracing::error!(error = %e, key = %msg.key, "Failed to write to cache");
        }
    }

    /// Retrieves and deserializes a cached value, `None` on a miss
    ///
    /// A failed read or a value that no longer deserializes is logged and counts
    /// as a miss, so the caller falls through to the catalog.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let key = key.to_string();
        match self.store.get_json(&key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Queues a value for caching without waiting for the write
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let msg = CacheWriteMessage {
            key: key.to_string(),
            value: json,
            ttl,
        };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }
}
