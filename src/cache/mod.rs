use crate::models::ModMetadata;
use lru::LruCache;
use serde::Serialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Raw blobs are bounded; metadata is tiny and lives for the session.
/// Evicting a blob is safe because the emitter falls back to a fresh fetch.
const BLOB_CACHE_SIZE: usize = 64;

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub metadata_entries: usize,
    pub blob_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Memoizes `source key -> (metadata, raw bytes)` so repeated analysis
/// and the final emit never re-download or re-parse the same archive
pub struct MetadataCache {
    metadata: Arc<RwLock<HashMap<String, Arc<ModMetadata>>>>,
    blobs: Arc<RwLock<LruCache<String, Arc<Vec<u8>>>>>,
    hits: Arc<RwLock<u64>>,
    misses: Arc<RwLock<u64>>,
}

/// Cache key for an entry inside a loaded pack archive
pub fn local_key(pack_id: Uuid, path: &str) -> String {
    format!("local:{pack_id}:{path}")
}

/// The cache key a file record resolves under: its first download url
/// for remote files, a pack-scoped entry key for local ones
pub fn source_key(file: &crate::models::FileRecord) -> Option<String> {
    match &file.origin {
        crate::models::FileOrigin::Remote { urls, .. } => urls.first().cloned(),
        crate::models::FileOrigin::Local { entry } => Some(local_key(file.pack_id, entry)),
    }
}

impl MetadataCache {
    pub fn new() -> Self {
        Self {
            metadata: Arc::new(RwLock::new(HashMap::new())),
            blobs: Arc::new(RwLock::new(LruCache::new(
                NonZeroUsize::new(BLOB_CACHE_SIZE).unwrap(),
            ))),
            hits: Arc::new(RwLock::new(0)),
            misses: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<ModMetadata>> {
        let cache = self.metadata.read().await;
        if let Some(metadata) = cache.get(key) {
            *self.hits.write().await += 1;
            tracing::debug!("metadata cache HIT for {key}");
            Some(Arc::clone(metadata))
        } else {
            *self.misses.write().await += 1;
            tracing::debug!("metadata cache MISS for {key}");
            None
        }
    }

    pub async fn insert(&self, key: String, metadata: ModMetadata, raw: Option<Vec<u8>>) {
        if let Some(bytes) = raw {
            let mut blobs = self.blobs.write().await;
            blobs.put(key.clone(), Arc::new(bytes));
        }
        let mut cache = self.metadata.write().await;
        cache.insert(key, Arc::new(metadata));
    }

    /// Raw bytes for a key, when still resident
    pub async fn get_blob(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        let mut blobs = self.blobs.write().await;
        blobs.get(key).map(Arc::clone)
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            metadata_entries: self.metadata.read().await.len(),
            blob_entries: self.blobs.read().await.len(),
            hits: *self.hits.read().await,
            misses: *self.misses.read().await,
        }
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MetadataCache {
    fn clone(&self) -> Self {
        Self {
            metadata: Arc::clone(&self.metadata),
            blobs: Arc::clone(&self.blobs),
            hits: Arc::clone(&self.hits),
            misses: Arc::clone(&self.misses),
        }
    }
}
