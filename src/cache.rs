//! Cache-aside artifact store.
//!
//! Expensive per-map aggregations are serialized once and served from object
//! storage on subsequent identical queries. The protocol is cache-aside with
//! no locking: concurrent callers racing on a cold key may each compute and
//! each write, and the store's whole-object last-writer-wins replace keeps
//! every reader consistent. The guaranteed property is "the stored blob
//! eventually equals some valid compute result", not "exactly one compute
//! occurs". Acceptable for a read-heavy, rarely-contended workload.
//!
//! Cache isolation: only global (no player filter) queries have a blob key.
//! Per-player queries never read from or write to the per-map blob.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use log::{debug, info, warn};

use crate::artifact::{ArtifactKind, HeatmapArtifact, ARTIFACT_CONTENT_TYPE};
use crate::error::{BlobError, CacheError, EngineError};

/// The object-storage surface the cache consumes.
///
/// Writes are atomic whole-object replaces; readers never observe a partial
/// artifact.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, BlobError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError>;
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), BlobError>;
}

/// Cache key: map identity plus query shape.
///
/// The key is a pure function of `(map, kind, global)`. A per-player query
/// produces a non-cacheable key with no storage location at all, so it can
/// neither be served from the global entry nor leak into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub map: String,
    pub kind: ArtifactKind,
    pub global: bool,
}

impl CacheKey {
    /// Key for a global (unfiltered) query. Cacheable.
    pub fn global(map: &str, kind: ArtifactKind) -> Self {
        Self {
            map: map.to_string(),
            kind,
            global: true,
        }
    }

    /// Key for a player-filtered query. Never cached in either direction.
    pub fn per_player(map: &str, kind: ArtifactKind) -> Self {
        Self {
            map: map.to_string(),
            kind,
            global: false,
        }
    }

    /// Blob key, or `None` when this query shape is not cacheable.
    pub fn storage_key(&self) -> Option<String> {
        self.global.then(|| self.kind.storage_key(&self.map))
    }
}

/// Cache-aside manager over an external object store.
pub struct ArtifactCache {
    store: Arc<dyn ObjectStore>,
}

impl ArtifactCache {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Read/compute/write.
    ///
    /// With `use_cache` and a cacheable key, the blob is consulted first and
    /// returned verbatim on a hit. Otherwise `compute` runs and its result is
    /// written back best-effort (for cacheable keys): a failed write is
    /// logged and the freshly computed artifact is still returned.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &CacheKey,
        use_cache: bool,
        compute: F,
    ) -> Result<HeatmapArtifact, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HeatmapArtifact, EngineError>>,
    {
        let blob_key = key.storage_key();

        if use_cache {
            if let Some(k) = blob_key.as_deref() {
                if let Some(artifact) = self.read(k).await {
                    return Ok(artifact);
                }
            }
        }

        let artifact = compute().await?;

        if let Some(k) = blob_key.as_deref() {
            if let Err(e) = self.put_inner(k, &artifact).await {
                warn!("[ArtifactCache] best-effort write to {k} failed: {e}");
            }
        }

        Ok(artifact)
    }

    /// Write an artifact unconditionally, bypassing the read path. The
    /// cache-warming path: here a failed write is an error, not best-effort.
    pub async fn force_put(
        &self,
        key: &CacheKey,
        artifact: &HeatmapArtifact,
    ) -> Result<(), CacheError> {
        match key.storage_key() {
            Some(k) => self.put_inner(&k, artifact).await,
            None => Ok(()),
        }
    }

    /// Read path. Every failure mode (missing blob, transport error,
    /// corrupt payload) is a miss; the corrupt case is overwritten by the
    /// next successful write.
    async fn read(&self, key: &str) -> Option<HeatmapArtifact> {
        match self.store.exists(key).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("[ArtifactCache] miss {key}");
                return None;
            }
            Err(e) => {
                warn!("[ArtifactCache] exists({key}) failed: {e}; treating as miss");
                return None;
            }
        }

        let bytes = match self.store.get(key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("[ArtifactCache] get({key}) failed: {e}; treating as miss");
                return None;
            }
        };

        match HeatmapArtifact::from_bytes(&bytes) {
            Ok(artifact) => {
                info!("[ArtifactCache] hit {key} ({} bytes)", bytes.len());
                Some(artifact)
            }
            Err(e) => {
                warn!("[ArtifactCache] corrupt blob at {key}: {e}; recomputing");
                None
            }
        }
    }

    async fn put_inner(&self, key: &str, artifact: &HeatmapArtifact) -> Result<(), CacheError> {
        let bytes = artifact.to_bytes()?;
        self.store
            .put(key, bytes, ARTIFACT_CONTENT_TYPE)
            .await?;
        debug!("[ArtifactCache] wrote {key}");
        Ok(())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory object store for tests and demos.
///
/// Tracks read/write counts so tests can assert cache-isolation properties.
#[derive(Default)]
pub struct MemoryObjectStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    exists_calls: AtomicU32,
    gets: AtomicU32,
    puts: AtomicU32,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw blob contents, if present.
    pub fn blob(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().expect("store poisoned").get(key).cloned()
    }

    /// Plant raw bytes at a key (e.g. a corrupt blob).
    pub fn insert_raw(&self, key: &str, bytes: Vec<u8>) {
        self.blobs
            .lock()
            .expect("store poisoned")
            .insert(key.to_string(), bytes);
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().expect("store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read_count(&self) -> u32 {
        self.exists_calls.load(Ordering::Relaxed) + self.gets.load(Ordering::Relaxed)
    }

    pub fn put_count(&self) -> u32 {
        self.puts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, BlobError> {
        self.exists_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.blobs.lock().expect("store poisoned").contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.blobs
            .lock()
            .expect("store poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::Transport(format!("no blob at {key}")))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), BlobError> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.blobs
            .lock()
            .expect("store poisoned")
            .insert(key.to_string(), bytes);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
