//! Error taxonomy for the aggregation engine.
//!
//! Only record-store failures propagate out of a query; blob-store failures
//! on the cache path are downgraded to misses or logged best-effort writes
//! (see [`crate::cache`]). The batch scheduler surfaces cache-write failures
//! per map instead of swallowing them, since warming the cache is its whole
//! purpose.

use thiserror::Error;

/// Record store query/transport failure. Propagated to the caller once;
/// the engine never retries the analytical store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Object-storage transport failure.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("object storage error: {0}")]
    Transport(String),
}

/// Failure while persisting an artifact to the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("artifact encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Blob(#[from] BlobError),
}

/// Top-level error surface of the engine.
///
/// `compute_or_fetch` can only fail with `Store`; `CacheWrite` appears only
/// on the precompute (cache-warming) path, where a failed write means the
/// map was not actually warmed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cache write failed: {0}")]
    CacheWrite(#[from] CacheError),
}
