//! HTTP adapters for the record store and object storage.
//!
//! These adapters speak plain JSON-over-HTTP:
//! - the record store exposes `GET /records?map=..&name=..` returning raw
//!   match rows, and `GET /maps` returning the distinct map list
//! - the blob service exposes `HEAD`/`GET`/`PUT` per key
//!
//! Transport errors and 429 responses are retried with exponential backoff,
//! up to a small bounded number of attempts; after that the error propagates
//! to the caller, which must not retry indefinitely itself.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::cache::ObjectStore;
use crate::error::{BlobError, StoreError};
use crate::store::{RawMatchRow, RecordStore};
use crate::MatchRecord;

const MAX_RETRIES: u32 = 3;
const RETRY_BASE_MS: u64 = 200;
const REQUEST_TIMEOUT_SECS: u64 = 30;

fn build_client() -> Result<Client, String> {
    Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .tcp_keepalive(Duration::from_secs(30))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| format!("failed to create HTTP client: {e}"))
}

/// Send a request, retrying transport errors and 429s with exponential
/// backoff. Returns the first definitive response (success or not).
async fn send_with_retry<F>(mut request: F, what: &str) -> Result<Response, String>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut retries = 0;
    loop {
        match request().send().await {
            Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(format!("{what}: max retries exceeded (429)"));
                }
                let wait = Duration::from_millis(RETRY_BASE_MS * (1 << retries));
                warn!("[Http] {what}: 429, retry {retries} after {wait:?}");
                tokio::time::sleep(wait).await;
            }
            Ok(resp) => return Ok(resp),
            Err(e) => {
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(format!("{what}: {e}"));
                }
                let wait = Duration::from_millis(RETRY_BASE_MS * (1 << retries));
                warn!("[Http] {what}: {e}, retry {retries} after {wait:?}");
                tokio::time::sleep(wait).await;
            }
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

// ============================================================================
// Record store
// ============================================================================

/// Record store backed by the analytical query service's REST surface.
pub struct HttpRecordStore {
    client: Client,
    base_url: String,
}

impl HttpRecordStore {
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let client = build_client().map_err(StoreError::Unavailable)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, StoreError> {
        let url = join_url(&self.base_url, path);
        let resp = send_with_retry(
            || self.client.get(&url).query(query),
            &format!("GET {path}"),
        )
        .await
        .map_err(StoreError::Unavailable)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StoreError::Unavailable(format!("GET {path}: HTTP {status}")));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| StoreError::Unavailable(format!("GET {path}: body error: {e}")))?;
        debug!("[Http] GET {path}: {} bytes", bytes.len());
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Unavailable(format!("GET {path}: parse error: {e}")))
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn fetch(
        &self,
        map: &str,
        player: Option<&str>,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let mut query: Vec<(&str, &str)> = vec![("map", map)];
        if let Some(name) = player {
            query.push(("name", name));
        }
        let rows: Vec<RawMatchRow> = self.get_json("records", &query).await?;
        Ok(rows.into_iter().map(RawMatchRow::into_record).collect())
    }

    async fn list_maps(&self) -> Result<Vec<String>, StoreError> {
        self.get_json("maps", &[]).await
    }
}

// ============================================================================
// Object storage
// ============================================================================

/// Object storage client speaking plain `HEAD`/`GET`/`PUT` against a blob
/// service.
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: &str) -> Result<Self, BlobError> {
        let client = build_client().map_err(BlobError::Transport)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn blob_url(&self, key: &str) -> String {
        join_url(&self.base_url, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, BlobError> {
        let url = self.blob_url(key);
        let resp = send_with_retry(|| self.client.head(&url), &format!("HEAD {key}"))
            .await
            .map_err(BlobError::Transport)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(BlobError::Transport(format!("HEAD {key}: HTTP {status}"))),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let url = self.blob_url(key);
        let resp = send_with_retry(|| self.client.get(&url), &format!("GET {key}"))
            .await
            .map_err(BlobError::Transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(BlobError::Transport(format!("GET {key}: HTTP {status}")));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| BlobError::Transport(format!("GET {key}: body error: {e}")))?;
        debug!("[Http] GET {key}: {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), BlobError> {
        let url = self.blob_url(key);
        let content_type = content_type.to_string();
        let resp = send_with_retry(
            || {
                self.client
                    .put(&url)
                    .header("Content-Type", content_type.clone())
                    .body(bytes.clone())
            },
            &format!("PUT {key}"),
        )
        .await
        .map_err(BlobError::Transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(BlobError::Transport(format!("PUT {key}: HTTP {status}")));
        }
        debug!("[Http] PUT {key}: {} bytes", bytes.len());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_normalizes_slashes() {
        assert_eq!(join_url("http://s/", "/maps"), "http://s/maps");
        assert_eq!(join_url("http://s", "maps"), "http://s/maps");
        assert_eq!(
            join_url("http://s/blobs/", "Heatmaps/heatmap_canyon"),
            "http://s/blobs/Heatmaps/heatmap_canyon"
        );
    }
}
