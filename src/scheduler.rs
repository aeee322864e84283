//! Batch precomputation over all known maps.
//!
//! Warms the artifact cache out-of-band: every map the record store knows is
//! recomputed and force-written, skipping the cache read path. Failures are
//! isolated per map: one bad map never aborts the batch and is not retried
//! within the run, and every map gets exactly one entry in the outcome
//! report. Maps are independent, so they run with bounded concurrency;
//! parallelism affects wall-clock time only.
//!
//! Cancellation is cooperative: the flag is checked before a map starts, and
//! a map already in flight runs to completion (its work is not observable
//! until its write lands).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{info, warn};

use crate::engine::HeatmapEngine;
use crate::error::EngineError;

/// Cooperative cancellation flag for a precomputation run.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of one map within a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapStatus {
    /// Every artifact kind was computed and written.
    Success,
    /// The map failed (store error, write error); the rest of the batch
    /// still ran.
    Error(String),
    /// The run was cancelled before this map started.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapOutcome {
    pub map: String,
    pub status: MapStatus,
}

/// Per-map outcome report for a batch run.
#[derive(Debug, Clone, Default)]
pub struct PrecomputeReport {
    pub outcomes: Vec<MapOutcome>,
}

impl PrecomputeReport {
    pub fn successes(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == MapStatus::Success)
            .count()
    }

    pub fn errors(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, MapStatus::Error(_)))
            .count()
    }

    pub fn cancelled(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == MapStatus::Cancelled)
            .count()
    }
}

/// Recompute and force-write the global artifacts for every known map.
///
/// Only the initial map enumeration can fail the run as a whole; after that,
/// per-map failures are recorded and processing continues.
pub async fn precompute_all(
    engine: &HeatmapEngine,
    cancel: &CancelToken,
) -> Result<PrecomputeReport, EngineError> {
    let maps = engine.store().list_maps().await?;
    let concurrency = engine.config().precompute_concurrency.max(1);
    info!(
        "[Scheduler] precomputing {} maps (concurrency {})",
        maps.len(),
        concurrency
    );

    let outcomes: Vec<MapOutcome> = stream::iter(maps)
        .map(|map| async move {
            if cancel.is_cancelled() {
                return MapOutcome {
                    map,
                    status: MapStatus::Cancelled,
                };
            }
            match engine.precompute_map(&map).await {
                Ok(()) => {
                    info!("[Scheduler] map {map} done");
                    MapOutcome {
                        map,
                        status: MapStatus::Success,
                    }
                }
                Err(e) => {
                    warn!("[Scheduler] map {map} failed: {e}");
                    MapOutcome {
                        map,
                        status: MapStatus::Error(e.to_string()),
                    }
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    info!(
        "[Scheduler] done: {} ok, {} failed, {} cancelled",
        outcomes.iter().filter(|o| o.status == MapStatus::Success).count(),
        outcomes
            .iter()
            .filter(|o| matches!(o.status, MapStatus::Error(_)))
            .count(),
        outcomes.iter().filter(|o| o.status == MapStatus::Cancelled).count(),
    );

    Ok(PrecomputeReport { outcomes })
}

// ============================================================================
// Tests
// ============================================================================
