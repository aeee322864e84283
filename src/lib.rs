//! # Replay Heatmap
//!
//! Spatial analytics and heatmap caching for game-replay telemetry.
//!
//! This library provides:
//! - Position-density and shot-map aggregation over per-match trajectory records
//! - Spawn-side classification via k-means clustering on early-game positions
//! - Per-cell win-rate grids with a statistical-significance floor
//! - A cache-aside artifact store backed by external object storage
//! - Batch precomputation over all known maps with per-map failure isolation
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel spawn-point extraction with rayon
//! - **`http`** - Enable HTTP-backed record store and object storage adapters
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use replay_heatmap::{winrate_grid, MatchRecord, TimedPosition, WorldPoint};
//!
//! // One match that spent 120 samples in a single cell and won.
//! let record = MatchRecord {
//!     map: "canyon".to_string(),
//!     team: 1,
//!     winner_team: 1,
//!     positions: (0..120)
//!         .map(|i| TimedPosition { t: i as f64, pos: WorldPoint::new(5.0, 5.0) })
//!         .collect(),
//!     shots: vec![],
//! };
//!
//! let records = vec![&record];
//! let grid = winrate_grid(&records, 10.0, 100);
//! assert_eq!(grid.cells[0][0].winrate, Some(1.0));
//! ```

use serde::{Deserialize, Serialize};

pub mod artifact;
pub mod cache;
pub mod engine;
pub mod error;
pub mod grid;
pub mod scheduler;
pub mod spawn;
pub mod store;

// HTTP adapters for the record store and object storage
#[cfg(feature = "http")]
pub mod http;

pub use artifact::{ArtifactKind, HeatmapArtifact};
pub use cache::{ArtifactCache, CacheKey, MemoryObjectStore, ObjectStore};
pub use engine::{HeatmapEngine, HeatmapQuery};
pub use error::{BlobError, CacheError, EngineError, StoreError};
pub use grid::{density_grid, winrate_grid, DensityGrid, GridCell, WinrateGrid};
pub use scheduler::{precompute_all, CancelToken, MapOutcome, MapStatus, PrecomputeReport};
pub use spawn::{classify_spawn_sides, spawn_point, SideAssignment};
pub use store::{MemoryRecordStore, RawMatchRow, RecordStore};

#[cfg(feature = "http")]
pub use http::{HttpObjectStore, HttpRecordStore};

// ============================================================================
// Core Types
// ============================================================================

/// A position in planar world coordinates.
///
/// Game maps are flat: coordinates are plain x/y in world units, with no
/// geodesy involved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl WorldPoint {
    /// Create a new world point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Check if the point has finite coordinates.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// True for the exact `(0, 0)` point, which the replay parser emits as
    /// an "unknown position" sentinel on shot endpoints.
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// One trajectory sample: where a vehicle was at `t` seconds into the match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedPosition {
    pub t: f64,
    pub pos: WorldPoint,
}

/// A single shot, from firing position to impact position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    pub origin: WorldPoint,
    pub target: WorldPoint,
}

/// One match as returned by the record store.
///
/// Immutable once built: the engine derives everything else (spawn points,
/// grids, artifacts) without mutating the record. `positions` is sorted by
/// timestamp ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub map: String,
    pub team: i32,
    pub winner_team: i32,
    pub positions: Vec<TimedPosition>,
    pub shots: Vec<Shot>,
}

impl MatchRecord {
    /// Whether the recorded player's team won this match.
    pub fn won(&self) -> bool {
        self.team == self.winner_team
    }
}

/// Axis-aligned bounding box in world coordinates.
///
/// Always derived from the data itself, never from map metadata: the samples
/// may not span the full map, and downstream renderers get the box used for
/// binning so grid indices map back to world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Create bounds from world points. Returns `None` for empty input.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a WorldPoint>,
    {
        let mut bounds: Option<Bounds> = None;
        for p in points {
            let b = bounds.get_or_insert(Bounds {
                min_x: p.x,
                min_y: p.y,
                max_x: p.x,
                max_y: p.y,
            });
            b.min_x = b.min_x.min(p.x);
            b.min_y = b.min_y.min(p.y);
            b.max_x = b.max_x.max(p.x);
            b.max_y = b.max_y.max(p.y);
        }
        bounds
    }

    /// Bounding box of every position sample across the given records.
    pub fn from_records<'a, I>(records: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a MatchRecord>,
    {
        Self::from_points(
            records
                .into_iter()
                .flat_map(|r| r.positions.iter().map(|s| &s.pos)),
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check whether a point falls inside the box (inclusive).
    pub fn contains(&self, p: &WorldPoint) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

/// Configuration for the aggregation pipeline.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Grid cell edge length in world units.
    /// Default: 10.0
    pub bin_size: f64,

    /// Minimum samples a cell needs before its win rate is reported.
    /// Cells below the floor are "no data", never 0%. Default: 100
    pub min_samples: u32,

    /// Center of the early-game window used for spawn-point extraction,
    /// in seconds from match start. Default: 30.0
    pub spawn_time: f64,

    /// Half-width of the spawn window in seconds. Default: 2.0
    pub spawn_window: f64,

    /// Which of the two spawn-side clusters win-rate analytics select.
    /// The side ids are an arbitrary per-call labeling (see [`spawn`]),
    /// so this picks "one of the two bases", not a specific team.
    /// Default: 0
    pub analyzed_side: u8,

    /// Iteration cap for the k-means side clustering. Default: 32
    pub kmeans_max_iters: u32,

    /// Concurrency cap for batch precomputation. Default: 8
    pub precompute_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bin_size: 10.0,
            min_samples: 100,
            spawn_time: 30.0,
            spawn_window: 2.0,
            analyzed_side: 0,
            kmeans_max_iters: 32,
            precompute_concurrency: 8,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_point_validation() {
        assert!(WorldPoint::new(5.0, -3.0).is_valid());
        assert!(!WorldPoint::new(f64::NAN, 0.0).is_valid());
        assert!(!WorldPoint::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_zero_sentinel() {
        assert!(WorldPoint::new(0.0, 0.0).is_zero());
        assert!(!WorldPoint::new(0.0, 0.1).is_zero());
    }

    #[test]
    fn test_bounds_from_points() {
        let points = [
            WorldPoint::new(-10.0, 4.0),
            WorldPoint::new(25.0, -8.0),
            WorldPoint::new(0.0, 0.0),
        ];
        let bounds = Bounds::from_points(points.iter()).unwrap();
        assert_eq!(bounds.min_x, -10.0);
        assert_eq!(bounds.max_x, 25.0);
        assert_eq!(bounds.min_y, -8.0);
        assert_eq!(bounds.max_y, 4.0);
        assert_eq!(bounds.width(), 35.0);
        assert_eq!(bounds.height(), 12.0);
    }

    #[test]
    fn test_bounds_empty_input() {
        assert!(Bounds::from_points(std::iter::empty::<&WorldPoint>()).is_none());
    }

    #[test]
    fn test_match_record_won() {
        let record = MatchRecord {
            map: "m".to_string(),
            team: 2,
            winner_team: 2,
            positions: vec![],
            shots: vec![],
        };
        assert!(record.won());
    }
}
