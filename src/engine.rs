//! The aggregation pipeline and its request surface.
//!
//! A query names a map (required), an optional player filter, a caching
//! hint, and an artifact kind. Global queries go through the cache-aside
//! path; player-filtered queries always hit the record store directly and
//! are never cached. The caller sees either a complete artifact or a single
//! error, never a partial grid.

use std::sync::Arc;

use log::{debug, info};

use crate::artifact::{ArtifactKind, HeatmapArtifact};
use crate::cache::{ArtifactCache, CacheKey, ObjectStore};
use crate::error::EngineError;
use crate::grid::{density_grid, winrate_grid};
use crate::spawn::classify_spawn_sides;
use crate::store::RecordStore;
use crate::{EngineConfig, MatchRecord, Shot};

/// A single artifact request.
#[derive(Debug, Clone)]
pub struct HeatmapQuery {
    pub map: String,
    /// Exact player-name filter. `None` or an empty string selects all
    /// players (a global query).
    pub player: Option<String>,
    /// When false, the cache read path is skipped; a fresh compute is still
    /// written back for global queries.
    pub use_cache: bool,
    pub kind: ArtifactKind,
}

impl HeatmapQuery {
    /// A cached global query.
    pub fn global(map: &str, kind: ArtifactKind) -> Self {
        Self {
            map: map.to_string(),
            player: None,
            use_cache: true,
            kind,
        }
    }

    /// A player-filtered query. Bypasses the cache in both directions.
    pub fn for_player(map: &str, kind: ArtifactKind, player: &str) -> Self {
        Self {
            map: map.to_string(),
            player: Some(player.to_string()),
            use_cache: true,
            kind,
        }
    }

    fn player_filter(&self) -> Option<&str> {
        self.player.as_deref().filter(|p| !p.is_empty())
    }
}

/// The heatmap engine: record store in, artifacts out.
pub struct HeatmapEngine {
    store: Arc<dyn RecordStore>,
    cache: ArtifactCache,
    config: EngineConfig,
}

impl HeatmapEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn ObjectStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            cache: ArtifactCache::new(blobs),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Serve one query: from the cache when possible, otherwise by fetching
    /// records and aggregating.
    ///
    /// An empty result set is not an error; it yields an artifact with an
    /// empty grid and `games == 0`.
    pub async fn compute_or_fetch(
        &self,
        query: &HeatmapQuery,
    ) -> Result<HeatmapArtifact, EngineError> {
        let player = query.player_filter();
        let key = match player {
            None => CacheKey::global(&query.map, query.kind),
            Some(_) => CacheKey::per_player(&query.map, query.kind),
        };
        debug!(
            "[Engine] {} query for map={} player={:?} cache={}",
            query.kind, query.map, player, query.use_cache
        );

        self.cache
            .get_or_compute(&key, query.use_cache, || async move {
                let records = self.store.fetch(&query.map, player).await?;
                info!(
                    "[Engine] aggregating {} records for map={} kind={}",
                    records.len(),
                    query.map,
                    query.kind
                );
                Ok(self.build_artifact(&query.map, query.kind, &records))
            })
            .await
    }

    /// Recompute the global artifacts for one map and force-write them,
    /// bypassing the cache read path. This is the cache-warming path used by
    /// the scheduler; unlike the query path, a failed write is an error.
    pub async fn precompute_map(&self, map: &str) -> Result<(), EngineError> {
        let records = self.store.fetch(map, None).await?;
        for kind in ArtifactKind::ALL {
            let artifact = self.build_artifact(map, kind, &records);
            self.cache
                .force_put(&CacheKey::global(map, kind), &artifact)
                .await?;
        }
        Ok(())
    }

    fn build_artifact(
        &self,
        map: &str,
        kind: ArtifactKind,
        records: &[MatchRecord],
    ) -> HeatmapArtifact {
        let games = records.len() as u32;
        match kind {
            ArtifactKind::Positions => {
                let refs: Vec<&MatchRecord> = records.iter().collect();
                HeatmapArtifact::Positions {
                    map: map.to_string(),
                    games,
                    grid: density_grid(&refs, self.config.bin_size),
                }
            }
            ArtifactKind::Shots => HeatmapArtifact::Shots {
                map: map.to_string(),
                games,
                shots: collect_shots(records),
            },
            ArtifactKind::Winrate => {
                let assignment = classify_spawn_sides(records, &self.config);
                let side = self.config.analyzed_side;
                let selected = assignment.select(records, side);
                HeatmapArtifact::Winrate {
                    map: map.to_string(),
                    games,
                    side,
                    grid: winrate_grid(&selected, self.config.bin_size, self.config.min_samples),
                }
            }
        }
    }
}

/// All shots across the records, with the parser's `(0, 0)` "unknown
/// position" sentinel dropped from either endpoint.
fn collect_shots(records: &[MatchRecord]) -> Vec<Shot> {
    records
        .iter()
        .flat_map(|r| r.shots.iter())
        .filter(|s| !s.origin.is_zero() && !s.target.is_zero())
        .copied()
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryObjectStore;
    use crate::store::MemoryRecordStore;
    use crate::{TimedPosition, WorldPoint};

    fn record(map: &str, team: i32, winner: i32, samples: Vec<(f64, f64, f64)>) -> MatchRecord {
        MatchRecord {
            map: map.to_string(),
            team,
            winner_team: winner,
            positions: samples
                .into_iter()
                .map(|(t, x, y)| TimedPosition {
                    t,
                    pos: WorldPoint::new(x, y),
                })
                .collect(),
            shots: vec![],
        }
    }

    fn engine_with(
        store: MemoryRecordStore,
    ) -> (HeatmapEngine, Arc<MemoryObjectStore>) {
        let blobs = Arc::new(MemoryObjectStore::new());
        let engine = HeatmapEngine::new(
            Arc::new(store),
            blobs.clone(),
            EngineConfig::default(),
        );
        (engine, blobs)
    }

    #[tokio::test]
    async fn test_empty_data_set_is_not_an_error() {
        let (engine, _) = engine_with(MemoryRecordStore::new());
        let artifact = engine
            .compute_or_fetch(&HeatmapQuery::global("void", ArtifactKind::Winrate))
            .await
            .unwrap();
        match artifact {
            HeatmapArtifact::Winrate { games, grid, .. } => {
                assert_eq!(games, 0);
                assert!(grid.bounds.is_none());
                assert!(grid.cells.is_empty());
            }
            other => panic!("unexpected artifact {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_store_failure_propagates_once() {
        let mut store = MemoryRecordStore::new();
        store.fail_map("canyon", "backend down");
        let (engine, blobs) = engine_with(store);
        let err = engine
            .compute_or_fetch(&HeatmapQuery::global("canyon", ArtifactKind::Positions))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));
        // A failed compute must not leave a blob behind.
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn test_empty_player_filter_is_global() {
        let mut store = MemoryRecordStore::new();
        store.insert(record("canyon", 1, 1, vec![(30.0, 5.0, 5.0)]));
        let (engine, blobs) = engine_with(store);

        let query = HeatmapQuery {
            map: "canyon".to_string(),
            player: Some(String::new()),
            use_cache: true,
            kind: ArtifactKind::Positions,
        };
        engine.compute_or_fetch(&query).await.unwrap();
        // Treated as global: the artifact was cached.
        assert_eq!(blobs.len(), 1);
        assert!(blobs.blob("Heatmaps/heatmap_canyon").is_some());
    }

    #[tokio::test]
    async fn test_player_query_bypasses_cache_even_when_warm() {
        let mut store = MemoryRecordStore::new();
        store.insert(record("canyon", 1, 1, vec![(30.0, 5.0, 5.0)]));
        store.insert_for("alice", record("canyon", 2, 1, vec![(30.0, 95.0, 95.0)]));
        let (engine, blobs) = engine_with(store);

        // Warm the global entry.
        engine
            .compute_or_fetch(&HeatmapQuery::global("canyon", ArtifactKind::Positions))
            .await
            .unwrap();
        let reads_after_warm = blobs.read_count();
        let puts_after_warm = blobs.put_count();

        let artifact = engine
            .compute_or_fetch(&HeatmapQuery::for_player(
                "canyon",
                ArtifactKind::Positions,
                "alice",
            ))
            .await
            .unwrap();

        // Alice's single record, not the cached global artifact.
        assert_eq!(artifact.games(), 1);
        assert_eq!(blobs.read_count(), reads_after_warm);
        assert_eq!(blobs.put_count(), puts_after_warm);
    }

    #[tokio::test]
    async fn test_shot_sentinels_are_dropped() {
        let mut store = MemoryRecordStore::new();
        let mut r = record("canyon", 1, 1, vec![]);
        r.shots = vec![
            Shot {
                origin: WorldPoint::new(1.0, 1.0),
                target: WorldPoint::new(2.0, 2.0),
            },
            Shot {
                origin: WorldPoint::new(0.0, 0.0),
                target: WorldPoint::new(2.0, 2.0),
            },
            Shot {
                origin: WorldPoint::new(1.0, 1.0),
                target: WorldPoint::new(0.0, 0.0),
            },
        ];
        store.insert(r);
        let (engine, _) = engine_with(store);

        let artifact = engine
            .compute_or_fetch(&HeatmapQuery::global("canyon", ArtifactKind::Shots))
            .await
            .unwrap();
        match artifact {
            HeatmapArtifact::Shots { shots, .. } => assert_eq!(shots.len(), 1),
            other => panic!("unexpected artifact {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_winrate_artifact_uses_selected_side_only() {
        let mut store = MemoryRecordStore::new();
        // Two well-separated spawn clusters; both sides win their matches.
        for i in 0..3 {
            let mut samples = vec![(30.0, 0.0, 0.0)];
            samples.extend(vec![(60.0 + i as f64, 5.0, 5.0); 120]);
            store.insert(record("canyon", 1, 1, samples));
        }
        for i in 0..3 {
            let mut samples = vec![(30.0, 1000.0, 1000.0)];
            samples.extend(vec![(60.0 + i as f64, 995.0, 995.0); 120]);
            store.insert(record("canyon", 2, 1, samples));
        }
        let (engine, _) = engine_with(store);

        let artifact = engine
            .compute_or_fetch(&HeatmapQuery::global("canyon", ArtifactKind::Winrate))
            .await
            .unwrap();
        match artifact {
            HeatmapArtifact::Winrate { games, grid, .. } => {
                assert_eq!(games, 6);
                // Only one cluster's records were binned: the grid spans one
                // corner of the world, not the full 0..1000 extent.
                let bounds = grid.bounds.unwrap();
                assert!(bounds.width() < 500.0);
                assert!(bounds.height() < 500.0);
            }
            other => panic!("unexpected artifact {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_precompute_map_writes_all_kinds() {
        let mut store = MemoryRecordStore::new();
        store.insert(record("canyon", 1, 1, vec![(30.0, 5.0, 5.0)]));
        let (engine, blobs) = engine_with(store);

        engine.precompute_map("canyon").await.unwrap();
        assert!(blobs.blob("Heatmaps/heatmap_canyon").is_some());
        assert!(blobs.blob("Shotmaps/shotmap_canyon").is_some());
        assert!(blobs.blob("Winrates/winrate_canyon").is_some());
    }
}
