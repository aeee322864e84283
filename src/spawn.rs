//! Spawn-side classification.
//!
//! Matches are partitioned into the two bases of a map by clustering the
//! centroid of each match's early-game positions with k-means (k=2). Spawn
//! location, not the declared team number, is the separating signal: it
//! works on any map geometry without team-label bookkeeping.
//!
//! ## Side ids are advisory
//!
//! The side ids {0, 1} are a per-call labeling. Centroid seeding is random,
//! so the same base may come out as side 0 in one run and side 1 in the
//! next. Callers that need stable team-labeled output must additionally
//! correlate with the record's own `team` field.

use log::{debug, warn};
use rand::Rng;

use crate::{EngineConfig, MatchRecord, WorldPoint};

/// Side assignment for the records that produced a spawn point.
///
/// Records whose position samples never fall inside the spawn window have no
/// spawn point and are excluded from side-clustered analytics.
#[derive(Debug, Clone)]
pub struct SideAssignment {
    /// Indices into the input slice, in input order.
    pub indices: Vec<usize>,
    /// Cluster id (0 or 1) per surviving record, parallel to `indices`.
    pub sides: Vec<u8>,
}

impl SideAssignment {
    /// Records assigned to `side`, in input order.
    pub fn select<'a>(&self, records: &'a [MatchRecord], side: u8) -> Vec<&'a MatchRecord> {
        self.indices
            .iter()
            .zip(&self.sides)
            .filter(|(_, s)| **s == side)
            .map(|(i, _)| &records[*i])
            .collect()
    }

    /// Number of records that survived spawn-point extraction.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Average position over the spawn window
/// `[spawn_time - spawn_window, spawn_time + spawn_window]`.
///
/// Returns `None` when no sample falls inside the window.
pub fn spawn_point(record: &MatchRecord, config: &EngineConfig) -> Option<WorldPoint> {
    let min_t = config.spawn_time - config.spawn_window;
    let max_t = config.spawn_time + config.spawn_window;

    let mut count = 0usize;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for sample in &record.positions {
        if sample.t >= min_t && sample.t <= max_t {
            sum_x += sample.pos.x;
            sum_y += sample.pos.y;
            count += 1;
        }
    }

    if count == 0 {
        None
    } else {
        Some(WorldPoint::new(sum_x / count as f64, sum_y / count as f64))
    }
}

/// Partition records into two spawn sides.
///
/// Records without a spawn point are dropped. With fewer than two distinct
/// spawn points the clustering is degenerate: everything is assigned to
/// side 0 and a warning is logged.
pub fn classify_spawn_sides(records: &[MatchRecord], config: &EngineConfig) -> SideAssignment {
    #[cfg(feature = "parallel")]
    let spawns: Vec<Option<WorldPoint>> = {
        use rayon::prelude::*;
        records.par_iter().map(|r| spawn_point(r, config)).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let spawns: Vec<Option<WorldPoint>> =
        records.iter().map(|r| spawn_point(r, config)).collect();

    let mut indices = Vec::new();
    let mut points = Vec::new();
    for (i, spawn) in spawns.iter().enumerate() {
        if let Some(p) = spawn {
            indices.push(i);
            points.push(*p);
        }
    }

    debug!(
        "[SpawnClassifier] {} of {} records have a spawn point",
        indices.len(),
        records.len()
    );

    let degenerate = points.len() < 2 || points.iter().all(|p| *p == points[0]);
    if degenerate {
        if !points.is_empty() {
            warn!(
                "[SpawnClassifier] fewer than 2 distinct spawn points ({} records); \
                 treating all records as one side",
                points.len()
            );
        }
        let sides = vec![0u8; indices.len()];
        return SideAssignment { indices, sides };
    }

    let sides = kmeans2(&points, config.kmeans_max_iters);
    SideAssignment { indices, sides }
}

fn dist2(a: &WorldPoint, b: &WorldPoint) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

fn farthest_from(points: &[WorldPoint], from: &WorldPoint) -> WorldPoint {
    let mut best = points[0];
    let mut best_d = dist2(&best, from);
    for p in &points[1..] {
        let d = dist2(p, from);
        if d > best_d {
            best = *p;
            best_d = d;
        }
    }
    best
}

/// Lloyd's k-means with k=2 and Euclidean distance.
///
/// Seeded with a random point plus the point farthest from it, which for the
/// two-base geometry of game maps already lands near the optimum. Caller
/// guarantees at least two distinct points.
fn kmeans2(points: &[WorldPoint], max_iters: u32) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let first = points[rng.gen_range(0..points.len())];
    let second = farthest_from(points, &first);
    let mut centroids = [first, second];

    let mut sides = vec![0u8; points.len()];
    for iteration in 0..max_iters {
        let mut changed = iteration == 0;
        for (i, p) in points.iter().enumerate() {
            let side = if dist2(p, &centroids[0]) <= dist2(p, &centroids[1]) {
                0
            } else {
                1
            };
            if sides[i] != side {
                sides[i] = side;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        for cluster in 0..2u8 {
            let mut count = 0usize;
            let mut sum_x = 0.0;
            let mut sum_y = 0.0;
            for (p, side) in points.iter().zip(&sides) {
                if *side == cluster {
                    sum_x += p.x;
                    sum_y += p.y;
                    count += 1;
                }
            }
            if count > 0 {
                centroids[cluster as usize] =
                    WorldPoint::new(sum_x / count as f64, sum_y / count as f64);
            } else {
                // Empty cluster: reseed with the point farthest from the
                // other centroid.
                let other = centroids[1 - cluster as usize];
                centroids[cluster as usize] = farthest_from(points, &other);
            }
        }
    }

    sides
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TimedPosition;

    fn record_with_positions(samples: Vec<(f64, f64, f64)>) -> MatchRecord {
        MatchRecord {
            map: "m".to_string(),
            team: 1,
            winner_team: 1,
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

    #[test]
    fn test_spawn_point_window() {
        let config = EngineConfig::default();
        // Samples at t=29 and t=31 are inside [28, 32]; t=60 is not.
        let record = record_with_positions(vec![
            (29.0, 10.0, 0.0),
            (31.0, 20.0, 10.0),
            (60.0, 500.0, 500.0),
        ]);
        let spawn = spawn_point(&record, &config).unwrap();
        assert_eq!(spawn, WorldPoint::new(15.0, 5.0));
    }

    #[test]
    fn test_spawn_point_absent_outside_window() {
        let config = EngineConfig::default();
        let record = record_with_positions(vec![(60.0, 1.0, 1.0), (90.0, 2.0, 2.0)]);
        assert!(spawn_point(&record, &config).is_none());
    }

    #[test]
    fn test_spawn_point_within_sample_bounds() {
        // The centroid of the window samples can never leave their bounding
        // box (and so never leaves their convex hull).
        let config = EngineConfig::default();
        let record = record_with_positions(vec![
            (29.0, -50.0, 10.0),
            (30.0, 0.0, 30.0),
            (31.0, 50.0, 20.0),
        ]);
        let spawn = spawn_point(&record, &config).unwrap();
        assert!(spawn.x >= -50.0 && spawn.x <= 50.0);
        assert!(spawn.y >= 10.0 && spawn.y <= 30.0);
    }

    #[test]
    fn test_two_separated_clusters_get_consistent_sides() {
        let config = EngineConfig::default();
        // 10 matches spawning near (0, 0), 10 near (1000, 1000).
        let mut records = Vec::new();
        for i in 0..10 {
            let jitter = i as f64 * 0.5;
            records.push(record_with_positions(vec![(30.0, jitter, jitter)]));
        }
        for i in 0..10 {
            let jitter = i as f64 * 0.5;
            records.push(record_with_positions(vec![(
                30.0,
                1000.0 + jitter,
                1000.0 + jitter,
            )]));
        }

        let assignment = classify_spawn_sides(&records, &config);
        assert_eq!(assignment.len(), 20);

        let low_sides: Vec<u8> = assignment.sides[..10].to_vec();
        let high_sides: Vec<u8> = assignment.sides[10..].to_vec();
        // All points within each cluster share a side, and the clusters differ.
        assert!(low_sides.iter().all(|s| *s == low_sides[0]));
        assert!(high_sides.iter().all(|s| *s == high_sides[0]));
        assert_ne!(low_sides[0], high_sides[0]);
    }

    #[test]
    fn test_degenerate_clustering_falls_back_to_one_side() {
        let config = EngineConfig::default();
        let records = vec![
            record_with_positions(vec![(30.0, 5.0, 5.0)]),
            record_with_positions(vec![(30.0, 5.0, 5.0)]),
            record_with_positions(vec![(30.0, 5.0, 5.0)]),
        ];
        let assignment = classify_spawn_sides(&records, &config);
        assert_eq!(assignment.len(), 3);
        assert!(assignment.sides.iter().all(|s| *s == 0));
    }

    #[test]
    fn test_records_without_spawn_point_are_dropped() {
        let config = EngineConfig::default();
        let records = vec![
            record_with_positions(vec![(30.0, 0.0, 0.0)]),
            record_with_positions(vec![(300.0, 9.0, 9.0)]),
            record_with_positions(vec![(30.0, 1000.0, 1000.0)]),
        ];
        let assignment = classify_spawn_sides(&records, &config);
        assert_eq!(assignment.indices, vec![0, 2]);
    }

    #[test]
    fn test_select_preserves_input_order() {
        let config = EngineConfig::default();
        let records = vec![
            record_with_positions(vec![(30.0, 0.0, 0.0)]),
            record_with_positions(vec![(30.0, 1.0, 1.0)]),
            record_with_positions(vec![(30.0, 2.0, 2.0)]),
        ];
        // Degenerate-ish but distinct points; whatever the labeling, selected
        // records must appear in input order.
        let assignment = classify_spawn_sides(&records, &config);
        for side in [0u8, 1u8] {
            let selected = assignment.select(&records, side);
            let mut last_index = None;
            for record in selected {
                let index = records
                    .iter()
                    .position(|r| std::ptr::eq(r, record))
                    .unwrap();
                if let Some(last) = last_index {
                    assert!(index > last);
                }
                last_index = Some(index);
            }
        }
    }
}
