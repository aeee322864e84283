//! Example of warming the artifact cache for every known map.
//!
//! Run with: cargo run --example precompute

use std::sync::Arc;

use replay_heatmap::{
    precompute_all, CancelToken, EngineConfig, HeatmapEngine, MapStatus, MatchRecord,
    MemoryObjectStore, MemoryRecordStore, TimedPosition, WorldPoint,
};

#[tokio::main]
async fn main() {
    env_logger::init();
    println!("Batch Precomputation Example\n");

    let mut store = MemoryRecordStore::new();
    for map in ["canyon", "harbor", "steppe", "ruins"] {
        for i in 0..4 {
            store.insert(MatchRecord {
                map: map.to_string(),
                team: 1 + (i % 2),
                winner_team: 1,
                positions: vec![
                    TimedPosition {
                        t: 30.0,
                        pos: WorldPoint::new(10.0 * i as f64, 5.0),
                    },
                    TimedPosition {
                        t: 120.0,
                        pos: WorldPoint::new(10.0 * i as f64 + 3.0, 40.0),
                    },
                ],
                shots: vec![],
            });
        }
    }
    // One map whose store queries fail; the batch must keep going.
    store.fail_map("glacier", "backend query timed out");

    let blobs = Arc::new(MemoryObjectStore::new());
    let engine = HeatmapEngine::new(Arc::new(store), blobs.clone(), EngineConfig::default());

    let report = precompute_all(&engine, &CancelToken::new())
        .await
        .expect("map enumeration failed");

    println!("Outcome report:");
    let mut outcomes = report.outcomes.clone();
    outcomes.sort_by(|a, b| a.map.cmp(&b.map));
    for outcome in &outcomes {
        match &outcome.status {
            MapStatus::Success => println!("  {:<10} ok", outcome.map),
            MapStatus::Error(message) => println!("  {:<10} FAILED: {message}", outcome.map),
            MapStatus::Cancelled => println!("  {:<10} cancelled", outcome.map),
        }
    }

    println!(
        "\n{} succeeded, {} failed; {} blobs written",
        report.successes(),
        report.errors(),
        blobs.len()
    );
}
