//! Example of computing a win-rate heatmap end to end.
//!
//! Run with: cargo run --example winrate_map

use std::sync::Arc;

use replay_heatmap::{
    ArtifactKind, EngineConfig, HeatmapArtifact, HeatmapEngine, HeatmapQuery, MatchRecord,
    MemoryObjectStore, MemoryRecordStore, TimedPosition, WorldPoint,
};

#[tokio::main]
async fn main() {
    env_logger::init();
    println!("Win-rate Heatmap Example\n");

    let mut store = MemoryRecordStore::new();

    // Matches spawning near the south-west base, mostly winning there.
    for i in 0..6 {
        store.insert(synthetic_match("canyon", 1, 1, (10.0, 10.0), i));
    }
    for i in 0..2 {
        store.insert(synthetic_match("canyon", 1, 2, (10.0, 10.0), i));
    }
    // Matches spawning near the north-east base.
    for i in 0..8 {
        store.insert(synthetic_match("canyon", 2, 1, (900.0, 900.0), i));
    }

    let engine = HeatmapEngine::new(
        Arc::new(store),
        Arc::new(MemoryObjectStore::new()),
        EngineConfig::default(),
    );

    let query = HeatmapQuery::global("canyon", ArtifactKind::Winrate);
    let artifact = engine
        .compute_or_fetch(&query)
        .await
        .expect("aggregation failed");

    let HeatmapArtifact::Winrate { games, side, grid, .. } = artifact else {
        unreachable!("winrate query returns a winrate artifact");
    };

    println!("Games: {games}, analyzed spawn side: {side}");
    if let Some(bounds) = grid.bounds {
        println!(
            "Grid: {}x{} cells of {} world units, spanning ({:.0}, {:.0})..({:.0}, {:.0})\n",
            grid.rows, grid.cols, grid.bin_size,
            bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
        );
    }

    let mut reported = 0;
    let mut sparse = 0;
    for (row_index, row) in grid.cells.iter().enumerate() {
        for (col_index, cell) in row.iter().enumerate() {
            match cell.winrate {
                Some(rate) => {
                    reported += 1;
                    println!(
                        "  cell ({row_index}, {col_index}): {} samples, winrate {:.0}%",
                        cell.total,
                        rate * 100.0
                    );
                }
                None if cell.total > 0 => sparse += 1,
                None => {}
            }
        }
    }
    println!("\n{reported} cells reported, {sparse} below the sample floor");
}

/// A match that idles at its spawn, then fights around a mid-map hot spot.
fn synthetic_match(
    map: &str,
    team: i32,
    winner_team: i32,
    spawn: (f64, f64),
    seed: usize,
) -> MatchRecord {
    let mut positions = Vec::new();
    for i in 0..5 {
        positions.push(TimedPosition {
            t: 28.0 + i as f64,
            pos: WorldPoint::new(spawn.0, spawn.1),
        });
    }
    let hot_spot = (spawn.0 + 50.0, spawn.1 + 30.0);
    for i in 0..30 {
        let wobble = ((seed + i) % 3) as f64;
        positions.push(TimedPosition {
            t: 60.0 + i as f64,
            pos: WorldPoint::new(hot_spot.0 + wobble, hot_spot.1 - wobble),
        });
    }
    MatchRecord {
        map: map.to_string(),
        team,
        winner_team,
        positions,
        shots: vec![],
    }
}
