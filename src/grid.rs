//! Spatial binning and win-rate aggregation.
//!
//! Position samples are projected onto a fixed-size square grid derived from
//! the data's own bounding box. Two modes exist:
//!
//! - **density**: a raw 2D count grid (a histogram), suitable as input to
//!   client-side contour rendering
//! - **winrate**: per-cell totals and wins, with win rate reported only for
//!   cells at or above a minimum-sample floor
//!
//! ## Dwell-time weighting
//!
//! Win-rate binning counts every time-sampled position: a match that lingers
//! in a cell contributes one increment per sample, not one per match. Matches
//! that spend longer in a cell therefore weigh more. This is a deliberate
//! choice, not an accident of implementation; see the crate docs before
//! "fixing" it to per-match weighting.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{Bounds, MatchRecord};

/// One win-rate cell.
///
/// `winrate` is `Some` only when `total` reached the minimum-sample floor;
/// a sparse cell is "no data", which is distinct from a 0% win rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub total: u32,
    pub wins: u32,
    pub winrate: Option<f64>,
}

/// Per-cell win rates plus the bounding box used for binning, so renderers
/// can map grid indices back to world coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinrateGrid {
    /// `None` when the input had no position samples.
    pub bounds: Option<Bounds>,
    pub bin_size: f64,
    pub rows: u32,
    pub cols: u32,
    /// Row-major: `cells[row][col]`.
    pub cells: Vec<Vec<GridCell>>,
}

/// Raw position-count histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityGrid {
    pub bounds: Option<Bounds>,
    pub bin_size: f64,
    pub rows: u32,
    pub cols: u32,
    /// Row-major: `counts[row][col]`.
    pub counts: Vec<Vec<u32>>,
}

fn grid_dims(bounds: &Bounds, bin_size: f64) -> (u32, u32) {
    let rows = (bounds.height() / bin_size).ceil() as u32 + 1;
    let cols = (bounds.width() / bin_size).ceil() as u32 + 1;
    (rows, cols)
}

fn cell_index(
    bounds: &Bounds,
    bin_size: f64,
    rows: u32,
    cols: u32,
    x: f64,
    y: f64,
) -> Option<(usize, usize)> {
    let col = ((x - bounds.min_x) / bin_size).floor() as i64;
    let row = ((y - bounds.min_y) / bin_size).floor() as i64;
    if row >= 0 && (row as u64) < rows as u64 && col >= 0 && (col as u64) < cols as u64 {
        Some((row as usize, col as usize))
    } else {
        None
    }
}

/// Bin every position sample into a win-rate grid.
///
/// A sample increments its cell's `total`; if the record's team won the
/// match, `wins` as well. Cells with `total < min_samples` report no win
/// rate. Empty input yields an empty grid, not an error.
pub fn winrate_grid(records: &[&MatchRecord], bin_size: f64, min_samples: u32) -> WinrateGrid {
    if bin_size <= 0.0 {
        warn!("[Binner] non-positive bin size {bin_size}; returning empty grid");
        return WinrateGrid {
            bounds: None,
            bin_size,
            rows: 0,
            cols: 0,
            cells: vec![],
        };
    }

    let bounds = Bounds::from_records(records.iter().copied());
    let Some(bounds) = bounds else {
        return WinrateGrid {
            bounds: None,
            bin_size,
            rows: 0,
            cols: 0,
            cells: vec![],
        };
    };

    let (rows, cols) = grid_dims(&bounds, bin_size);
    let mut cells = vec![vec![GridCell::default(); cols as usize]; rows as usize];

    for record in records {
        let won = record.won();
        for sample in &record.positions {
            if let Some((row, col)) =
                cell_index(&bounds, bin_size, rows, cols, sample.pos.x, sample.pos.y)
            {
                let cell = &mut cells[row][col];
                cell.total += 1;
                if won {
                    cell.wins += 1;
                }
            }
        }
    }

    for row in &mut cells {
        for cell in row.iter_mut() {
            if cell.total > 0 && cell.total >= min_samples {
                cell.winrate = Some(cell.wins as f64 / cell.total as f64);
            }
        }
    }

    WinrateGrid {
        bounds: Some(bounds),
        bin_size,
        rows,
        cols,
        cells,
    }
}

/// Bin every position sample into a count histogram.
pub fn density_grid(records: &[&MatchRecord], bin_size: f64) -> DensityGrid {
    if bin_size <= 0.0 {
        warn!("[Binner] non-positive bin size {bin_size}; returning empty grid");
        return DensityGrid {
            bounds: None,
            bin_size,
            rows: 0,
            cols: 0,
            counts: vec![],
        };
    }

    let bounds = Bounds::from_records(records.iter().copied());
    let Some(bounds) = bounds else {
        return DensityGrid {
            bounds: None,
            bin_size,
            rows: 0,
            cols: 0,
            counts: vec![],
        };
    };

    let (rows, cols) = grid_dims(&bounds, bin_size);
    let mut counts = vec![vec![0u32; cols as usize]; rows as usize];

    for record in records {
        for sample in &record.positions {
            if let Some((row, col)) =
                cell_index(&bounds, bin_size, rows, cols, sample.pos.x, sample.pos.y)
            {
                counts[row][col] += 1;
            }
        }
    }

    DensityGrid {
        bounds: Some(bounds),
        bin_size,
        rows,
        cols,
        counts,
    }
}

// ============================================================================
// Tests
// ============================================================================
