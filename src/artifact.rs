//! Heatmap artifacts and their storage keys.
//!
//! An artifact is the serialized output of one aggregation run, written to
//! object storage under a deterministic per-map key and read back verbatim on
//! a cache hit. Artifact kinds are namespaced so different kinds for the same
//! map never collide.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grid::{DensityGrid, WinrateGrid};
use crate::Shot;

/// Content type used for every artifact blob.
pub const ARTIFACT_CONTENT_TYPE: &str = "application/json";

/// The kinds of artifact the engine produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Position-density histogram.
    Positions,
    /// Flat shot origin/target pairs.
    Shots,
    /// Side-clustered per-cell win rates.
    Winrate,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Positions,
        ArtifactKind::Shots,
        ArtifactKind::Winrate,
    ];

    /// Deterministic blob key for the global artifact of this kind.
    pub fn storage_key(&self, map: &str) -> String {
        match self {
            ArtifactKind::Positions => format!("Heatmaps/heatmap_{map}"),
            ArtifactKind::Shots => format!("Shotmaps/shotmap_{map}"),
            ArtifactKind::Winrate => format!("Winrates/winrate_{map}"),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Positions => write!(f, "positions"),
            ArtifactKind::Shots => write!(f, "shots"),
            ArtifactKind::Winrate => write!(f, "winrate"),
        }
    }
}

/// The serialized output of one aggregation run.
///
/// `games` is the number of matches that contributed, so renderers can show
/// sample size alongside the plot. Each write fully replaces the prior blob
/// for its key; artifacts are never partially overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeatmapArtifact {
    Positions {
        map: String,
        games: u32,
        grid: DensityGrid,
    },
    Shots {
        map: String,
        games: u32,
        shots: Vec<Shot>,
    },
    Winrate {
        map: String,
        games: u32,
        /// Which spawn-side cluster the grid was computed for. An advisory
        /// per-run label, not a stable team identity.
        side: u8,
        grid: WinrateGrid,
    },
}

impl HeatmapArtifact {
    pub fn map(&self) -> &str {
        match self {
            HeatmapArtifact::Positions { map, .. }
            | HeatmapArtifact::Shots { map, .. }
            | HeatmapArtifact::Winrate { map, .. } => map,
        }
    }

    pub fn games(&self) -> u32 {
        match self {
            HeatmapArtifact::Positions { games, .. }
            | HeatmapArtifact::Shots { games, .. }
            | HeatmapArtifact::Winrate { games, .. } => *games,
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            HeatmapArtifact::Positions { .. } => ArtifactKind::Positions,
            HeatmapArtifact::Shots { .. } => ArtifactKind::Shots,
            HeatmapArtifact::Winrate { .. } => ArtifactKind::Winrate,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorldPoint;

    #[test]
    fn test_storage_keys_are_namespaced_per_kind() {
        let keys: Vec<String> = ArtifactKind::ALL
            .iter()
            .map(|k| k.storage_key("canyon"))
            .collect();
        assert_eq!(keys[0], "Heatmaps/heatmap_canyon");
        assert_eq!(keys[1], "Shotmaps/shotmap_canyon");
        assert_eq!(keys[2], "Winrates/winrate_canyon");
        // No two kinds may share a key for the same map.
        let mut deduped = keys.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), keys.len());
    }

    #[test]
    fn test_round_trip_preserves_artifact() {
        let artifact = HeatmapArtifact::Shots {
            map: "harbor".to_string(),
            games: 7,
            shots: vec![Shot {
                origin: WorldPoint::new(1.0, 2.0),
                target: WorldPoint::new(3.0, 4.0),
            }],
        };
        let bytes = artifact.to_bytes().unwrap();
        let decoded = HeatmapArtifact::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, artifact);
        assert_eq!(decoded.map(), "harbor");
        assert_eq!(decoded.games(), 7);
        assert_eq!(decoded.kind(), ArtifactKind::Shots);
    }

    #[test]
    fn test_corrupt_bytes_fail_decoding() {
        assert!(HeatmapArtifact::from_bytes(b"{\"kind\": \"nope\"}").is_err());
        assert!(HeatmapArtifact::from_bytes(b"garbage").is_err());
    }
}
