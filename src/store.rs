//! Record store adapter.
//!
//! The analytical store holds one row per player-match, filtered server-side
//! by map and (optionally) exact player name. Rows carry `positions` and
//! `shots` as opaque JSON payloads written by the replay parser; this module
//! parses them into typed shapes. An unparsable payload yields zero samples
//! for that record, never a failed query.

use std::collections::HashMap;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::error::StoreError;
use crate::{MatchRecord, Shot, TimedPosition, WorldPoint};

/// Query surface of the analytical record store.
///
/// Implementations filter by map equality and, when given, exact player-name
/// equality. Transport or query errors fail with [`StoreError::Unavailable`],
/// propagated once; callers must not retry indefinitely.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch all match records for a map, optionally filtered by player.
    async fn fetch(&self, map: &str, player: Option<&str>)
        -> Result<Vec<MatchRecord>, StoreError>;

    /// Enumerate the distinct map identifiers known to the store.
    async fn list_maps(&self) -> Result<Vec<String>, StoreError>;
}

/// One row as returned by the store, before payload parsing.
///
/// `winnerTeam` is the store's column spelling; both it and `winner_team`
/// are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMatchRow {
    pub map: String,
    pub team: i32,
    #[serde(alias = "winnerTeam")]
    pub winner_team: i32,
    #[serde(default)]
    pub positions: Value,
    #[serde(default)]
    pub shots: Value,
}

impl RawMatchRow {
    /// Parse the opaque payloads into a typed record.
    pub fn into_record(self) -> MatchRecord {
        let positions = parse_positions(&self.positions);
        let shots = parse_shots(&self.shots);
        MatchRecord {
            map: self.map,
            team: self.team,
            winner_team: self.winner_team,
            positions,
            shots,
        }
    }
}

/// Some stores hand the payload back as a JSON string rather than an
/// embedded object; unwrap that extra layer when present.
fn decode_payload(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => serde_json::from_str(s).ok(),
        Value::Null => None,
        other => Some(other.clone()),
    }
}

fn point_from(value: &Value) -> Option<WorldPoint> {
    let x = value.get("x")?.as_f64()?;
    let y = value.get("y")?.as_f64()?;
    Some(WorldPoint::new(x, y))
}

/// Parse a positions payload: an object keyed by fractional-second
/// timestamps mapping to `{x, y}`. Entries with unparsable keys or points
/// are skipped; the result is sorted by timestamp ascending.
pub fn parse_positions(payload: &Value) -> Vec<TimedPosition> {
    let Some(decoded) = decode_payload(payload) else {
        return Vec::new();
    };
    let Some(object) = decoded.as_object() else {
        debug!("[RecordStore] positions payload is not an object; treating as empty");
        return Vec::new();
    };

    let mut samples: Vec<TimedPosition> = object
        .iter()
        .filter_map(|(key, value)| {
            let t = key.parse::<f64>().ok()?;
            let pos = point_from(value)?;
            Some(TimedPosition { t, pos })
        })
        .collect();

    samples.sort_by(|a, b| a.t.partial_cmp(&b.t).unwrap_or(std::cmp::Ordering::Equal));
    samples
}

/// Parse a shots payload: a sequence (array, or object keyed by index) of
/// `{shot_origin, recieve_pos}` pairs. The parser's field spellings,
/// `recieve_pos` included, are the wire format. `origin`/`target` are
/// accepted as well.
pub fn parse_shots(payload: &Value) -> Vec<Shot> {
    let Some(decoded) = decode_payload(payload) else {
        return Vec::new();
    };

    let entries: Vec<&Value> = match &decoded {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => {
            debug!("[RecordStore] shots payload is not a sequence; treating as empty");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| {
            let origin = point_from(entry.get("shot_origin").or_else(|| entry.get("origin"))?)?;
            let target = point_from(entry.get("recieve_pos").or_else(|| entry.get("target"))?)?;
            Some(Shot { origin, target })
        })
        .collect()
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory record store for tests and demos.
///
/// Records are tagged with an optional player name so player-filtered
/// queries behave like the real store's server-side filter. Individual maps
/// can be made to fail, which the scheduler tests lean on.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Vec<(Option<String>, MatchRecord)>,
    failing_maps: HashMap<String, String>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record with no player attribution.
    pub fn insert(&mut self, record: MatchRecord) {
        self.records.push((None, record));
    }

    /// Add a record attributed to a player.
    pub fn insert_for(&mut self, player: &str, record: MatchRecord) {
        self.records.push((Some(player.to_string()), record));
    }

    /// Make every query for `map` fail with the given message.
    pub fn fail_map(&mut self, map: &str, message: &str) {
        self.failing_maps
            .insert(map.to_string(), message.to_string());
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch(
        &self,
        map: &str,
        player: Option<&str>,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        if let Some(message) = self.failing_maps.get(map) {
            return Err(StoreError::Unavailable(message.clone()));
        }
        Ok(self
            .records
            .iter()
            .filter(|(owner, record)| {
                record.map == map
                    && match player {
                        Some(name) => owner.as_deref() == Some(name),
                        None => true,
                    }
            })
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn list_maps(&self) -> Result<Vec<String>, StoreError> {
        let mut maps: Vec<String> = self
            .records
            .iter()
            .map(|(_, record)| record.map.clone())
            .chain(self.failing_maps.keys().cloned())
            .collect();
        maps.sort();
        maps.dedup();
        Ok(maps)
    }
}

// ============================================================================
// Tests
// ============================================================================
