//! Versioned state views sent to clients: a full [`Snapshot`] on join and a
//! [`SnapshotDelta`] every tick after that.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::constants::SNAPSHOT_VERSION;
use crate::error::SnapshotError;
use crate::types::{MapNodeView, Phase, PlayerView, UnitView};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub tick: u64,
    #[serde(rename = "roundTime")]
    pub round_time: f32,
    pub phase: Phase,
    pub players: Vec<PlayerView>,
    pub units: Vec<UnitView>,
    pub nodes: Vec<MapNodeView>,
}

/// Changes between two snapshots. Players are always sent whole; units and
/// nodes only when they changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDelta {
    pub version: u32,
    #[serde(rename = "baseTick")]
    pub base_tick: u64,
    pub tick: u64,
    #[serde(rename = "roundTime")]
    pub round_time: f32,
    pub phase: Phase,
    pub players: Vec<PlayerView>,
    #[serde(rename = "upsertUnits")]
    pub upsert_units: Vec<UnitView>,
    #[serde(rename = "removedUnits")]
    pub removed_units: Vec<String>,
    pub nodes: Vec<MapNodeView>,
}

impl SnapshotDelta {
    pub fn is_empty(&self) -> bool {
        self.upsert_units.is_empty() && self.removed_units.is_empty() && self.nodes.is_empty()
    }
}

pub fn diff(prev: &Snapshot, next: &Snapshot) -> SnapshotDelta {
    let prev_units: HashMap<&str, &UnitView> = prev
        .units
        .iter()
        .map(|unit| (unit.id.as_str(), unit))
        .collect();
    let next_ids: HashSet<&str> = next.units.iter().map(|unit| unit.id.as_str()).collect();

    let upsert_units = next
        .units
        .iter()
        .filter(|unit| prev_units.get(unit.id.as_str()).copied() != Some(*unit))
        .cloned()
        .collect();
    let removed_units = prev
        .units
        .iter()
        .filter(|unit| !next_ids.contains(unit.id.as_str()))
        .map(|unit| unit.id.clone())
        .collect();

    let prev_nodes: HashMap<&str, &MapNodeView> = prev
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), node))
        .collect();
    let nodes = next
        .nodes
        .iter()
        .filter(|node| prev_nodes.get(node.id.as_str()).copied() != Some(*node))
        .cloned()
        .collect();

    SnapshotDelta {
        version: next.version,
        base_tick: prev.tick,
        tick: next.tick,
        round_time: next.round_time,
        phase: next.phase,
        players: next.players.clone(),
        upsert_units,
        removed_units,
        nodes,
    }
}

/// Rebuilds the snapshot `delta` was diffed toward. New units are appended
/// in delta order, which matches the order the session spawned them in.
pub fn apply(base: &Snapshot, delta: &SnapshotDelta) -> Result<Snapshot, SnapshotError> {
    if base.version != SNAPSHOT_VERSION || delta.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::VersionMismatch {
            expected: SNAPSHOT_VERSION,
            found: if delta.version != SNAPSHOT_VERSION {
                delta.version
            } else {
                base.version
            },
        });
    }
    if delta.base_tick != base.tick {
        return Err(SnapshotError::BaseTickMismatch {
            delta_base: delta.base_tick,
            snapshot_tick: base.tick,
        });
    }

    let removed: HashSet<&str> = delta.removed_units.iter().map(String::as_str).collect();
    let mut upserts: HashMap<&str, &UnitView> = delta
        .upsert_units
        .iter()
        .map(|unit| (unit.id.as_str(), unit))
        .collect();

    let mut units: Vec<UnitView> = Vec::with_capacity(base.units.len() + upserts.len());
    for unit in &base.units {
        if removed.contains(unit.id.as_str()) {
            continue;
        }
        match upserts.remove(unit.id.as_str()) {
            Some(updated) => units.push(updated.clone()),
            None => units.push(unit.clone()),
        }
    }
    units.extend(
        delta
            .upsert_units
            .iter()
            .filter(|unit| upserts.contains_key(unit.id.as_str()))
            .cloned(),
    );

    let nodes = base
        .nodes
        .iter()
        .map(|node| {
            delta
                .nodes
                .iter()
                .find(|changed| changed.id == node.id)
                .unwrap_or(node)
                .clone()
        })
        .collect();

    Ok(Snapshot {
        version: delta.version,
        tick: delta.tick,
        round_time: delta.round_time,
        phase: delta.phase,
        players: delta.players.clone(),
        units,
        nodes,
    })
}
