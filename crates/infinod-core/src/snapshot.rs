//! Versioned flat snapshot of the registry for fast restart.
//!
//! The snapshot is a single JSON document: version tag, matured records
//! sorted by burn outpoint, payee index sorted by script bytes, the last
//! scan height, and per-tier statement state in BIG, MID, LIL order. Maps
//! with non-string keys are stored as sorted entry vectors, which also
//! makes the bytes a pure function of registry state: two registries with
//! identical contents produce identical snapshots.
//!
//! The non-matured shadow set is not persisted; it is rebuilt by the next
//! scan. Ranks are not persisted either and are refreshed on the next tick.

use std::fs;
use std::path::Path;

use bitcoin::ScriptBuf;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::registry::{tier_slot, Registry};
use crate::types::{BlockHeight, NodeRecord, Tier};

pub const SNAPSHOT_VERSION: &str = "infinod-registry-v1";

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    version: String,
    matured: Vec<NodeRecord>,
    payees: Vec<PayeeEntry>,
    last_scan_height: BlockHeight,
    tiers: Vec<TierSnapshot>,
}

#[derive(Serialize, Deserialize)]
struct PayeeEntry {
    script: ScriptBuf,
    height: BlockHeight,
}

#[derive(Serialize, Deserialize)]
struct TierSnapshot {
    tier: Tier,
    statements: Vec<(BlockHeight, u32)>,
    last_start: BlockHeight,
    last_size: u32,
}

/// Write the registry snapshot to `path`, replacing any previous one.
pub fn save(registry: &Registry, path: &Path) -> Result<(), CoreError> {
    let mut payees: Vec<PayeeEntry> = registry
        .payee_index
        .iter()
        .map(|(script, height)| PayeeEntry {
            script: script.clone(),
            height: *height,
        })
        .collect();
    payees.sort_by(|a, b| a.script.as_bytes().cmp(b.script.as_bytes()));

    let tiers = Tier::ALL
        .iter()
        .map(|tier| {
            let slot = &registry.statements[tier_slot(*tier)];
            TierSnapshot {
                tier: *tier,
                statements: slot.map.iter().map(|(h, s)| (*h, *s)).collect(),
                last_start: slot.last_start,
                last_size: slot.last_size,
            }
        })
        .collect();

    let file = SnapshotFile {
        version: SNAPSHOT_VERSION.to_string(),
        matured: registry.matured.values().cloned().collect(),
        payees,
        last_scan_height: registry.last_scan_height,
        tiers,
    };

    let mut content = serde_json::to_string(&file)?;
    content.push('\n');
    fs::write(path, content)?;
    Ok(())
}

/// Load a snapshot from `path` into the registry, replacing its contents.
///
/// A version-tag mismatch returns `SnapshotVersionMismatch` without
/// touching the registry; the caller clears and cold-starts on the next
/// tip.
pub fn restore(registry: &mut Registry, path: &Path) -> Result<(), CoreError> {
    let content = fs::read_to_string(path)?;
    let file: SnapshotFile = serde_json::from_str(&content)?;

    if file.version != SNAPSHOT_VERSION {
        return Err(CoreError::SnapshotVersionMismatch {
            expected: SNAPSHOT_VERSION.to_string(),
            found: file.version,
        });
    }

    registry.clear();
    for record in file.matured {
        registry.matured.insert(record.burn_outpoint, record);
    }
    for entry in file.payees {
        registry.payee_index.insert(entry.script, entry.height);
    }
    registry.last_scan_height = file.last_scan_height;
    for tier_snapshot in file.tiers {
        let slot = &mut registry.statements[tier_slot(tier_snapshot.tier)];
        slot.map = tier_snapshot.statements.into_iter().collect();
        slot.last_start = tier_snapshot.last_start;
        slot.last_size = tier_snapshot.last_size;
    }

    Ok(())
}
