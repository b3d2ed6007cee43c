//! Snapshot layer: deterministic world-state snapshots.
//!
//! Snapshots contain canonical JSON + hash for verification.
//! No timestamps in snapshot content (determinism).
//!
//! A snapshot whose hash does not verify is ignored and the replica falls
//! back to full replay.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use access_engine::codec::digest;
use access_engine::store::MemoryStore;
use access_engine::CONTRACT_VERSION;

use crate::error::RuntimeResult;
use crate::snapshot_codec::{encode_world, restore_world, SnapshotError};

/// Snapshot on-disk format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    /// Sequence of the last transaction included.
    pub sequence: u64,
    /// Canonical JSON of the world (see `snapshot_codec`).
    pub canonical_json: String,
    /// SHA-256 of `canonical_json`.
    pub hash: String,
    /// Contract version at snapshot time.
    pub contract_version: u32,
}

impl Snapshot {
    /// Build a snapshot of `world` at `sequence`.
    pub fn capture(sequence: u64, world: &MemoryStore) -> RuntimeResult<Self> {
        let canonical_json = encode_world(world)?;
        let hash = digest(canonical_json.as_bytes());
        Ok(Self {
            sequence,
            canonical_json,
            hash,
            contract_version: CONTRACT_VERSION,
        })
    }

    /// Decode and validate the captured world.
    pub fn restore(&self) -> RuntimeResult<MemoryStore> {
        if !verify_snapshot_hash(self) {
            return Err(SnapshotError::InvariantViolation(format!(
                "snapshot {} hash does not match its content",
                self.sequence
            ))
            .into());
        }
        if self.contract_version != CONTRACT_VERSION {
            return Err(SnapshotError::InvariantViolation(format!(
                "snapshot {} was taken under contract version {}",
                self.sequence, self.contract_version
            ))
            .into());
        }
        Ok(restore_world(&self.canonical_json)?)
    }
}

fn snapshot_file_name(sequence: u64) -> String {
    format!("snapshot_{:06}.json", sequence)
}

/// Save a deterministic snapshot of `world` at `sequence`.
pub fn save_snapshot(dir: &Path, sequence: u64, world: &MemoryStore) -> RuntimeResult<PathBuf> {
    fs::create_dir_all(dir)?;

    let snap = Snapshot::capture(sequence, world)?;
    let path = dir.join(snapshot_file_name(sequence));
    let content = serde_json::to_string(&snap)
        .map_err(|e| SnapshotError::SerializationError(e.to_string()))?;

    let mut file = File::create(&path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    info!(sequence, hash = %snap.hash, "snapshot saved");
    Ok(path)
}

/// Load the snapshot at a specific sequence number.
/// Returns None if no snapshot exists at that sequence.
pub fn load_snapshot(dir: &Path, sequence: u64) -> RuntimeResult<Option<Snapshot>> {
    let path = dir.join(snapshot_file_name(sequence));
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)?;
    let snap: Snapshot = serde_json::from_str(&content)
        .map_err(|e| SnapshotError::DeserializationError(format!("bad snapshot: {}", e)))?;
    Ok(Some(snap))
}

/// Sequences of every snapshot file in `dir`, ascending.
pub fn list_snapshots(dir: &Path) -> RuntimeResult<Vec<u64>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut sequences = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if let Some(seq) = name_str
            .strip_prefix("snapshot_")
            .and_then(|s| s.strip_suffix(".json"))
            .and_then(|s| s.parse::<u64>().ok())
        {
            sequences.push(seq);
        }
    }
    sequences.sort_unstable();
    Ok(sequences)
}

/// Load the latest snapshot in a directory.
pub fn load_latest_snapshot(dir: &Path) -> RuntimeResult<Option<Snapshot>> {
    match list_snapshots(dir)?.last() {
        Some(&seq) => load_snapshot(dir, seq),
        None => Ok(None),
    }
}

/// Verify a snapshot's internal hash consistency.
pub fn verify_snapshot_hash(snap: &Snapshot) -> bool {
    digest(snap.canonical_json.as_bytes()) == snap.hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_engine::identity::IdentityContext;
    use access_engine::invocation::Invocation;

    use crate::replay::apply_transaction;

    fn world() -> MemoryStore {
        let mut w = MemoryStore::new();
        apply_transaction(&mut w, &IdentityContext::new("admin", "Org1MSP"), &Invocation::bare("init"))
            .unwrap();
        w
    }

    #[test]
    fn latest_snapshot_wins() {
        let dir = tempfile::tempdir().unwrap();
        save_snapshot(dir.path(), 2, &world()).unwrap();
        save_snapshot(dir.path(), 10, &world()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(list_snapshots(dir.path()).unwrap(), vec![2, 10]);
        let snap = load_latest_snapshot(dir.path()).unwrap().unwrap();
        assert_eq!(snap.sequence, 10);
        assert_eq!(snap.restore().unwrap(), world());
    }

    #[test]
    fn tampered_snapshot_does_not_verify() {
        let mut snap = Snapshot::capture(1, &world()).unwrap();
        assert!(verify_snapshot_hash(&snap));
        snap.canonical_json = snap.canonical_json.replace("admin", "mallory");
        assert!(!verify_snapshot_hash(&snap));
        assert!(snap.restore().is_err());
    }

    #[test]
    fn missing_directory_has_no_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_latest_snapshot(&dir.path().join("absent")).unwrap().is_none());
    }
}
