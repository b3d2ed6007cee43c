//! Snapshot Codec: deterministic world-state encoder/decoder.
//!
//! Pure codec layer. No side-effects, no timestamps, no envelope.
//!
//! - `encode_world`:  MemoryStore → canonical JSON string
//! - `decode_world`:  JSON string → MemoryStore (strict, no defaults)
//! - `restore_world`: decode + world-state validation
//! - `export_world_to_file` / `import_world_from_file`: file I/O
//! - `world_hash`:    SHA-256 of canonical JSON (lowercase hex)

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use access_engine::codec::digest;
use access_engine::invariants::try_validate_world;
use access_engine::store::MemoryStore;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// All possible snapshot codec failures.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// JSON serialization failed, or a stored value is not UTF-8.
    #[error("SerializationError: {0}")]
    SerializationError(String),
    /// Malformed JSON, unknown fields, duplicate or unsorted keys.
    #[error("DeserializationError: {0}")]
    DeserializationError(String),
    /// Decoded world fails the world-state checks.
    #[error("InvariantViolation: {0}")]
    InvariantViolation(String),
    #[error("IoError: {0}")]
    IoError(String),
}

impl From<io::Error> for SnapshotError {
    fn from(err: io::Error) -> Self {
        SnapshotError::IoError(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorldEntry {
    key: String,
    value: String,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorldImage {
    entries: Vec<WorldEntry>,
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Encode a world to a canonical JSON string.
///
/// Entries are listed in key order. Every value the kernel writes is UTF-8,
/// so values are stored as strings.
pub fn encode_world(world: &MemoryStore) -> Result<String, SnapshotError> {
    let entries = world
        .entries()
        .iter()
        .map(|(key, value)| {
            let value = String::from_utf8(value.clone()).map_err(|_| {
                SnapshotError::SerializationError(format!("value at {:?} is not UTF-8", key))
            })?;
            Ok(WorldEntry {
                key: key.clone(),
                value,
            })
        })
        .collect::<Result<Vec<_>, SnapshotError>>()?;

    serde_json::to_string(&WorldImage { entries })
        .map_err(|e| SnapshotError::SerializationError(e.to_string()))
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Decode a JSON string into a world.
///
/// Keys must be strictly increasing, which rules out duplicates and keeps
/// one canonical text per world. No world-state validation; use
/// `restore_world` for validated loading.
pub fn decode_world(json: &str) -> Result<MemoryStore, SnapshotError> {
    let image: WorldImage = serde_json::from_str(json)
        .map_err(|e| SnapshotError::DeserializationError(e.to_string()))?;

    let mut entries = BTreeMap::new();
    let mut previous: Option<String> = None;
    for entry in image.entries {
        if let Some(prev) = &previous {
            if entry.key <= *prev {
                return Err(SnapshotError::DeserializationError(format!(
                    "key {:?} is duplicated or out of order",
                    entry.key
                )));
            }
        }
        previous = Some(entry.key.clone());
        entries.insert(entry.key, entry.value.into_bytes());
    }
    Ok(MemoryStore::from_entries(entries))
}

// ---------------------------------------------------------------------------
// Restore (decode + validate)
// ---------------------------------------------------------------------------

/// Decode a JSON string and validate every stored record.
///
/// This is the safe entry point for loading state from disk.
pub fn restore_world(json: &str) -> Result<MemoryStore, SnapshotError> {
    let world = decode_world(json)?;
    try_validate_world(&world).map_err(SnapshotError::InvariantViolation)?;
    Ok(world)
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

/// Export a world to a file as canonical JSON.
pub fn export_world_to_file(world: &MemoryStore, path: &Path) -> Result<(), SnapshotError> {
    let json = encode_world(world)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, json.as_bytes())?;
    Ok(())
}

/// Import and validate a world from a JSON file.
pub fn import_world_from_file(path: &Path) -> Result<MemoryStore, SnapshotError> {
    let content = fs::read_to_string(path)?;
    restore_world(&content)
}

// ---------------------------------------------------------------------------
// Hash
// ---------------------------------------------------------------------------

/// SHA-256 of the canonical JSON encoding. Lowercase hex string.
///
/// This is a file-integrity hash; the replica-comparison digest is
/// `access_engine::codec::state_digest`.
pub fn world_hash(world: &MemoryStore) -> Result<String, SnapshotError> {
    Ok(digest(encode_world(world)?.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_engine::identity::IdentityContext;
    use access_engine::invocation::Invocation;
    use access_engine::store::{keys, org_key, StateStore};

    use crate::replay::apply_transaction;

    fn make_test_world() -> MemoryStore {
        let mut world = MemoryStore::new();
        let admin = IdentityContext::new("admin", "Org1MSP");
        for inv in [
            Invocation::bare("init"),
            Invocation::new("addOrg", ["Org1MSP", "One", "17"]),
            Invocation::new("publishDatasetTo", ["d1", "c1", "16"]),
            Invocation::new("addUser", ["u1", "Ann", "a@x", "1"]),
        ] {
            apply_transaction(&mut world, &admin, &inv).unwrap();
        }
        world
    }

    #[test]
    fn roundtrip_produces_identical_json() {
        let world = make_test_world();
        let json1 = encode_world(&world).unwrap();
        let decoded = restore_world(&json1).unwrap();
        assert_eq!(decoded, world);
        assert_eq!(encode_world(&decoded).unwrap(), json1);
    }

    #[test]
    fn composite_keys_survive_encoding() {
        let json = encode_world(&make_test_world()).unwrap();
        assert!(json.contains("\\u0000ORG:\\u0000Org1MSP\\u0000"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let result = decode_world(r#"{"entries":[],"extra":1}"#);
        assert!(matches!(result, Err(SnapshotError::DeserializationError(_))));
    }

    #[test]
    fn unsorted_keys_are_rejected() {
        let json = r#"{"entries":[{"key":"OWNER","value":"a"},{"key":"INIT","value":"TRUE"}]}"#;
        assert!(matches!(decode_world(json), Err(SnapshotError::DeserializationError(_))));
    }

    #[test]
    fn malformed_record_is_invariant_violation() {
        let mut world = make_test_world();
        world.put(&org_key("Org1MSP").unwrap(), b"{\"id\":1}".to_vec()).unwrap();
        let json = encode_world(&world).unwrap();
        match restore_world(&json) {
            Err(SnapshotError::InvariantViolation(msg)) => assert!(msg.contains("org_record")),
            other => panic!("expected InvariantViolation, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn non_utf8_value_cannot_be_encoded() {
        let mut world = MemoryStore::new();
        world.put(keys::OWNER, vec![0xff, 0xfe]).unwrap();
        assert!(matches!(encode_world(&world), Err(SnapshotError::SerializationError(_))));
    }

    #[test]
    fn file_roundtrip_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("world.json");
        let world = make_test_world();
        export_world_to_file(&world, &path).unwrap();
        let loaded = import_world_from_file(&path).unwrap();
        assert_eq!(world_hash(&loaded).unwrap(), world_hash(&world).unwrap());
        assert_eq!(world_hash(&world).unwrap().len(), 64);
    }
}
