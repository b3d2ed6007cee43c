/// Access Kernel: State Store Contract
///
/// The kernel reads and writes through these traits only. Reads and writes
/// are split so read-only operations are handed a `StateReader` and cannot
/// write by construction.

use std::collections::BTreeMap;

use crate::error::{AccessError, AccessResult};

/// Well-known keys and key prefixes.
pub mod keys {
    pub const IS_INITIALIZED: &str = "INIT";
    pub const OWNER: &str = "OWNER";
    pub const ORG_PREFIX: &str = "ORG:";
    pub const USER_PREFIX: &str = "USER:";
    pub const CHANNEL_TO_PUBS: &str = "CTP";

    /// Stored value of the initialization flag.
    pub const TRUE: &[u8] = b"TRUE";
}

const DELIMITER: char = '\u{0}';

/// Build a namespaced key: `\0prefix\0seg1\0seg2\0`.
///
/// Distinct prefixes can never collide because the prefix is framed by
/// delimiters that no prefix or segment may contain.
pub fn composite_key(prefix: &str, segments: &[&str]) -> AccessResult<String> {
    if prefix.is_empty() {
        return Err(AccessError::Validation(
            "composite key prefix must not be empty".to_string(),
        ));
    }
    let mut key = String::with_capacity(
        2 + prefix.len() + segments.iter().map(|s| s.len() + 1).sum::<usize>(),
    );
    key.push(DELIMITER);
    for part in std::iter::once(&prefix).chain(segments.iter()) {
        if part.contains(DELIMITER) {
            return Err(AccessError::Validation(format!(
                "composite key part {:?} contains U+0000",
                part
            )));
        }
        key.push_str(part);
        key.push(DELIMITER);
    }
    Ok(key)
}

/// Split a composite key back into `(prefix, segments)`.
pub fn split_composite_key(key: &str) -> Option<(&str, Vec<&str>)> {
    let body = key.strip_prefix(DELIMITER)?.strip_suffix(DELIMITER)?;
    let mut parts = body.split(DELIMITER);
    let prefix = parts.next()?;
    Some((prefix, parts.collect()))
}

pub fn org_key(id: &str) -> AccessResult<String> {
    composite_key(keys::ORG_PREFIX, &[id])
}

pub fn user_key(id: &str) -> AccessResult<String> {
    composite_key(keys::USER_PREFIX, &[id])
}

/// Read half of the store contract.
pub trait StateReader {
    /// `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> AccessResult<Option<Vec<u8>>>;
}

/// View any reader as a trait object, including through `dyn StateStore`.
pub trait AsReader {
    fn as_reader(&self) -> &dyn StateReader;
}

impl<T: StateReader> AsReader for T {
    fn as_reader(&self) -> &dyn StateReader {
        self
    }
}

/// Full store contract.
pub trait StateStore: StateReader + AsReader {
    fn put(&mut self, key: &str, value: Vec<u8>) -> AccessResult<()>;
    fn delete(&mut self, key: &str) -> AccessResult<()>;
}

// ---------------------------------------------------------------------------
// In-memory committed state
// ---------------------------------------------------------------------------

/// Ordered in-memory world state. Iteration is in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, Vec<u8>>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply a committed write set.
    pub fn apply(&mut self, writes: WriteSet) {
        for (key, value) in writes.into_inner() {
            match value {
                Some(bytes) => {
                    self.entries.insert(key, bytes);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
    }
}

impl StateReader for MemoryStore {
    fn get(&self, key: &str) -> AccessResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }
}

impl StateStore for MemoryStore {
    fn put(&mut self, key: &str, value: Vec<u8>) -> AccessResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> AccessResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Staged writes
// ---------------------------------------------------------------------------

/// Ordered set of pending writes; `None` marks a delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    writes: BTreeMap<String, Option<Vec<u8>>>,
}

impl WriteSet {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.writes.keys().map(|k| k.as_str())
    }

    pub fn into_inner(self) -> BTreeMap<String, Option<Vec<u8>>> {
        self.writes
    }
}

/// Overlay that buffers writes over a committed reader.
///
/// Reads see the transaction's own writes first. Nothing reaches the base
/// until the caller takes the write set and applies it.
pub struct StagedStore<'a> {
    base: &'a dyn StateReader,
    writes: WriteSet,
}

impl<'a> StagedStore<'a> {
    pub fn new(base: &'a dyn StateReader) -> Self {
        Self {
            base,
            writes: WriteSet::default(),
        }
    }

    pub fn into_write_set(self) -> WriteSet {
        self.writes
    }
}

impl StateReader for StagedStore<'_> {
    fn get(&self, key: &str) -> AccessResult<Option<Vec<u8>>> {
        match self.writes.writes.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => self.base.get(key),
        }
    }
}

impl StateStore for StagedStore<'_> {
    fn put(&mut self, key: &str, value: Vec<u8>) -> AccessResult<()> {
        self.writes.writes.insert(key.to_string(), Some(value));
        Ok(())
    }

    fn delete(&mut self, key: &str) -> AccessResult<()> {
        self.writes.writes.insert(key.to_string(), None);
        Ok(())
    }
}
