//! Drift detection: determinism verification and replica comparison.
//!
//! Comparison is key-level over the raw stored bytes; two replicas have
//! converged exactly when their reports show no differences.

use std::collections::BTreeSet;

use access_engine::codec::state_digest;
use access_engine::store::{keys, split_composite_key, MemoryStore};

use crate::error::{RuntimeError, RuntimeResult};
use crate::proto_bridge::Transaction;
use crate::replay;

/// Replay the same transactions twice and require identical digests.
/// Returns the agreed digest.
pub fn verify_determinism(txs: &[Transaction]) -> RuntimeResult<String> {
    let first = replay::rebuild_digest(txs)?;
    let second = replay::rebuild_digest(txs)?;
    if first != second {
        return Err(RuntimeError::Nondeterministic { first, second });
    }
    Ok(first)
}

/// Structured comparison of two worlds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftReport {
    pub digest_a: String,
    pub digest_b: String,
    pub key_count_a: usize,
    pub key_count_b: usize,
    pub org_count_a: usize,
    pub org_count_b: usize,
    pub user_count_a: usize,
    pub user_count_b: usize,
    /// Keys rendered readable, e.g. `ORG:Org1MSP`.
    pub only_in_a: Vec<String>,
    pub only_in_b: Vec<String>,
    pub differing: Vec<String>,
}

impl DriftReport {
    pub fn is_converged(&self) -> bool {
        self.digest_a == self.digest_b
    }
}

/// Compare two worlds key by key.
pub fn compare_worlds(a: &MemoryStore, b: &MemoryStore) -> DriftReport {
    let keys_a: BTreeSet<&String> = a.entries().keys().collect();
    let keys_b: BTreeSet<&String> = b.entries().keys().collect();

    let only_in_a = keys_a.difference(&keys_b).map(|k| display_key(k)).collect();
    let only_in_b = keys_b.difference(&keys_a).map(|k| display_key(k)).collect();
    let differing = keys_a
        .intersection(&keys_b)
        .filter(|k| a.entries()[k.as_str()] != b.entries()[k.as_str()])
        .map(|k| display_key(k))
        .collect();

    DriftReport {
        digest_a: state_digest(a.entries()),
        digest_b: state_digest(b.entries()),
        key_count_a: a.len(),
        key_count_b: b.len(),
        org_count_a: count_prefix(a, keys::ORG_PREFIX),
        org_count_b: count_prefix(b, keys::ORG_PREFIX),
        user_count_a: count_prefix(a, keys::USER_PREFIX),
        user_count_b: count_prefix(b, keys::USER_PREFIX),
        only_in_a,
        only_in_b,
        differing,
    }
}

fn count_prefix(world: &MemoryStore, prefix: &str) -> usize {
    world
        .entries()
        .keys()
        .filter(|k| matches!(split_composite_key(k), Some((p, _)) if p == prefix))
        .count()
}

/// Composite keys with the delimiters replaced for reports.
fn display_key(key: &str) -> String {
    match split_composite_key(key) {
        Some((prefix, segments)) => format!("{}{}", prefix, segments.join("/")),
        None => key.to_string(),
    }
}
