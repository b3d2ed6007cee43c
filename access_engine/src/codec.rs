/// Access Kernel: Canonical Codec
///
/// Deterministic canonical serialization + SHA-256 digests.
/// Produces byte-identical output on every replica.
///
/// Rules:
///   - Object keys sorted by UTF-8 byte order at every depth
///   - Arrays keep insertion order
///   - UTF-8 JSON, no whitespace, no float
///   - Absent or empty bytes decode to NotFound, malformed bytes to Decode

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{AccessError, AccessResult};
use crate::store::StateReader;

/// Canonical bytes of any serializable entity.
pub fn encode<T: Serialize>(entity: &T) -> AccessResult<Vec<u8>> {
    let value = serde_json::to_value(entity)
        .map_err(|e| AccessError::Validation(format!("entity not encodable: {}", e)))?;
    encode_value(&value)
}

/// Canonical bytes of an already-built JSON value.
pub fn encode_value(value: &Value) -> AccessResult<Vec<u8>> {
    serde_json::to_vec(&canonicalize(value))
        .map_err(|e| AccessError::Validation(format!("value not encodable: {}", e)))
}

/// Rebuild `value` with every object's keys in sorted order.
///
/// serde_json's map may preserve insertion order, so ordering is made
/// explicit here rather than relied on.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for k in keys {
                sorted.insert(k.clone(), canonicalize(&map[k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Decode bytes read from `key`.
pub fn decode<T: DeserializeOwned>(key: &str, bytes: Option<&[u8]>) -> AccessResult<T> {
    match bytes {
        None | Some([]) => Err(AccessError::NotFound(key.to_string())),
        Some(raw) => serde_json::from_slice(raw).map_err(|e| AccessError::Decode {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Generic fetch: load `key` and decode it. Never yields an empty object.
pub fn fetch<T: DeserializeOwned>(store: &dyn StateReader, key: &str) -> AccessResult<T> {
    let bytes = store.get(key)?;
    decode(key, bytes.as_deref())
}

/// SHA-256 of `bytes`. Lowercase hex string.
pub fn digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}

/// Digest over an ordered sequence of `(key, value)` records.
///
/// Each key and value is length-prefixed so that concatenation boundaries
/// cannot alias.
pub fn state_digest<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a Vec<u8>)>,
{
    let mut hasher = Sha256::new();
    for (key, value) in entries {
        hasher.update((key.len() as u64).to_le_bytes());
        hasher.update(key.as_bytes());
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::access::AccessMask;
    use crate::domain::{DatasetGrant, Organization};
    use crate::store::{MemoryStore, StateStore};

    #[test]
    fn keys_sorted_at_every_depth() {
        let v = json!({"b": {"z": 1, "a": [ {"y": 2, "x": 1} ]}, "a": true});
        let out = String::from_utf8(encode_value(&v).unwrap()).unwrap();
        assert_eq!(out, r#"{"a":true,"b":{"a":[{"x":1,"y":2}],"z":1}}"#);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut first = Map::new();
        first.insert("name".into(), json!("n"));
        first.insert("id".into(), json!("i"));
        let mut second = Map::new();
        second.insert("id".into(), json!("i"));
        second.insert("name".into(), json!("n"));
        assert_eq!(
            encode_value(&Value::Object(first)).unwrap(),
            encode_value(&Value::Object(second)).unwrap()
        );
    }

    #[test]
    fn arrays_keep_order() {
        let out = encode_value(&json!(["b", "a", "b"])).unwrap();
        assert_eq!(out, br#"["b","a","b"]"#);
    }

    #[test]
    fn organization_encodes_sorted() {
        let mut org = Organization::new("A", "Alpha", AccessMask::READ);
        org.datasets.insert(
            "d1".into(),
            DatasetGrant {
                name: "d1".into(),
                location: "loc".into(),
                access: AccessMask::READ,
                expires_at: -1,
            },
        );
        let out = String::from_utf8(encode(&org).unwrap()).unwrap();
        assert_eq!(
            out,
            r#"{"access":16,"datasets":{"d1":{"access":16,"expiredAt":-1,"location":"loc","name":"d1"}},"id":"A","name":"Alpha","pubs":{},"subs":{},"users":{}}"#
        );
    }

    #[test]
    fn absent_and_malformed_are_distinct() {
        let absent = decode::<Organization>("k", None).unwrap_err();
        assert!(absent.is_not_found());
        let empty = decode::<Organization>("k", Some(b"")).unwrap_err();
        assert!(empty.is_not_found());
        let bad = decode::<Organization>("k", Some(b"{not json")).unwrap_err();
        assert_eq!(bad.kind().as_str(), "DecodeError");
    }

    #[test]
    fn fetch_reads_through_store() {
        let mut store = MemoryStore::new();
        let org = Organization::new("A", "Alpha", AccessMask::WRITE);
        store.put("k", encode(&org).unwrap()).unwrap();
        let back: Organization = fetch(&store, "k").unwrap();
        assert_eq!(back, org);
        assert!(fetch::<Organization>(&store, "missing").unwrap_err().is_not_found());
    }

    #[test]
    fn digest_is_lowercase_hex_sha256() {
        assert_eq!(
            digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn state_digest_separates_boundaries() {
        let a = [("ab".to_string(), b"c".to_vec())];
        let b = [("a".to_string(), b"bc".to_vec())];
        assert_ne!(
            state_digest(a.iter().map(|(k, v)| (k, v))),
            state_digest(b.iter().map(|(k, v)| (k, v)))
        );
    }
}
