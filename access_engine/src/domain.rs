/// Access Kernel: Core Domain Types
///
/// Pure data plus small, side-effect-free helpers.
/// Serialized field names are the stored wire names; every map is a
/// BTreeMap so iteration order is identical on every replica.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::access::{AccessMask, EXPIRED, NEVER_EXPIRES};

// ── Core Domain Types ──────────────────────────────────────────────

/// One organization's offered access to a named dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetGrant {
    pub name: String,
    /// Opaque locator handed to readers.
    pub location: String,
    pub access: AccessMask,
    /// `EXPIRED`, `NEVER_EXPIRES`, or a timestamp.
    #[serde(rename = "expiredAt")]
    pub expires_at: i64,
}

impl DatasetGrant {
    /// Advisory expiry check. Nothing in the kernel enforces this.
    pub fn is_expired(&self, now: i64) -> bool {
        match self.expires_at {
            EXPIRED => true,
            NEVER_EXPIRES => false,
            at => at <= now,
        }
    }
}

/// A registered participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub access: AccessMask,
    /// userId -> membership flag (false = tombstoned)
    #[serde(rename = "users")]
    pub members: BTreeMap<String, bool>,
    /// channel -> publisher flag
    #[serde(rename = "pubs")]
    pub published_channels: BTreeMap<String, bool>,
    /// channel -> subscription flag
    #[serde(rename = "subs")]
    pub subscribed_channels: BTreeMap<String, bool>,
    pub datasets: BTreeMap<String, DatasetGrant>,
}

impl Organization {
    /// A fresh organization with empty collections.
    pub fn new(id: &str, name: &str, access: AccessMask) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            access,
            members: BTreeMap::new(),
            published_channels: BTreeMap::new(),
            subscribed_channels: BTreeMap::new(),
            datasets: BTreeMap::new(),
        }
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.get(user_id).copied().unwrap_or(false)
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.subscribed_channels.get(channel).copied().unwrap_or(false)
    }
}

/// An enrolled person; may belong to several organizations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// orgId -> membership flag (false = tombstoned)
    #[serde(rename = "orgs")]
    pub org_memberships: BTreeMap<String, bool>,
}

impl User {
    pub fn new(id: &str, name: &str, email: &str, phone: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            org_memberships: BTreeMap::new(),
        }
    }

    pub fn is_member_of(&self, org_id: &str) -> bool {
        self.org_memberships.get(org_id).copied().unwrap_or(false)
    }
}

/// Global channel -> publishers record. Append-only, duplicates kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelPublisherIndex {
    channels: BTreeMap<String, Vec<String>>,
}

impl ChannelPublisherIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `org_id` to the channel's publisher list.
    pub fn append(&mut self, channel: &str, org_id: &str) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push(org_id.to_string());
    }

    /// Publishers of `channel` in append order, if the channel was ever published.
    pub fn publishers(&self, channel: &str) -> Option<&[String]> {
        self.channels.get(channel).map(|v| v.as_slice())
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(expires_at: i64) -> DatasetGrant {
        DatasetGrant {
            name: "d1".into(),
            location: "s3://bucket/d1".into(),
            access: AccessMask::READ,
            expires_at,
        }
    }

    #[test]
    fn expiry_sentinels() {
        assert!(grant(EXPIRED).is_expired(10));
        assert!(!grant(NEVER_EXPIRES).is_expired(i64::MAX));
        assert!(grant(100).is_expired(100));
        assert!(!grant(100).is_expired(99));
    }

    #[test]
    fn organization_wire_names() {
        let org = Organization::new("Org1MSP", "Org One", AccessMask::READ);
        let v = serde_json::to_value(&org).unwrap();
        for key in ["id", "name", "access", "users", "pubs", "subs", "datasets"] {
            assert!(v.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(v["access"], 16);
    }

    #[test]
    fn grant_uses_expired_at_on_the_wire() {
        let v = serde_json::to_value(grant(NEVER_EXPIRES)).unwrap();
        assert_eq!(v["expiredAt"], -1);
        assert!(v.get("expires_at").is_none());
    }

    #[test]
    fn unknown_fields_rejected() {
        let raw = r#"{"id":"u","name":"n","email":"e","phone":"p","orgs":{},"extra":1}"#;
        assert!(serde_json::from_str::<User>(raw).is_err());
    }

    #[test]
    fn membership_flags_respect_tombstones() {
        let mut org = Organization::new("o", "o", AccessMask::NONE);
        org.members.insert("u1".into(), true);
        org.members.insert("u2".into(), false);
        assert!(org.is_member("u1"));
        assert!(!org.is_member("u2"));
        assert!(!org.is_member("u3"));
    }

    #[test]
    fn index_keeps_duplicates_in_order() {
        let mut idx = ChannelPublisherIndex::new();
        idx.append("c1", "A");
        idx.append("c1", "B");
        idx.append("c1", "A");
        assert_eq!(idx.publishers("c1").unwrap(), ["A", "B", "A"]);
        assert!(idx.publishers("c2").is_none());
    }

    #[test]
    fn index_is_a_bare_map_on_the_wire() {
        let mut idx = ChannelPublisherIndex::new();
        idx.append("c1", "A");
        assert_eq!(serde_json::to_string(&idx).unwrap(), r#"{"c1":["A"]}"#);
    }
}
