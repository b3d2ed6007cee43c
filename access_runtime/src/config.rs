//! Runtime configuration.
//!
//! Loaded from a TOML file, then overridden from the environment:
//!
//! | variable                   | field                 |
//! |----------------------------|-----------------------|
//! | `CHANNEL_NAME`             | `channel_name`        |
//! | `CHAINCODE_NAME`           | `contract_name`       |
//! | `MSP_ID`                   | `gateway.default_msp` |
//! | `ACCESS_DATA_DIR`          | `data_dir`            |
//! | `ACCESS_SNAPSHOT_INTERVAL` | `snapshot_interval`   |

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RuntimeError, RuntimeResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Root directory; replicas live under `<data_dir>/<channel>/<contract>`.
    pub data_dir: PathBuf,
    /// Snapshot every N committed transactions; 0 disables.
    pub snapshot_interval: u64,
    pub channel_name: String,
    pub contract_name: String,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Identity used for the dataset permission check.
    pub default_msp: String,
    pub identities: Vec<IdentityConfig>,
    /// Drop grants that have expired before the permission check.
    pub skip_expired: bool,
}

/// The principal a gateway submits as when acting for `msp_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    pub msp_id: String,
    pub principal: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            snapshot_interval: 100,
            channel_name: "mychannel".to_string(),
            contract_name: "test2".to_string(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_msp: "Org1MSP".to_string(),
            identities: vec![
                IdentityConfig {
                    msp_id: "Org1MSP".to_string(),
                    principal: "User1@org1.example.com".to_string(),
                },
                IdentityConfig {
                    msp_id: "Org2MSP".to_string(),
                    principal: "User1@org2.example.com".to_string(),
                },
            ],
            skip_expired: false,
        }
    }
}

impl GatewayConfig {
    /// `msp_id -> principal`.
    pub fn identity_map(&self) -> BTreeMap<String, String> {
        self.identities
            .iter()
            .map(|i| (i.msp_id.clone(), i.principal.clone()))
            .collect()
    }
}

impl RuntimeConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> RuntimeResult<Self> {
        toml::from_str(text).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    /// Load a TOML file, apply environment overrides, and validate.
    pub fn load(path: &Path) -> RuntimeResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| RuntimeError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        debug!(path = %path.display(), "runtime config loaded");
        Ok(config)
    }

    /// Apply overrides from `lookup` (the process environment in `load`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> RuntimeResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CHANNEL_NAME") {
            self.channel_name = v;
        }
        if let Some(v) = lookup("CHAINCODE_NAME") {
            self.contract_name = v;
        }
        if let Some(v) = lookup("MSP_ID") {
            self.gateway.default_msp = v;
        }
        if let Some(v) = lookup("ACCESS_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ACCESS_SNAPSHOT_INTERVAL") {
            self.snapshot_interval = v.trim().parse().map_err(|_| {
                RuntimeError::Config(format!("ACCESS_SNAPSHOT_INTERVAL must be an integer, got {:?}", v))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        if self.channel_name.is_empty() || self.contract_name.is_empty() {
            return Err(RuntimeError::Config(
                "channel_name and contract_name must not be empty".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for identity in &self.gateway.identities {
            if identity.msp_id.is_empty() || identity.principal.is_empty() {
                return Err(RuntimeError::Config(
                    "gateway identities need both msp_id and principal".to_string(),
                ));
            }
            if !seen.insert(identity.msp_id.as_str()) {
                return Err(RuntimeError::Config(format!(
                    "duplicate gateway identity for {}",
                    identity.msp_id
                )));
            }
        }
        if !seen.contains(self.gateway.default_msp.as_str()) {
            return Err(RuntimeError::Config(format!(
                "default_msp {} has no configured identity",
                self.gateway.default_msp
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RuntimeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.channel_name, "mychannel");
        assert_eq!(config.gateway.identity_map().len(), 2);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            data_dir = "/var/lib/access"
            snapshot_interval = 5

            [gateway]
            default_msp = "Org3MSP"
            skip_expired = true
            identities = [{ msp_id = "Org3MSP", principal = "x509::ins" }]
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/access"));
        assert_eq!(config.snapshot_interval, 5);
        assert_eq!(config.contract_name, "test2");
        assert!(config.gateway.skip_expired);
        config.validate().unwrap();
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(RuntimeConfig::from_toml_str("peer_endpoint = \"localhost:7051\"").is_err());
    }

    #[test]
    fn environment_overrides_apply() {
        let mut config = RuntimeConfig::default();
        config
            .apply_overrides(|name| match name {
                "CHANNEL_NAME" => Some("datachannel".to_string()),
                "MSP_ID" => Some("Org2MSP".to_string()),
                "ACCESS_SNAPSHOT_INTERVAL" => Some("7".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.channel_name, "datachannel");
        assert_eq!(config.gateway.default_msp, "Org2MSP");
        assert_eq!(config.snapshot_interval, 7);

        let err = config
            .apply_overrides(|name| (name == "ACCESS_SNAPSHOT_INTERVAL").then(|| "often".to_string()))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn duplicate_identities_are_rejected() {
        let mut config = RuntimeConfig::default();
        config.gateway.identities.push(IdentityConfig {
            msp_id: "Org1MSP".to_string(),
            principal: "x509::other".to_string(),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate gateway identity for Org1MSP"));
    }

    #[test]
    fn default_msp_needs_an_identity() {
        let mut config = RuntimeConfig::default();
        config.gateway.default_msp = "Org9MSP".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.toml");
        std::fs::write(&path, "contract_name = \"access\"\n").unwrap();
        let config = RuntimeConfig::load(&path).unwrap();
        assert_eq!(config.contract_name, "access");
    }
}
