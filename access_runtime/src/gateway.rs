//! Gateway: the boundary adapter between external callers and a replica.
//!
//! Translates external method names, picks the configured identity for the
//! caller's organization, and shapes every outcome as a structured
//! response. Failures become `{status: "fail"}` responses; they never
//! escape as errors.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use access_engine::access::AccessMask;
use access_engine::domain::DatasetGrant;
use access_engine::error::AccessError;
use access_engine::identity::IdentityContext;
use access_engine::invocation::Invocation;

use crate::config::GatewayConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::replica::SharedReplica;

/// External method name -> catalogue operation. `None` marks a method the
/// gateway knows but the contract does not offer.
pub static METHOD_MAPPER: &[(&str, Option<&str>)] = &[
    ("initContract", Some("init")),
    ("transferOwnershipTo", None),
    ("addOrg", Some("addOrg")),
    ("updateOrgName", Some("updateOrgName")),
    ("updateOrgAccess", Some("updateOrgAccess")),
    ("updateOrgDatasetAccess", Some("updateOrgDatasetAccess")),
    ("removeOrg", Some("removeOrg")),
    ("addUser", Some("addUser")),
    ("removeUser", Some("removeUser")),
    ("publishDatasetTo", Some("publishDatasetTo")),
    ("revokePublishedDataset", Some("revokePublishedDataset")),
    ("subscribe", Some("subscribe")),
    ("revokeSubscribing", Some("revokeSubscribing")),
    ("queryAccessOnDataset", Some("queryAccessOnDataset")),
    ("owner", Some("owner")),
    ("getOrg", Some("getOrg")),
    ("getUsers", Some("getUsers")),
    ("getUser", Some("getUser")),
];

/// Resolve an external method name for the submit path.
pub fn resolve_method(name: &str) -> Result<&'static str, AccessError> {
    match METHOD_MAPPER.iter().find(|(external, _)| *external == name) {
        Some((_, Some(op))) => Ok(*op),
        _ => Err(AccessError::UnknownOperation(name.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Fail,
}

/// Structured response body, plus the HTTP-style status it would carry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayResponse {
    #[serde(skip)]
    pub http_status: u16,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl GatewayResponse {
    fn success() -> Self {
        Self {
            http_status: 200,
            status: Status::Success,
            data: None,
            location: None,
            kind: None,
            msg: None,
        }
    }

    fn with_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::success()
        }
    }

    fn fail(err: &RuntimeError) -> Self {
        Self {
            status: Status::Fail,
            kind: Some(err.kind_str().to_string()),
            msg: Some(err.to_string()),
            ..Self::success()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Payload bytes as JSON when they parse, otherwise as a plain string.
pub fn payload_to_json(payload: &[u8]) -> Value {
    serde_json::from_slice(payload)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).into_owned()))
}

/// Gateway over one shared replica.
pub struct Gateway {
    replica: Arc<SharedReplica>,
    identities: BTreeMap<String, String>,
    default_msp: String,
    skip_expired: bool,
}

impl Gateway {
    pub fn new(replica: Arc<SharedReplica>, config: &GatewayConfig) -> Self {
        Self {
            replica,
            identities: config.identity_map(),
            default_msp: config.default_msp.clone(),
            skip_expired: config.skip_expired,
        }
    }

    fn identity(&self, msp_id: &str) -> RuntimeResult<IdentityContext> {
        self.identities
            .get(msp_id)
            .map(|principal| IdentityContext::new(principal.clone(), msp_id))
            .ok_or_else(|| RuntimeError::UnknownIdentity(msp_id.to_string()))
    }

    /// Submit `func_name` as `msp_id`. Arguments are stringified the way the
    /// contract receives them.
    pub fn call(&self, msp_id: &str, func_name: &str, args: &[Value]) -> GatewayResponse {
        match self.submit(msp_id, func_name, stringify_args(args)) {
            Ok(_) => {
                info!(msp = msp_id, method = func_name, "call committed");
                GatewayResponse::success()
            }
            Err(e) => {
                warn!(msp = msp_id, method = func_name, error = %e, "call failed");
                GatewayResponse::fail(&e)
            }
        }
    }

    /// Evaluate `func_name` as `msp_id`. Query names are catalogue names.
    pub fn query(&self, msp_id: &str, func_name: &str, args: &[Value]) -> GatewayResponse {
        match self.evaluate(msp_id, func_name, stringify_args(args)) {
            Ok(payload) => GatewayResponse::with_data(payload_to_json(&payload)),
            Err(e) => {
                warn!(msp = msp_id, method = func_name, error = %e, "query failed");
                GatewayResponse::fail(&e)
            }
        }
    }

    fn submit(&self, msp_id: &str, func_name: &str, args: Vec<String>) -> RuntimeResult<Vec<u8>> {
        let op = resolve_method(func_name)?;
        let ctx = self.identity(msp_id)?;
        self.replica.submit(&ctx, &Invocation::new(op, args))
    }

    fn evaluate(&self, msp_id: &str, op: &str, args: Vec<String>) -> RuntimeResult<Vec<u8>> {
        let ctx = self.identity(msp_id)?;
        self.replica.evaluate(&ctx, &Invocation::new(op, args))
    }

    /// Resolve where `user_id` may read `dataset` from.
    ///
    /// Returns the location of the first reachable grant carrying READ and a
    /// non-empty location, or a 403 "No Permission" response. `now` is only consulted when the
    /// gateway is configured to skip expired grants.
    pub fn check_dataset_permission(&self, user_id: &str, dataset: &str, now: i64) -> GatewayResponse {
        let grants = self
            .evaluate(
                &self.default_msp,
                "queryAccessOnDataset",
                vec![user_id.to_string(), dataset.to_string()],
            )
            .and_then(|payload| {
                serde_json::from_slice::<Vec<DatasetGrant>>(&payload).map_err(|e| {
                    RuntimeError::Access(AccessError::Decode {
                        key: "queryAccessOnDataset".to_string(),
                        reason: e.to_string(),
                    })
                })
            });

        let grants = match grants {
            Ok(grants) => grants,
            Err(e) => {
                warn!(user = user_id, dataset, error = %e, "permission check failed");
                return GatewayResponse::fail(&e);
            }
        };

        let readable = grants
            .iter()
            .filter(|g| !self.skip_expired || !g.is_expired(now))
            .find(|g| g.access.allows(AccessMask::READ) && !g.location.is_empty());

        match readable {
            Some(grant) => GatewayResponse {
                location: Some(grant.location.clone()),
                ..GatewayResponse::success()
            },
            None => GatewayResponse {
                http_status: 403,
                msg: Some("No Permission".to_string()),
                ..GatewayResponse::success()
            },
        }
    }
}

fn stringify_args(args: &[Value]) -> Vec<String> {
    args.iter()
        .map(|a| match a {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}
