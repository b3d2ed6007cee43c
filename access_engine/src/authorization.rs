/// Access Kernel: Authorization Predicates
///
/// Hard-fail checks run before any mutation. Each returns
/// `AccessError::Authorization` on failure.

use crate::error::{AccessError, AccessResult};
use crate::identity::IdentityContext;
use crate::store::{keys, StateReader};

/// Stored owner principal, if the contract was initialized.
pub fn stored_owner(store: &dyn StateReader) -> AccessResult<Option<String>> {
    match store.get(keys::OWNER)? {
        None => Ok(None),
        Some(bytes) if bytes.is_empty() => Ok(None),
        Some(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| AccessError::Decode {
                key: keys::OWNER.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Fail unless the caller is the stored owner.
///
/// An uninitialized contract has no owner, so every caller fails.
pub fn require_owner(store: &dyn StateReader, ctx: &IdentityContext) -> AccessResult<()> {
    match stored_owner(store)? {
        Some(owner) if owner == ctx.principal => Ok(()),
        _ => Err(AccessError::Authorization(format!(
            "principal {:?} is not the contract owner",
            ctx.principal
        ))),
    }
}

/// Fail unless the caller acts as `org_id`.
pub fn require_org_scope(ctx: &IdentityContext, org_id: &str) -> AccessResult<()> {
    if ctx.org != org_id {
        return Err(AccessError::Authorization(format!(
            "only members of {:?} can view it, caller acts as {:?}",
            org_id, ctx.org
        )));
    }
    Ok(())
}
