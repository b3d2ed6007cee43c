/// Access Kernel: Read-Only Queries
///
/// Point reads over stored entities. None of these can write: they are
/// handed a `StateReader` only.

use crate::authorization::{require_org_scope, stored_owner};
use crate::codec::fetch;
use crate::domain::{Organization, User};
use crate::error::{AccessError, AccessResult};
use crate::identity::IdentityContext;
use crate::store::{keys, org_key, user_key, StateReader};

/// The owner principal recorded at initialization.
pub fn owner(store: &dyn StateReader) -> AccessResult<String> {
    stored_owner(store)?.ok_or_else(|| AccessError::NotFound(keys::OWNER.to_string()))
}

pub fn get_org(store: &dyn StateReader, id: &str) -> AccessResult<Organization> {
    fetch(store, &org_key(id)?)
}

/// Active members of `org_id`, in user-id order. Caller must act as `org_id`.
///
/// A user is listed only when both the org's flag and the user's own
/// membership flag are set.
pub fn get_users(
    store: &dyn StateReader,
    ctx: &IdentityContext,
    org_id: &str,
) -> AccessResult<Vec<User>> {
    require_org_scope(ctx, org_id)?;
    let org = get_org(store, org_id)?;

    let mut users = Vec::new();
    for user_id in org.members.keys() {
        let user: User = fetch(store, &user_key(user_id)?)?;
        if user.is_member_of(org_id) {
            users.push(user);
        }
    }
    Ok(users)
}

/// One user as seen by `org_id`. `Ok(None)` when the user exists but is not
/// an active member of that org.
pub fn get_user(
    store: &dyn StateReader,
    ctx: &IdentityContext,
    org_id: &str,
    user_id: &str,
) -> AccessResult<Option<User>> {
    require_org_scope(ctx, org_id)?;
    let user: User = fetch(store, &user_key(user_id)?)?;
    Ok(user.is_member_of(org_id).then_some(user))
}
