/// Access Kernel: Centralized Transition Logic
///
/// ALL state-mutation logic lives here. Every handler loads the entities it
/// touches, validates, mutates, and writes each mutated entity back as a
/// complete canonical re-encode. No partial-field writes.

use serde::Serialize;
use tracing::{debug, info};

use crate::access::{validate_id, AccessMask, EXPIRED};
use crate::authorization::require_owner;
use crate::codec::{encode, fetch};
use crate::domain::{ChannelPublisherIndex, DatasetGrant, Organization, User};
use crate::error::{AccessError, AccessResult};
use crate::identity::IdentityContext;
use crate::store::{keys, org_key, user_key, StateStore};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn save<T: Serialize>(store: &mut dyn StateStore, key: &str, entity: &T) -> AccessResult<()> {
    let bytes = encode(entity)?;
    store.put(key, bytes)
}

fn load_org(store: &dyn StateStore, id: &str) -> AccessResult<(String, Organization)> {
    let key = org_key(id)?;
    let org = fetch(store.as_reader(), &key)?;
    Ok((key, org))
}

/// Load the caller's own organization for a self-scoped action.
fn load_acting_org(
    store: &dyn StateStore,
    ctx: &IdentityContext,
) -> AccessResult<(String, Organization)> {
    let org_id = ctx.acting_org()?;
    load_org(store, org_id)
}

// ---------------------------------------------------------------------------
// Contract lifecycle
// ---------------------------------------------------------------------------

/// Exactly-once setup: record the caller as owner and set the init flag.
pub fn init(store: &mut dyn StateStore, ctx: &IdentityContext) -> AccessResult<()> {
    if let Some(flag) = store.get(keys::IS_INITIALIZED)? {
        if !flag.is_empty() {
            return Err(AccessError::AlreadyInitialized);
        }
    }
    validate_id("caller principal", &ctx.principal)?;

    store.put(keys::OWNER, ctx.principal.as_bytes().to_vec())?;
    store.put(keys::IS_INITIALIZED, keys::TRUE.to_vec())?;
    info!(owner = %ctx.principal, "contract initialized");
    Ok(())
}

// ---------------------------------------------------------------------------
// Owner-administered organizations
// ---------------------------------------------------------------------------

pub fn add_org(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    id: &str,
    name: &str,
    access: AccessMask,
) -> AccessResult<()> {
    require_owner(store.as_reader(), ctx)?;
    validate_id("org id", id)?;

    let key = org_key(id)?;
    if matches!(store.get(&key)?, Some(existing) if !existing.is_empty()) {
        return Err(AccessError::AlreadyExists(key));
    }

    save(store, &key, &Organization::new(id, name, access))?;
    debug!(org = id, %access, "organization added");
    Ok(())
}

pub fn update_org_name(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    id: &str,
    name: &str,
) -> AccessResult<()> {
    require_owner(store.as_reader(), ctx)?;
    let (key, mut org) = load_org(store, id)?;
    org.name = name.to_string();
    save(store, &key, &org)
}

pub fn update_org_access(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    id: &str,
    access: AccessMask,
) -> AccessResult<()> {
    require_owner(store.as_reader(), ctx)?;
    let (key, mut org) = load_org(store, id)?;
    org.access = access;
    save(store, &key, &org)
}

/// Hard delete. Deleting an absent org is not an error.
///
/// The id is NOT purged from the channel publisher index; traversals skip
/// the dangling entry.
pub fn remove_org(store: &mut dyn StateStore, ctx: &IdentityContext, id: &str) -> AccessResult<()> {
    require_owner(store.as_reader(), ctx)?;
    let key = org_key(id)?;
    store.delete(&key)?;
    debug!(org = id, "organization removed");
    Ok(())
}

// ---------------------------------------------------------------------------
// Self-scoped organization actions
// ---------------------------------------------------------------------------

/// Upsert the caller org's grant for `dataset`.
pub fn update_org_dataset_access(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    dataset: &str,
    access: AccessMask,
    expires_at: i64,
    location: &str,
) -> AccessResult<()> {
    validate_id("dataset", dataset)?;
    let (key, mut org) = load_acting_org(store, ctx)?;
    org.datasets.insert(
        dataset.to_string(),
        DatasetGrant {
            name: dataset.to_string(),
            location: location.to_string(),
            access,
            expires_at,
        },
    );
    save(store, &key, &org)?;
    debug!(org = %org.id, dataset, %access, expires_at, "dataset grant updated");
    Ok(())
}

/// Enroll (or re-enroll) a user in the caller's org.
///
/// Profile fields are overwritten; memberships in other orgs are kept.
pub fn add_user(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    id: &str,
    name: &str,
    email: &str,
    phone: &str,
) -> AccessResult<()> {
    validate_id("user id", id)?;
    let (org_record, mut org) = load_acting_org(store, ctx)?;
    org.members.insert(id.to_string(), true);
    save(store, &org_record, &org)?;

    let key = user_key(id)?;
    let mut user = match fetch::<User>(store.as_reader(), &key) {
        Ok(mut existing) => {
            existing.name = name.to_string();
            existing.email = email.to_string();
            existing.phone = phone.to_string();
            existing
        }
        Err(e) if e.is_not_found() => User::new(id, name, email, phone),
        Err(e) => return Err(e),
    };
    user.org_memberships.insert(org.id.clone(), true);
    save(store, &key, &user)?;
    debug!(org = %org.id, user = id, "user enrolled");
    Ok(())
}

/// Tombstone a membership on both sides. No-op for non-members.
pub fn remove_user(store: &mut dyn StateStore, ctx: &IdentityContext, id: &str) -> AccessResult<()> {
    let (org_record, mut org) = load_acting_org(store, ctx)?;
    if !org.is_member(id) {
        debug!(org = %org.id, user = id, "remove_user: not a member, nothing to do");
        return Ok(());
    }
    org.members.insert(id.to_string(), false);
    save(store, &org_record, &org)?;

    let key = user_key(id)?;
    match fetch::<User>(store.as_reader(), &key) {
        Ok(mut user) => {
            user.org_memberships.insert(org.id.clone(), false);
            save(store, &key, &user)?;
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }
    debug!(org = %org.id, user = id, "user membership tombstoned");
    Ok(())
}

/// Declare the caller org a publisher on `channel`.
///
/// The org id is appended to the global index every time, so repeated
/// publishes produce repeated entries.
pub fn publish_dataset_to(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    dataset: &str,
    channel: &str,
    access: AccessMask,
) -> AccessResult<()> {
    validate_id("channel", channel)?;
    let (org_record, mut org) = load_acting_org(store, ctx)?;
    org.published_channels.insert(channel.to_string(), true);
    save(store, &org_record, &org)?;

    let mut index = match fetch::<ChannelPublisherIndex>(store.as_reader(), keys::CHANNEL_TO_PUBS) {
        Ok(index) => index,
        Err(e) if e.is_not_found() => ChannelPublisherIndex::new(),
        Err(e) => return Err(e),
    };
    index.append(channel, &org.id);
    save(store, keys::CHANNEL_TO_PUBS, &index)?;
    debug!(org = %org.id, dataset, channel, %access, "published on channel");
    Ok(())
}

/// Mark the caller org's grant for `dataset` as expired.
pub fn revoke_published_dataset(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    dataset: &str,
    channel: &str,
    access: AccessMask,
) -> AccessResult<()> {
    let (key, mut org) = load_acting_org(store, ctx)?;
    let grant = org.datasets.get_mut(dataset).ok_or_else(|| {
        AccessError::NotFound(format!("dataset {} of org {}", dataset, org.id))
    })?;
    grant.expires_at = EXPIRED;
    save(store, &key, &org)?;
    debug!(org = %org.id, dataset, channel, %access, "dataset grant revoked");
    Ok(())
}

pub fn subscribe(store: &mut dyn StateStore, ctx: &IdentityContext, channel: &str) -> AccessResult<()> {
    set_subscription(store, ctx, channel, true)
}

pub fn revoke_subscribing(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    channel: &str,
) -> AccessResult<()> {
    set_subscription(store, ctx, channel, false)
}

fn set_subscription(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    channel: &str,
    subscribed: bool,
) -> AccessResult<()> {
    validate_id("channel", channel)?;
    let (key, mut org) = load_acting_org(store, ctx)?;
    org.subscribed_channels.insert(channel.to_string(), subscribed);
    save(store, &key, &org)?;
    debug!(org = %org.id, channel, subscribed, "subscription updated");
    Ok(())
}
