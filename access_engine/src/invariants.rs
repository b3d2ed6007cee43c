/// Access Kernel: World-State Checks
///
/// Structural validation over a whole committed world. Used by snapshot
/// restore and by the determinism harness.
///
/// Dangling references (a user listing a removed org, an index naming a
/// removed publisher) are legal and are not reported.

use crate::codec::decode;
use crate::domain::{ChannelPublisherIndex, Organization, User};
use crate::store::{keys, split_composite_key, MemoryStore};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run every check. Panics on the first failure.
pub fn validate_world(world: &MemoryStore) {
    if let Err(msg) = try_validate_world(world) {
        panic!("World-state violation: {}", msg);
    }
}

/// Non-panicking variant of `validate_world`.
/// Returns `Err(message)` on the first failure.
pub fn try_validate_world(world: &MemoryStore) -> Result<(), String> {
    check_initialization(world)?;
    check_keys_and_records(world)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Individual checks (private)
// ---------------------------------------------------------------------------

/// Owner is recorded exactly when the init flag is set, and the flag holds `TRUE`.
fn check_initialization(world: &MemoryStore) -> Result<(), String> {
    let entries = world.entries();
    let flag = entries.get(keys::IS_INITIALIZED);
    let owner = entries.get(keys::OWNER);

    if let Some(value) = flag {
        if value.as_slice() != keys::TRUE {
            return Err(format!(
                "[init_flag] {:?} holds {:?}, expected {:?}",
                keys::IS_INITIALIZED,
                String::from_utf8_lossy(value),
                String::from_utf8_lossy(keys::TRUE)
            ));
        }
    }
    match (flag.is_some(), owner.is_some()) {
        (true, false) => Err("[owner] initialized world has no owner".to_string()),
        (false, true) => Err("[owner] owner recorded without init flag".to_string()),
        _ => Ok(()),
    }
}

/// Every key is known, and every entity record decodes under its own id.
fn check_keys_and_records(world: &MemoryStore) -> Result<(), String> {
    for (key, value) in world.entries() {
        match key.as_str() {
            keys::IS_INITIALIZED | keys::OWNER => {}
            keys::CHANNEL_TO_PUBS => {
                decode::<ChannelPublisherIndex>(key, Some(value))
                    .map_err(|e| format!("[index] {}", e))?;
            }
            _ => check_entity(key, value)?,
        }
    }
    Ok(())
}

fn check_entity(key: &str, value: &[u8]) -> Result<(), String> {
    let Some((prefix, segments)) = split_composite_key(key) else {
        return Err(format!("[unknown_key] {:?} is not a recognised key", key));
    };
    let [id] = segments.as_slice() else {
        return Err(format!("[unknown_key] {:?} has {} id segments", key, segments.len()));
    };

    let stored_id = match prefix {
        keys::ORG_PREFIX => {
            decode::<Organization>(key, Some(value))
                .map_err(|e| format!("[org_record] {}", e))?
                .id
        }
        keys::USER_PREFIX => {
            decode::<User>(key, Some(value))
                .map_err(|e| format!("[user_record] {}", e))?
                .id
        }
        other => return Err(format!("[unknown_key] unknown prefix {:?}", other)),
    };

    if stored_id != *id {
        return Err(format!(
            "[id_mismatch] record under {:?} claims id {:?}",
            id, stored_id
        ));
    }
    Ok(())
}
