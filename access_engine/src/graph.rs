/// Access Kernel: Reachability Traversal
///
/// Resolves every grant a user can reach through
///   user -> member orgs -> subscribed channels -> publishing orgs -> grants
///
/// Read-only. Only the two root lookups (publisher index, user) may fail
/// the call; any miss deeper in the graph prunes that branch.

use tracing::{debug, warn};

use crate::codec::fetch;
use crate::domain::{ChannelPublisherIndex, DatasetGrant, Organization, User};
use crate::error::{AccessError, AccessResult};
use crate::store::{keys, org_key, user_key, StateReader};

/// All grants named `dataset` reachable by `user_id`.
///
/// Traversal order: member orgs by id, their subscribed channels by name,
/// publishers in index order. No deduplication and no expiry filtering.
///
/// Membership and subscription are taken from map *keys*; a tombstoned
/// (`false`) entry is still traversed.
pub fn query_access_on_dataset(
    store: &dyn StateReader,
    user_id: &str,
    dataset: &str,
) -> AccessResult<Vec<DatasetGrant>> {
    let index: ChannelPublisherIndex = fetch(store, keys::CHANNEL_TO_PUBS)?;
    let user: User = fetch(store, &user_key(user_id)?)?;

    let mut reachable = Vec::new();
    for org_id in user.org_memberships.keys() {
        let Some(org) = load_branch(store, org_id) else {
            continue;
        };
        for channel in org.subscribed_channels.keys() {
            let Some(publishers) = index.publishers(channel) else {
                debug!(channel = %channel, "no publishers on channel, skipping");
                continue;
            };
            for publisher_id in publishers {
                let Some(publisher) = load_branch(store, publisher_id) else {
                    continue;
                };
                if let Some(grant) = publisher.datasets.get(dataset) {
                    reachable.push(grant.clone());
                }
            }
        }
    }

    debug!(user = user_id, dataset, found = reachable.len(), "access query resolved");
    Ok(reachable)
}

/// Load an org for an inner hop; any failure prunes the branch.
fn load_branch(store: &dyn StateReader, org_id: &str) -> Option<Organization> {
    let loaded = org_key(org_id).and_then(|key| fetch::<Organization>(store, &key));
    match loaded {
        Ok(org) => Some(org),
        Err(AccessError::NotFound(_)) => {
            debug!(org = org_id, "dangling organization reference, skipping");
            None
        }
        Err(e) => {
            warn!(org = org_id, error = %e, "unreadable organization, skipping");
            None
        }
    }
}
