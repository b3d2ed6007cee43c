//! Replay orchestrator: rebuild world state from committed transactions.
//!
//! Delegates all domain logic to the kernel. Every transaction runs through
//! the same staged commit the replica uses, so a replayed world is
//! byte-identical to the live one.

use tracing::debug;

use access_engine::codec::state_digest;
use access_engine::engine::execute;
use access_engine::error::AccessResult;
use access_engine::identity::IdentityContext;
use access_engine::invocation::Invocation;
use access_engine::store::{MemoryStore, StagedStore};

use crate::error::{RuntimeError, RuntimeResult};
use crate::proto_bridge::Transaction;

/// Run one invocation against `world` with all-or-nothing semantics.
///
/// Writes are staged over the committed state and applied only if the
/// operation succeeds. On failure `world` is untouched.
pub fn apply_transaction(
    world: &mut MemoryStore,
    ctx: &IdentityContext,
    invocation: &Invocation,
) -> AccessResult<Vec<u8>> {
    let (payload, writes) = {
        let mut staged = StagedStore::new(&*world);
        let payload = execute(&mut staged, ctx, invocation)?;
        (payload, staged.into_write_set())
    };
    debug!(op = %invocation.operation, writes = writes.len(), "transaction committed");
    world.apply(writes);
    Ok(payload)
}

/// Apply `txs` on top of `world`, in order.
///
/// A committed transaction that fails on replay means the log and the
/// kernel disagree; that is reported, never skipped.
pub fn replay_onto(world: &mut MemoryStore, txs: &[Transaction]) -> RuntimeResult<()> {
    for tx in txs {
        apply_transaction(world, &tx.ctx, &tx.invocation).map_err(|source| {
            RuntimeError::ReplayDiverged {
                sequence: tx.sequence,
                source,
            }
        })?;
    }
    Ok(())
}

/// Rebuild the world from an empty store.
///
/// Returns `(final_world, state_digest)`.
pub fn rebuild_state(txs: &[Transaction]) -> RuntimeResult<(MemoryStore, String)> {
    let mut world = MemoryStore::new();
    replay_onto(&mut world, txs)?;
    let digest = state_digest(world.entries());
    Ok((world, digest))
}

/// Rebuild the world and return only its digest.
pub fn rebuild_digest(txs: &[Transaction]) -> RuntimeResult<String> {
    let (_, digest) = rebuild_state(txs)?;
    Ok(digest)
}
