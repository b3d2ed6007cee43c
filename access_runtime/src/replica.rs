//! Replica: one peer's committed world state with persist-on-commit
//! semantics.
//!
//! Each replica gets its own directory with a transaction log and
//! snapshots. Concurrency: Mutex for write serialization, no global
//! mutable state.
//!
//! Submit order:
//!   1. execute against a staged overlay (may fail; nothing is kept)
//!   2. append the transaction to the log (only if step 1 succeeded)
//!   3. apply the staged writes to the committed world
//!   4. snapshot if the interval is reached

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

use access_engine::codec::state_digest;
use access_engine::engine::{evaluate, execute, lookup};
use access_engine::identity::IdentityContext;
use access_engine::invocation::Invocation;
use access_engine::store::{MemoryStore, StagedStore};

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::proto_bridge::{kernel_to_proto, proto_to_kernel, Transaction};
use crate::replay;
use crate::snapshot;
use crate::tx_log::TransactionLog;

/// An isolated ledger peer with its own log and world state.
pub struct Replica {
    replica_id: String,
    dir: PathBuf,
    world: MemoryStore,
    log: TransactionLog,
    snapshot_interval: u64,
    current_sequence: u64,
}

impl Replica {
    /// Open (or create) a replica in the given base directory.
    ///
    /// Directory structure:
    ///   <base_dir>/<replica_id>/transactions.log
    ///   <base_dir>/<replica_id>/snapshots/
    ///
    /// Existing state is rebuilt from the latest verified snapshot plus the
    /// log tail, or by full replay when no usable snapshot exists.
    pub fn open(base_dir: &Path, replica_id: &str, snapshot_interval: u64) -> RuntimeResult<Self> {
        let dir = base_dir.join(replica_id);
        let log = TransactionLog::open(&dir.join("transactions.log"))?;
        let last_seq = log.last_sequence();

        let mut replica = Self {
            replica_id: replica_id.to_string(),
            dir,
            world: MemoryStore::new(),
            log,
            snapshot_interval,
            current_sequence: 0,
        };

        if last_seq > 0 {
            replica.recover()?;
        }
        Ok(replica)
    }

    /// Open a replica for the configured channel and contract, under
    /// `<data_dir>/<channel_name>/<contract_name>/<replica_id>`.
    pub fn from_config(config: &RuntimeConfig, replica_id: &str) -> RuntimeResult<Self> {
        let base_dir = config.data_dir.join(&config.channel_name).join(&config.contract_name);
        let replica = Self::open(&base_dir, replica_id, config.snapshot_interval)?;
        info!(
            replica = replica_id,
            channel = %config.channel_name,
            contract = %config.contract_name,
            sequence = replica.current_sequence,
            "replica opened"
        );
        Ok(replica)
    }

    fn snapshot_dir(&self) -> PathBuf {
        self.dir.join("snapshots")
    }

    fn recover(&mut self) -> RuntimeResult<()> {
        let last_seq = self.log.last_sequence();
        let (mut world, base_seq) = match snapshot::load_latest_snapshot(&self.snapshot_dir()) {
            Ok(Some(snap)) if snap.sequence <= last_seq => match snap.restore() {
                Ok(world) => (world, snap.sequence),
                Err(e) => {
                    warn!(replica = %self.replica_id, sequence = snap.sequence, error = %e,
                        "snapshot rejected, falling back to full replay");
                    (MemoryStore::new(), 0)
                }
            },
            Ok(Some(snap)) => {
                warn!(replica = %self.replica_id, sequence = snap.sequence, last_seq,
                    "snapshot is ahead of the log, falling back to full replay");
                (MemoryStore::new(), 0)
            }
            Ok(None) => (MemoryStore::new(), 0),
            Err(e) => {
                warn!(replica = %self.replica_id, error = %e,
                    "snapshot unreadable, falling back to full replay");
                (MemoryStore::new(), 0)
            }
        };

        let tail = self
            .log
            .load_after(base_seq)?
            .iter()
            .map(proto_to_kernel)
            .collect::<RuntimeResult<Vec<_>>>()?;
        replay::replay_onto(&mut world, &tail)?;

        info!(
            replica = %self.replica_id,
            from_snapshot = base_seq,
            replayed = tail.len(),
            sequence = last_seq,
            "replica recovered"
        );
        self.world = world;
        self.current_sequence = last_seq;
        Ok(())
    }

    /// Submit path. Runs any catalogued operation; commits and logs its
    /// writes only if it succeeds.
    pub fn submit(&mut self, ctx: &IdentityContext, invocation: &Invocation) -> RuntimeResult<Vec<u8>> {
        // Step 1: execute against the overlay
        let (payload, writes) = {
            let mut staged = StagedStore::new(&self.world);
            let payload = execute(&mut staged, ctx, invocation)?;
            (payload, staged.into_write_set())
        };

        // Step 2: persist (only if step 1 succeeded)
        let tx = Transaction {
            sequence: self.current_sequence + 1,
            ctx: ctx.clone(),
            invocation: invocation.clone(),
        };
        self.log.append(&kernel_to_proto(&tx))?;
        self.current_sequence = tx.sequence;

        // Step 3: commit
        self.world.apply(writes);

        // Step 4: auto-snapshot at interval. The transaction is already
        // committed; recovery replays the log when no snapshot is usable.
        if self.snapshot_interval > 0 && tx.sequence % self.snapshot_interval == 0 {
            if let Err(e) = snapshot::save_snapshot(&self.snapshot_dir(), tx.sequence, &self.world) {
                warn!(replica = %self.replica_id, sequence = tx.sequence, error = %e,
                    "snapshot failed after commit");
            }
        }

        Ok(payload)
    }

    /// Evaluate path. Read-only operations against committed state; nothing
    /// is logged.
    pub fn evaluate(&self, ctx: &IdentityContext, invocation: &Invocation) -> RuntimeResult<Vec<u8>> {
        Ok(evaluate(&self.world, ctx, invocation)?)
    }

    /// True if `operation` names a catalogued mutating operation.
    pub fn is_mutating(operation: &str) -> RuntimeResult<bool> {
        Ok(lookup(operation)?.mutating())
    }

    /// Snapshot the committed world now, at the current sequence.
    pub fn snapshot_now(&self) -> RuntimeResult<PathBuf> {
        snapshot::save_snapshot(&self.snapshot_dir(), self.current_sequence, &self.world)
    }

    /// Rebuild from the full log, replace the world, and return its digest.
    pub fn replay_full(&mut self) -> RuntimeResult<String> {
        let txs = self.committed_transactions()?;
        let (world, digest) = replay::rebuild_state(&txs)?;
        self.world = world;
        Ok(digest)
    }

    /// Every committed transaction, in order.
    pub fn committed_transactions(&self) -> RuntimeResult<Vec<Transaction>> {
        self.log.load_all()?.iter().map(proto_to_kernel).collect()
    }

    pub fn world(&self) -> &MemoryStore {
        &self.world
    }

    pub fn state_digest(&self) -> String {
        state_digest(self.world.entries())
    }

    pub fn current_sequence(&self) -> u64 {
        self.current_sequence
    }

    pub fn replica_id(&self) -> &str {
        &self.replica_id
    }
}

/// Thread-safe replica handle using Mutex.
pub struct SharedReplica {
    inner: Mutex<Replica>,
}

impl SharedReplica {
    pub fn new(replica: Replica) -> Self {
        Self {
            inner: Mutex::new(replica),
        }
    }

    /// Submit under lock.
    pub fn submit(&self, ctx: &IdentityContext, invocation: &Invocation) -> RuntimeResult<Vec<u8>> {
        let mut replica = self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        replica.submit(ctx, invocation)
    }

    /// Evaluate under lock.
    pub fn evaluate(&self, ctx: &IdentityContext, invocation: &Invocation) -> RuntimeResult<Vec<u8>> {
        let replica = self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        replica.evaluate(ctx, invocation)
    }

    pub fn state_digest(&self) -> RuntimeResult<String> {
        let replica = self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        Ok(replica.state_digest())
    }

    pub fn current_sequence(&self) -> RuntimeResult<u64> {
        let replica = self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        Ok(replica.current_sequence())
    }

    /// Clone of the committed world, taken under lock.
    pub fn world_snapshot(&self) -> RuntimeResult<MemoryStore> {
        let replica = self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        Ok(replica.world().clone())
    }
}
