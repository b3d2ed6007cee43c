//! Runtime error type.
//!
//! Kernel rejections pass through unchanged as `Access`; everything else is
//! a failure of the ledger machinery around the kernel.

use std::io;

use thiserror::Error;

use access_engine::error::AccessError;

use crate::snapshot_codec::SnapshotError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The kernel rejected the operation. Nothing was committed.
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A log frame could not be read back.
    #[error("corrupt transaction log: {0}")]
    CorruptLog(String),

    /// A frame outside `1..=MAX_FRAME_LEN` bytes; refused before writing.
    #[error("transaction frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("sequence violation in transaction log: expected {expected}, got {got}")]
    Sequence { expected: u64, got: u64 },

    /// A committed transaction failed when replayed.
    #[error("replay diverged at sequence {sequence}: {source}")]
    ReplayDiverged { sequence: u64, source: AccessError },

    #[error("determinism failure: run 1 = {first}, run 2 = {second}")]
    Nondeterministic { first: String, second: String },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("config error: {0}")]
    Config(String),

    /// No identity is configured for the requested organization.
    #[error("no identity configured for {0}")]
    UnknownIdentity(String),

    #[error("replica lock poisoned")]
    LockPoisoned,
}

impl RuntimeError {
    /// Kind name surfaced at the gateway boundary.
    pub fn kind_str(&self) -> &'static str {
        match self {
            RuntimeError::Access(e) => e.kind().as_str(),
            RuntimeError::UnknownIdentity(_) => "UnknownIdentity",
            RuntimeError::Config(_) => "ConfigError",
            RuntimeError::FrameTooLarge { .. } => "FrameTooLarge",
            _ => "RuntimeError",
        }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
