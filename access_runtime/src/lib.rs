#![forbid(unsafe_code)]

//! Access Runtime
//!
//! Plays the ledger's part around the access kernel: an append-only
//! transaction log, staged all-or-nothing commits, replay, snapshots,
//! drift detection, configuration, and the gateway boundary.
//!
//! No domain logic lives here. Every transition and query is delegated to
//! the kernel.

pub mod config;
pub mod drift;
pub mod error;
pub mod gateway;
pub mod proto_bridge;
pub mod proto_types;
pub mod replay;
pub mod replica;
pub mod snapshot;
pub mod snapshot_codec;
pub mod tx_log;
