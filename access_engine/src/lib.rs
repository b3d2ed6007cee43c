#![forbid(unsafe_code)]

/// Contract v1. Stored-record layout changes require a new version.
pub const CONTRACT_VERSION: u32 = 1;

pub mod access;
pub mod authorization;
pub mod codec;
pub mod domain;
pub mod engine;
pub mod error;
pub mod graph;
pub mod identity;
pub mod invariants;
pub mod invocation;
pub mod queries;
pub mod store;
pub mod transitions;
