//! Hand-written protobuf types for the transaction log.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//! Field numbers are the on-disk schema; never renumber them.

use prost::Message;

// ── Transaction ────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoTransaction {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    #[prost(message, optional, tag = "2")]
    pub identity: Option<ProtoIdentity>,
    #[prost(message, optional, tag = "3")]
    pub invocation: Option<ProtoInvocation>,
}

// ── Identity ───────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoIdentity {
    #[prost(string, tag = "1")]
    pub principal: String,
    #[prost(string, tag = "2")]
    pub org: String,
}

// ── Invocation ─────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoInvocation {
    #[prost(string, tag = "1")]
    pub operation: String,
    #[prost(string, repeated, tag = "2")]
    pub args: Vec<String>,
}
