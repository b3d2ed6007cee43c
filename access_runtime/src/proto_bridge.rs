//! Proto ↔ Kernel conversion bridge.
//!
//! A committed transaction is the caller identity plus the invocation, in
//! the exact form the kernel received them. Replay feeds these back through
//! the kernel unchanged.

use access_engine::identity::IdentityContext;
use access_engine::invocation::Invocation;

use crate::error::{RuntimeError, RuntimeResult};
use crate::proto_types::{ProtoIdentity, ProtoInvocation, ProtoTransaction};

/// One committed transaction, kernel-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub sequence: u64,
    pub ctx: IdentityContext,
    pub invocation: Invocation,
}

/// Convert a logged frame back into a kernel transaction.
///
/// Frames missing their identity or invocation are corrupt.
pub fn proto_to_kernel(proto: &ProtoTransaction) -> RuntimeResult<Transaction> {
    let identity = proto.identity.as_ref().ok_or_else(|| {
        RuntimeError::CorruptLog(format!("transaction {} has no identity", proto.sequence))
    })?;
    let invocation = proto.invocation.as_ref().ok_or_else(|| {
        RuntimeError::CorruptLog(format!("transaction {} has no invocation", proto.sequence))
    })?;

    Ok(Transaction {
        sequence: proto.sequence,
        ctx: IdentityContext::new(identity.principal.clone(), identity.org.clone()),
        invocation: Invocation::new(&invocation.operation, invocation.args.iter().cloned()),
    })
}

/// Convert a kernel transaction to its log frame.
pub fn kernel_to_proto(tx: &Transaction) -> ProtoTransaction {
    ProtoTransaction {
        sequence: tx.sequence,
        identity: Some(ProtoIdentity {
            principal: tx.ctx.principal.clone(),
            org: tx.ctx.org.clone(),
        }),
        invocation: Some(ProtoInvocation {
            operation: tx.invocation.operation.clone(),
            args: tx.invocation.args.clone(),
        }),
    }
}
