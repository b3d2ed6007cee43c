/// Access Kernel: Engine
///
/// The operation catalogue and its dispatcher. `OPERATIONS` is the single
/// source of truth for what the submit and evaluate paths may invoke.
///
/// Handlers adapt positional string arguments to the typed functions in
/// `transitions`, `queries`, and `graph`, and return the response payload.

use tracing::{debug, warn};

use crate::codec::{encode, encode_value, state_digest};
use crate::error::{AccessError, AccessResult};
use crate::graph::query_access_on_dataset;
use crate::identity::IdentityContext;
use crate::invocation::Invocation;
use crate::queries;
use crate::store::{MemoryStore, StateReader, StateStore};
use crate::transitions;

pub type SubmitFn = fn(&mut dyn StateStore, &IdentityContext, &Invocation) -> AccessResult<Vec<u8>>;
pub type EvaluateFn = fn(&dyn StateReader, &IdentityContext, &Invocation) -> AccessResult<Vec<u8>>;

/// Handler kind. The variant doubles as the mutating flag.
#[derive(Clone, Copy)]
pub enum Handler {
    /// Mutating: submit path only.
    Submit(SubmitFn),
    /// Read-only: allowed on both paths, never writes.
    Evaluate(EvaluateFn),
}

/// One catalogue entry.
#[derive(Clone, Copy)]
pub struct OperationSpec {
    pub name: &'static str,
    pub handler: Handler,
}

impl OperationSpec {
    pub const fn mutating(&self) -> bool {
        matches!(self.handler, Handler::Submit(_))
    }
}

pub static OPERATIONS: &[OperationSpec] = &[
    OperationSpec { name: "init", handler: Handler::Submit(op_init) },
    OperationSpec { name: "addOrg", handler: Handler::Submit(op_add_org) },
    OperationSpec { name: "updateOrgName", handler: Handler::Submit(op_update_org_name) },
    OperationSpec { name: "updateOrgAccess", handler: Handler::Submit(op_update_org_access) },
    OperationSpec {
        name: "updateOrgDatasetAccess",
        handler: Handler::Submit(op_update_org_dataset_access),
    },
    OperationSpec { name: "removeOrg", handler: Handler::Submit(op_remove_org) },
    OperationSpec { name: "addUser", handler: Handler::Submit(op_add_user) },
    OperationSpec { name: "removeUser", handler: Handler::Submit(op_remove_user) },
    OperationSpec { name: "publishDatasetTo", handler: Handler::Submit(op_publish_dataset_to) },
    OperationSpec {
        name: "revokePublishedDataset",
        handler: Handler::Submit(op_revoke_published_dataset),
    },
    OperationSpec { name: "subscribe", handler: Handler::Submit(op_subscribe) },
    OperationSpec { name: "revokeSubscribing", handler: Handler::Submit(op_revoke_subscribing) },
    OperationSpec { name: "owner", handler: Handler::Evaluate(op_owner) },
    OperationSpec { name: "getOrg", handler: Handler::Evaluate(op_get_org) },
    OperationSpec { name: "getUsers", handler: Handler::Evaluate(op_get_users) },
    OperationSpec { name: "getUser", handler: Handler::Evaluate(op_get_user) },
    OperationSpec {
        name: "queryAccessOnDataset",
        handler: Handler::Evaluate(op_query_access_on_dataset),
    },
];

/// Look up a catalogue entry by name.
pub fn lookup(name: &str) -> AccessResult<&'static OperationSpec> {
    OPERATIONS
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| AccessError::UnknownOperation(name.to_string()))
}

/// Execute any catalogued operation against `store` (submit path).
///
/// Writes go straight to `store`. Discarding them on failure is the
/// caller's job; stage through `StagedStore` for all-or-nothing.
pub fn execute(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    invocation: &Invocation,
) -> AccessResult<Vec<u8>> {
    let spec = lookup(&invocation.operation)?;
    debug!(op = spec.name, principal = %ctx.principal, org = %ctx.org, "submit");
    let outcome = match spec.handler {
        Handler::Submit(f) => f(store, ctx, invocation),
        Handler::Evaluate(f) => f(store.as_reader(), ctx, invocation),
    };
    if let Err(e) = &outcome {
        warn!(op = spec.name, kind = e.kind().as_str(), error = %e, "operation rejected");
    }
    outcome
}

/// Execute a read-only operation (evaluate path). Mutating operations are
/// refused before they run.
pub fn evaluate(
    store: &dyn StateReader,
    ctx: &IdentityContext,
    invocation: &Invocation,
) -> AccessResult<Vec<u8>> {
    let spec = lookup(&invocation.operation)?;
    debug!(op = spec.name, principal = %ctx.principal, org = %ctx.org, "evaluate");
    match spec.handler {
        Handler::Evaluate(f) => f(store, ctx, invocation),
        Handler::Submit(_) => Err(AccessError::NotEvaluable(spec.name.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Engine: a state machine composed over an injected store
// ---------------------------------------------------------------------------

/// Stateful wrapper owning one store.
pub struct AccessEngine<S> {
    store: S,
}

impl<S: StateStore> AccessEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn submit(&mut self, ctx: &IdentityContext, invocation: &Invocation) -> AccessResult<Vec<u8>> {
        execute(&mut self.store, ctx, invocation)
    }

    pub fn evaluate(&self, ctx: &IdentityContext, invocation: &Invocation) -> AccessResult<Vec<u8>> {
        evaluate(&self.store, ctx, invocation)
    }
}

impl AccessEngine<MemoryStore> {
    /// Digest over the whole world state, in key order.
    pub fn state_digest(&self) -> String {
        state_digest(self.store.entries())
    }
}

impl Default for AccessEngine<MemoryStore> {
    fn default() -> Self {
        Self::new(MemoryStore::new())
    }
}

// ---------------------------------------------------------------------------
// Argument adapters (private)
// ---------------------------------------------------------------------------

fn op_init(store: &mut dyn StateStore, ctx: &IdentityContext, inv: &Invocation) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&[])?;
    transitions::init(store, ctx)?;
    Ok(Vec::new())
}

fn op_add_org(store: &mut dyn StateStore, ctx: &IdentityContext, inv: &Invocation) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["id", "name", "access"])?;
    transitions::add_org(
        store,
        ctx,
        inv.str_arg(0, "id")?,
        inv.str_arg(1, "name")?,
        inv.mask_arg(2, "access")?,
    )?;
    Ok(Vec::new())
}

fn op_update_org_name(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    inv: &Invocation,
) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["id", "name"])?;
    transitions::update_org_name(store, ctx, inv.str_arg(0, "id")?, inv.str_arg(1, "name")?)?;
    Ok(Vec::new())
}

fn op_update_org_access(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    inv: &Invocation,
) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["id", "access"])?;
    transitions::update_org_access(store, ctx, inv.str_arg(0, "id")?, inv.mask_arg(1, "access")?)?;
    Ok(Vec::new())
}

fn op_update_org_dataset_access(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    inv: &Invocation,
) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["dataset", "access", "expiredAt", "location"])?;
    transitions::update_org_dataset_access(
        store,
        ctx,
        inv.str_arg(0, "dataset")?,
        inv.mask_arg(1, "access")?,
        inv.expiry_arg(2, "expiredAt")?,
        inv.str_arg(3, "location")?,
    )?;
    Ok(Vec::new())
}

fn op_remove_org(store: &mut dyn StateStore, ctx: &IdentityContext, inv: &Invocation) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["id"])?;
    transitions::remove_org(store, ctx, inv.str_arg(0, "id")?)?;
    Ok(Vec::new())
}

fn op_add_user(store: &mut dyn StateStore, ctx: &IdentityContext, inv: &Invocation) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["id", "name", "email", "phone"])?;
    transitions::add_user(
        store,
        ctx,
        inv.str_arg(0, "id")?,
        inv.str_arg(1, "name")?,
        inv.str_arg(2, "email")?,
        inv.str_arg(3, "phone")?,
    )?;
    Ok(Vec::new())
}

fn op_remove_user(store: &mut dyn StateStore, ctx: &IdentityContext, inv: &Invocation) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["id"])?;
    transitions::remove_user(store, ctx, inv.str_arg(0, "id")?)?;
    Ok(Vec::new())
}

fn op_publish_dataset_to(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    inv: &Invocation,
) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["dataset", "channel", "access"])?;
    transitions::publish_dataset_to(
        store,
        ctx,
        inv.str_arg(0, "dataset")?,
        inv.str_arg(1, "channel")?,
        inv.mask_arg(2, "access")?,
    )?;
    Ok(Vec::new())
}

fn op_revoke_published_dataset(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    inv: &Invocation,
) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["dataset", "channel", "access"])?;
    transitions::revoke_published_dataset(
        store,
        ctx,
        inv.str_arg(0, "dataset")?,
        inv.str_arg(1, "channel")?,
        inv.mask_arg(2, "access")?,
    )?;
    Ok(Vec::new())
}

fn op_subscribe(store: &mut dyn StateStore, ctx: &IdentityContext, inv: &Invocation) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["channel"])?;
    transitions::subscribe(store, ctx, inv.str_arg(0, "channel")?)?;
    Ok(Vec::new())
}

fn op_revoke_subscribing(
    store: &mut dyn StateStore,
    ctx: &IdentityContext,
    inv: &Invocation,
) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["channel"])?;
    transitions::revoke_subscribing(store, ctx, inv.str_arg(0, "channel")?)?;
    Ok(Vec::new())
}

/// Owner is returned as the raw principal string, not JSON.
fn op_owner(store: &dyn StateReader, _ctx: &IdentityContext, inv: &Invocation) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&[])?;
    Ok(queries::owner(store)?.into_bytes())
}

fn op_get_org(store: &dyn StateReader, _ctx: &IdentityContext, inv: &Invocation) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["id"])?;
    encode(&queries::get_org(store, inv.str_arg(0, "id")?)?)
}

fn op_get_users(store: &dyn StateReader, ctx: &IdentityContext, inv: &Invocation) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["orgId"])?;
    encode(&queries::get_users(store, ctx, inv.str_arg(0, "orgId")?)?)
}

/// Empty payload when the user is not an active member.
fn op_get_user(store: &dyn StateReader, ctx: &IdentityContext, inv: &Invocation) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["orgId", "userId"])?;
    match queries::get_user(store, ctx, inv.str_arg(0, "orgId")?, inv.str_arg(1, "userId")?)? {
        Some(user) => encode(&user),
        None => Ok(Vec::new()),
    }
}

fn op_query_access_on_dataset(
    store: &dyn StateReader,
    _ctx: &IdentityContext,
    inv: &Invocation,
) -> AccessResult<Vec<u8>> {
    inv.expect_arity(&["userId", "dataset"])?;
    let grants = query_access_on_dataset(store, inv.str_arg(0, "userId")?, inv.str_arg(1, "dataset")?)?;
    let value = serde_json::to_value(&grants)
        .map_err(|e| AccessError::Validation(format!("grant list not encodable: {}", e)))?;
    encode_value(&value)
}
