/// Behavioral properties of the access contract, exercised through the
/// dispatch table exactly as a ledger peer would invoke it.

use serde_json::Value;

use access_engine::codec::{encode, encode_value};
use access_engine::domain::{DatasetGrant, Organization, User};
use access_engine::engine::AccessEngine;
use access_engine::error::ErrorKind;
use access_engine::identity::IdentityContext;
use access_engine::invocation::Invocation;
use access_engine::store::MemoryStore;

fn owner() -> IdentityContext {
    IdentityContext::new("x509::owner", "A")
}

fn member_of(org: &str) -> IdentityContext {
    IdentityContext::new(format!("x509::{}-clerk", org), org)
}

fn submit(engine: &mut AccessEngine<MemoryStore>, ctx: &IdentityContext, op: &str, args: &[&str]) -> Vec<u8> {
    engine
        .submit(ctx, &Invocation::new(op, args.iter().copied()))
        .unwrap_or_else(|e| panic!("{} failed: {}", op, e))
}

fn submit_err(
    engine: &mut AccessEngine<MemoryStore>,
    ctx: &IdentityContext,
    op: &str,
    args: &[&str],
) -> ErrorKind {
    engine
        .submit(ctx, &Invocation::new(op, args.iter().copied()))
        .expect_err("operation should fail")
        .kind()
}

fn query(engine: &AccessEngine<MemoryStore>, ctx: &IdentityContext, op: &str, args: &[&str]) -> Vec<u8> {
    engine
        .evaluate(ctx, &Invocation::new(op, args.iter().copied()))
        .unwrap_or_else(|e| panic!("{} failed: {}", op, e))
}

fn grants(engine: &AccessEngine<MemoryStore>, user: &str, dataset: &str) -> Vec<DatasetGrant> {
    let payload = query(engine, &member_of("B"), "queryAccessOnDataset", &[user, dataset]);
    serde_json::from_slice(&payload).unwrap()
}

/// Three orgs, A publishes d1/READ on c1, B subscribes c1, u1 in B.
fn traversal_world() -> AccessEngine<MemoryStore> {
    let mut e = AccessEngine::default();
    submit(&mut e, &owner(), "init", &[]);
    for id in ["A", "B", "C"] {
        submit(&mut e, &owner(), "addOrg", &[id, id, "16"]);
    }
    submit(&mut e, &member_of("A"), "updateOrgDatasetAccess", &["d1", "16", "-1", "s3://a/d1"]);
    submit(&mut e, &member_of("A"), "publishDatasetTo", &["d1", "c1", "16"]);
    submit(&mut e, &member_of("B"), "subscribe", &["c1"]);
    submit(&mut e, &member_of("B"), "addUser", &["u1", "Ann", "ann@b", "1"]);
    e
}

// ---------------------------------------------------------------------------
// Lifecycle and ownership
// ---------------------------------------------------------------------------

#[test]
fn initialization_is_exactly_once() {
    let mut e = AccessEngine::default();
    submit(&mut e, &owner(), "init", &[]);
    assert_eq!(query(&e, &owner(), "owner", &[]), b"x509::owner");

    let other = IdentityContext::new("x509::other", "B");
    assert_eq!(submit_err(&mut e, &other, "init", &[]), ErrorKind::AlreadyInitializedError);
    assert_eq!(query(&e, &other, "owner", &[]), b"x509::owner");
}

#[test]
fn owner_only_operations_reject_others_without_writing() {
    let mut e = AccessEngine::default();
    submit(&mut e, &owner(), "init", &[]);
    submit(&mut e, &owner(), "addOrg", &["A", "Alpha", "16"]);
    let before = e.state_digest();

    let intruder = member_of("A");
    for (op, args) in [
        ("addOrg", vec!["B", "Beta", "16"]),
        ("updateOrgName", vec!["A", "Hijacked"]),
        ("updateOrgAccess", vec!["A", "273"]),
        ("removeOrg", vec!["A"]),
    ] {
        assert_eq!(submit_err(&mut e, &intruder, op, &args), ErrorKind::AuthorizationError);
    }
    assert_eq!(e.state_digest(), before);
}

#[test]
fn uninitialized_contract_has_no_owner() {
    let mut e = AccessEngine::default();
    assert_eq!(
        submit_err(&mut e, &owner(), "addOrg", &["A", "Alpha", "16"]),
        ErrorKind::AuthorizationError
    );
    let err = e.evaluate(&owner(), &Invocation::bare("owner")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFoundError);
}

// ---------------------------------------------------------------------------
// Organizations and users
// ---------------------------------------------------------------------------

#[test]
fn add_org_is_create_only_and_reads_back() {
    let mut e = AccessEngine::default();
    submit(&mut e, &owner(), "init", &[]);
    submit(&mut e, &owner(), "addOrg", &["A", "Alpha", "17"]);
    assert_eq!(
        submit_err(&mut e, &owner(), "addOrg", &["A", "Other", "16"]),
        ErrorKind::AlreadyExistsError
    );

    let org: Organization = serde_json::from_slice(&query(&e, &owner(), "getOrg", &["A"])).unwrap();
    assert_eq!(org, Organization::new("A", "Alpha", access_engine::access::AccessMask(17)));
}

#[test]
fn stored_org_uses_wire_field_names() {
    let e = traversal_world();
    let raw = query(&e, &owner(), "getOrg", &["B"]);
    let v: Value = serde_json::from_slice(&raw).unwrap();
    let keys: Vec<&str> = v.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, ["access", "datasets", "id", "name", "pubs", "subs", "users"]);
    assert_eq!(v["users"]["u1"], true);
}

#[test]
fn remove_then_add_user_restores_membership() {
    let mut e = traversal_world();
    let b = member_of("B");
    submit(&mut e, &b, "removeUser", &["u1"]);
    assert_eq!(query(&e, &b, "getUser", &["B", "u1"]), b"");

    submit(&mut e, &b, "addUser", &["u1", "Ann", "ann@b", "1"]);
    let user: User = serde_json::from_slice(&query(&e, &b, "getUser", &["B", "u1"])).unwrap();
    assert_eq!(user.email, "ann@b");
    assert_eq!(user.org_memberships.get("B"), Some(&true));
}

#[test]
fn get_users_lists_active_members_only() {
    let mut e = traversal_world();
    let b = member_of("B");
    submit(&mut e, &b, "addUser", &["u2", "Ben", "ben@b", "2"]);
    submit(&mut e, &b, "removeUser", &["u1"]);
    let users: Vec<User> = serde_json::from_slice(&query(&e, &b, "getUsers", &["B"])).unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, "u2");

    let err = e
        .evaluate(&member_of("C"), &Invocation::new("getUsers", ["B"]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthorizationError);
}

#[test]
fn self_scoped_actions_need_a_registered_org() {
    let mut e = traversal_world();
    let ghost = member_of("Z");
    assert_eq!(
        submit_err(&mut e, &ghost, "addUser", &["u9", "N", "e", "p"]),
        ErrorKind::NotFoundError
    );
    assert_eq!(submit_err(&mut e, &ghost, "subscribe", &["c1"]), ErrorKind::NotFoundError);
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

#[test]
fn encoding_is_insertion_order_independent() {
    let a: Value = serde_json::from_str(r#"{"b":1,"a":{"y":[2,1],"x":null}}"#).unwrap();
    let b: Value = serde_json::from_str(r#"{"a":{"x":null,"y":[2,1]},"b":1}"#).unwrap();
    assert_eq!(encode_value(&a).unwrap(), encode_value(&b).unwrap());
    assert_eq!(encode_value(&a).unwrap(), br#"{"a":{"x":null,"y":[2,1]},"b":1}"#);

    let mut first = Organization::new("A", "Alpha", access_engine::access::AccessMask::READ);
    first.members.insert("u2".into(), true);
    first.members.insert("u1".into(), false);
    let mut second = Organization::new("A", "Alpha", access_engine::access::AccessMask::READ);
    second.members.insert("u1".into(), false);
    second.members.insert("u2".into(), true);
    assert_eq!(encode(&first).unwrap(), encode(&second).unwrap());
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

#[test]
fn traversal_returns_publisher_grant() {
    let e = traversal_world();
    let found = grants(&e, "u1", "d1");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].location, "s3://a/d1");
    assert!(grants(&e, "u1", "d2").is_empty());
}

#[test]
fn traversal_needs_a_subscription() {
    let mut e = traversal_world();
    submit(&mut e, &member_of("C"), "addUser", &["u2", "Cy", "cy@c", "3"]);
    assert!(grants(&e, "u2", "d1").is_empty());
}

#[test]
fn traversal_without_index_is_not_found() {
    let mut e = AccessEngine::default();
    submit(&mut e, &owner(), "init", &[]);
    submit(&mut e, &owner(), "addOrg", &["B", "B", "16"]);
    submit(&mut e, &member_of("B"), "addUser", &["u1", "Ann", "ann@b", "1"]);
    let err = e
        .evaluate(&member_of("B"), &Invocation::new("queryAccessOnDataset", ["u1", "d1"]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFoundError);
}

#[test]
fn expired_grants_are_still_returned() {
    let mut e = traversal_world();
    submit(&mut e, &member_of("A"), "revokePublishedDataset", &["d1", "c1", "16"]);
    let found = grants(&e, "u1", "d1");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].expires_at, 0);
    assert!(found[0].is_expired(1_700_000_000));
}

#[test]
fn duplicate_publish_duplicates_results() {
    let mut e = traversal_world();
    submit(&mut e, &member_of("A"), "publishDatasetTo", &["d1", "c1", "16"]);
    assert_eq!(grants(&e, "u1", "d1").len(), 2);
}

#[test]
fn tombstoned_subscription_is_still_traversed() {
    let mut e = traversal_world();
    submit(&mut e, &member_of("B"), "revokeSubscribing", &["c1"]);
    assert_eq!(grants(&e, "u1", "d1").len(), 1);
}

#[test]
fn tombstoned_membership_is_still_traversed() {
    let mut e = traversal_world();
    submit(&mut e, &member_of("B"), "removeUser", &["u1"]);
    assert_eq!(grants(&e, "u1", "d1").len(), 1);
}

#[test]
fn removed_publisher_is_skipped() {
    let mut e = traversal_world();
    submit(&mut e, &owner(), "removeOrg", &["A"]);
    assert!(grants(&e, "u1", "d1").is_empty());
    // removing again is a no-op
    submit(&mut e, &owner(), "removeOrg", &["A"]);
}
