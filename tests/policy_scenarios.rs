//! End-to-end scenarios driving the evaluator against a populated store,
//! the way the surrounding service does: resolve lookups from the store,
//! evaluate, and commit the proposed snapshot only on Allow.

use serde_json::json;
use typegate::policy::types::{
    AccessRequest, Decision, FieldValue, Identity, Operation, Snapshot,
};
use typegate::policy::{chat_dependency, evaluate};
use typegate::store::MemoryStore;

fn check(store: &MemoryStore, req: &AccessRequest) -> Decision {
    evaluate(req, &store.lookups_for(req))
}

/// Evaluate and, on Allow, write the proposed snapshot.
fn apply(store: &mut MemoryStore, req: AccessRequest) -> Decision {
    let decision = check(store, &req);
    if decision.is_allow() {
        if let (Some(id), Some(proposed)) = (req.document_id.as_deref(), req.proposed) {
            store.put(&req.collection, id, proposed);
        }
    }
    decision
}

fn user_profile(uid: &str, mbti: &str) -> Snapshot {
    Snapshot::new()
        .with("uid", FieldValue::string(uid))
        .with("email", FieldValue::string(&format!("{uid}@example.com")))
        .with("name", FieldValue::string(uid))
        .with("createdAt", FieldValue::server_assigned())
        .with("updatedAt", FieldValue::server_assigned())
        .with("mbtiType", FieldValue::string(mbti))
}

fn request(
    operation: Operation,
    collection: &str,
    document_id: &str,
    identity: Identity,
    store: &MemoryStore,
    proposed: Option<Snapshot>,
) -> AccessRequest {
    AccessRequest {
        operation,
        collection: collection.to_string(),
        document_id: Some(document_id.to_string()),
        identity,
        existing: store.get(collection, document_id).cloned(),
        proposed,
    }
}

#[test]
fn profile_lifecycle_scenario() {
    let mut store = MemoryStore::new();
    let testuser = Identity::user("testuser");

    // testuser creates users/testuser with a valid type
    let create_own = request(
        Operation::Create,
        "users",
        "testuser",
        testuser.clone(),
        &store,
        Some(user_profile("testuser", "ENFP")),
    );
    assert_eq!(apply(&mut store, create_own), Decision::Allow);
    // server tokens were materialized on the way in
    assert!(store
        .get("users", "testuser")
        .unwrap()
        .get("createdAt")
        .unwrap()
        .as_str()
        .is_some());

    // same identity cannot create someone else's profile
    let create_other = request(
        Operation::Create,
        "users",
        "otheruser",
        testuser.clone(),
        &store,
        Some(user_profile("otheruser", "ENFP")),
    );
    assert_eq!(apply(&mut store, create_other), Decision::Deny);
    assert!(store.get("users", "otheruser").is_none());

    // and cannot later change its own uid
    let tampered = store
        .get("users", "testuser")
        .cloned()
        .unwrap()
        .with("uid", FieldValue::string("changed_uid"));
    let change_uid = request(
        Operation::Update,
        "users",
        "testuser",
        testuser.clone(),
        &store,
        Some(tampered),
    );
    assert_eq!(apply(&mut store, change_uid), Decision::Deny);
    assert_eq!(
        store.get("users", "testuser").unwrap().str_field("uid"),
        Some("testuser")
    );

    // a legitimate rename goes through
    let renamed = store
        .get("users", "testuser")
        .cloned()
        .unwrap()
        .with("name", FieldValue::string("New Name"))
        .with("updatedAt", FieldValue::server_assigned());
    let rename = request(
        Operation::Update,
        "users",
        "testuser",
        testuser,
        &store,
        Some(renamed),
    );
    assert_eq!(apply(&mut store, rename), Decision::Allow);
    assert_eq!(
        store.get("users", "testuser").unwrap().str_field("name"),
        Some("New Name")
    );
}

#[test]
fn chat_and_message_scenario() {
    let mut store = MemoryStore::new();
    let alice = Identity::user("alice");
    let bob = Identity::user("bob");
    let mallory = Identity::user("mallory");

    let chat = Snapshot::new()
        .with("chatId", FieldValue::string("chat_1"))
        .with("type", FieldValue::string("group"))
        .with("title", FieldValue::string("weekend plans"))
        .with("createdBy", FieldValue::string("alice"))
        .with("createdAt", FieldValue::server_assigned())
        .with("participants", json!(["alice", "bob"]).into());

    // alice creates a chat she participates in
    let create_chat = request(
        Operation::Create,
        "chats",
        "chat_1",
        alice.clone(),
        &store,
        Some(chat),
    );
    assert_eq!(apply(&mut store, create_chat), Decision::Allow);

    let message = Snapshot::new()
        .with("messageId", FieldValue::string("msg_1"))
        .with("chatId", FieldValue::string("chat_1"))
        .with("senderId", FieldValue::string("bob"))
        .with("content", FieldValue::string("hi"))
        .with("createdAt", FieldValue::server_assigned());

    // the message create declares its chat dependency, resolved from the store
    let create_msg = request(
        Operation::Create,
        "messages",
        "msg_1",
        bob.clone(),
        &store,
        Some(message.clone()),
    );
    assert_eq!(chat_dependency(&create_msg), Some("chat_1"));
    assert_eq!(apply(&mut store, create_msg), Decision::Allow);

    // a non-participant cannot write into the chat, even authenticated
    let intruding = message
        .clone()
        .with("messageId", FieldValue::string("msg_2"))
        .with("senderId", FieldValue::string("mallory"));
    let create_intruding = request(
        Operation::Create,
        "messages",
        "msg_2",
        mallory.clone(),
        &store,
        Some(intruding),
    );
    assert_eq!(apply(&mut store, create_intruding), Decision::Deny);

    // nor read what was written
    let read = request(Operation::Read, "messages", "msg_1", mallory, &store, None);
    assert_eq!(check(&store, &read), Decision::Deny);
    let read = request(Operation::Read, "messages", "msg_1", alice, &store, None);
    assert_eq!(check(&store, &read), Decision::Allow);

    // a message pointing at a chat that never existed fails closed
    let orphan = Snapshot::new()
        .with("messageId", FieldValue::string("msg_3"))
        .with("chatId", FieldValue::string("ghost_chat"))
        .with("senderId", FieldValue::string("bob"))
        .with("content", FieldValue::string("lost"));
    let create_orphan = request(
        Operation::Create,
        "messages",
        "msg_3",
        bob,
        &store,
        Some(orphan),
    );
    assert_eq!(apply(&mut store, create_orphan), Decision::Deny);
}

#[test]
fn test_results_are_write_once() {
    let mut store = MemoryStore::new();
    let testuser = Identity::user("testuser");

    let result = Snapshot::new()
        .with("testId", FieldValue::string("test_1"))
        .with("userId", FieldValue::string("testuser"))
        .with("result", FieldValue::string("ENFP"))
        .with("completedAt", FieldValue::server_assigned());

    let create = request(
        Operation::Create,
        "mbti_tests",
        "test_1",
        testuser.clone(),
        &store,
        Some(result),
    );
    assert_eq!(apply(&mut store, create), Decision::Allow);

    // no update is ever admitted, whatever the change
    let retake = store
        .get("mbti_tests", "test_1")
        .cloned()
        .unwrap()
        .with("result", FieldValue::string("INTJ"));
    let update = request(
        Operation::Update,
        "mbti_tests",
        "test_1",
        testuser.clone(),
        &store,
        Some(retake),
    );
    assert_eq!(apply(&mut store, update), Decision::Deny);
    assert_eq!(
        store.get("mbti_tests", "test_1").unwrap().str_field("result"),
        Some("ENFP")
    );

    // only the owner reads it back
    let read = request(
        Operation::Read,
        "mbti_tests",
        "test_1",
        Identity::user("otheruser"),
        &store,
        None,
    );
    assert_eq!(check(&store, &read), Decision::Deny);
    let read = request(Operation::Read, "mbti_tests", "test_1", testuser, &store, None);
    assert_eq!(check(&store, &read), Decision::Allow);
}

#[test]
fn migrated_email_collection_stays_private() {
    // documents written by the migration live outside the declared set, so
    // clients cannot touch them at all
    let mut store = MemoryStore::new();
    typegate::migrate::migrate_emails(
        &mut store,
        &[typegate::migrate::AuthUser {
            uid: "u1".into(),
            email: Some("alice@example.com".into()),
        }],
    );

    for op in [Operation::Read, Operation::List, Operation::Update, Operation::Delete] {
        let req = request(
            op,
            "emails",
            "alice@example.com",
            Identity::user("u1"),
            &store,
            None,
        );
        assert_eq!(check(&store, &req), Decision::Deny, "{op:?}");
    }
}
