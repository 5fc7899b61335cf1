//! In-memory document store.
//!
//! Stands in for the managed document database: it supplies `existing`
//! snapshots and the chat-participants lookup to the evaluator, and receives
//! accepted writes. Persistence is a plain JSON file so the server and the
//! migration job share state across runs. The store never evaluates policy.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::GateError;
use crate::policy::engine;
use crate::policy::types::{AccessRequest, FieldValue, Lookups, Snapshot};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    /// collection name -> document id -> snapshot
    collections: BTreeMap<String, BTreeMap<String, Snapshot>>,
}

/// A set of document writes applied in one step, all or nothing.
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<(String, String, Snapshot)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &str, id: &str, snapshot: Snapshot) {
        self.ops
            .push((collection.to_string(), id.to_string(), snapshot));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<&Snapshot> {
        self.collections.get(collection)?.get(id)
    }

    /// Write a snapshot, materializing any server-assigned markers into
    /// real timestamps.
    pub fn put(&mut self, collection: &str, id: &str, snapshot: Snapshot) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), materialize(snapshot));
    }

    pub fn commit(&mut self, batch: WriteBatch) {
        for (collection, id, snapshot) in batch.ops {
            self.put(&collection, &id, snapshot);
        }
    }

    pub fn document_count(&self) -> usize {
        self.collections.values().map(BTreeMap::len).sum()
    }

    /// Resolve the cross-document reads the evaluator declares for this
    /// request. A missing chat, or a `participants` field that is not a
    /// string list, stays unresolved and the engine fails closed.
    pub fn lookups_for(&self, req: &AccessRequest) -> Lookups {
        let chat_participants = engine::chat_dependency(req)
            .and_then(|chat_id| self.get("chats", chat_id))
            .and_then(|chat| chat.str_list_field("participants"));
        Lookups { chat_participants }
    }

    pub fn load(path: &Path) -> Result<Self, GateError> {
        let contents = std::fs::read_to_string(path)?;
        let store: MemoryStore = serde_json::from_str(&contents)?;
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> Result<(), GateError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Replace server-assigned markers with the current timestamp. The engine
/// never sees materialization; it happens only after an Allow decision.
fn materialize(snapshot: Snapshot) -> Snapshot {
    let now = chrono::Utc::now().to_rfc3339();
    Snapshot(
        snapshot
            .0
            .into_iter()
            .map(|(name, value)| {
                let value = if value.is_server_assigned() {
                    FieldValue::string(&now)
                } else {
                    value
                };
                (name, value)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::types::{Identity, Operation};
    use serde_json::json;

    #[test]
    fn test_put_and_get() {
        let mut store = MemoryStore::new();
        let doc = Snapshot::new().with("uid", FieldValue::string("alice"));
        store.put("users", "alice", doc.clone());

        assert_eq!(store.get("users", "alice"), Some(&doc));
        assert!(store.get("users", "bob").is_none());
        assert!(store.get("chats", "alice").is_none());
        assert_eq!(store.document_count(), 1);
    }

    #[test]
    fn test_put_materializes_server_timestamps() {
        let mut store = MemoryStore::new();
        let doc = Snapshot::new()
            .with("uid", FieldValue::string("alice"))
            .with("createdAt", FieldValue::server_assigned());
        store.put("users", "alice", doc);

        let stored = store.get("users", "alice").unwrap();
        let created_at = stored.get("createdAt").unwrap();
        assert!(!created_at.is_server_assigned());
        assert!(created_at.as_str().is_some());
    }

    #[test]
    fn test_commit_batch() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());

        batch.set(
            "emails",
            "a@example.com",
            Snapshot::new().with("uid", FieldValue::string("a")),
        );
        batch.set(
            "emails",
            "b@example.com",
            Snapshot::new().with("uid", FieldValue::string("b")),
        );
        assert_eq!(batch.len(), 2);

        store.commit(batch);
        assert_eq!(store.document_count(), 2);
        assert!(store.get("emails", "a@example.com").is_some());
    }

    #[test]
    fn test_lookups_resolve_chat_participants() {
        let mut store = MemoryStore::new();
        store.put(
            "chats",
            "chat_1",
            Snapshot::new().with("participants", json!(["alice", "bob"]).into()),
        );

        let req = AccessRequest {
            operation: Operation::Read,
            collection: "messages".into(),
            document_id: Some("msg_1".into()),
            identity: Identity::user("alice"),
            existing: Some(Snapshot::new().with("chatId", FieldValue::string("chat_1"))),
            proposed: None,
        };
        let lookups = store.lookups_for(&req);
        assert_eq!(
            lookups.chat_participants,
            Some(vec!["alice".to_string(), "bob".to_string()])
        );

        // absent chat stays unresolved
        let req = AccessRequest {
            existing: Some(Snapshot::new().with("chatId", FieldValue::string("missing"))),
            ..req
        };
        assert!(store.lookups_for(&req).chat_participants.is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("store.json");

        let mut store = MemoryStore::new();
        store.put(
            "users",
            "alice",
            Snapshot::new()
                .with("uid", FieldValue::string("alice"))
                .with("mbtiType", FieldValue::string("ENFP")),
        );
        store.save(&path).unwrap();

        let loaded = MemoryStore::load(&path).unwrap();
        assert_eq!(loaded.document_count(), 1);
        assert_eq!(
            loaded.get("users", "alice").unwrap().str_field("mbtiType"),
            Some("ENFP")
        );
    }

    #[test]
    fn test_load_missing_file_errors() {
        let err = MemoryStore::load(Path::new("/nonexistent/store.json")).unwrap_err();
        assert!(matches!(err, GateError::Io(_)));
    }
}
