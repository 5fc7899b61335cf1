use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Outcome of a policy evaluation. There is no partial or ambiguous result:
/// malformed input, missing fields, and failed lookups all come back `Deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allow(self) -> bool {
        self == Decision::Allow
    }

    /// `Allow` iff the predicate holds.
    pub fn allow_if(predicate: bool) -> Self {
        if predicate {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

/// Document operation being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    List,
    Create,
    Update,
    Delete,
}

/// The five declared collections. Anything else is undeclared and denied
/// for every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Recommendations,
    Chats,
    Messages,
    MbtiTests,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Users,
        Collection::Recommendations,
        Collection::Chats,
        Collection::Messages,
        Collection::MbtiTests,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "users" => Some(Collection::Users),
            "recommendations" => Some(Collection::Recommendations),
            "chats" => Some(Collection::Chats),
            "messages" => Some(Collection::Messages),
            "mbti_tests" => Some(Collection::MbtiTests),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Recommendations => "recommendations",
            Collection::Chats => "chats",
            Collection::Messages => "messages",
            Collection::MbtiTests => "mbti_tests",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Requester context supplied by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl Identity {
    pub fn user(uid: &str) -> Self {
        Self {
            authenticated: true,
            uid: Some(uid.to_string()),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            uid: None,
        }
    }

    /// The uid this identity acts as, or `None` if it cannot satisfy any
    /// rule (anonymous, or authenticated without a uid).
    pub fn uid(&self) -> Option<&str> {
        if self.authenticated {
            self.uid.as_deref()
        } else {
            None
        }
    }
}

/// Wire sentinel for a server-computed timestamp: exactly
/// `{"$serverTimestamp": true}`. A `false` flag or extra keys do not parse
/// as the sentinel and fall through to a plain value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerAssignedMarker {
    #[serde(rename = "$serverTimestamp", deserialize_with = "deserialize_true")]
    server_timestamp: bool,
}

fn deserialize_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    if bool::deserialize(deserializer)? {
        Ok(true)
    } else {
        Err(serde::de::Error::custom("expected literal `true`"))
    }
}

/// A field value in a document snapshot. `ServerAssigned` is the "set on
/// write" token: the store fills in the real timestamp when the write lands,
/// so validation treats it as satisfying presence and immutability checks
/// without comparing literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    ServerAssigned(ServerAssignedMarker),
    Value(Value),
}

impl FieldValue {
    pub fn server_assigned() -> Self {
        FieldValue::ServerAssigned(ServerAssignedMarker {
            server_timestamp: true,
        })
    }

    pub fn string(s: &str) -> Self {
        FieldValue::Value(Value::String(s.to_string()))
    }

    pub fn is_server_assigned(&self) -> bool {
        matches!(self, FieldValue::ServerAssigned(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Value(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The value as a list of strings, if it is an array of strings.
    pub fn as_str_list(&self) -> Option<Vec<&str>> {
        match self {
            FieldValue::Value(Value::Array(items)) => {
                items.iter().map(|v| v.as_str()).collect::<Option<Vec<_>>>()
            }
            _ => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

/// A document snapshot: field name -> value. `existing` snapshots describe
/// the document before the operation, `proposed` snapshots the full
/// post-write field set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(pub BTreeMap<String, FieldValue>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: FieldValue) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    pub fn str_list_field(&self, name: &str) -> Option<Vec<String>> {
        self.get(name)
            .and_then(FieldValue::as_str_list)
            .map(|items| items.into_iter().map(str::to_string).collect())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// A single access request for the engine to admit or refuse.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub operation: Operation,
    /// Raw collection name as supplied by the caller. Undeclared names are
    /// denied, they are not an error.
    pub collection: String,
    pub document_id: Option<String>,
    pub identity: Identity,
    pub existing: Option<Snapshot>,
    pub proposed: Option<Snapshot>,
}

/// Cross-document reads resolved by the caller before evaluation. The
/// message rules check the participant list of the referenced chat;
/// resolving it up front keeps the evaluator pure and testable without a
/// live database. An unresolved lookup fails closed.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    pub chat_participants: Option<Vec<String>>,
}

// ---------- API request/response types ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub operation: Operation,
    /// e.g. "users"
    pub collection: String,
    #[serde(default)]
    pub document_id: Option<String>,
    pub identity: Identity,
    #[serde(default)]
    pub proposed: Option<Snapshot>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub allowed: bool,
    pub applied: bool,
}
