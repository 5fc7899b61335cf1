use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::RwLock;

use crate::errors::GateError;
use crate::policy::engine;
use crate::policy::types::{
    AccessRequest, ApplyResponse, CheckRequest, CheckResponse, Operation,
};
use crate::store::MemoryStore;

pub type SharedStore = Arc<RwLock<MemoryStore>>;

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/v1/check", post(handle_check))
        .route("/v1/apply", post(handle_apply))
        .route("/healthz", get(health))
        .with_state(store)
}

/// Build the engine request: the existing snapshot comes from the store,
/// never from the client.
fn build_request(store: &MemoryStore, req: CheckRequest) -> AccessRequest {
    let existing = req
        .document_id
        .as_deref()
        .and_then(|id| store.get(&req.collection, id))
        .cloned();
    AccessRequest {
        operation: req.operation,
        collection: req.collection,
        document_id: req.document_id,
        identity: req.identity,
        existing,
        proposed: req.proposed,
    }
}

async fn handle_check(
    State(store): State<SharedStore>,
    Json(req): Json<CheckRequest>,
) -> impl IntoResponse {
    let store = store.read().await;
    let access = build_request(&store, req);
    let lookups = store.lookups_for(&access);
    let decision = engine::evaluate(&access, &lookups);
    tracing::debug!(
        collection = %access.collection,
        operation = ?access.operation,
        allowed = decision.is_allow(),
        "Evaluated access request"
    );
    Json(CheckResponse {
        allowed: decision.is_allow(),
    })
}

/// Evaluate and, on Allow, commit the proposed snapshot. The engine itself
/// never mutates storage; the write happens here, after the decision.
async fn handle_apply(
    State(store): State<SharedStore>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<ApplyResponse>, GateError> {
    let is_write = matches!(req.operation, Operation::Create | Operation::Update);
    if is_write && req.document_id.is_none() {
        return Err(GateError::BadRequest(
            "create/update requires a documentId".into(),
        ));
    }

    let mut store = store.write().await;
    let access = build_request(&store, req);
    let lookups = store.lookups_for(&access);
    let decision = engine::evaluate(&access, &lookups);

    let mut applied = false;
    if decision.is_allow() && is_write {
        if let (Some(id), Some(proposed)) = (access.document_id.as_deref(), access.proposed) {
            store.put(&access.collection, id, proposed);
            applied = true;
        }
    }
    tracing::debug!(
        collection = %access.collection,
        operation = ?access.operation,
        allowed = decision.is_allow(),
        applied,
        "Applied access request"
    );
    Ok(Json(ApplyResponse {
        allowed: decision.is_allow(),
        applied,
    }))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
