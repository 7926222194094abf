//! In-process HTTP servers standing in for the audit API and the document
//! store, bound to 127.0.0.1:0

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::fixtures::{audit_payload, claim_payload};

pub const GOOD_TOKEN: &str = "good-token";

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Test server failed");
    });
    format!("http://{addr}")
}

async fn generate_audit(Query(params): Query<HashMap<String, String>>) -> Response {
    let company = params.get("company").cloned().unwrap_or_default();
    match company.as_str() {
        "Busy" => (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response(),
        "Broken" => (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response(),
        "Nonsense" => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": {"code": "INVALID_COMPANY", "message": "not a company"}})),
        )
            .into_response(),
        "Tobacco Inc" => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"code": "COMPANY_REJECTED", "error": "excluded industry"})),
        )
            .into_response(),
        "Flaky" => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": {"code": "VALIDATION_SYSTEM_ERROR", "message": "validator offline"}})),
        )
            .into_response(),
        "Quota" => Json(json!({"error": "quota exhausted"})).into_response(),
        "NoScore" => Json(json!({"company": "NoScore", "sources": []})).into_response(),
        "Slow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(audit_payload("Slow", 50.0)).into_response()
        }
        other => Json(audit_payload(other, 72.0)).into_response(),
    }
}

async fn check_claim(Json(body): Json<Value>) -> Response {
    let claim = body.get("claim").and_then(Value::as_str).unwrap_or_default();
    if claim.contains("lottery") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"code": "CLAIM_REJECTED", "message": "not a sustainability claim"}})),
        )
            .into_response();
    }
    Json(claim_payload(claim, "Partially supported")).into_response()
}

/// Audit API with canned behaviour per company name
pub async fn spawn_audit_api() -> String {
    let router = Router::new()
        .route("/", get(|| async { "GreenScore API" }))
        .route("/generate-audit", get(generate_audit))
        .route("/check", post(check_claim));
    serve(router).await
}

/// Documents per collection, as stored by the mock document store
#[derive(Clone, Default)]
pub struct DocumentStoreState {
    pub collections: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    next_id: Arc<Mutex<u64>>,
}

impl DocumentStoreState {
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {GOOD_TOKEN}"))
        .unwrap_or(false)
}

async fn list_documents(
    State(state): State<DocumentStoreState>,
    Path(collection): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let uid = params.get("uid").cloned().unwrap_or_default();
    let docs: Vec<Value> = state
        .documents(&collection)
        .into_iter()
        .filter(|d| d.get("uid").and_then(Value::as_str) == Some(uid.as_str()))
        .collect();
    Json(docs).into_response()
}

async fn create_document(
    State(state): State<DocumentStoreState>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    Json(mut doc): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let id = {
        let mut next = state.next_id.lock().unwrap();
        *next += 1;
        format!("srv-{}", *next)
    };
    doc["id"] = json!(id);
    state
        .collections
        .lock()
        .unwrap()
        .entry(collection)
        .or_default()
        .push(doc);
    (StatusCode::CREATED, Json(json!({ "id": id }))).into_response()
}

async fn patch_document(
    State(state): State<DocumentStoreState>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(fields): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut collections = state.collections.lock().unwrap();
    let Some(doc) = collections
        .get_mut(&collection)
        .and_then(|docs| docs.iter_mut().find(|d| d["id"] == json!(id)))
    else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let (Some(target), Some(fields)) = (doc.as_object_mut(), fields.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn delete_document(
    State(state): State<DocumentStoreState>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut collections = state.collections.lock().unwrap();
    let Some(docs) = collections.get_mut(&collection) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let before = docs.len();
    docs.retain(|d| d["id"] != json!(id));
    if docs.len() == before {
        return StatusCode::NOT_FOUND.into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

/// REST document store requiring `Bearer good-token`
pub async fn spawn_document_store() -> (String, DocumentStoreState) {
    let state = DocumentStoreState::default();
    let router = Router::new()
        .route("/:collection", get(list_documents).post(create_document))
        .route(
            "/:collection/:id",
            patch(patch_document).delete(delete_document),
        )
        .with_state(state.clone());
    (serve(router).await, state)
}
