//! Sync API endpoints: push, bulk sync, pull, modified records, reference
//! data and conflict queries.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use fieldops_core::sync::{
    BulkSyncResponse, ConflictCheck, ConflictStatus, ModifiedRecordsRequest,
    ModifiedRecordsResponse, PullRequest, PullResponse, PushResponse, ReferenceDataResponse,
    SyncConflict, SyncEngine, SyncSession,
};
use fieldops_storage_sqlite::{get_connection, SqliteRecordStore};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

/// Header carrying the user authenticated by the fronting auth layer.
pub const USER_HEADER: &str = "x-fieldops-user";

fn session_from(headers: &HeaderMap) -> SyncSession {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .map(SyncSession::new)
        .unwrap_or_else(SyncSession::guest)
}

/// Query string as a JSON object, so the core models can deserialize it.
fn query_object(params: HashMap<String, String>) -> Value {
    Value::Object(
        params
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
    )
}

fn from_query<T: serde::de::DeserializeOwned>(params: HashMap<String, String>) -> ApiResult<T> {
    serde_json::from_value(query_object(params)).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Runs a synchronous store operation on a pooled connection off the async runtime.
async fn with_store<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut SqliteRecordStore<'_>) -> fieldops_core::Result<T> + Send + 'static,
{
    let pool = state.pool.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut conn = get_connection(&pool)?;
        let mut store = SqliteRecordStore::new(&mut conn);
        f(&mut store)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Sync task failed: {}", e)))?;
    Ok(outcome?)
}

async fn push_sync_data(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Json<PushResponse>> {
    let session = session_from(&headers);
    debug!("Push from {}", session.user);
    let response = with_store(&state, move |store| {
        Ok(SyncEngine::new(store, session).push(&body))
    })
    .await?;
    Ok(Json(response))
}

async fn bulk_sync(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Json<BulkSyncResponse>> {
    let session = session_from(&headers);
    let response = with_store(&state, move |store| {
        Ok(SyncEngine::new(store, session).bulk_sync(&body))
    })
    .await?;
    Ok(Json(response))
}

async fn get_sync_data(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<PullResponse>> {
    let session = session_from(&headers);
    let request: PullRequest = from_query(params)?;
    let response = with_store(&state, move |store| {
        SyncEngine::new(store, session).pull(&request)
    })
    .await?;
    Ok(Json(response))
}

async fn get_modified_records(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<ModifiedRecordsResponse>> {
    let session = session_from(&headers);
    let request: ModifiedRecordsRequest = from_query(params)?;
    let response = with_store(&state, move |store| {
        Ok(SyncEngine::new(store, session).modified_records(&request))
    })
    .await?;
    Ok(Json(response))
}

async fn get_reference_data(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<ReferenceDataResponse>> {
    let session = session_from(&headers);
    let response = with_store(&state, move |store| {
        Ok(SyncEngine::new(store, session).reference_data())
    })
    .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ConflictCheckParams {
    #[serde(alias = "entity_type")]
    doctype: String,
    #[serde(alias = "record_id")]
    name: String,
    #[serde(alias = "mobileModified")]
    mobile_modified: String,
}

async fn check_conflicts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ConflictCheckParams>,
) -> ApiResult<Json<ConflictCheck>> {
    let session = session_from(&headers);
    let response = with_store(&state, move |store| {
        Ok(SyncEngine::new(store, session).check_conflicts(
            &params.doctype,
            &params.name,
            &params.mobile_modified,
        ))
    })
    .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ConflictListParams {
    status: Option<String>,
}

async fn list_sync_conflicts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ConflictListParams>,
) -> ApiResult<Json<Vec<SyncConflict>>> {
    let status = match params.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => Some(
            ConflictStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown conflict status '{}'", raw)))?,
        ),
        None => None,
    };
    let session = session_from(&headers);
    let conflicts = with_store(&state, move |store| {
        SyncEngine::new(store, session).list_conflicts(status)
    })
    .await?;
    Ok(Json(conflicts))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync/push", post(push_sync_data))
        .route("/sync/bulk", post(bulk_sync))
        .route("/sync/pull", get(get_sync_data))
        .route("/sync/modified", get(get_modified_records))
        .route("/sync/reference-data", get(get_reference_data))
        .route("/sync/conflicts/check", get(check_conflicts))
        .route("/sync/conflicts", get(list_sync_conflicts))
}
