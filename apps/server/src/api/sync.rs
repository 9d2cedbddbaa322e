use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use rilievo_core::sync::{FileSyncNotice, SyncOutcome, SyncRecord, SyncRequest, SyncStatus};

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileUploadQuery {
    file_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileUploadResponse {
    path: String,
    size: usize,
}

async fn sync_data(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SyncRequest>,
) -> ApiResult<Json<SyncOutcome>> {
    let outcome = state.sync_service.sync_data(request).await?;
    Ok(Json(outcome))
}

async fn get_sync_status(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<SyncStatus>> {
    let status = state.sync_service.get_sync_status(&device_id)?;
    Ok(Json(status))
}

async fn complete_file_sync(
    State(state): State<Arc<AppState>>,
    Json(notice): Json<FileSyncNotice>,
) -> ApiResult<Json<SyncRecord>> {
    let record = state.sync_service.complete_file_sync(notice).await?;
    Ok(Json(record))
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    Query(query): Query<FileUploadQuery>,
    body: Bytes,
) -> ApiResult<Json<FileUploadResponse>> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }
    let size = body.len();
    let path = state
        .blob_store
        .store(&device_id, &query.file_name, body.to_vec())
        .await?;
    info!("Stored attachment {} for device {}", query.file_name, device_id);
    Ok(Json(FileUploadResponse { path, size }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync", post(sync_data))
        .route("/sync/status/:device_id", get(get_sync_status))
        .route("/sync/files/complete", post(complete_file_sync))
        .route("/sync/files/:device_id", post(upload_file))
}
