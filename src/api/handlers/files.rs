use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::AppError;
use crate::api::response::{AppQuery, JSend, JSendPaginated, Pagination};
use crate::api::session::AuthSession;
use crate::storage::models::{FileKind, FileRecord, FileStats};
use crate::upload_service::signed_access_url;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub content_type: Option<String>,
    pub created_at: String,
    pub id: String,
    pub kind: FileKind,
    pub name: String,
    pub owner_id: String,
    pub size: u64,
    pub updated_at: String,
}

/// A single file together with a short-lived read URL
#[derive(Debug, Serialize)]
pub struct FileDetailResponse {
    #[serde(flatten)]
    pub file: FileResponse,
    pub signed_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ListFilesParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Result<Json<JSendPaginated<FileResponse>>, AppError> {
    if params.limit == 0 {
        return Err(AppError::Validation(
            "limit must be greater than 0".to_string(),
        ));
    }

    let files = state.db.list_owner_files(session.subject())?;
    let total = files.len() as u64;
    let items: Vec<FileResponse> = files
        .iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .map(file_to_response)
        .collect();

    Ok(JSendPaginated::success(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

pub async fn file_stats(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
) -> Result<Json<JSend<FileStats>>, AppError> {
    let stats = state.db.owner_stats(session.subject(), Utc::now())?;
    Ok(JSend::success(stats))
}

pub async fn get_file(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<JSend<FileDetailResponse>>, AppError> {
    let file = state
        .db
        .get_owned_file(&id, session.subject())?
        .ok_or(AppError::NotFound)?;

    let signed_url = signed_access_url(state.uploads.as_ref(), &file.storage_url).await?;

    Ok(JSend::success(FileDetailResponse {
        file: file_to_response(&file),
        signed_url,
    }))
}

/// Removes the record only. The stored object stays at the upload service.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, AppError> {
    if !state.db.delete_owned_file(&id, session.subject())? {
        return Err(AppError::NotFound);
    }

    tracing::info!(file_id = %id, owner_id = %session.subject(), "Deleted file");
    Ok(JSend::success(()))
}

// ============================================================================
// Helpers
// ============================================================================

pub(crate) fn file_to_response(file: &FileRecord) -> FileResponse {
    FileResponse {
        content_type: file.content_type.clone(),
        created_at: file.created_at.to_rfc3339(),
        id: file.id.clone(),
        kind: file.kind(),
        name: file.name.clone(),
        owner_id: file.owner_id.clone(),
        size: file.size,
        updated_at: file.updated_at.to_rfc3339(),
    }
}
