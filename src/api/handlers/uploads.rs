use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::files::{file_to_response, FileResponse};
use crate::api::error::AppError;
use crate::api::response::{AppJson, JSend};
use crate::api::session::AuthSession;
use crate::storage::models::{CompletedUpload, CompletionOutcome, PendingUpload};
use crate::upload_service::UploadTicket;
use crate::AppState;

/// Content types accepted for upload
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/svg+xml",
    "text/plain",
    "text/markdown",
    "text/csv",
];

pub const MAX_FILES_PER_REQUEST: usize = 10;

/// Header carrying the upload service's HMAC over the callback body
pub const SIGNATURE_HEADER: &str = "x-uploadthing-signature";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct InitiateUploadRequest {
    pub files: Vec<UploadFileRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UploadFileRequest {
    pub name: String,
    pub size: u64,
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitiatedUpload {
    pub file_id: String,
    pub key: String,
    pub name: String,
    pub upload_url: String,
}

/// Body posted by the upload service once a file's bytes are stored.
#[derive(Debug, Deserialize)]
pub struct UploadCallback {
    pub metadata: CallbackMetadata,
    pub file: CallbackFile,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackFile {
    pub name: String,
    pub size: u64,
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
    pub url: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Bind each declared file to the caller and hand back where to upload it.
pub async fn initiate_upload(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    AppJson(req): AppJson<InitiateUploadRequest>,
) -> Result<Json<JSend<Vec<InitiatedUpload>>>, AppError> {
    if req.files.is_empty() {
        return Err(AppError::Validation(
            "at least one file must be provided".to_string(),
        ));
    }
    if req.files.len() > MAX_FILES_PER_REQUEST {
        return Err(AppError::Validation(format!(
            "at most {MAX_FILES_PER_REQUEST} files may be uploaded at once"
        )));
    }

    let max_size = state.config.uploads.max_upload_size;
    let tickets = req
        .files
        .iter()
        .map(|f| validate_file(f, max_size))
        .collect::<Result<Vec<_>, _>>()?;

    // Presign every file before binding any, so a failed presign leaves no rows behind.
    let now = Utc::now();
    let mut bindings = Vec::with_capacity(tickets.len());
    let mut initiated = Vec::with_capacity(tickets.len());
    for ticket in tickets {
        let presigned = state.uploads.presign_upload(&ticket).await?;

        bindings.push(PendingUpload {
            file_id: ticket.file_id.clone(),
            owner_id: session.subject().to_string(),
            name: ticket.name.clone(),
            size: ticket.size,
            content_type: Some(ticket.content_type),
            created_at: now,
        });
        initiated.push(InitiatedUpload {
            file_id: ticket.file_id,
            key: presigned.key,
            name: ticket.name,
            upload_url: presigned.url,
        });
    }

    state.db.put_pending_uploads(&bindings)?;

    tracing::debug!(
        owner_id = %session.subject(),
        files = initiated.len(),
        "Uploads initiated"
    );

    Ok(JSend::success(initiated))
}

/// Completion callback from the upload service. One attempt; a failed insert
/// leaves the stored object in place.
pub async fn upload_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<JSend<FileResponse>>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    state.uploads.verify_callback(&body, signature)?;

    let callback: UploadCallback = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid callback body: {e}")))?;

    let file_id = callback.metadata.file_id;
    let upload = CompletedUpload {
        name: callback.file.name,
        size: callback.file.size,
        content_type: reported_content_type(&file_id, callback.file.content_type),
        storage_url: callback.file.url,
    };

    let outcome = state
        .db
        .complete_upload(&file_id, &upload, Utc::now())
        .inspect_err(|e| {
            tracing::error!(
                file_id = %file_id,
                storage_url = %upload.storage_url,
                error = %e,
                "Failed to record completed upload; stored object is orphaned"
            );
        })?;

    match outcome {
        CompletionOutcome::Created(file) => {
            tracing::info!(
                file_id = %file.id,
                owner_id = %file.owner_id,
                size = file.size,
                "Upload completed"
            );
            Ok(JSend::success(file_to_response(&file)))
        }
        CompletionOutcome::UnknownUpload => {
            tracing::warn!(file_id = %file_id, "Completion callback for unknown upload");
            Err(AppError::NotFound)
        }
        CompletionOutcome::AlreadyExists => {
            tracing::warn!(file_id = %file_id, "Duplicate completion callback");
            Err(AppError::Conflict(format!("file '{file_id}' already exists")))
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// The type reported at completion, if it is on the allow-list. Otherwise `None`,
/// so the record keeps the type checked at initiation.
fn reported_content_type(file_id: &str, reported: Option<String>) -> Option<String> {
    let reported = reported
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty())?;

    if ALLOWED_CONTENT_TYPES.contains(&reported.as_str()) {
        Some(reported)
    } else {
        tracing::warn!(
            file_id = %file_id,
            reported = %reported,
            "Completion reported a disallowed content type; keeping the declared type"
        );
        None
    }
}

/// Check one declared file against the allow-list and size limit, resolving
/// its content type, and assign it a fresh id.
fn validate_file(file: &UploadFileRequest, max_size: u64) -> Result<UploadTicket, AppError> {
    let name = file.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("file name must not be empty".to_string()));
    }

    let content_type = file
        .content_type
        .as_deref()
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
        .or_else(|| mime_guess::from_path(name).first().map(|m| m.to_string()))
        .ok_or_else(|| AppError::Validation(format!("cannot determine type of '{name}'")))?;

    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::Validation(format!(
            "file type '{content_type}' is not allowed"
        )));
    }

    if file.size == 0 {
        return Err(AppError::Validation(format!("'{name}' is empty")));
    }
    if file.size > max_size {
        return Err(AppError::PayloadTooLarge(format!(
            "'{name}' exceeds maximum upload size of {max_size} bytes"
        )));
    }

    Ok(UploadTicket {
        file_id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        size: file.size,
        content_type,
    })
}
