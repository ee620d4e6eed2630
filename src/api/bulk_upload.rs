//! Admin-only spreadsheet upload creating integrations in bulk.

use axum::{
    Extension,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::domain::Caller;
use crate::services::BulkImportResult;

/// Multipart field carrying the sheet. Any other file field is used as a fallback.
const FILE_FIELD: &str = "file";

struct Upload {
    filename: Option<String>,
    bytes: Vec<u8>,
}

fn multipart_error(err: &MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::InvalidFile(format!("Uploaded file exceeds the {limit} byte limit"))
    } else {
        ApiError::InvalidFile(format!("Malformed multipart body: {}", err.body_text()))
    }
}

async fn read_upload(multipart: &mut Multipart, limit: usize) -> Result<Upload, ApiError> {
    let mut fallback = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e, limit))?
    {
        let is_named_file = field.name() == Some(FILE_FIELD);
        if !is_named_file && (fallback.is_some() || field.file_name().is_none()) {
            continue;
        }

        let filename = field.file_name().map(ToString::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(&e, limit))?
            .to_vec();

        let upload = Upload { filename, bytes };
        if is_named_file {
            return Ok(upload);
        }
        fallback = Some(upload);
    }

    fallback.ok_or_else(|| ApiError::InvalidFile("No file uploaded".to_string()))
}

/// POST /integrations/bulk-upload
///
/// Partial success is a normal outcome: rejected rows come back in
/// `data.failed_records` while the valid ones are committed.
pub async fn bulk_upload(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<BulkImportResult>, ApiError> {
    // Authorization comes before any look at the payload.
    if !caller.is_admin() {
        return Err(ApiError::Forbidden("Permission denied".to_string()));
    }

    let mut multipart = multipart
        .map_err(|e| ApiError::InvalidFile(format!("Expected a multipart upload: {}", e.body_text())))?;

    let limit = state.config().import.max_upload_bytes;
    let upload = read_upload(&mut multipart, limit).await?;

    tracing::info!(
        user_id = %caller.user_id,
        filename = upload.filename.as_deref().unwrap_or("<unnamed>"),
        size = upload.bytes.len(),
        "Received bulk upload"
    );

    let result = state
        .integration_service()
        .bulk_import(&caller, upload.filename, upload.bytes)
        .await?;

    Ok(ApiResponse::success(
        format!("Successfully uploaded {} integrations", result.success_count),
        result,
    ))
}
