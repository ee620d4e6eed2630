//! Owner-scoped CRUD over integration records.

use axum::{Extension, extract::State};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::{validate_email, validate_integration_id, validate_integration_key};
use super::{ApiError, ApiResponse, AppJson, AppPath, AppState};
use crate::domain::{Caller, IntegrationId};
use crate::services::{IntegrationDto, IntegrationInput, StatusToggle};

/// Body of `POST /integrations` and `PUT /edit-integrations/{id}`.
#[derive(Debug, Deserialize)]
pub struct IntegrationRequest {
    pub integration_key: String,
    pub account_id: i32,
    #[serde(default)]
    pub private_key_file: Option<String>,
    pub email: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl IntegrationRequest {
    fn into_input(self) -> Result<IntegrationInput, ApiError> {
        Ok(IntegrationInput {
            integration_key: validate_integration_key(&self.integration_key)?.to_string(),
            account_id: self.account_id,
            private_key_file: self.private_key_file,
            email: validate_email(&self.email)?.to_string(),
            status: self.status,
        })
    }
}

/// POST /integrations
pub async fn create_integration(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    AppJson(payload): AppJson<IntegrationRequest>,
) -> Result<ApiResponse<IntegrationDto>, ApiError> {
    let created = state
        .integration_service()
        .create(&caller, payload.into_input()?)
        .await?;

    Ok(ApiResponse::created("Integration created successfully", created))
}

/// GET /get-all-integrations
pub async fn list_integrations(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<ApiResponse<Vec<IntegrationDto>>, ApiError> {
    let integrations = state.integration_service().list_all(&caller).await?;
    Ok(ApiResponse::success(
        "Integrations retrieved successfully",
        integrations,
    ))
}

/// GET /get-integrations/{id}
pub async fn get_integration(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    AppPath(id): AppPath<i32>,
) -> Result<ApiResponse<IntegrationDto>, ApiError> {
    let id = IntegrationId::new(validate_integration_id(id)?);
    let integration = state.integration_service().get(&caller, id).await?;
    Ok(ApiResponse::success(
        "Integration retrieved successfully",
        integration,
    ))
}

/// PUT /edit-integrations/{id}
pub async fn update_integration(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<IntegrationRequest>,
) -> Result<ApiResponse<IntegrationDto>, ApiError> {
    let id = IntegrationId::new(validate_integration_id(id)?);
    let updated = state
        .integration_service()
        .update(&caller, id, payload.into_input()?)
        .await?;

    Ok(ApiResponse::success(
        "Integration updated successfully",
        updated,
    ))
}

/// DELETE /delete-integrations/{id}
pub async fn delete_integration(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    AppPath(id): AppPath<i32>,
) -> Result<ApiResponse<()>, ApiError> {
    let id = IntegrationId::new(validate_integration_id(id)?);
    state.integration_service().delete(&caller, id).await?;
    Ok(ApiResponse::message("Integration deleted successfully"))
}

/// PATCH /integrations/{id}/toggle-status
pub async fn toggle_integration_status(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    AppPath(id): AppPath<i32>,
) -> Result<ApiResponse<StatusToggle>, ApiError> {
    let id = IntegrationId::new(validate_integration_id(id)?);
    let toggle = state
        .integration_service()
        .toggle_status(&caller, id)
        .await?;

    Ok(ApiResponse::success(
        format!("Integration status updated to {}", toggle.new_status),
        toggle,
    ))
}
