//! Domain service for integration records.
//!
//! Covers the owner-scoped CRUD operations and the admin-only bulk upload.

use serde::Serialize;
use thiserror::Error;

use crate::db::Integration;
use crate::domain::{Caller, IntegrationId, IntegrationStatus};
use crate::services::bulk_import::{BulkImportResult, ImportError};

/// Errors specific to integration operations.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("Integration not found")]
    NotFound,

    #[error("No integrations found")]
    NoneStored,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for IntegrationError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for IntegrationError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Fields supplied when creating or replacing an integration.
#[derive(Debug, Clone)]
pub struct IntegrationInput {
    pub integration_key: String,
    pub account_id: i32,
    pub private_key_file: Option<String>,
    pub email: String,
    /// Raw status text; `None` means `pending`.
    pub status: Option<String>,
}

/// Integration as exposed to clients. The key file never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrationDto {
    pub integration_id: IntegrationId,
    pub integration_key: String,
    pub user_id: i32,
    pub account_id: i32,
    pub email: String,
    pub status: IntegrationStatus,
}

impl From<Integration> for IntegrationDto {
    fn from(integration: Integration) -> Self {
        Self {
            integration_id: integration.integration_id,
            integration_key: integration.integration_key,
            user_id: integration.user_id.value(),
            account_id: integration.account_id,
            email: integration.email,
            status: integration.status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusToggle {
    pub integration_id: IntegrationId,
    pub new_status: IntegrationStatus,
}

/// Domain service trait for integrations.
#[async_trait::async_trait]
pub trait IntegrationService: Send + Sync {
    /// Creates an integration owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::Conflict`] if the key is already taken.
    async fn create(
        &self,
        caller: &Caller,
        input: IntegrationInput,
    ) -> Result<IntegrationDto, IntegrationError>;

    /// Lists every stored integration. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::NoneStored`] when the store holds none.
    async fn list_all(&self, caller: &Caller) -> Result<Vec<IntegrationDto>, IntegrationError>;

    async fn get(
        &self,
        caller: &Caller,
        id: IntegrationId,
    ) -> Result<IntegrationDto, IntegrationError>;

    /// Replaces the mutable fields of an integration.
    async fn update(
        &self,
        caller: &Caller,
        id: IntegrationId,
        input: IntegrationInput,
    ) -> Result<IntegrationDto, IntegrationError>;

    async fn delete(&self, caller: &Caller, id: IntegrationId) -> Result<(), IntegrationError>;

    /// Flips `active` to `inactive`; any other status becomes `active`.
    async fn toggle_status(
        &self,
        caller: &Caller,
        id: IntegrationId,
    ) -> Result<StatusToggle, IntegrationError>;

    /// Validates every row of an uploaded sheet and inserts the valid ones in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::Forbidden`] for non-admin callers and
    /// [`IntegrationError::Import`] when the file is unreadable or lacks required columns.
    /// Rejected rows are reported in the result, not as errors.
    async fn bulk_import(
        &self,
        caller: &Caller,
        filename: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<BulkImportResult, IntegrationError>;
}
