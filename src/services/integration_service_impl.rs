//! `SeaORM` implementation of the `IntegrationService` trait.

use async_trait::async_trait;
use tokio::task;
use tracing::{info, warn};

use crate::config::ImportConfig;
use crate::db::{Integration, IntegrationChanges, NewIntegration, Store, is_unique_violation};
use crate::domain::{Caller, IntegrationId, IntegrationStatus};
use crate::services::bulk_import::{self, BulkImportResult};
use crate::services::integration_service::{
    IntegrationDto, IntegrationError, IntegrationInput, IntegrationService, StatusToggle,
};

pub struct SeaOrmIntegrationService {
    store: Store,
    import: ImportConfig,
}

impl SeaOrmIntegrationService {
    #[must_use]
    pub const fn new(store: Store, import: ImportConfig) -> Self {
        Self { store, import }
    }

    /// Loads an integration the caller may act on. Absence is reported before ownership.
    async fn load_owned(
        &self,
        caller: &Caller,
        id: IntegrationId,
    ) -> Result<Integration, IntegrationError> {
        let integration = self
            .store
            .integration_repo()
            .get(id)
            .await?
            .ok_or(IntegrationError::NotFound)?;

        if !caller.can_access(integration.user_id) {
            return Err(IntegrationError::Forbidden("Access denied".to_string()));
        }

        Ok(integration)
    }

    /// Fails when `key` belongs to an integration other than `current`.
    async fn ensure_key_free(
        &self,
        key: &str,
        current: Option<IntegrationId>,
    ) -> Result<(), IntegrationError> {
        match self.store.integration_repo().key_owner(key).await? {
            Some(owner) if Some(owner) != current => Err(key_taken(key)),
            _ => Ok(()),
        }
    }
}

fn key_taken(key: &str) -> IntegrationError {
    IntegrationError::Conflict(format!("Integration key '{key}' already exists"))
}

/// A write that lost the race for `key` after `ensure_key_free` passed.
fn write_error(err: anyhow::Error, key: &str) -> IntegrationError {
    if is_unique_violation(&err) {
        key_taken(key)
    } else {
        err.into()
    }
}

fn parse_status(raw: Option<&str>) -> Result<IntegrationStatus, IntegrationError> {
    raw.map_or(Ok(IntegrationStatus::default()), |s| {
        s.parse().map_err(IntegrationError::Validation)
    })
}

#[async_trait]
impl IntegrationService for SeaOrmIntegrationService {
    async fn create(
        &self,
        caller: &Caller,
        input: IntegrationInput,
    ) -> Result<IntegrationDto, IntegrationError> {
        let status = parse_status(input.status.as_deref())?;
        self.ensure_key_free(&input.integration_key, None).await?;

        let key = input.integration_key.clone();
        let created = self
            .store
            .integration_repo()
            .insert(NewIntegration {
                integration_key: input.integration_key,
                user_id: caller.user_id,
                account_id: input.account_id,
                private_key_file: input.private_key_file,
                email: input.email,
                status,
            })
            .await
            .map_err(|e| write_error(e, &key))?;

        info!(
            integration_id = %created.integration_id,
            user_id = %caller.user_id,
            "Integration created"
        );

        Ok(created.into())
    }

    async fn list_all(&self, caller: &Caller) -> Result<Vec<IntegrationDto>, IntegrationError> {
        if !caller.is_admin() {
            return Err(IntegrationError::Forbidden("Permission denied".to_string()));
        }

        let integrations = self.store.integration_repo().list_all().await?;
        if integrations.is_empty() {
            return Err(IntegrationError::NoneStored);
        }

        Ok(integrations.into_iter().map(IntegrationDto::from).collect())
    }

    async fn get(
        &self,
        caller: &Caller,
        id: IntegrationId,
    ) -> Result<IntegrationDto, IntegrationError> {
        Ok(self.load_owned(caller, id).await?.into())
    }

    async fn update(
        &self,
        caller: &Caller,
        id: IntegrationId,
        input: IntegrationInput,
    ) -> Result<IntegrationDto, IntegrationError> {
        self.load_owned(caller, id).await?;

        let status = parse_status(input.status.as_deref())?;
        self.ensure_key_free(&input.integration_key, Some(id)).await?;

        let key = input.integration_key.clone();
        let updated = self
            .store
            .integration_repo()
            .update(
                id,
                IntegrationChanges {
                    integration_key: input.integration_key,
                    account_id: input.account_id,
                    private_key_file: input.private_key_file,
                    email: input.email,
                    status,
                },
            )
            .await
            .map_err(|e| write_error(e, &key))?
            .ok_or(IntegrationError::NotFound)?;

        info!(integration_id = %id, "Integration updated");
        Ok(updated.into())
    }

    async fn delete(&self, caller: &Caller, id: IntegrationId) -> Result<(), IntegrationError> {
        self.load_owned(caller, id).await?;

        if !self.store.integration_repo().delete(id).await? {
            return Err(IntegrationError::NotFound);
        }

        info!(integration_id = %id, user_id = %caller.user_id, "Integration deleted");
        Ok(())
    }

    async fn toggle_status(
        &self,
        caller: &Caller,
        id: IntegrationId,
    ) -> Result<StatusToggle, IntegrationError> {
        let integration = self.load_owned(caller, id).await?;
        let new_status = integration.status.toggled();

        if !self
            .store
            .integration_repo()
            .set_status(id, new_status)
            .await?
        {
            return Err(IntegrationError::NotFound);
        }

        info!(integration_id = %id, status = %new_status, "Integration status toggled");

        Ok(StatusToggle {
            integration_id: id,
            new_status,
        })
    }

    async fn bulk_import(
        &self,
        caller: &Caller,
        filename: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<BulkImportResult, IntegrationError> {
        if !caller.is_admin() {
            return Err(IntegrationError::Forbidden("Permission denied".to_string()));
        }

        let max_rows = self.import.max_rows;
        let rows = task::spawn_blocking(move || {
            bulk_import::parse_upload(filename.as_deref(), &bytes, max_rows)
        })
        .await
        .map_err(|e| IntegrationError::Internal(format!("Sheet parsing task failed: {e}")))??;

        info!(
            user_id = %caller.user_id,
            rows = rows.len(),
            "Starting integration bulk import"
        );

        // Only rows that survive the field checks need store lookups.
        let (keys, user_ids): (Vec<String>, Vec<i32>) = rows
            .iter()
            .filter_map(|row| row.validate().ok())
            .map(|valid| (valid.integration_key, valid.user_id))
            .unzip();

        let stored_keys = self.store.integration_repo().existing_keys(&keys).await?;
        let mut user_ids = user_ids;
        user_ids.sort_unstable();
        user_ids.dedup();
        let known_users = self.store.user_repo().existing_ids(&user_ids).await?;

        let plan = bulk_import::plan_import(&rows, &stored_keys, &known_users);
        let result = plan.result();

        if let Err(e) = self.store.insert_integrations_batch(plan.staged).await {
            warn!(error = %e, "Bulk import commit failed, no rows persisted");
            return Err(e.into());
        }

        info!(
            success_count = result.success_count,
            failed_count = result.failed_records.len(),
            "Integration bulk import finished"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrator::DEFAULT_ADMIN_USERNAME;

    #[tokio::test]
    async fn lost_key_race_maps_to_conflict() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let owner = store
            .get_user_by_username(DEFAULT_ADMIN_USERNAME)
            .await
            .unwrap()
            .unwrap()
            .user_id;
        let new = || NewIntegration {
            integration_key: "raced".to_string(),
            user_id: owner,
            account_id: 1,
            private_key_file: None,
            email: "ops@example.com".to_string(),
            status: IntegrationStatus::Pending,
        };

        let repo = store.integration_repo();
        repo.insert(new()).await.unwrap();
        let err = repo.insert(new()).await.unwrap_err();

        match write_error(err, "raced") {
            IntegrationError::Conflict(msg) => {
                assert_eq!(msg, "Integration key 'raced' already exists");
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        assert!(matches!(
            write_error(anyhow::anyhow!("disk full"), "raced"),
            IntegrationError::Internal(_)
        ));
    }
}
