use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::domain::{IntegrationId, IntegrationStatus, UserId};
use crate::entities::{integrations, prelude::*};

/// Rows per `INSERT` / `IN (...)` statement, kept well below SQLite's bound-variable limit.
const CHUNK_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integration {
    pub integration_id: IntegrationId,
    pub integration_key: String,
    pub user_id: UserId,
    pub account_id: i32,
    pub private_key_file: Option<String>,
    pub email: String,
    pub status: IntegrationStatus,
}

impl From<integrations::Model> for Integration {
    fn from(model: integrations::Model) -> Self {
        let status = model.status.parse().unwrap_or_else(|_| {
            warn!(
                integration_id = model.integration_id,
                stored = %model.status,
                "Unknown integration status in store, reading it as pending"
            );
            IntegrationStatus::default()
        });

        Self {
            integration_id: IntegrationId::new(model.integration_id),
            integration_key: model.integration_key,
            user_id: UserId::new(model.user_id),
            account_id: model.account_id,
            private_key_file: model.private_key_file,
            email: model.email,
            status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIntegration {
    pub integration_key: String,
    pub user_id: UserId,
    pub account_id: i32,
    pub private_key_file: Option<String>,
    pub email: String,
    pub status: IntegrationStatus,
}

impl NewIntegration {
    fn into_active_model(self) -> integrations::ActiveModel {
        integrations::ActiveModel {
            integration_key: Set(self.integration_key),
            user_id: Set(self.user_id.value()),
            account_id: Set(self.account_id),
            private_key_file: Set(self.private_key_file),
            email: Set(self.email),
            status: Set(self.status.as_str().to_string()),
            ..Default::default()
        }
    }
}

/// Full replacement of the mutable columns. The owner never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationChanges {
    pub integration_key: String,
    pub account_id: i32,
    pub private_key_file: Option<String>,
    pub email: String,
    pub status: IntegrationStatus,
}

pub struct IntegrationRepository {
    conn: DatabaseConnection,
}

impl IntegrationRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, new: NewIntegration) -> Result<Integration> {
        let result = Integrations::insert(new.into_active_model())
            .exec(&self.conn)
            .await
            .context("Failed to insert integration")?;

        let model = Integrations::find_by_id(result.last_insert_id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created integration"))?;

        Ok(Integration::from(model))
    }

    /// Inserts every row inside one transaction. Either all rows land or none do.
    pub async fn insert_batch(&self, rows: Vec<NewIntegration>) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let total = rows.len() as u64;
        let models: Vec<integrations::ActiveModel> = rows
            .into_iter()
            .map(NewIntegration::into_active_model)
            .collect();

        let txn = self.conn.begin().await?;

        for chunk in models.chunks(CHUNK_SIZE) {
            Integrations::insert_many(chunk.to_vec())
                .exec(&txn)
                .await
                .context("Failed to insert integration batch")?;
        }

        txn.commit()
            .await
            .context("Failed to commit integration batch")?;

        info!("Inserted {} integrations in one transaction", total);
        Ok(total)
    }

    pub async fn get(&self, id: IntegrationId) -> Result<Option<Integration>> {
        let model = Integrations::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query integration")?;

        Ok(model.map(Integration::from))
    }

    pub async fn list_all(&self) -> Result<Vec<Integration>> {
        let models = Integrations::find()
            .order_by_asc(integrations::Column::IntegrationId)
            .all(&self.conn)
            .await
            .context("Failed to list integrations")?;

        Ok(models.into_iter().map(Integration::from).collect())
    }

    pub async fn update(
        &self,
        id: IntegrationId,
        changes: IntegrationChanges,
    ) -> Result<Option<Integration>> {
        let Some(model) = Integrations::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query integration for update")?
        else {
            return Ok(None);
        };

        let mut active: integrations::ActiveModel = model.into();
        active.integration_key = Set(changes.integration_key);
        active.account_id = Set(changes.account_id);
        active.private_key_file = Set(changes.private_key_file);
        active.email = Set(changes.email);
        active.status = Set(changes.status.as_str().to_string());

        let updated = active
            .update(&self.conn)
            .await
            .context("Failed to update integration")?;

        Ok(Some(Integration::from(updated)))
    }

    pub async fn set_status(&self, id: IntegrationId, status: IntegrationStatus) -> Result<bool> {
        let result = Integrations::update_many()
            .col_expr(
                integrations::Column::Status,
                sea_orm::sea_query::Expr::value(status.as_str()),
            )
            .filter(integrations::Column::IntegrationId.eq(id.value()))
            .exec(&self.conn)
            .await
            .context("Failed to update integration status")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn delete(&self, id: IntegrationId) -> Result<bool> {
        let result = Integrations::delete_by_id(id.value())
            .exec(&self.conn)
            .await
            .context("Failed to delete integration")?;

        Ok(result.rows_affected > 0)
    }

    /// Id of the integration holding `key`, if any.
    pub async fn key_owner(&self, key: &str) -> Result<Option<IntegrationId>> {
        let model = Integrations::find()
            .filter(integrations::Column::IntegrationKey.eq(key))
            .one(&self.conn)
            .await
            .context("Failed to query integration by key")?;

        Ok(model.map(|m| IntegrationId::new(m.integration_id)))
    }

    /// Subset of `keys` already present in the store.
    pub async fn existing_keys(&self, keys: &[String]) -> Result<HashSet<String>> {
        let mut found = HashSet::new();

        for chunk in keys.chunks(CHUNK_SIZE) {
            let models = Integrations::find()
                .filter(integrations::Column::IntegrationKey.is_in(chunk.to_vec()))
                .all(&self.conn)
                .await
                .context("Failed to query existing integration keys")?;

            found.extend(models.into_iter().map(|m| m.integration_key));
        }

        Ok(found)
    }

    pub async fn count(&self) -> Result<u64> {
        Integrations::find()
            .count(&self.conn)
            .await
            .context("Failed to count integrations")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Store, is_unique_violation, migrator::DEFAULT_ADMIN_USERNAME};

    async fn store_with_owner() -> (Store, UserId) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let admin = store
            .get_user_by_username(DEFAULT_ADMIN_USERNAME)
            .await
            .unwrap()
            .unwrap();
        (store, admin.user_id)
    }

    fn new_integration(key: &str, owner: UserId) -> NewIntegration {
        NewIntegration {
            integration_key: key.to_string(),
            user_id: owner,
            account_id: 1,
            private_key_file: None,
            email: "ops@example.com".to_string(),
            status: IntegrationStatus::Active,
        }
    }

    #[tokio::test]
    async fn duplicate_key_insert_is_reported_as_unique_violation() {
        let (store, owner) = store_with_owner().await;
        let repo = store.integration_repo();

        repo.insert(new_integration("dup", owner)).await.unwrap();
        let err = repo.insert(new_integration("dup", owner)).await.unwrap_err();

        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&anyhow::anyhow!("unrelated")));
    }

    #[test]
    fn unknown_stored_status_reads_as_pending() {
        let integration = Integration::from(integrations::Model {
            integration_id: 3,
            integration_key: "k".to_string(),
            user_id: 1,
            account_id: 2,
            private_key_file: None,
            email: "ops@example.com".to_string(),
            status: "archived".to_string(),
        });

        assert_eq!(integration.status, IntegrationStatus::Pending);
    }
}
