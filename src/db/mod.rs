use anyhow::Result;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, SqlErr, Statement,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::integration::{Integration, IntegrationChanges, NewIntegration};
pub use repositories::token::{IssuedToken, TokenKind};
pub use repositories::user::{NewUser, User};

/// True when a store error came from a UNIQUE constraint, wherever it sits in the context chain.
#[must_use]
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<DbErr>()
            .and_then(DbErr::sql_err)
            .is_some_and(|sql| matches!(sql, SqlErr::UniqueConstraintViolation(_)))
    })
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        // Every pooled connection to `:memory:` is its own database, so the
        // pool is pinned to one connection that is never recycled.
        if in_memory {
            opt.max_connections(1).min_connections(1);
        } else {
            opt.max_connections(max_connections)
                .min_connections(min_connections)
                .idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
        }

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn token_repo(&self) -> repositories::token::TokenRepository {
        repositories::token::TokenRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn integration_repo(&self) -> repositories::integration::IntegrationRepository {
        repositories::integration::IntegrationRepository::new(self.conn.clone())
    }

    // ========== User Repository Methods ==========

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn verify_user_password(&self, username: &str, password: &str) -> Result<Option<User>> {
        self.user_repo().verify_password(username, password).await
    }

    // ========== Integration Repository Methods ==========

    pub async fn count_integrations(&self) -> Result<u64> {
        self.integration_repo().count().await
    }

    pub async fn insert_integrations_batch(&self, rows: Vec<NewIntegration>) -> Result<u64> {
        self.integration_repo().insert_batch(rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{plans, prelude::*};
    use sea_orm::{EntityTrait, PaginatorTrait};

    #[tokio::test]
    async fn memory_store_runs_migrations_and_seeds_defaults() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        store.ping().await.unwrap();

        let admin = store
            .get_user_by_username(migrator::DEFAULT_ADMIN_USERNAME)
            .await
            .unwrap()
            .expect("bootstrap admin missing");
        assert!(admin.is_admin);

        let plan_count = Plans::find().count(&store.conn).await.unwrap();
        assert_eq!(plan_count, 4);

        let free = Plans::find()
            .all(&store.conn)
            .await
            .unwrap()
            .into_iter()
            .find(|p: &plans::Model| p.name == "free")
            .unwrap();
        assert_eq!(free.duration_days, 0);

        assert_eq!(store.count_integrations().await.unwrap(), 0);
        assert_eq!(Subscriptions::find().count(&store.conn).await.unwrap(), 0);
        assert_eq!(Documents::find().count(&store.conn).await.unwrap(), 0);
    }
}
