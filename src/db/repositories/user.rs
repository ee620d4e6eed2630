use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::collections::HashSet;
use tokio::task;

use crate::config::SecurityConfig;
use crate::domain::UserId;
use crate::entities::users;

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub is_staff: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            user_id: UserId::new(model.user_id),
            username: model.username,
            email: model.email,
            is_admin: model.is_admin,
            is_staff: model.is_staff,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_admin: bool,
    pub is_staff: bool,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    /// Any user already holding this username or this email.
    pub async fn find_conflicting(&self, username: &str, email: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(
                Condition::any()
                    .add(users::Column::Username.eq(username))
                    .add(users::Column::Email.eq(email)),
            )
            .one(&self.conn)
            .await
            .context("Failed to query users by username or email")?;

        Ok(user.map(User::from))
    }

    /// Subset of `ids` that belong to stored users.
    pub async fn existing_ids(&self, ids: &[i32]) -> Result<HashSet<i32>> {
        let mut found = HashSet::new();

        for chunk in ids.chunks(100) {
            let models = users::Entity::find()
                .filter(users::Column::UserId.is_in(chunk.to_vec()))
                .all(&self.conn)
                .await
                .context("Failed to query users by ID")?;

            found.extend(models.into_iter().map(|u| u.user_id));
        }

        Ok(found)
    }

    /// Hashes the password off the async runtime and stores the user.
    pub async fn create(&self, new_user: NewUser, config: &SecurityConfig) -> Result<User> {
        let password = new_user.password;
        let config = config.clone();
        let password_hash = task::spawn_blocking(move || hash_password(&password, Some(&config)))
            .await
            .context("Password hashing task panicked")??;

        let now = chrono::Utc::now().to_rfc3339();

        let model = users::ActiveModel {
            username: Set(new_user.username),
            password_hash: Set(password_hash),
            email: Set(new_user.email),
            is_admin: Set(new_user.is_admin),
            is_staff: Set(new_user.is_staff),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = users::Entity::insert(model)
            .exec(&self.conn)
            .await
            .context("Failed to insert user")?;

        let inserted = users::Entity::find_by_id(result.last_insert_id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created user"))?;

        Ok(User::from(inserted))
    }

    /// Verify password for a user and return the user on success.
    /// Note: This uses `spawn_blocking` because Argon2 hashing is CPU-intensive
    /// and would block the async runtime if run directly.
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let password_hash = user.password_hash.clone();
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            Ok::<bool, anyhow::Error>(
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid.then(|| User::from(user)))
    }
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses the library default params.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_password_produces_verifiable_argon2id_hash() {
        let config = SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        };

        let hash = hash_password("correct horse", Some(&config)).unwrap();
        assert!(hash.starts_with("$argon2id$"));

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"correct horse", &parsed)
                .is_ok()
        );
        assert!(
            Argon2::default()
                .verify_password(b"wrong horse", &parsed)
                .is_err()
        );
    }

    #[test]
    fn hash_password_rejects_invalid_params() {
        let config = SecurityConfig {
            argon2_memory_cost_kib: 0,
            ..SecurityConfig::default()
        };
        assert!(hash_password("secret", Some(&config)).is_err());
    }
}
