//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::db::{NewUser, Store, is_unique_violation};
use crate::domain::Caller;
use crate::services::auth_service::{AuthError, AuthService, LoginResult, SignupInput, UserInfo};

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }
}

/// A concurrent signup claimed the username or email after the conflict check.
fn signup_write_error(err: anyhow::Error) -> AuthError {
    if is_unique_violation(&err) {
        AuthError::Conflict("Username or email already registered".to_string())
    } else {
        err.into()
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn signup(&self, input: SignupInput) -> Result<UserInfo, AuthError> {
        let repo = self.store.user_repo();

        if let Some(existing) = repo.find_conflicting(&input.username, &input.email).await? {
            let field = if existing.username == input.username {
                "Username"
            } else {
                "Email"
            };
            return Err(AuthError::Conflict(format!("{field} already registered")));
        }

        let user = repo
            .create(
                NewUser {
                    username: input.username,
                    email: input.email,
                    password: input.password,
                    is_admin: false,
                    is_staff: false,
                },
                &self.security,
            )
            .await
            .map_err(signup_write_error)?;

        info!(user_id = %user.user_id, username = %user.username, "User registered");

        Ok(UserInfo {
            user_id: user.user_id.value(),
            username: user.username,
            email: user.email,
            is_admin: user.is_admin,
            is_staff: user.is_staff,
            created_at: user.created_at,
        })
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        let user = self
            .store
            .verify_user_password(username, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let access_ttl = Duration::try_minutes(self.security.access_token_expire_minutes)
            .ok_or_else(|| AuthError::Internal("Access token lifetime out of range".to_string()))?;
        let refresh_ttl = Duration::try_days(self.security.refresh_token_expire_days)
            .ok_or_else(|| AuthError::Internal("Refresh token lifetime out of range".to_string()))?;

        let issued = self
            .store
            .token_repo()
            .replace_for_user(user.user_id, access_ttl, refresh_ttl)
            .await?;

        info!(user_id = %user.user_id, "User logged in");

        Ok(LoginResult {
            username: user.username,
            is_admin: user.is_admin,
            is_staff: user.is_staff,
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
            token_type: "bearer",
            expires_in: access_ttl.num_seconds(),
        })
    }

    async fn logout(&self, caller: &Caller) -> Result<(), AuthError> {
        let revoked = self.store.token_repo().revoke_for_user(caller.user_id).await?;
        info!(user_id = %caller.user_id, revoked, "User logged out");
        Ok(())
    }

    async fn resolve_caller(&self, token: &str) -> Result<Caller, AuthError> {
        let user_id = self
            .store
            .token_repo()
            .find_valid_access(token)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        // Token rows cascade with their user, so a miss here means a race with deletion.
        let user = self
            .store
            .user_repo()
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        Ok(Caller {
            user_id: user.user_id,
            username: user.username,
            is_admin: user.is_admin,
            is_staff: user.is_staff,
        })
    }
}
