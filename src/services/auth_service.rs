//! Domain service for accounts and bearer tokens.
//!
//! Handles signup, login, logout and resolving a token to a [`Caller`].

use serde::Serialize;
use thiserror::Error;

use crate::domain::Caller;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub username: String,
    pub password: String,
    pub email: String,
}

/// Public view of an account.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub is_staff: bool,
    pub created_at: String,
}

/// Login result containing the freshly issued tokens.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub username: String,
    pub is_admin: bool,
    pub is_staff: bool,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates a regular (non-admin) account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Conflict`] if the username or email is taken.
    async fn signup(&self, input: SignupInput) -> Result<UserInfo, AuthError>;

    /// Verifies credentials and replaces the user's tokens with a new pair.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if login fails.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Revokes every token held by the caller.
    async fn logout(&self, caller: &Caller) -> Result<(), AuthError>;

    /// Resolves an access token to the identity behind it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] for unknown or expired tokens.
    async fn resolve_caller(&self, token: &str) -> Result<Caller, AuthError>;
}
