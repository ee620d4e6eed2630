use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TransactionTrait,
};

use crate::domain::UserId;
use crate::entities::{prelude::*, tokens};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Pair of tokens handed out at login.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

pub struct TokenRepository {
    conn: DatabaseConnection,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Drops every token the user holds and stores a fresh access/refresh pair.
    pub async fn replace_for_user(
        &self,
        user_id: UserId,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<IssuedToken> {
        let now = Utc::now();
        let expiry = |ttl: Duration| {
            now.checked_add_signed(ttl)
                .with_context(|| format!("Token lifetime of {ttl} overflows the calendar"))
        };
        let issued = IssuedToken {
            access_token: generate_token(),
            refresh_token: generate_token(),
            access_expires_at: expiry(access_ttl)?,
            refresh_expires_at: expiry(refresh_ttl)?,
        };

        let txn = self.conn.begin().await?;

        Tokens::delete_many()
            .filter(tokens::Column::UserId.eq(user_id.value()))
            .exec(&txn)
            .await
            .context("Failed to delete previous tokens")?;

        let rows = [
            (TokenKind::Access, &issued.access_token, issued.access_expires_at),
            (TokenKind::Refresh, &issued.refresh_token, issued.refresh_expires_at),
        ]
        .into_iter()
        .map(|(kind, token, expires_at)| tokens::ActiveModel {
            user_id: Set(user_id.value()),
            token_type: Set(kind.as_str().to_string()),
            token: Set(token.clone()),
            expires_at: Set(expires_at.to_rfc3339()),
            ..Default::default()
        });

        Tokens::insert_many(rows)
            .exec(&txn)
            .await
            .context("Failed to store issued tokens")?;

        txn.commit().await?;

        Ok(issued)
    }

    /// Owner of `token` when it is a stored, unexpired access token.
    pub async fn find_valid_access(&self, token: &str) -> Result<Option<UserId>> {
        let row = Tokens::find()
            .filter(tokens::Column::Token.eq(token))
            .filter(tokens::Column::TokenType.eq(TokenKind::Access.as_str()))
            .one(&self.conn)
            .await
            .context("Failed to query access token")?;

        let Some(row) = row else {
            return Ok(None);
        };

        // An unparseable timestamp counts as expired.
        let still_valid = DateTime::parse_from_rfc3339(&row.expires_at)
            .is_ok_and(|expires_at| expires_at.with_timezone(&Utc) > Utc::now());

        Ok(still_valid.then(|| UserId::new(row.user_id)))
    }

    pub async fn revoke_for_user(&self, user_id: UserId) -> Result<u64> {
        let result = Tokens::delete_many()
            .filter(tokens::Column::UserId.eq(user_id.value()))
            .exec(&self.conn)
            .await
            .context("Failed to revoke tokens")?;

        Ok(result.rows_affected)
    }
}

/// Random 64-character hex token.
#[must_use]
pub fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_64_hex_chars_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn overflowing_lifetime_is_an_error_and_keeps_old_tokens() {
        let store = crate::db::Store::new("sqlite::memory:").await.unwrap();
        let admin = store
            .get_user_by_username(crate::db::migrator::DEFAULT_ADMIN_USERNAME)
            .await
            .unwrap()
            .unwrap();
        let repo = store.token_repo();

        let issued = repo
            .replace_for_user(admin.user_id, Duration::minutes(30), Duration::days(7))
            .await
            .unwrap();

        let result = repo
            .replace_for_user(admin.user_id, Duration::minutes(30), Duration::days(100_000_000))
            .await;
        assert!(result.is_err());

        let owner = repo.find_valid_access(&issued.access_token).await.unwrap();
        assert_eq!(owner, Some(admin.user_id));
    }

    #[test]
    fn token_kind_labels() {
        assert_eq!(TokenKind::Access.as_str(), "access");
        assert_eq!(TokenKind::Refresh.as_str(), "refresh");
    }
}
