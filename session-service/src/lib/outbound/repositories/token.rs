use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;

use crate::session::errors::StoreError;
use crate::session::models::Token;
use crate::session::models::TokenKind;
use crate::session::models::UserId;
use crate::session::ports::TokenRepository;

/// Refresh and verification token store on the `auth_tokens` table.
///
/// Each mutation is one SQL statement, so row-level locking in Postgres
/// serializes concurrent logout, refresh and sweep on the same token.
pub struct PostgresTokenRepository {
    pool: PgPool,
}

impl PostgresTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: String,
    user_id: String,
    token: String,
    kind: String,
    expires_at: DateTime<Utc>,
    blacklisted: bool,
    credential_version: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<TokenRow> for Token {
    type Error = StoreError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let kind = row.kind.parse::<TokenKind>().map_err(|e| {
            StoreError::Unavailable(format!("Stored token {} is unreadable: {}", row.id, e))
        })?;

        Ok(Token {
            id: row.id,
            user_id: UserId::new(row.user_id),
            secret: row.token,
            kind,
            expires_at: row.expires_at,
            blacklisted: row.blacklisted,
            credential_version: row.credential_version,
            created_at: row.created_at,
        })
    }
}

fn database_error(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl TokenRepository for PostgresTokenRepository {
    async fn create(&self, token: Token) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (id, user_id, token, kind, expires_at, blacklisted, credential_version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&token.id)
        .bind(token.user_id.as_str())
        .bind(&token.secret)
        .bind(token.kind.as_str())
        .bind(token.expires_at)
        .bind(token.blacklisted)
        .bind(token.credential_version)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return StoreError::Conflict(token.id.clone());
                }
            }
            database_error(e)
        })?;

        Ok(())
    }

    async fn find_by_secret(&self, secret: &str) -> Result<Option<Token>, StoreError> {
        sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT id, user_id, token, kind, expires_at, blacklisted, credential_version, created_at
            FROM auth_tokens
            WHERE token = $1
            "#,
        )
        .bind(secret)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?
        .map(Token::try_from)
        .transpose()
    }

    async fn blacklist(&self, secret: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE auth_tokens SET blacklisted = TRUE WHERE token = $1")
            .bind(secret)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        Ok(())
    }

    async fn revoke_if_active(&self, secret: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE auth_tokens
            SET blacklisted = TRUE
            WHERE token = $1 AND blacklisted = FALSE
            "#,
        )
        .bind(secret)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        Ok(result.rows_affected())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        Ok(result.rows_affected())
    }
}
