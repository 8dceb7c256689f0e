use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{CredentialStore, StoreTransaction};
use crate::domain::{Identity, RefreshTokenRecord, TokenStatus};
use crate::error::{AppError, DatabaseError};

/// Postgres-backed credential store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    name: String,
    email: String,
    profile_picture: String,
    password_hash: String,
    address: String,
    phone_number: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        Identity {
            id: row.id,
            name: row.name,
            email: row.email,
            profile_picture: row.profile_picture,
            password_hash: row.password_hash,
            address: row.address,
            phone_number: row.phone_number,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    user_id: Uuid,
    hashed_refresh_token: String,
    status: String,
    created_at: DateTime<Utc>,
    expired_at: DateTime<Utc>,
}

impl TryFrom<RefreshTokenRow> for RefreshTokenRecord {
    type Error = AppError;

    fn try_from(row: RefreshTokenRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TokenStatus>()
            .map_err(|e| AppError::Database(DatabaseError::UnexpectedError(e)))?;

        Ok(RefreshTokenRecord {
            user_id: row.user_id,
            hashed_refresh_token: row.hashed_refresh_token,
            status,
            created_at: row.created_at,
            expired_at: row.expired_at,
        })
    }
}

const IDENTITY_COLUMNS: &str = "id, name, email, profile_picture, password_hash, address, \
                                phone_number, created_at, updated_at";

#[async_trait]
impl CredentialStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }

    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            IDENTITY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Identity::from))
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            IDENTITY_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Identity::from))
    }

    async fn refresh_tokens_for(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, AppError> {
        let rows = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT user_id, hashed_refresh_token, status, created_at, expired_at
            FROM refresh_tokens
            WHERE user_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RefreshTokenRecord::try_from).collect()
    }
}

/// A live Postgres transaction. Rolled back by sqlx on drop.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn credential_taken(&mut self, name: &str, email: &str) -> Result<bool, AppError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE name = $1 OR email = $2)",
        )
        .bind(name)
        .bind(email)
        .fetch_one(&mut self.tx)
        .await?;

        Ok(taken)
    }

    async fn insert_identity(&mut self, identity: &Identity) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, profile_picture, password_hash, address,
                               phone_number, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(identity.id)
        .bind(&identity.name)
        .bind(&identity.email)
        .bind(&identity.profile_picture)
        .bind(&identity.password_hash)
        .bind(&identity.address)
        .bind(&identity.phone_number)
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .execute(&mut self.tx)
        .await?;

        Ok(())
    }

    async fn lock_identity(&mut self, id: Uuid) -> Result<bool, AppError> {
        let row = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut self.tx)
            .await?;

        Ok(row.is_some())
    }

    async fn delete_identity(&mut self, id: Uuid) -> Result<bool, AppError> {
        // refresh_tokens rows go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_refresh_token(&mut self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, hashed_refresh_token, status, created_at, expired_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.user_id)
        .bind(&record.hashed_refresh_token)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.expired_at)
        .execute(&mut self.tx)
        .await?;

        Ok(())
    }

    async fn revoke_latest_refresh_token(&mut self, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET status = 'revoked'
            WHERE id = (
                SELECT id FROM refresh_tokens
                WHERE user_id = $1
                ORDER BY id DESC
                LIMIT 1
            )
            AND status = 'active'
            "#,
        )
        .bind(user_id)
        .execute(&mut self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn latest_refresh_token(
        &mut self,
        user_id: Uuid,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT user_id, hashed_refresh_token, status, created_at, expired_at
            FROM refresh_tokens
            WHERE user_id = $1
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut self.tx)
        .await?;

        row.map(RefreshTokenRecord::try_from).transpose()
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
