/// Refresh Token Ledger
///
/// Server-side record of issued refresh tokens. Rows are hashed with
/// SHA-256 before storage (never store plaintext) and carry an
/// `active`/`revoked` status. For each identity at most one row is active:
/// every issuance revokes the previous latest row before recording the new
/// one. All functions run inside the caller's transaction.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::jwt::IssuedToken;
use crate::domain::RefreshTokenRecord;
use crate::error::AppError;
use crate::store::StoreTransaction;

/// Outcome of presenting a refresh token for rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Presented token was the latest one; the replacement is now active.
    Rotated,
    /// Presented token was stale or unknown. The latest row has been
    /// revoked and nothing new was installed. Commit before reporting.
    ReuseDetected,
}

/// Lowercase hex SHA-256 of the token string.
pub fn digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Insert a new active row. Does not revoke anything by itself.
pub async fn record(
    tx: &mut dyn StoreTransaction,
    user_id: Uuid,
    token_digest: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<(), AppError> {
    let row = RefreshTokenRecord::active(user_id, token_digest, created_at, expires_at);
    tx.insert_refresh_token(&row).await
}

/// Revoke the identity's most recent row. Idempotent.
pub async fn revoke_latest(tx: &mut dyn StoreTransaction, user_id: Uuid) -> Result<(), AppError> {
    if !tx.revoke_latest_refresh_token(user_id).await? {
        tracing::debug!(user_id = %user_id, "No active refresh token to revoke");
    }
    Ok(())
}

/// Digest of the identity's most recent row. `None` when the ledger is
/// empty or that row has already been revoked.
pub async fn latest_digest(
    tx: &mut dyn StoreTransaction,
    user_id: Uuid,
) -> Result<Option<String>, AppError> {
    Ok(tx
        .latest_refresh_token(user_id)
        .await?
        .filter(|row| row.is_active())
        .map(|row| row.hashed_refresh_token))
}

/// Revoke-then-record for a freshly issued refresh token.
pub async fn install(
    tx: &mut dyn StoreTransaction,
    user_id: Uuid,
    issued: &IssuedToken,
) -> Result<(), AppError> {
    revoke_latest(tx, user_id).await?;
    record(
        tx,
        user_id,
        digest(&issued.token),
        issued.issued_at,
        issued.expires_at,
    )
    .await
}

/// Compare `presented` with the ledger's latest row for `user_id` and
/// either install `replacement` or revoke the session. A latest row that is
/// already revoked never matches.
pub async fn rotate(
    tx: &mut dyn StoreTransaction,
    user_id: Uuid,
    presented: &str,
    replacement: &IssuedToken,
) -> Result<Rotation, AppError> {
    let presented_digest = digest(presented);

    match latest_digest(tx, user_id).await? {
        Some(latest) if latest == presented_digest => {
            install(tx, user_id, replacement).await?;
            Ok(Rotation::Rotated)
        }
        latest => {
            tracing::warn!(
                user_id = %user_id,
                live_session = latest.is_some(),
                "Refresh token does not match the latest active token"
            );
            revoke_latest(tx, user_id).await?;
            Ok(Rotation::ReuseDetected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Identity, TokenStatus};
    use crate::store::{CredentialStore, InMemoryStore};
    use chrono::Duration;

    fn issued(token: &str) -> IssuedToken {
        let now = Utc::now();
        IssuedToken {
            token: token.to_string(),
            issued_at: now,
            expires_at: now + Duration::days(30),
        }
    }

    async fn store_with_identity() -> (InMemoryStore, Uuid) {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let identity = Identity {
            id: Uuid::new_v4(),
            name: "alice123".to_string(),
            email: "alice@example.com".to_string(),
            profile_picture: "https://cdn.example.com/alice.png".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            address: "12 Harbour Street".to_string(),
            phone_number: "081234567890".to_string(),
            created_at: now,
            updated_at: now,
        };
        let mut tx = store.begin().await.unwrap();
        tx.insert_identity(&identity).await.unwrap();
        tx.commit().await.unwrap();
        (store, identity.id)
    }

    #[test]
    fn test_digest_is_sha256_hex() {
        let hash = digest("hello");
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(digest("hello"), hash);
        assert_ne!(digest("hello!"), hash);
    }

    #[tokio::test]
    async fn test_install_keeps_one_active_row() {
        let (store, user_id) = store_with_identity().await;

        let mut tx = store.begin().await.unwrap();
        install(tx.as_mut(), user_id, &issued("first")).await.unwrap();
        install(tx.as_mut(), user_id, &issued("second")).await.unwrap();
        tx.commit().await.unwrap();

        let rows = store.refresh_tokens_for(user_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.iter().filter(|r| r.is_active()).count(), 1);
        assert_eq!(rows[1].hashed_refresh_token, digest("second"));
        assert_ne!(rows[1].hashed_refresh_token, "second");
    }

    #[tokio::test]
    async fn test_revoke_latest_twice_changes_one_row() {
        let (store, user_id) = store_with_identity().await;

        let mut tx = store.begin().await.unwrap();
        install(tx.as_mut(), user_id, &issued("first")).await.unwrap();
        revoke_latest(tx.as_mut(), user_id).await.unwrap();
        revoke_latest(tx.as_mut(), user_id).await.unwrap();
        tx.commit().await.unwrap();

        let rows = store.refresh_tokens_for(user_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, TokenStatus::Revoked);
    }

    #[tokio::test]
    async fn test_rotate_with_latest_token() {
        let (store, user_id) = store_with_identity().await;

        let mut tx = store.begin().await.unwrap();
        install(tx.as_mut(), user_id, &issued("r1")).await.unwrap();
        let outcome = rotate(tx.as_mut(), user_id, "r1", &issued("r2")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome, Rotation::Rotated);
        let rows = store.refresh_tokens_for(user_id).await.unwrap();
        assert_eq!(rows[0].status, TokenStatus::Revoked);
        assert_eq!(rows[1].status, TokenStatus::Active);
        assert_eq!(rows[1].hashed_refresh_token, digest("r2"));
    }

    #[tokio::test]
    async fn test_rotation_follows_insertion_order_not_timestamps() {
        let (store, user_id) = store_with_identity().await;
        let mut earlier = issued("r2");
        earlier.issued_at -= Duration::minutes(5);

        let mut tx = store.begin().await.unwrap();
        install(tx.as_mut(), user_id, &issued("r1")).await.unwrap();
        let first = rotate(tx.as_mut(), user_id, "r1", &earlier).await.unwrap();
        let second = rotate(tx.as_mut(), user_id, "r2", &issued("r3")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first, Rotation::Rotated);
        assert_eq!(second, Rotation::Rotated);
        let rows = store.refresh_tokens_for(user_id).await.unwrap();
        assert_eq!(rows.iter().filter(|r| r.is_active()).count(), 1);
        assert_eq!(rows[2].hashed_refresh_token, digest("r3"));
    }

    #[tokio::test]
    async fn test_rotate_with_stale_token_revokes_session() {
        let (store, user_id) = store_with_identity().await;

        let mut tx = store.begin().await.unwrap();
        install(tx.as_mut(), user_id, &issued("r1")).await.unwrap();
        rotate(tx.as_mut(), user_id, "r1", &issued("r2")).await.unwrap();
        let outcome = rotate(tx.as_mut(), user_id, "r1", &issued("r3")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome, Rotation::ReuseDetected);
        let rows = store.refresh_tokens_for(user_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| !r.is_active()));
    }

    #[tokio::test]
    async fn test_revoked_latest_token_cannot_rotate() {
        let (store, user_id) = store_with_identity().await;

        let mut tx = store.begin().await.unwrap();
        install(tx.as_mut(), user_id, &issued("r1")).await.unwrap();
        revoke_latest(tx.as_mut(), user_id).await.unwrap();
        assert_eq!(latest_digest(tx.as_mut(), user_id).await.unwrap(), None);

        let outcome = rotate(tx.as_mut(), user_id, "r1", &issued("r2")).await.unwrap();
        assert_eq!(outcome, Rotation::ReuseDetected);
    }

    #[tokio::test]
    async fn test_rotate_with_empty_ledger_is_reuse() {
        let (store, user_id) = store_with_identity().await;

        let mut tx = store.begin().await.unwrap();
        let outcome = rotate(tx.as_mut(), user_id, "r1", &issued("r2")).await.unwrap();

        assert_eq!(outcome, Rotation::ReuseDetected);
    }
}
