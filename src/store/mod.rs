/// Credential store
///
/// Narrow persistence interface for identities and the refresh-token
/// ledger. Ledger mutations go through a [`StoreTransaction`] so that
/// revoke-then-insert pairs and digest comparisons happen atomically.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Identity, RefreshTokenRecord};
use crate::error::AppError;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Start a transaction. Dropping it without [`StoreTransaction::commit`]
    /// rolls every change back.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, AppError>;

    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, AppError>;

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, AppError>;

    /// All ledger rows for an identity, oldest first.
    async fn refresh_tokens_for(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, AppError>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    /// True if another identity already uses this name or email.
    async fn credential_taken(&mut self, name: &str, email: &str) -> Result<bool, AppError>;

    async fn insert_identity(&mut self, identity: &Identity) -> Result<(), AppError>;

    /// Confirm the identity exists and hold it until commit, so concurrent
    /// rotations for the same identity run one after the other.
    async fn lock_identity(&mut self, id: Uuid) -> Result<bool, AppError>;

    /// Remove the identity together with its ledger rows. Returns false
    /// when there was nothing to remove.
    async fn delete_identity(&mut self, id: Uuid) -> Result<bool, AppError>;

    async fn insert_refresh_token(&mut self, record: &RefreshTokenRecord) -> Result<(), AppError>;

    /// Flip the identity's most recent ledger row to `revoked`.
    /// Returns false when there is no row or it was already revoked.
    async fn revoke_latest_refresh_token(&mut self, user_id: Uuid) -> Result<bool, AppError>;

    /// The identity's most recently created ledger row, whatever its status.
    async fn latest_refresh_token(&mut self, user_id: Uuid) -> Result<Option<RefreshTokenRecord>, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
