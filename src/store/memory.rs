use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{CredentialStore, StoreTransaction};
use crate::domain::{Identity, RefreshTokenRecord, TokenStatus};
use crate::error::AppError;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    identities: Vec<Identity>,
    // Insertion order doubles as the ledger's creation order.
    refresh_tokens: Vec<RefreshTokenRecord>,
}

/// Process-local credential store used by tests and local runs.
///
/// A transaction holds the whole store until it commits or drops, so
/// transactions never interleave. Do not call the read methods on the
/// store while holding a transaction from the same task.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }

    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        let state = self.state.lock().await;
        Ok(state.identities.iter().find(|i| i.id == id).cloned())
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let state = self.state.lock().await;
        Ok(state.identities.iter().find(|i| i.email == email).cloned())
    }

    async fn refresh_tokens_for(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .refresh_tokens
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Works on a private copy; commit swaps it into the locked state.
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl InMemoryTransaction {
    fn latest_mut(&mut self, user_id: Uuid) -> Option<&mut RefreshTokenRecord> {
        self.working
            .refresh_tokens
            .iter_mut()
            .rev()
            .find(|r| r.user_id == user_id)
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn credential_taken(&mut self, name: &str, email: &str) -> Result<bool, AppError> {
        Ok(self
            .working
            .identities
            .iter()
            .any(|i| i.name == name || i.email == email))
    }

    async fn insert_identity(&mut self, identity: &Identity) -> Result<(), AppError> {
        if self.credential_taken(&identity.name, &identity.email).await? {
            return Err(crate::error::AuthError::DuplicateCredential.into());
        }
        self.working.identities.push(identity.clone());
        Ok(())
    }

    async fn lock_identity(&mut self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.working.identities.iter().any(|i| i.id == id))
    }

    async fn delete_identity(&mut self, id: Uuid) -> Result<bool, AppError> {
        let before = self.working.identities.len();
        self.working.identities.retain(|i| i.id != id);
        if self.working.identities.len() == before {
            return Ok(false);
        }
        self.working.refresh_tokens.retain(|r| r.user_id != id);
        Ok(true)
    }

    async fn insert_refresh_token(&mut self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        if !self.working.identities.iter().any(|i| i.id == record.user_id) {
            return Err(AppError::not_found("user not found"));
        }
        self.working.refresh_tokens.push(record.clone());
        Ok(())
    }

    async fn revoke_latest_refresh_token(&mut self, user_id: Uuid) -> Result<bool, AppError> {
        match self.latest_mut(user_id) {
            Some(record) if record.is_active() => {
                record.status = TokenStatus::Revoked;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn latest_refresh_token(
        &mut self,
        user_id: Uuid,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        Ok(self.latest_mut(user_id).cloned())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let InMemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn identity(name: &str, email: &str) -> Identity {
        let now = Utc::now();
        Identity {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            profile_picture: "https://cdn.example.com/p.png".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            address: "12 Harbour Street".to_string(),
            phone_number: "081234567890".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn record(user_id: Uuid, digest: &str) -> RefreshTokenRecord {
        let now = Utc::now();
        RefreshTokenRecord::active(user_id, digest.to_string(), now, now + Duration::days(30))
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_rolls_back() {
        let store = InMemoryStore::new();
        let alice = identity("alice123", "alice@example.com");

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_identity(&alice).await.unwrap();
        }

        assert!(store.find_identity(alice.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = InMemoryStore::new();
        let alice = identity("alice123", "alice@example.com");

        let mut tx = store.begin().await.unwrap();
        tx.insert_identity(&alice).await.unwrap();
        tx.insert_refresh_token(&record(alice.id, "d1")).await.unwrap();
        tx.commit().await.unwrap();

        let found = store.find_identity_by_email("alice@example.com").await.unwrap();
        assert_eq!(found.map(|i| i.id), Some(alice.id));
        assert_eq!(store.refresh_tokens_for(alice.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_name_or_email_is_taken() {
        let store = InMemoryStore::new();
        let alice = identity("alice123", "alice@example.com");

        let mut tx = store.begin().await.unwrap();
        tx.insert_identity(&alice).await.unwrap();
        assert!(tx.credential_taken("alice123", "other@example.com").await.unwrap());
        assert!(tx.credential_taken("bobby", "alice@example.com").await.unwrap());
        assert!(!tx.credential_taken("bobby", "bob@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_latest_row_is_per_identity() {
        let store = InMemoryStore::new();
        let alice = identity("alice123", "alice@example.com");
        let bob = identity("bobby12", "bob@example.com");

        let mut tx = store.begin().await.unwrap();
        tx.insert_identity(&alice).await.unwrap();
        tx.insert_identity(&bob).await.unwrap();
        tx.insert_refresh_token(&record(alice.id, "a1")).await.unwrap();
        tx.insert_refresh_token(&record(bob.id, "b1")).await.unwrap();

        let latest = tx.latest_refresh_token(alice.id).await.unwrap().unwrap();
        assert_eq!(latest.hashed_refresh_token, "a1");
        let latest = tx.latest_refresh_token(bob.id).await.unwrap().unwrap();
        assert_eq!(latest.hashed_refresh_token, "b1");
    }

    #[tokio::test]
    async fn test_revoke_only_touches_latest_active_row() {
        let store = InMemoryStore::new();
        let alice = identity("alice123", "alice@example.com");

        let mut tx = store.begin().await.unwrap();
        tx.insert_identity(&alice).await.unwrap();
        tx.insert_refresh_token(&record(alice.id, "a1")).await.unwrap();
        tx.insert_refresh_token(&record(alice.id, "a2")).await.unwrap();

        assert!(tx.revoke_latest_refresh_token(alice.id).await.unwrap());
        assert!(!tx.revoke_latest_refresh_token(alice.id).await.unwrap());
        tx.commit().await.unwrap();

        let rows = store.refresh_tokens_for(alice.id).await.unwrap();
        assert_eq!(rows[0].status, TokenStatus::Active);
        assert_eq!(rows[1].status, TokenStatus::Revoked);
    }

    #[tokio::test]
    async fn test_delete_removes_identity_and_its_ledger_rows() {
        let store = InMemoryStore::new();
        let alice = identity("alice123", "alice@example.com");
        let bob = identity("bobby12", "bob@example.com");

        let mut tx = store.begin().await.unwrap();
        tx.insert_identity(&alice).await.unwrap();
        tx.insert_identity(&bob).await.unwrap();
        tx.insert_refresh_token(&record(alice.id, "a1")).await.unwrap();
        tx.insert_refresh_token(&record(bob.id, "b1")).await.unwrap();
        assert!(tx.delete_identity(alice.id).await.unwrap());
        assert!(!tx.delete_identity(alice.id).await.unwrap());
        tx.commit().await.unwrap();

        assert!(store.find_identity(alice.id).await.unwrap().is_none());
        assert!(store.refresh_tokens_for(alice.id).await.unwrap().is_empty());
        assert_eq!(store.refresh_tokens_for(bob.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_revoke_without_rows_is_noop() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert!(!tx.revoke_latest_refresh_token(Uuid::new_v4()).await.unwrap());
        assert!(tx.latest_refresh_token(Uuid::new_v4()).await.unwrap().is_none());
    }
}
