/// Session Issuer
///
/// Registration, login, logout and account removal. Each of them ends with
/// the identity owning exactly one active refresh token (or none, after
/// logout or removal).

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::auth::jwt::{TokenKeys, TokenPair};
use crate::auth::password::PasswordHasher;
use crate::auth::refresh_token;
use crate::domain::Identity;
use crate::error::{AppError, AuthError};
use crate::events::{DomainEvent, EventPublisher};
use crate::store::CredentialStore;
use crate::validators::{validate_login, validate_registration, LoginRequest, RegisterRequest};

/// Compared against on unknown-email logins so both login failures cost
/// one bcrypt verification.
const DECOY_PASSWORD: &str = "decoy-password-for-unknown-accounts";

pub struct SessionIssuer {
    store: Arc<dyn CredentialStore>,
    keys: TokenKeys,
    hasher: PasswordHasher,
    events: EventPublisher,
    decoy_hash: OnceCell<String>,
}

impl SessionIssuer {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        keys: TokenKeys,
        hasher: PasswordHasher,
        events: EventPublisher,
    ) -> Self {
        Self {
            store,
            keys,
            hasher,
            events,
            decoy_hash: OnceCell::new(),
        }
    }

    /// Create an identity and its first session.
    ///
    /// # Errors
    /// - `Validation` for bad fields
    /// - `DuplicateCredential` if the name or email is taken
    pub async fn register(&self, request: &RegisterRequest) -> Result<TokenPair, AppError> {
        let valid = validate_registration(request)?;
        // Hash before the transaction; bcrypt is slow and touches no state
        let password_hash = self.hasher.hash(&valid.password).await?;

        let now = Utc::now();
        let identity = Identity {
            id: Uuid::new_v4(),
            name: valid.name,
            email: valid.email,
            profile_picture: valid.profile_picture,
            password_hash,
            address: valid.address,
            phone_number: valid.phone_number,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        if tx.credential_taken(&identity.name, &identity.email).await? {
            return Err(AuthError::DuplicateCredential.into());
        }
        tx.insert_identity(&identity).await?;

        let pair = self.keys.issue_pair(identity.id, now)?;
        refresh_token::record(
            tx.as_mut(),
            identity.id,
            refresh_token::digest(&pair.refresh.token),
            pair.refresh.issued_at,
            pair.refresh.expires_at,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(user_id = %identity.id, "User registered successfully");
        self.publish_registration(&identity);

        Ok(pair)
    }

    /// Exchange email and password for a new session, replacing the
    /// previous one.
    ///
    /// Unknown email and wrong password both yield `InvalidCredentials`.
    pub async fn login(&self, request: &LoginRequest) -> Result<TokenPair, AppError> {
        let email = validate_login(request)?;

        let identity = match self.store.find_identity_by_email(&email).await? {
            Some(identity) => identity,
            None => {
                tracing::info!("Login attempt for unknown email");
                let decoy = self
                    .decoy_hash
                    .get_or_try_init(|| self.hasher.hash(DECOY_PASSWORD))
                    .await?;
                self.hasher.verify(&request.password, decoy).await?;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !self
            .hasher
            .verify(&request.password, &identity.password_hash)
            .await?
        {
            tracing::info!(user_id = %identity.id, "Login attempt with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let mut tx = self.store.begin().await?;
        if !tx.lock_identity(identity.id).await? {
            return Err(AuthError::InvalidCredentials.into());
        }
        let pair = self.keys.issue_pair(identity.id, Utc::now())?;
        refresh_token::install(tx.as_mut(), identity.id, &pair.refresh).await?;
        tx.commit().await?;

        tracing::info!(user_id = %identity.id, "User logged in successfully");
        Ok(pair)
    }

    /// Revoke the identity's current refresh token.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        if !tx.lock_identity(user_id).await? {
            return Err(AppError::not_found("user not found"));
        }
        refresh_token::revoke_latest(tx.as_mut(), user_id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Delete the identity and its ledger rows. Tokens already issued for
    /// it stop working: the gates report `SubjectNotFound` and `/refresh`
    /// reports `user not found`.
    pub async fn unregister(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        if !tx.lock_identity(user_id).await? || !tx.delete_identity(user_id).await? {
            return Err(AppError::not_found("user not found"));
        }
        tx.commit().await?;

        tracing::info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    fn publish_registration(&self, identity: &Identity) {
        self.events.publish(DomainEvent::Activity {
            id: identity.id,
            event: "Create".to_string(),
            created_at: identity.created_at,
        });
        self.events.publish(DomainEvent::Notification {
            id: identity.id,
            email: identity.email.clone(),
            event: "Create".to_string(),
            created_at: identity.created_at,
        });
        self.events.publish(DomainEvent::Verification {
            id: identity.id,
            profile_picture: identity.profile_picture.clone(),
        });
    }
}
