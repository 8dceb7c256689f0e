/// Session Renewer
///
/// `/refresh` flow. The presented token must be signed with the refresh
/// secret, unexpired, and equal to the latest token recorded for its
/// subject. Anything else ends the session.

use chrono::Utc;
use std::sync::Arc;

use crate::auth::jwt::{TokenKeys, TokenPair};
use crate::auth::refresh_token::{self, Rotation};
use crate::error::{AppError, AuthError};
use crate::store::CredentialStore;
use crate::validators::{validate_refresh, RefreshRequest};

pub struct SessionRenewer {
    store: Arc<dyn CredentialStore>,
    keys: TokenKeys,
}

impl SessionRenewer {
    pub fn new(store: Arc<dyn CredentialStore>, keys: TokenKeys) -> Self {
        Self { store, keys }
    }

    /// Rotate the presented refresh token into a new pair.
    ///
    /// # Errors
    /// - `MalformedToken` / `InvalidToken` for tokens that do not verify or
    ///   carry no subject
    /// - `TokenExpired` without touching the ledger
    /// - `NotFound` if the subject no longer exists
    /// - `ReuseDetected` if the token is not the latest one; the session
    ///   is revoked before this is returned
    pub async fn refresh(&self, request: &RefreshRequest) -> Result<TokenPair, AppError> {
        validate_refresh(request)?;
        let presented = request.refresh_token.trim();

        let verified = self
            .keys
            .refresh
            .verify(presented)
            .map_err(AuthError::from)?;
        if verified.expired {
            return Err(AuthError::TokenExpired.into());
        }
        let user_id = verified.claims.subject_id()?;

        let mut tx = self.store.begin().await?;
        // Row lock serialises concurrent rotations for this identity
        if !tx.lock_identity(user_id).await? {
            return Err(AppError::not_found("user not found"));
        }

        let replacement = self.keys.issue_pair(user_id, Utc::now())?;
        let outcome =
            refresh_token::rotate(tx.as_mut(), user_id, presented, &replacement.refresh).await?;
        tx.commit().await?;

        match outcome {
            Rotation::Rotated => {
                tracing::info!(user_id = %user_id, "Token refreshed successfully");
                Ok(replacement)
            }
            Rotation::ReuseDetected => {
                tracing::warn!(user_id = %user_id, "Refresh token reuse detected, session revoked");
                Err(AuthError::ReuseDetected.into())
            }
        }
    }
}
