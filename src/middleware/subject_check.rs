use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::identity_client::IdentityServiceClient;
use crate::store::CredentialStore;

/// Confirms that a verified token's subject is still a registered identity.
#[async_trait]
pub trait SubjectCheck: Send + Sync {
    async fn confirm(&self, subject: Uuid, bearer: &str) -> Result<(), AppError>;
}

/// For the service that owns the user table.
pub struct LocalSubjectCheck {
    store: Arc<dyn CredentialStore>,
}

impl LocalSubjectCheck {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SubjectCheck for LocalSubjectCheck {
    async fn confirm(&self, subject: Uuid, _bearer: &str) -> Result<(), AppError> {
        match self.store.find_identity(subject).await? {
            Some(_) => Ok(()),
            None => Err(AuthError::SubjectNotFound.into()),
        }
    }
}

/// Asks the identity service, re-presenting the caller's bearer token.
pub struct RemoteSubjectCheck {
    client: IdentityServiceClient,
}

impl RemoteSubjectCheck {
    pub fn new(client: IdentityServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SubjectCheck for RemoteSubjectCheck {
    async fn confirm(&self, subject: Uuid, bearer: &str) -> Result<(), AppError> {
        if self.client.check_existence(bearer).await? {
            Ok(())
        } else {
            tracing::warn!(user_id = %subject, "Identity service does not know token subject");
            Err(AuthError::SubjectNotFound.into())
        }
    }
}
