/// JWT Claims structure
///
/// Payload shared by access and refresh tokens. The two token kinds differ
/// only in signing secret and lifetime.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (identity id as UUID string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,
    /// Unique per token, so two tokens minted in the same second differ
    #[serde(default)]
    pub jti: String,
}

impl Claims {
    pub fn new(subject: Uuid, issued_at: i64, ttl_seconds: i64) -> Self {
        Self {
            id: Some(subject.to_string()),
            exp: issued_at + ttl_seconds,
            iat: issued_at,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract the subject id.
    ///
    /// # Errors
    /// `InvalidToken` if the claim is absent or not a UUID
    pub fn subject_id(&self) -> Result<Uuid, AuthError> {
        self.id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or(AuthError::InvalidToken)
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp <= now
    }
}
