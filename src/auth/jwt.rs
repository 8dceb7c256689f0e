/// JWT Token Signing and Verification
///
/// One `TokenCodec` per secret. Access and refresh tokens use separate
/// codecs so a token signed for one purpose never verifies for the other.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::fmt;
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::response::TokenResponse;

/// Why a token failed verification. Expiry is not an error here, see
/// [`VerifiedToken::expired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Not a three-part compact JWT, or parts that do not decode.
    Malformed,
    /// Well formed, but the MAC or algorithm does not check out.
    InvalidSignature,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "token is malformed"),
            TokenError::InvalidSignature => write!(f, "token signature is invalid"),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed => AuthError::MalformedToken,
            TokenError::InvalidSignature => AuthError::InvalidToken,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub claims: Claims,
    pub expired: bool,
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }

    /// Sign a fresh token for `subject`, valid from `now` for the codec's ttl.
    ///
    /// # Errors
    /// Returns `Internal` if encoding fails
    pub fn sign(&self, subject: Uuid, now: DateTime<Utc>) -> Result<IssuedToken, AppError> {
        let claims = Claims::new(subject, now.timestamp(), self.ttl_seconds);

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at: now + Duration::seconds(self.ttl_seconds),
        })
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Check signature and shape, then report expiry relative to `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedToken, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is reported, not enforced, so callers can tell it apart
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("JWT verification error: {}", e);
                classify(e.kind())
            })?;

        Ok(VerifiedToken {
            expired: claims.is_expired_at(now.timestamp()),
            claims,
        })
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
        _ => TokenError::InvalidSignature,
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        TokenResponse {
            access_token: pair.access.token,
            refresh_token: pair.refresh.token,
        }
    }
}

/// Both codecs, built once from configuration.
#[derive(Clone)]
pub struct TokenKeys {
    pub access: TokenCodec,
    pub refresh: TokenCodec,
}

impl TokenKeys {
    pub fn from_settings(settings: &JwtSettings) -> Self {
        Self {
            access: TokenCodec::new(&settings.access_token_secret, settings.access_token_expiry),
            refresh: TokenCodec::new(
                &settings.refresh_token_secret,
                settings.refresh_token_expiry,
            ),
        }
    }

    pub fn issue_pair(&self, subject: Uuid, now: DateTime<Utc>) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access: self.access.sign(subject, now)?,
            refresh: self.refresh.sign(subject, now)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_settings() -> JwtSettings {
        JwtSettings {
            access_token_secret: "test-access-secret-at-least-32-characters".to_string(),
            refresh_token_secret: "test-refresh-secret-at-least-32-characters".to_string(),
            access_token_expiry: 300,
            refresh_token_expiry: 2_592_000,
        }
    }

    #[test]
    fn test_sign_and_verify_token() {
        let keys = TokenKeys::from_settings(&get_test_settings());
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let issued = keys.access.sign(user_id, now).expect("Failed to sign token");
        let verified = keys.access.verify_at(&issued.token, now).expect("Failed to verify token");

        assert!(!verified.expired);
        assert_eq!(verified.claims.subject_id(), Ok(user_id));
        assert_eq!(issued.expires_at - issued.issued_at, Duration::seconds(300));
    }

    #[test]
    fn test_expired_token_still_yields_claims() {
        let codec = TokenCodec::new("secret-one", 60);
        let user_id = Uuid::new_v4();
        let then = Utc::now() - Duration::seconds(120);

        let issued = codec.sign(user_id, then).unwrap();
        let verified = codec.verify(&issued.token).unwrap();

        assert!(verified.expired);
        assert_eq!(verified.claims.subject_id(), Ok(user_id));
    }

    #[test]
    fn test_malformed_token() {
        let codec = TokenCodec::new("secret-one", 60);
        assert_eq!(codec.verify("not-a-jwt").unwrap_err(), TokenError::Malformed);
        assert_eq!(codec.verify("a.b.c").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_secret_isolation() {
        let keys = TokenKeys::from_settings(&get_test_settings());
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let refresh = keys.refresh.sign(user_id, now).unwrap();
        assert_eq!(
            keys.access.verify_at(&refresh.token, now).unwrap_err(),
            TokenError::InvalidSignature
        );

        let access = keys.access.sign(user_id, now).unwrap();
        assert_eq!(
            keys.refresh.verify_at(&access.token, now).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_other_algorithms_are_rejected() {
        let codec = TokenCodec::new("secret-one", 60);
        let claims = Claims::new(Uuid::new_v4(), Utc::now().timestamp(), 60);
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"secret-one"),
        )
        .unwrap();

        assert_eq!(codec.verify(&token).unwrap_err(), TokenError::InvalidSignature);
    }

    #[test]
    fn test_pair_tokens_differ_within_the_same_second() {
        let keys = TokenKeys::from_settings(&get_test_settings());
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let first = keys.issue_pair(user_id, now).unwrap();
        let second = keys.issue_pair(user_id, now).unwrap();

        assert_ne!(first.refresh.token, second.refresh.token);
        assert_ne!(first.access.token, second.access.token);
    }

    #[test]
    fn test_token_error_maps_to_auth_error() {
        assert_eq!(AuthError::from(TokenError::Malformed), AuthError::MalformedToken);
        assert_eq!(AuthError::from(TokenError::InvalidSignature), AuthError::InvalidToken);
    }
}
