/// Persistent entities owned by the credential store.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub profile_picture: String,
    pub password_hash: String,
    pub address: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Active,
    Revoked,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Active => "active",
            TokenStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TokenStatus::Active),
            "revoked" => Ok(TokenStatus::Revoked),
            other => Err(format!("unknown refresh token status: {}", other)),
        }
    }
}

/// One row of the refresh-token ledger.
///
/// Holds the SHA-256 hex digest of the issued token, never the token itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub user_id: Uuid,
    pub hashed_refresh_token: String,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn active(
        user_id: Uuid,
        hashed_refresh_token: String,
        created_at: DateTime<Utc>,
        expired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            hashed_refresh_token,
            status: TokenStatus::Active,
            created_at,
            expired_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TokenStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [TokenStatus::Active, TokenStatus::Revoked] {
            assert_eq!(status.as_str().parse::<TokenStatus>(), Ok(status));
        }
        assert!("expired".parse::<TokenStatus>().is_err());
    }

    #[test]
    fn test_new_records_are_active() {
        let now = Utc::now();
        let record = RefreshTokenRecord::active(Uuid::new_v4(), "ab".repeat(32), now, now);
        assert!(record.is_active());
    }
}
