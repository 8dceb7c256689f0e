/// Authentication module
///
/// Token signing/verification, password hashing, the refresh-token ledger
/// and the two orchestrators built on them.

mod claims;
mod issuer;
mod jwt;
mod password;
pub mod refresh_token;
mod renewer;

pub use claims::Claims;
pub use issuer::SessionIssuer;
pub use jwt::{IssuedToken, TokenCodec, TokenError, TokenKeys, TokenPair, VerifiedToken};
pub use password::PasswordHasher;
pub use refresh_token::Rotation;
pub use renewer::SessionRenewer;
