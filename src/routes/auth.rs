/// Authentication Routes
///
/// Registration, login, token refresh and logout. Validation, hashing and
/// ledger work live in the session orchestrators; handlers only translate
/// between HTTP and those calls.

use actix_web::{web, HttpResponse};

use crate::auth::{SessionIssuer, SessionRenewer};
use crate::error::AppError;
use crate::middleware::AuthenticatedSubject;
use crate::response::{TokenResponse, WebResponse};
use crate::validators::{LoginRequest, RefreshRequest, RegisterRequest};

/// POST /register
///
/// # Errors
/// - 400: Validation errors
/// - 409: Name or email already registered
/// - 500: Internal server error
pub async fn register(
    form: web::Json<RegisterRequest>,
    issuer: web::Data<SessionIssuer>,
) -> Result<HttpResponse, AppError> {
    let pair = issuer.register(&form).await?;

    tracing::info!("Registration completed");
    Ok(WebResponse::ok(TokenResponse::from(pair)))
}

/// POST /login
///
/// # Errors
/// - 400: Validation error
/// - 404: Unknown email or wrong password (never told apart)
pub async fn login(
    form: web::Json<LoginRequest>,
    issuer: web::Data<SessionIssuer>,
) -> Result<HttpResponse, AppError> {
    let pair = issuer.login(&form).await?;

    tracing::info!("Login completed");
    Ok(WebResponse::ok(TokenResponse::from(pair)))
}

/// POST /refresh
///
/// Exchanges the latest refresh token for a new pair. Presenting any older
/// token revokes the session.
///
/// # Errors
/// - 400: Missing or too short `refresh_token`
/// - 401: Malformed, invalid or expired refresh token
/// - 403: Reuse detected, client must log in again
/// - 404: Token subject no longer exists
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    renewer: web::Data<SessionRenewer>,
) -> Result<HttpResponse, AppError> {
    let pair = renewer.refresh(&form).await?;

    tracing::info!("Token refresh completed");
    Ok(WebResponse::ok(TokenResponse::from(pair)))
}

/// POST /logout
///
/// **Requires valid access token.** Revokes the caller's refresh token.
pub async fn logout(
    subject: web::ReqData<AuthenticatedSubject>,
    issuer: web::Data<SessionIssuer>,
) -> Result<HttpResponse, AppError> {
    issuer.logout(subject.0).await?;

    tracing::info!(user_id = %subject.0, "Logout completed");
    Ok(WebResponse::ok("logged out"))
}
