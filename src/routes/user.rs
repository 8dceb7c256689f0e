use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::SessionIssuer;
use crate::domain::Identity;
use crate::error::{AppError, ValidationError};
use crate::middleware::AuthenticatedSubject;
use crate::response::WebResponse;
use crate::store::CredentialStore;

/// Public view of an identity. The password hash never leaves the store.
#[derive(Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub profile_picture: String,
    pub address: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Identity> for UserProfile {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            name: identity.name,
            email: identity.email,
            profile_picture: identity.profile_picture,
            address: identity.address,
            phone_number: identity.phone_number,
            created_at: identity.created_at,
            updated_at: identity.updated_at,
        }
    }
}

/// Name and address only, for lookups by id.
#[derive(Serialize)]
struct UserSummary {
    name: String,
    address: String,
}

#[derive(Serialize)]
struct ExistenceStatus {
    status: &'static str,
}

#[derive(Serialize)]
struct EmailAddress {
    email: String,
}

async fn load(store: &dyn CredentialStore, id: Uuid) -> Result<Identity, AppError> {
    store
        .find_identity(id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}

/// GET /user
pub async fn get_current_user(
    subject: web::ReqData<AuthenticatedSubject>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let identity = load(store.get_ref(), subject.0).await?;
    Ok(WebResponse::ok(UserProfile::from(identity)))
}

/// GET /existence
///
/// The gate has already confirmed the subject; reaching the handler is the
/// answer.
pub async fn existence(_subject: web::ReqData<AuthenticatedSubject>) -> HttpResponse {
    WebResponse::ok(ExistenceStatus {
        status: "User exist",
    })
}

/// GET /email
pub async fn email(
    subject: web::ReqData<AuthenticatedSubject>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let identity = load(store.get_ref(), subject.0).await?;
    Ok(WebResponse::ok(EmailAddress {
        email: identity.email,
    }))
}

/// DELETE /user
///
/// Removes the caller's account and every refresh token recorded for it.
pub async fn delete_user(
    subject: web::ReqData<AuthenticatedSubject>,
    issuer: web::Data<SessionIssuer>,
) -> Result<HttpResponse, AppError> {
    issuer.unregister(subject.0).await?;
    Ok(WebResponse::ok("user deleted"))
}

/// GET /user/{id}
///
/// # Errors
/// - 400: `id` is not a UUID
/// - 404: No such user
pub async fn get_user_summary(
    id: web::Path<String>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ValidationError::InvalidFormat("user id".to_string()))?;
    let identity = load(store.get_ref(), id).await?;

    Ok(WebResponse::ok(UserSummary {
        name: identity.name,
        address: identity.address,
    }))
}
