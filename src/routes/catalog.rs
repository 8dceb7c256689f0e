/// Catalog service routes
///
/// The catalog does not own user records. Callers are admitted by the
/// remote gate, and anything else about them is fetched from the identity
/// service with their own bearer token.

use actix_web::{web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::identity_client::IdentityServiceClient;
use crate::middleware::{AuthenticatedSubject, BearerToken};
use crate::response::WebResponse;

#[derive(Serialize)]
struct Caller {
    id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

/// GET /caller
pub async fn caller(subject: web::ReqData<AuthenticatedSubject>) -> HttpResponse {
    WebResponse::ok(Caller {
        id: subject.0,
        email: None,
    })
}

/// GET /caller/email
pub async fn caller_email(
    subject: web::ReqData<AuthenticatedSubject>,
    bearer: web::ReqData<BearerToken>,
    identity: web::Data<IdentityServiceClient>,
) -> Result<HttpResponse, AppError> {
    let email = identity.fetch_email(&bearer.0).await?;

    Ok(WebResponse::ok(Caller {
        id: subject.0,
        email: Some(email),
    }))
}
