/// Bearer Authentication Middleware
///
/// Validates the access token from the Authorization header, confirms its
/// subject still exists and injects the subject id into request extensions
/// for use by route handlers.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, AUTHORIZATION},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::TokenCodec;
use crate::error::{AppError, AuthError};
use crate::middleware::SubjectCheck;

/// Subject id of the verified access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedSubject(pub Uuid);

/// The raw bearer token, for handlers that call other services on the
/// caller's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

/// Must be applied to routes that require authentication.
pub struct BearerAuth {
    access: TokenCodec,
    check: Arc<dyn SubjectCheck>,
    forward_token: bool,
}

impl BearerAuth {
    pub fn new(access: TokenCodec, check: Arc<dyn SubjectCheck>) -> Self {
        Self {
            access,
            check,
            forward_token: false,
        }
    }

    /// Like [`BearerAuth::new`], and also exposes [`BearerToken`].
    pub fn forwarding(access: TokenCodec, check: Arc<dyn SubjectCheck>) -> Self {
        Self {
            forward_token: true,
            ..Self::new(access, check)
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BearerAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = BearerAuthService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(BearerAuthService {
            service: Rc::new(service),
            access: self.access.clone(),
            check: self.check.clone(),
            forward_token: self.forward_token,
        }))
    }
}

pub struct BearerAuthService<S> {
    service: Rc<S>,
    access: TokenCodec,
    check: Arc<dyn SubjectCheck>,
    forward_token: bool,
}

impl<S, B> Service<ServiceRequest> for BearerAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let access = self.access.clone();
        let check = self.check.clone();
        let forward_token = self.forward_token;

        Box::pin(async move {
            let token = bearer_token(req.headers()).map_err(AppError::from)?;
            let subject = verify_subject(&access, &token).map_err(AppError::from)?;
            check.confirm(subject, &token).await?;

            tracing::debug!(user_id = %subject, "Bearer token accepted");

            req.extensions_mut().insert(AuthenticatedSubject(subject));
            if forward_token {
                req.extensions_mut().insert(BearerToken(token));
            }

            service.call(req).await
        })
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let value = value.to_str().map_err(|_| AuthError::BadTokenFormat)?;

    let parts: Vec<&str> = value.split("Bearer ").collect();
    match parts.as_slice() {
        ["", token] if !token.is_empty() => Ok(token.to_string()),
        _ => Err(AuthError::BadTokenFormat),
    }
}

fn verify_subject(access: &TokenCodec, token: &str) -> Result<Uuid, AuthError> {
    let verified = access.verify(token).map_err(|e| {
        tracing::warn!(reason = %e, "Access token rejected");
        AuthError::from(e)
    })?;
    if verified.expired {
        return Err(AuthError::TokenExpired);
    }
    verified.claims.subject_id()
}
