/// Application Error Handling
///
/// This module provides the error taxonomy shared by both services.
/// It covers:
/// 1. Domain-Specific Error Types (validation, storage, authentication)
/// 2. Unified Application Error Type with `From` conversions for `?`
/// 3. HTTP Response Mapping into the `{code, status, data}` envelope
/// 4. Error logging inside the request's span

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

use crate::response::WebResponse;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    SuspiciousContent(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
        }
    }
}

impl StdError for ValidationError {}

/// Database operation errors
#[derive(Debug)]
pub enum DatabaseError {
    NotFound(String),
    QueryExecution(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::NotFound(msg) => write!(f, "{}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Authentication and credential errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email or wrong password. The two cases are never told apart.
    InvalidCredentials,
    /// Name or email already belongs to another identity.
    DuplicateCredential,
    /// No `Authorization` header.
    MissingToken,
    /// `Authorization` header is not `Bearer <token>`.
    BadTokenFormat,
    MalformedToken,
    InvalidToken,
    TokenExpired,
    /// Token is valid but its subject no longer exists.
    SubjectNotFound,
    /// Presented refresh token is not the ledger's latest one.
    ReuseDetected,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "wrong email or password"),
            AuthError::DuplicateCredential => write!(f, "name or email already exist"),
            AuthError::MissingToken => write!(f, "No token provided"),
            AuthError::BadTokenFormat => write!(f, "Token format is not match"),
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::TokenExpired => write!(f, "Token is expired"),
            AuthError::SubjectNotFound => write!(f, "User not found, please register"),
            AuthError::ReuseDetected => write!(
                f,
                "Refresh token reuse detected. For security reasons, you have been logged out. Please sign in again."
            ),
        }
    }
}

impl StdError for AuthError {}

/// Domain event delivery errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    SendFailed(String),
    Rejected(u16),
    ConfigurationError(String),
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::SendFailed(msg) => write!(f, "Failed to send event: {}", msg),
            EventError::Rejected(status) => write!(f, "Event log rejected event with {}", status),
            EventError::ConfigurationError(msg) => write!(f, "Event log config error: {}", msg),
        }
    }
}

impl StdError for EventError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Database(DatabaseError),
    Auth(AuthError),
    /// The identity service could not be reached or answered garbage.
    Upstream(String),
    /// Unrecoverable for the current request (hashing, signing, invariants).
    Internal(String),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::Database(DatabaseError::NotFound(what.into()))
    }

    /// Returns the authentication error kind, if any.
    pub fn auth_kind(&self) -> Option<AuthError> {
        match self {
            AppError::Auth(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS (Control Flow Error Conversion)
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::not_found("record not found"),
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some("23505") =>
            {
                AppError::Auth(AuthError::DuplicateCredential)
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            sqlx::Error::Database(_) => {
                AppError::Database(DatabaseError::QueryExecution(err.to_string()))
            }
            other => AppError::Database(DatabaseError::UnexpectedError(other.to_string())),
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Trait for converting errors to HTTP responses with proper logging
///
/// Logs carry no request id of their own; they are emitted inside the
/// access-log span, which holds the request id.
pub trait ErrorHandler {
    fn envelope(&self) -> (StatusCode, WebResponse<String>);
    fn log_error(&self);
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),

            AppError::Database(e) => match e {
                DatabaseError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                DatabaseError::ConnectionPool(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Database service temporarily unavailable".to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                ),
            },

            AppError::Auth(e) => {
                let status = match e {
                    AuthError::InvalidCredentials => StatusCode::NOT_FOUND,
                    AuthError::DuplicateCredential => StatusCode::CONFLICT,
                    AuthError::ReuseDetected => StatusCode::FORBIDDEN,
                    AuthError::MissingToken
                    | AuthError::BadTokenFormat
                    | AuthError::MalformedToken
                    | AuthError::InvalidToken
                    | AuthError::TokenExpired
                    | AuthError::SubjectNotFound => StatusCode::UNAUTHORIZED,
                };
                (status, e.to_string())
            }

            AppError::Upstream(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "identity service unavailable".to_string(),
            ),

            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl ErrorHandler for AppError {
    fn envelope(&self) -> (StatusCode, WebResponse<String>) {
        let (status, message) = self.status_and_message();
        (status, WebResponse::new(status, message))
    }

    fn log_error(&self) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error = %e, "Validation error");
            }
            AppError::Database(DatabaseError::NotFound(_)) => {
                tracing::warn!(error = %self, "Entity not found");
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
            }
            AppError::Auth(AuthError::ReuseDetected) => {
                tracing::warn!(error = %self, "Refresh token reuse rejected");
            }
            AppError::Auth(e) => {
                tracing::warn!(error = %e, "Authentication error");
            }
            AppError::Upstream(msg) => {
                tracing::error!(error = %msg, "Upstream service error");
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
            }
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        self.log_error();

        let (status, body) = self.envelope();

        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.status_and_message().0
    }
}
