/// Request field validation
///
/// Length limits are counted in characters, not bytes. Every check returns
/// the trimmed value so handlers never persist surrounding whitespace.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::error::ValidationError;

const NAME_LENGTH: (usize, usize) = (5, 20);
const PROFILE_PICTURE_LENGTH: (usize, usize) = (20, 255);
const EMAIL_LENGTH: (usize, usize) = (5, 254); // RFC 5321
const PASSWORD_LENGTH: (usize, usize) = (5, 20);
const ADDRESS_LENGTH: (usize, usize) = (10, 30);
const PHONE_NUMBER_LENGTH: usize = 12;
const MIN_REFRESH_TOKEN_LENGTH: usize = 43;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    static ref PHONE_NUMBER_REGEX: Regex = Regex::new(r"^\+?[0-9]+$").unwrap();
}

/// Body of `POST /register`
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub profile_picture: String,
    pub email: String,
    pub password: String,
    pub address: String,
    pub phone_number: String,
}

/// Body of `POST /login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /refresh`
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Registration fields after validation.
#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub name: String,
    pub profile_picture: String,
    pub email: String,
    pub password: String,
    pub address: String,
    pub phone_number: String,
}

pub fn validate_registration(request: &RegisterRequest) -> Result<ValidRegistration, ValidationError> {
    Ok(ValidRegistration {
        name: is_valid_name(&request.name)?,
        profile_picture: check_length(
            "profile_picture",
            &request.profile_picture,
            PROFILE_PICTURE_LENGTH,
        )?,
        email: is_valid_email(&request.email)?,
        password: is_valid_password(&request.password)?,
        address: check_length("address", &request.address, ADDRESS_LENGTH)?,
        phone_number: is_valid_phone_number(&request.phone_number)?,
    })
}

/// Returns the normalised email; the password is checked for shape only.
pub fn validate_login(request: &LoginRequest) -> Result<String, ValidationError> {
    let email = is_valid_email(&request.email)?;
    is_valid_password(&request.password)?;
    Ok(email)
}

pub fn validate_refresh(request: &RefreshRequest) -> Result<(), ValidationError> {
    let token = request.refresh_token.trim();
    if token.is_empty() {
        return Err(ValidationError::EmptyField("refresh_token".to_string()));
    }
    if token.chars().count() < MIN_REFRESH_TOKEN_LENGTH {
        return Err(ValidationError::TooShort(
            "refresh_token".to_string(),
            MIN_REFRESH_TOKEN_LENGTH,
        ));
    }
    Ok(())
}

/// Validates email address
/// - Verifies length constraints
/// - Checks format using RFC 5322 simplified regex
/// - Rejects phishing-style local parts
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = check_length("email", email, EMAIL_LENGTH)?;

    if !EMAIL_REGEX.is_match(&trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    if has_suspicious_email_patterns(&trimmed) {
        return Err(ValidationError::SuspiciousContent("email".to_string()));
    }

    Ok(trimmed)
}

pub fn is_valid_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = check_length("name", name, NAME_LENGTH)?;

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent("name".to_string()));
    }

    Ok(trimmed)
}

/// Passwords are not trimmed: whitespace is part of the secret.
pub fn is_valid_password(password: &str) -> Result<String, ValidationError> {
    let length = password.chars().count();
    if length == 0 {
        return Err(ValidationError::EmptyField("password".to_string()));
    }
    if length < PASSWORD_LENGTH.0 {
        return Err(ValidationError::TooShort("password".to_string(), PASSWORD_LENGTH.0));
    }
    if length > PASSWORD_LENGTH.1 {
        return Err(ValidationError::TooLong("password".to_string(), PASSWORD_LENGTH.1));
    }
    Ok(password.to_string())
}

pub fn is_valid_phone_number(phone_number: &str) -> Result<String, ValidationError> {
    let trimmed = check_length(
        "phone_number",
        phone_number,
        (PHONE_NUMBER_LENGTH, PHONE_NUMBER_LENGTH),
    )?;

    if !PHONE_NUMBER_REGEX.is_match(&trimmed) {
        return Err(ValidationError::InvalidFormat("phone_number".to_string()));
    }

    Ok(trimmed)
}

fn check_length(field: &str, value: &str, (min, max): (usize, usize)) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    let length = trimmed.chars().count();

    if length == 0 {
        return Err(ValidationError::EmptyField(field.to_string()));
    }
    if length < min {
        return Err(ValidationError::TooShort(field.to_string(), min));
    }
    if length > max {
        return Err(ValidationError::TooLong(field.to_string(), max));
    }

    Ok(trimmed.to_string())
}

/// Detects suspicious patterns in email addresses that might indicate phishing
fn has_suspicious_email_patterns(email: &str) -> bool {
    // Extremely long local part (before @)
    if let Some(at_pos) = email.find('@') {
        if email[..at_pos].len() > 64 {
            return true;
        }
    }

    email.matches('@').count() != 1 || email.contains('\0')
}
