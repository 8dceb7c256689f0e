use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};

/// Response envelope shared by every endpoint of both services.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebResponse<T> {
    pub code: u16,
    pub status: String,
    pub data: T,
}

impl<T> WebResponse<T> {
    pub fn new(code: StatusCode, data: T) -> Self {
        Self {
            code: code.as_u16(),
            status: code.canonical_reason().unwrap_or("Unknown").to_string(),
            data,
        }
    }
}

impl<T: Serialize> WebResponse<T> {
    /// 200 OK with `data` as payload.
    pub fn ok(data: T) -> HttpResponse {
        HttpResponse::Ok().json(WebResponse::new(StatusCode::OK, data))
    }
}

/// Access/refresh pair returned by register, login and refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_uses_canonical_reason() {
        let envelope = WebResponse::new(StatusCode::FORBIDDEN, "nope");
        assert_eq!(envelope.code, 403);
        assert_eq!(envelope.status, "Forbidden");

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["data"], "nope");
    }
}
