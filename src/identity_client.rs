use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{AppError, AuthError};
use crate::response::WebResponse;

/// HTTP client for the identity service, used by services that do not own
/// the user table. Every call re-presents the caller's bearer token.
#[derive(Clone)]
pub struct IdentityServiceClient {
    http_client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct EmailData {
    email: String,
}

impl IdentityServiceClient {
    pub fn new(base_url: String, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get(&self, path: &str, bearer: &str) -> Result<reqwest::Response, AppError> {
        self.http_client
            .get(self.url(path))
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Identity service request failed: {}", e);
                AppError::Upstream(e.to_string())
            })
    }

    /// True if the token's subject is a registered identity.
    ///
    /// # Errors
    /// `Upstream` on transport failure, timeout or a 5xx answer
    pub async fn check_existence(&self, bearer: &str) -> Result<bool, AppError> {
        let response = self.get("existence", bearer).await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(false),
            status => {
                tracing::error!(status = status.as_u16(), "Identity service returned error");
                Err(AppError::Upstream(format!(
                    "existence check returned {}",
                    status
                )))
            }
        }
    }

    /// Email address of the token's subject.
    pub async fn fetch_email(&self, bearer: &str) -> Result<String, AppError> {
        let response = self.get("email", bearer).await?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .json::<WebResponse<EmailData>>()
                    .await
                    .map_err(|e| AppError::Upstream(format!("unreadable email response: {}", e)))?;
                Ok(body.data.email)
            }
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => {
                Err(AuthError::SubjectNotFound.into())
            }
            status => {
                tracing::error!(status = status.as_u16(), "Identity service returned error");
                Err(AppError::Upstream(format!("email lookup returned {}", status)))
            }
        }
    }
}
