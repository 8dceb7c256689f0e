use actix_web::HttpResponse;

use crate::response::WebResponse;

pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    WebResponse::ok("OK")
}
