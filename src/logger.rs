use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::time::Instant;
use tracing::Instrument;

/// Access log middleware
///
/// Opens one span per request (method, path, request id) and records the
/// final status and latency. Errors from inner middleware are rendered
/// inside the span, so every log line of a request carries the same
/// request id. Authorization headers and bodies are never logged.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let span = tracing::info_span!(
            "http_request",
            request_id = %uuid::Uuid::new_v4(),
            method = %req.method(),
            path = %req.path(),
        );

        let http_request = req.request().clone();
        let service = self.service.clone();

        Box::pin(
            async move {
                let response = match service.call(req).await {
                    Ok(res) => res.map_into_left_body(),
                    // Render here so `ResponseError` logs inside this span
                    Err(e) => ServiceResponse::from_err(e, http_request).map_into_right_body(),
                };

                tracing::info!(
                    status = response.status().as_u16(),
                    elapsed_ms = start_time.elapsed().as_millis() as u64,
                    "Request completed"
                );

                Ok(response)
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenCodec;
    use crate::error::AppError;
    use crate::middleware::{BearerAuth, LocalSubjectCheck};
    use crate::store::InMemoryStore;
    use actix_web::test as actix_test;
    use actix_web::{web, App, HttpResponse};
    use serde_json::Value;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn lines(&self) -> Vec<Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    fn capture() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(move || writer.clone()),
        );
        (logs, tracing::subscriber::set_default(subscriber))
    }

    fn line_with<'a>(lines: &'a [Value], message: &str) -> &'a Value {
        lines
            .iter()
            .find(|line| line["fields"]["message"] == message)
            .unwrap_or_else(|| panic!("no log line {:?} in {:?}", message, lines))
    }

    async fn missing_user() -> Result<HttpResponse, AppError> {
        Err(AppError::not_found("user not found"))
    }

    async fn never_reached() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn test_handler_error_is_logged_with_the_request_id() {
        let (logs, _guard) = capture();
        let app = actix_test::init_service(
            App::new()
                .wrap(LoggerMiddleware)
                .route("/user", web::get().to(missing_user)),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/user").to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 404);

        let lines = logs.lines();
        let error = line_with(&lines, "Entity not found");
        let completed = line_with(&lines, "Request completed");
        assert!(completed["span"]["request_id"].is_string());
        assert_eq!(error["span"]["request_id"], completed["span"]["request_id"]);
    }

    #[actix_web::test]
    async fn test_middleware_rejection_is_rendered_inside_the_span() {
        let (logs, _guard) = capture();
        let check = Arc::new(LocalSubjectCheck::new(Arc::new(InMemoryStore::new())));
        let app = actix_test::init_service(
            App::new().wrap(LoggerMiddleware).service(
                web::resource("/user")
                    .wrap(BearerAuth::new(TokenCodec::new("logger-test-secret", 300), check))
                    .route(web::get().to(never_reached)),
            ),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/user").to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 401);
        let body: Value = actix_test::read_body_json(res).await;
        assert_eq!(body["data"], "No token provided");

        let lines = logs.lines();
        let error = line_with(&lines, "Authentication error");
        let completed = line_with(&lines, "Request completed");
        assert_eq!(completed["fields"]["status"], 401);
        assert_eq!(error["span"]["request_id"], completed["span"]["request_id"]);
    }
}
