use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{PasswordHasher, SessionIssuer, SessionRenewer, TokenCodec, TokenKeys};
use crate::configuration::EventSettings;
use crate::error::{AppError, EventError, ValidationError};
use crate::events::{EventPublisher, EventSink, HttpEventSink, LogEventSink};
use crate::identity_client::IdentityServiceClient;
use crate::logger::LoggerMiddleware;
use crate::middleware::{BearerAuth, LocalSubjectCheck, RemoteSubjectCheck, SubjectCheck};
use crate::routes::{
    caller, caller_email, delete_user, email, existence, get_current_user, get_user_summary,
    health_check, login, logout, refresh, register,
};
use crate::store::CredentialStore;

/// Everything the identity service needs, built once in `main` (or a test).
pub struct IdentityService {
    pub store: Arc<dyn CredentialStore>,
    pub keys: TokenKeys,
    pub hasher: PasswordHasher,
    pub events: EventPublisher,
}

/// Bodies that do not parse as the expected JSON are validation errors.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        tracing::warn!(error = %err, "Rejected request body");
        AppError::from(ValidationError::InvalidFormat("request body".to_string())).into()
    })
}

pub fn run_identity_service(
    listener: TcpListener,
    service: IdentityService,
) -> Result<Server, std::io::Error> {
    let IdentityService {
        store,
        keys,
        hasher,
        events,
    } = service;

    let access = keys.access.clone();
    let gate_check: Arc<dyn SubjectCheck> = Arc::new(LocalSubjectCheck::new(store.clone()));
    let issuer = web::Data::new(SessionIssuer::new(
        store.clone(),
        keys.clone(),
        hasher,
        events,
    ));
    let renewer = web::Data::new(SessionRenewer::new(store.clone(), keys));
    let store = web::Data::from(store);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            // Shared state
            .app_data(json_config())
            .app_data(store.clone())
            .app_data(issuer.clone())
            .app_data(renewer.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh))
            .route("/user/{id}", web::get().to(get_user_summary))
            // Protected routes (require access token), each guarded on its own
            // so unknown paths still answer 404
            .service(
                web::resource("/user")
                    .wrap(BearerAuth::new(access.clone(), gate_check.clone()))
                    .route(web::get().to(get_current_user))
                    .route(web::delete().to(delete_user)),
            )
            .service(
                web::resource("/existence")
                    .wrap(BearerAuth::new(access.clone(), gate_check.clone()))
                    .route(web::get().to(existence)),
            )
            .service(
                web::resource("/email")
                    .wrap(BearerAuth::new(access.clone(), gate_check.clone()))
                    .route(web::get().to(email)),
            )
            .service(
                web::resource("/logout")
                    .wrap(BearerAuth::new(access.clone(), gate_check.clone()))
                    .route(web::post().to(logout)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

pub fn run_catalog_service(
    listener: TcpListener,
    access: TokenCodec,
    identity: IdentityServiceClient,
) -> Result<Server, std::io::Error> {
    let gate_check: Arc<dyn SubjectCheck> = Arc::new(RemoteSubjectCheck::new(identity.clone()));
    let identity = web::Data::new(identity);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(identity.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::resource("/caller")
                    .wrap(BearerAuth::new(access.clone(), gate_check.clone()))
                    .route(web::get().to(caller)),
            )
            .service(
                web::resource("/caller/email")
                    .wrap(BearerAuth::forwarding(access.clone(), gate_check.clone()))
                    .route(web::get().to(caller_email)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// HTTP sink when an event-log proxy is configured, log-only otherwise.
///
/// # Errors
/// `ConfigurationError` if the HTTP client cannot be built
pub fn build_event_publisher(settings: &EventSettings) -> Result<EventPublisher, EventError> {
    let sink: Arc<dyn EventSink> = match &settings.base_url {
        Some(base_url) => {
            tracing::info!(base_url = %base_url, "Publishing domain events over HTTP");
            let http_client = reqwest::Client::builder()
                .timeout(settings.timeout())
                .build()
                .map_err(|e| EventError::ConfigurationError(e.to_string()))?;
            Arc::new(HttpEventSink::new(base_url.clone(), http_client))
        }
        None => {
            tracing::info!("No event log configured, domain events are only logged");
            Arc::new(LogEventSink)
        }
    };
    Ok(EventPublisher::with_capacity(sink, settings.queue_capacity))
}
