use std::net::TcpListener;

use authgate::auth::TokenCodec;
use authgate::configuration::get_catalog_configuration;
use authgate::identity_client::IdentityServiceClient;
use authgate::startup::run_catalog_service;
use authgate::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("catalog");

    let configuration = get_catalog_configuration().map_err(|e| {
        tracing::error!("Failed to read configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    let http_client = reqwest::Client::builder()
        .timeout(configuration.identity_service.timeout())
        .build()
        .map_err(|e| {
            tracing::error!("Failed to build HTTP client: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "HTTP client error")
        })?;
    let identity = IdentityServiceClient::new(
        configuration.identity_service.base_url.clone(),
        http_client,
    );

    let access = TokenCodec::new(
        &configuration.jwt.access_token_secret,
        configuration.jwt.access_token_expiry,
    );

    let address = configuration.catalog.address();
    let listener = TcpListener::bind(&address)?;
    tracing::info!(
        identity_service = %configuration.identity_service.base_url,
        "Catalog service listening on: {}",
        address
    );

    run_catalog_service(listener, access, identity)?.await
}
