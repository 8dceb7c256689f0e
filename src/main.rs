use std::net::TcpListener;
use std::sync::Arc;

use authgate::auth::{PasswordHasher, TokenKeys};
use authgate::configuration::get_configuration;
use authgate::startup::{build_event_publisher, run_identity_service, IdentityService};
use authgate::store::PostgresStore;
use authgate::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // 구조화된 로깅 초기화
    init_telemetry("identity");

    // 설정 로드
    let configuration = get_configuration().map_err(|e| {
        tracing::error!("Failed to read configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    // 데이터베이스 연결 풀 생성
    tracing::info!("Attempting to connect to database");
    let pool = configuration.database.connect().await.map_err(|e| {
        tracing::error!("Failed to create connection pool: {}", e);
        std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "Database connection error",
        )
    })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
        })?;
    tracing::info!("Database ready");

    let events = build_event_publisher(&configuration.events).map_err(|e| {
        tracing::error!("Failed to set up event publishing: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Event publisher error")
    })?;

    let service = IdentityService {
        store: Arc::new(PostgresStore::new(pool)),
        keys: TokenKeys::from_settings(&configuration.jwt),
        hasher: PasswordHasher::new(configuration.password.bcrypt_cost),
        events,
    };

    let address = configuration.application.address();
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Identity service listening on: {}", address);

    run_identity_service(listener, service)?.await
}
