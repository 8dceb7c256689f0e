use config::ConfigError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub password: PasswordSettings,
    #[serde(default)]
    pub events: EventSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub min_connections: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_seconds: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_idle_timeout() -> u64 {
    10 * 60
}

fn default_max_lifetime() -> u64 {
    60 * 60
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }

    /// Bounded pool options: few open connections, recycled on idle and age.
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .idle_timeout(Duration::from_secs(self.idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(self.max_lifetime_seconds))
    }

    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        self.pool_options().connect(&self.connection_string()).await
    }
}

/// JWT authentication settings
///
/// Access and refresh tokens are signed with different secrets so a leak of
/// one cannot be used to forge the other.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    #[serde(default = "default_access_expiry")]
    pub access_token_expiry: i64,   // seconds (300 = 5 minutes)
    #[serde(default = "default_refresh_expiry")]
    pub refresh_token_expiry: i64,  // seconds (2592000 = 30 days)
}

fn default_access_expiry() -> i64 {
    5 * 60
}

fn default_refresh_expiry() -> i64 {
    30 * 24 * 60 * 60
}

impl JwtSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_secret.is_empty() || self.refresh_token_secret.is_empty() {
            return Err(ConfigError::Message(
                "jwt secrets must not be empty".to_string(),
            ));
        }
        if self.access_token_secret == self.refresh_token_secret {
            return Err(ConfigError::Message(
                "access and refresh token secrets must differ".to_string(),
            ));
        }
        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(ConfigError::Message(
                "token expiries must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct PasswordSettings {
    pub bcrypt_cost: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Where the catalog service reaches the identity service.
#[derive(serde::Deserialize, Clone)]
pub struct IdentityServiceSettings {
    pub base_url: String,
    #[serde(default = "default_upstream_timeout")]
    pub timeout_seconds: u64,
}

fn default_upstream_timeout() -> u64 {
    10
}

impl IdentityServiceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Message-log proxy settings. Without a base URL events are only logged.
#[derive(serde::Deserialize, Clone)]
pub struct EventSettings {
    pub base_url: Option<String>,
    #[serde(default = "default_event_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_event_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_event_timeout() -> u64 {
    5
}

fn default_event_queue_capacity() -> usize {
    crate::events::DEFAULT_QUEUE_CAPACITY
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_seconds: default_event_timeout(),
            queue_capacity: default_event_queue_capacity(),
        }
    }
}

impl EventSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.jwt.validate()?;
        if !(4..=31).contains(&self.password.bcrypt_cost) {
            return Err(ConfigError::Message(
                "bcrypt cost must be between 4 and 31".to_string(),
            ));
        }
        Ok(())
    }
}

/// What the catalog service reads. It owns no database and never sees
/// refresh tokens, so those sections are not required.
#[derive(serde::Deserialize, Clone)]
pub struct CatalogSettings {
    pub catalog: ApplicationSettings,
    pub jwt: AccessTokenSettings,
    pub identity_service: IdentityServiceSettings,
}

/// The access half of [`JwtSettings`].
#[derive(serde::Deserialize, Clone)]
pub struct AccessTokenSettings {
    pub access_token_secret: String,
    #[serde(default = "default_access_expiry")]
    pub access_token_expiry: i64,
}

impl CatalogSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.access_token_secret.is_empty() {
            return Err(ConfigError::Message(
                "access token secret must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn builder() -> config::ConfigBuilder<config::builder::DefaultState> {
    config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
}

/// Load identity service settings from `configuration.yaml` (optional)
/// overlaid with `APP__SECTION__KEY` environment variables.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = builder().build()?.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}

/// Same sources as [`get_configuration`], read as [`CatalogSettings`].
pub fn get_catalog_configuration() -> Result<CatalogSettings, ConfigError> {
    let settings = builder().build()?.try_deserialize::<CatalogSettings>()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(access: &str, refresh: &str) -> JwtSettings {
        JwtSettings {
            access_token_secret: access.to_string(),
            refresh_token_secret: refresh.to_string(),
            access_token_expiry: 300,
            refresh_token_expiry: 2_592_000,
        }
    }

    #[test]
    fn test_identical_secrets_are_rejected() {
        assert!(jwt("same-secret", "same-secret").validate().is_err());
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(jwt("", "refresh").validate().is_err());
    }

    #[test]
    fn test_distinct_secrets_are_accepted() {
        assert!(jwt("access-secret", "refresh-secret").validate().is_ok());
    }

    #[test]
    fn test_default_expiries_match_token_lifetimes() {
        assert_eq!(default_access_expiry(), 300);
        assert_eq!(default_refresh_expiry(), 2_592_000);
    }

    #[test]
    fn test_catalog_settings_need_no_database_or_refresh_secret() {
        let yaml = r#"
catalog:
  host: 127.0.0.1
  port: 8001
jwt:
  access_token_secret: catalog-access-secret
identity_service:
  base_url: http://127.0.0.1:8000
"#;
        let settings = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<CatalogSettings>()
            .unwrap();

        assert!(settings.validate().is_ok());
        assert_eq!(settings.jwt.access_token_expiry, 300);
        assert_eq!(settings.identity_service.timeout(), Duration::from_secs(10));
        assert_eq!(settings.catalog.address(), "127.0.0.1:8001");
    }

    #[test]
    fn test_event_settings_default_to_a_bounded_queue() {
        let settings = EventSettings::default();
        assert!(settings.base_url.is_none());
        assert_eq!(settings.timeout(), Duration::from_secs(5));
        assert_eq!(settings.queue_capacity, crate::events::DEFAULT_QUEUE_CAPACITY);
    }
}
