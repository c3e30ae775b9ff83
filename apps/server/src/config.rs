//! Server configuration module.
//!
//! Configuration is loaded from environment variables (optionally seeded from
//! a `.env` file) with fallback to defaults.
//!
//! ```text
//! .env (dotenvy) ──► process env ──► config::Environment ──► RawConfig
//!                                                              │
//!                                              validate + defaults
//!                                                              ▼
//!                                                        ServerConfig
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Development-only signing secret. Refused in production.
const DEV_JWT_SECRET: &str = "invenstore-dev-secret-change-me-before-deploying";

/// Minimum accepted length of `JWT_SECRET`.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// SQLite database file
    pub database_path: String,
    pub db_max_connections: u32,

    /// Secret for signing session tokens
    pub jwt_secret: String,
    pub jwt_lifetime_secs: i64,

    pub app_env: AppEnv,

    /// CORS origins; empty means permissive
    pub allowed_origins: Vec<String>,

    pub request_timeout: Duration,
    pub dashboard_cache_ttl: Duration,

    /// Redis connection string; the dashboard cache stays in memory without it
    pub redis_url: Option<String>,
}

/// Environment variables as read, before validation.
#[derive(Debug, Deserialize)]
struct RawConfig {
    host: String,
    port: u16,
    database_path: String,
    db_max_connections: u32,
    jwt_secret: Option<String>,
    jwt_lifetime_secs: i64,
    app_env: String,
    allowed_origins: Option<String>,
    request_timeout_secs: u64,
    dashboard_cache_ttl_secs: u64,
    redis_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is normal outside development
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder().add_source(config::Environment::default());
        Self::from_builder(builder)
    }

    /// Build configuration from an arbitrary source stack, applying defaults.
    pub fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let raw: RawConfig = builder
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3000_i64)?
            .set_default("database_path", "./invenstore.db")?
            .set_default("db_max_connections", 5_i64)?
            .set_default("jwt_lifetime_secs", 86_400_i64)? // 24 hours
            .set_default("app_env", "development")?
            .set_default("request_timeout_secs", 30_i64)?
            .set_default("dashboard_cache_ttl_secs", 300_i64)?
            .build()?
            .try_deserialize()?;

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let app_env = match raw.app_env.trim().to_lowercase().as_str() {
            "production" | "prod" => AppEnv::Production,
            "development" | "dev" | "test" => AppEnv::Development,
            _ => return Err(ConfigError::InvalidValue("APP_ENV".to_string())),
        };

        let jwt_secret = match raw.jwt_secret.filter(|s| !s.trim().is_empty()) {
            Some(secret) if secret.len() < MIN_JWT_SECRET_LEN => {
                return Err(ConfigError::WeakSecret {
                    min: MIN_JWT_SECRET_LEN,
                })
            }
            Some(secret) => secret,
            None if app_env == AppEnv::Production => {
                return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()))
            }
            None => DEV_JWT_SECRET.to_string(),
        };

        if raw.jwt_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("JWT_LIFETIME_SECS".to_string()));
        }
        if raw.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        let allowed_origins = raw
            .allowed_origins
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        Ok(ServerConfig {
            host: raw.host,
            port: raw.port,
            database_path: raw.database_path,
            db_max_connections: raw.db_max_connections,
            jwt_secret,
            jwt_lifetime_secs: raw.jwt_lifetime_secs,
            app_env,
            allowed_origins,
            request_timeout: Duration::from_secs(raw.request_timeout_secs),
            dashboard_cache_ttl: Duration::from_secs(raw.dashboard_cache_ttl_secs),
            redis_url: raw.redis_url.filter(|u| !u.trim().is_empty()),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.app_env == AppEnv::Production
    }

    /// Configuration for tests: in-memory defaults, development mode.
    pub fn for_tests() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_path: ":memory:".to_string(),
            db_max_connections: 1,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_lifetime_secs: 3_600,
            app_env: AppEnv::Development,
            allowed_origins: Vec::new(),
            request_timeout: Duration::from_secs(30),
            dashboard_cache_ttl: Duration::from_secs(300),
            redis_url: None,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("JWT_SECRET must be at least {min} characters")]
    WeakSecret { min: usize },

    #[error("Configuration source error: {0}")]
    Source(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(pairs: &[(&str, &str)]) -> config::ConfigBuilder<config::builder::DefaultState> {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_builder(builder(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.jwt_lifetime_secs, 86_400);
        assert_eq!(config.dashboard_cache_ttl, Duration::from_secs(300));
        assert!(config.allowed_origins.is_empty());
        assert!(config.redis_url.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn test_production_requires_secret() {
        let err = ServerConfig::from_builder(builder(&[("app_env", "production")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(_)));

        let secret = "s".repeat(MIN_JWT_SECRET_LEN);
        let config = ServerConfig::from_builder(builder(&[
            ("app_env", "production"),
            ("jwt_secret", &secret),
        ]))
        .unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = ServerConfig::from_builder(builder(&[("jwt_secret", "short")])).unwrap_err();
        assert!(matches!(err, ConfigError::WeakSecret { .. }));
    }

    #[test]
    fn test_origins_and_port_parse() {
        let config = ServerConfig::from_builder(builder(&[
            ("port", "8080"),
            ("allowed_origins", "https://a.example, https://b.example,"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.allowed_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_bad_port_is_error() {
        assert!(ServerConfig::from_builder(builder(&[("port", "not-a-port")])).is_err());
    }
}
