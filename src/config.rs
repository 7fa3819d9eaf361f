//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;

/// Application configuration, loaded once at startup (SPEC_FULL §6.5).
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// HMAC signing key for access tokens
    pub jwt_secret: String,

    /// Public base URL used to build password-reset and email-verification links
    pub app_base_url: String,

    /// Payment provider API key (unused by the mock gateway, read for parity with a real deployment)
    pub payment_provider_key: String,

    /// Email provider API key (unused by the mock email service)
    pub email_provider_key: String,

    /// "From" address used on outgoing transactional email
    pub email_from_address: String,

    /// Public base URL for catalog images and other static assets
    pub static_asset_base_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::MissingEnv("JWT_SECRET"))?;

        let app_base_url =
            env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let payment_provider_key = env::var("PAYMENT_PROVIDER_KEY").unwrap_or_default();
        let email_provider_key = env::var("EMAIL_PROVIDER_KEY").unwrap_or_default();
        let email_from_address =
            env::var("EMAIL_FROM_ADDRESS").unwrap_or_else(|_| "no-reply@example.com".to_string());
        let static_asset_base_url = env::var("STATIC_ASSET_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000/assets".to_string());

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            jwt_secret,
            app_base_url,
            payment_provider_key,
            email_provider_key,
            email_from_address,
            static_asset_base_url,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
