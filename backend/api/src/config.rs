//! Application configuration loaded from environment variables.

use tracing::warn;

use crate::errors::{AppError, Result};

/// Signing secret used when `JWT_SECRET` is unset. Refused in production.
pub const FALLBACK_JWT_SECRET: &str = "default_secret_change_in_production";

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the REST API server
    pub port: u16,
    /// SQLite connection string (e.g. `sqlite:./stakestream.db`)
    pub database_url: String,
    /// HMAC secret for session tokens
    pub jwt_secret: String,
    /// Deployment environment name from `APP_ENV`, else `NODE_ENV`
    pub environment: String,
    /// How often (in seconds) to recompute upcoming project status; 0 disables it
    pub status_sync_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("APP_ENV")
            .or_else(|| lookup("NODE_ENV"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "development".to_string());

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if environment == "production" => {
                return Err(AppError::Config(
                    "JWT_SECRET environment variable is required in production".to_string(),
                ))
            }
            None => {
                warn!("JWT_SECRET is not set; using the insecure built-in fallback secret");
                FALLBACK_JWT_SECRET.to_string()
            }
        };

        Ok(Config {
            port: lookup("PORT")
                .unwrap_or_else(|| "5000".to_string())
                .parse()
                .map_err(|_| AppError::Config("Invalid PORT".to_string()))?,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:./stakestream.db".to_string()),
            jwt_secret,
            environment,
            status_sync_interval_secs: lookup("STATUS_SYNC_INTERVAL_SECS")
                .unwrap_or_else(|| "0".to_string())
                .parse()
                .map_err(|_| AppError::Config("Invalid STATUS_SYNC_INTERVAL_SECS".to_string()))?,
        })
    }
}
