//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::world::DEFAULT_WORLD_SIZE;

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,

    /// HS256 secret for session tokens
    pub jwt_secret: String,
    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,

    /// World side length S in meters
    pub world_size: f64,
    /// How often the server pings an idle stream
    pub keepalive_interval: Duration,
    /// Close a stream after this long without a frame or pong
    pub keepalive_timeout: Duration,
    /// Inbound frames per second per stream
    pub frame_rate_limit: u32,

    /// Supabase project URL (PostgREST backend when set with the key)
    pub supabase_url: Option<String>,
    /// Supabase service role key (bypasses RLS - server only!)
    pub supabase_service_role_key: Option<String>,

    /// Create a demo world for this player on startup
    pub seed_player_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("text") | Err(_) => LogFormat::Text,
            Ok(_) => return Err(ConfigError::Invalid("LOG_FORMAT")),
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,

            jwt_secret: env::var("AUTH_JWT_SECRET")
                .map_err(|_| ConfigError::Missing("AUTH_JWT_SECRET"))?,
            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            world_size: parse_or("WORLD_SIZE", DEFAULT_WORLD_SIZE)?,
            keepalive_interval: Duration::from_secs(parse_or("KEEPALIVE_INTERVAL_SECS", 15)?),
            keepalive_timeout: Duration::from_secs(parse_or("KEEPALIVE_TIMEOUT_SECS", 45)?),
            frame_rate_limit: parse_or("SYNC_FRAME_RATE_LIMIT", 60)?,

            supabase_url: optional("SUPABASE_URL"),
            supabase_service_role_key: optional("SUPABASE_SERVICE_ROLE_KEY"),
            seed_player_id: optional("SEED_PLAYER_ID"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Memory-backed configuration that never reads the environment
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_level: "debug".to_string(),
            log_format: LogFormat::Text,
            jwt_secret: jwt_secret.to_string(),
            client_origin: "http://localhost:5173".to_string(),
            world_size: DEFAULT_WORLD_SIZE,
            keepalive_interval: Duration::from_secs(15),
            keepalive_timeout: Duration::from_secs(45),
            frame_rate_limit: 1000,
            supabase_url: None,
            supabase_service_role_key: None,
            seed_player_id: None,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.world_size.is_finite() && self.world_size > 0.0) {
            return Err(ConfigError::Invalid("WORLD_SIZE"));
        }
        if self.keepalive_interval.is_zero() {
            return Err(ConfigError::Invalid("KEEPALIVE_INTERVAL_SECS"));
        }
        if self.keepalive_timeout < self.keepalive_interval {
            return Err(ConfigError::Invalid("KEEPALIVE_TIMEOUT_SECS"));
        }
        if self.frame_rate_limit == 0 {
            return Err(ConfigError::Invalid("SYNC_FRAME_RATE_LIMIT"));
        }
        Ok(())
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validates() {
        assert!(Config::for_tests("s").validate().is_ok());
    }

    #[test]
    fn timeout_shorter_than_interval_is_rejected() {
        let mut config = Config::for_tests("s");
        config.keepalive_timeout = Duration::from_secs(1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid("KEEPALIVE_TIMEOUT_SECS"))
        ));
    }
}
