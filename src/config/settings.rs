//! Application settings loaded from environment variables.

use std::env;

use common::{CacheConfig, DatabaseConfig, GrpcClientConfig, MetricsConfig, ServiceConfig};

use super::constants::{
    DEFAULT_DATABASE_URL, DEFAULT_METRICS_HOST, DEFAULT_METRICS_PORT, DEFAULT_REDIS_URL,
    DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, DEFAULT_USER_SERVICE_URL,
};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServiceConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub user_service: GrpcClientConfig,
    pub metrics: MetricsConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables (with `.env` support).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            server: ServiceConfig {
                service_name: "post-service".to_string(),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_or("SERVER_PORT", DEFAULT_SERVER_PORT),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", 1),
            },
            cache: CacheConfig {
                url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
                db: env_or("REDIS_DB", 0),
                pool_size: env_or("REDIS_POOL_SIZE", 10),
            },
            user_service: GrpcClientConfig {
                endpoint: env::var("USER_SERVICE_URL")
                    .unwrap_or_else(|_| DEFAULT_USER_SERVICE_URL.to_string()),
                connect_timeout_ms: env_or("USER_SERVICE_CONNECT_TIMEOUT_MS", 5000),
                request_timeout_ms: env_or("USER_SERVICE_REQUEST_TIMEOUT_MS", 30000),
            },
            metrics: MetricsConfig {
                host: env::var("METRICS_HOST").unwrap_or_else(|_| DEFAULT_METRICS_HOST.to_string()),
                port: env_or("METRICS_PORT", DEFAULT_METRICS_PORT),
            },
        }
    }

    /// Full gRPC listen address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Full metrics listen address.
    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.metrics.host, self.metrics.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServiceConfig::default(),
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            user_service: GrpcClientConfig {
                endpoint: DEFAULT_USER_SERVICE_URL.to_string(),
                ..GrpcClientConfig::default()
            },
            metrics: MetricsConfig::default(),
        }
    }
}
