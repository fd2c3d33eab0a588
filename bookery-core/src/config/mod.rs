//! Configuration management for Bookery Core

use anyhow::{bail, Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis configuration
    pub redis: RedisConfig,
    /// Session token configuration
    pub jwt: JwtConfig,
    /// Revocation store configuration
    pub revocation: RevocationConfig,
    /// Subdomain tenancy configuration
    pub tenancy: TenancyConfig,
    /// Session cookie configuration
    pub cookies: CookieConfig,
    /// Logging and metrics configuration
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HS256 shared secret
    pub secret: String,
    /// Default token lifetime (7 days)
    pub ttl_secs: i64,
}

/// Where revoked tokens are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationBackend {
    /// Process-local map, only correct for a single instance
    Memory,
    /// Shared Redis keys with expiry
    Redis,
}

impl std::str::FromStr for RevocationBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(RevocationBackend::Memory),
            "redis" => Ok(RevocationBackend::Redis),
            other => Err(format!("Unknown revocation backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RevocationConfig {
    pub backend: RevocationBackend,
    /// Minimum time a revoked token is remembered
    pub retention_secs: i64,
    /// How often the in-memory store drops stale entries
    pub prune_interval_secs: u64,
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            backend: RevocationBackend::Memory,
            retention_secs: 86_400,
            prune_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TenancyConfig {
    /// First host labels that never name a tenant
    pub reserved_labels: Vec<String>,
    /// Path prefixes that skip tenant resolution and access checks
    pub bypass_paths: Vec<String>,
    /// Read the host from `X-Forwarded-Host` (only behind a trusted proxy)
    pub trust_forwarded_host: bool,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            reserved_labels: vec!["www".to_string(), "app".to_string(), "localhost".to_string()],
            bypass_paths: vec![
                "/api/auth".to_string(),
                "/health".to_string(),
                "/ready".to_string(),
                "/metrics".to_string(),
                "/api/init".to_string(),
            ],
            trust_forwarded_host: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Domain attribute used when clearing session cookies (e.g. `.bookery.app`)
    pub domain: Option<String>,
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            domain: None,
            secure: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "pretty" or "json"
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "pretty".to_string(),
            metrics_enabled: false,
        }
    }
}

fn comma_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|s| s.to_lowercase() == "true")
        .unwrap_or(default)
}

impl JwtConfig {
    /// Load only the token settings, for tools that never touch the database
    pub fn from_env() -> Result<Self> {
        let jwt = JwtConfig {
            secret: env::var("JWT_SECRET").context("JWT_SECRET is required")?,
            ttl_secs: env::var("JWT_TTL_SECS")
                .unwrap_or_else(|_| "604800".to_string())
                .parse()
                .context("Invalid JWT_TTL_SECS")?,
        };
        if jwt.secret.len() < 32 {
            bail!("JWT_SECRET must be at least 32 bytes");
        }
        Ok(jwt)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let jwt = JwtConfig::from_env()?;
        let tenancy_defaults = TenancyConfig::default();

        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            jwt,
            revocation: RevocationConfig {
                backend: env::var("REVOCATION_BACKEND")
                    .unwrap_or_else(|_| "memory".to_string())
                    .parse()
                    .map_err(anyhow::Error::msg)?,
                retention_secs: env::var("REVOCATION_RETENTION_SECS")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()
                    .context("Invalid REVOCATION_RETENTION_SECS")?,
                prune_interval_secs: env::var("REVOCATION_PRUNE_INTERVAL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
            },
            tenancy: TenancyConfig {
                reserved_labels: env::var("TENANCY_RESERVED_LABELS")
                    .map(|s| comma_list(&s.to_lowercase()))
                    .unwrap_or(tenancy_defaults.reserved_labels),
                bypass_paths: env::var("TENANCY_BYPASS_PATHS")
                    .map(|s| comma_list(&s))
                    .unwrap_or(tenancy_defaults.bypass_paths),
                trust_forwarded_host: env_flag("TENANCY_TRUST_FORWARDED_HOST", false),
            },
            cookies: CookieConfig {
                domain: env::var("COOKIE_DOMAIN").ok().filter(|d| !d.is_empty()),
                secure: env_flag("COOKIE_SECURE", true),
            },
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
                metrics_enabled: env_flag("METRICS_ENABLED", false),
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
