//! Configuration management for LunarDB.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables prefixed with `LUNARDB__` (nested keys separated by
//! `__`, e.g. `LUNARDB__RATE_LIMITING__BURST=10`).

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LunarError, Result};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "LUNARDB";

/// Main configuration for the LunarDB service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LunarConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Per-client rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Tokens added to each client's bucket per second
    #[serde(default = "default_rate_per_sec")]
    pub rate_per_sec: f64,

    /// Maximum tokens a client's bucket can hold
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Idle time after which a client's state is evicted, in seconds
    #[serde(default = "default_expiration")]
    pub expiration_secs: u64,

    /// How often the expiry sweep runs, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Derive client identity from `X-Forwarded-For` / `X-Real-IP` when present.
    ///
    /// Only safe behind a proxy that overwrites these headers; otherwise a
    /// client can pick its own identity and sidestep its bucket.
    #[serde(default = "default_true")]
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: default_rate_per_sec(),
            burst: default_burst(),
            expiration_secs: default_expiration(),
            sweep_interval_secs: default_sweep_interval(),
            trust_forwarded_for: true,
        }
    }
}

impl RateLimitingConfig {
    /// Idle expiration window.
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_secs)
    }

    /// Interval between expiry sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_rate_per_sec() -> f64 {
    1.0
}

fn default_burst() -> u32 {
    5
}

fn default_expiration() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// API keys accepted in the `X-API-Key` header
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// Generate and log a fresh API key at startup
    #[serde(default = "default_true")]
    pub generate_initial_key: bool,

    /// HMAC secret for bearer JWTs; bearer auth is disabled when unset
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Lifetime of issued JWTs, in seconds
    #[serde(default = "default_jwt_ttl")]
    pub jwt_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            generate_initial_key: true,
            jwt_secret: None,
            jwt_ttl_secs: default_jwt_ttl(),
        }
    }
}

fn default_jwt_ttl() -> u64 {
    86400
}

impl LunarConfig {
    /// Load configuration from defaults, an optional YAML file, and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?.try_deserialize::<LunarConfig>()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| LunarError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Reject values the admission core cannot work with.
    pub fn validate(&self) -> Result<()> {
        let rl = &self.rate_limiting;
        if !rl.rate_per_sec.is_finite() || rl.rate_per_sec <= 0.0 {
            return Err(LunarError::Config(format!(
                "rate_limiting.rate_per_sec must be a positive number, got {}",
                rl.rate_per_sec
            )));
        }
        if rl.burst == 0 {
            return Err(LunarError::Config(
                "rate_limiting.burst must be at least 1".to_string(),
            ));
        }
        if rl.expiration_secs == 0 {
            return Err(LunarError::Config(
                "rate_limiting.expiration_secs must be at least 1".to_string(),
            ));
        }
        if rl.sweep_interval_secs == 0 {
            return Err(LunarError::Config(
                "rate_limiting.sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        if matches!(self.auth.jwt_secret.as_deref(), Some("")) {
            return Err(LunarError::Config(
                "auth.jwt_secret must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
