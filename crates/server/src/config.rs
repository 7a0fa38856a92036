//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `JWT_SECRET` - Bearer token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `CARTWHEEL_HOST` - Bind address (default: 127.0.0.1)
//! - `CARTWHEEL_PORT` - Listen port (default: 5000)
//! - `CARTWHEEL_DATABASE_URL` - `PostgreSQL` connection string, falls back to
//!   `DATABASE_URL`. Without either the server runs on the in-memory store.
//! - `JWT_EXPIRES_IN_MINUTES` - Token lifetime for issued tokens (default: 60)
//! - `JWT_ISSUER` - Token issuer claim (default: cartwheel)
//! - `ORDER_WORKER_INTERVAL_SECS` - Background queue drain period (default: 5, 0 disables)
//! - `HISTORY_MAX_DEPTH` - Undo records kept per user (default: 50, 0 unbounded)
//! - `PRODUCT_CACHE_CAPACITY` - Max cached product entries (default: unbounded)
//! - `CART_LOCK_TIMEOUT_MS` - Wait for a busy cart before answering 409 (default: 2000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 1.0)
//! - `CARTWHEEL_LOG_JSON` - Emit JSON logs when set (read by the binary)

use std::collections::HashMap;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_WORKER_INTERVAL_SECS: u64 = 5;
const DEFAULT_HISTORY_MAX_DEPTH: usize = 50;
const DEFAULT_CART_LOCK_TIMEOUT_MS: u64 = 2000;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` connection URL (contains password). `None` selects the in-memory store.
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Bearer token settings
    pub auth: AuthConfig,
    /// Period of the background order drain. `None` disables it.
    pub worker_interval: Option<Duration>,
    /// Undo records kept per user. `None` keeps everything.
    pub history_max_depth: Option<usize>,
    /// Product cache entry bound. `None` is unbounded.
    pub product_cache_capacity: Option<u64>,
    /// How long a cart mutation waits for the user's cart lock.
    pub cart_lock_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Bearer token configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub jwt_secret: SecretString,
    /// Lifetime of issued tokens
    pub expires_in_minutes: i64,
    /// `iss` claim written and required
    pub issuer: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("expires_in_minutes", &self.expires_in_minutes)
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl ServerConfig {
    /// Configuration with every optional setting at its default and no database.
    #[must_use]
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            database_url: None,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 5000,
            auth,
            worker_interval: Some(Duration::from_secs(DEFAULT_WORKER_INTERVAL_SECS)),
            history_max_depth: Some(DEFAULT_HISTORY_MAX_DEPTH),
            product_cache_capacity: None,
            cart_lock_timeout: Duration::from_millis(DEFAULT_CART_LOCK_TIMEOUT_MS),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CARTWHEEL_DATABASE_URL");
        let host = parse_env_or_default::<IpAddr>("CARTWHEEL_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("CARTWHEEL_PORT", "5000")?;
        let auth = AuthConfig::from_env()?;

        let worker_secs = parse_env_or_default::<u64>(
            "ORDER_WORKER_INTERVAL_SECS",
            &DEFAULT_WORKER_INTERVAL_SECS.to_string(),
        )?;
        let history_max_depth = parse_env_or_default::<usize>(
            "HISTORY_MAX_DEPTH",
            &DEFAULT_HISTORY_MAX_DEPTH.to_string(),
        )?;
        let product_cache_capacity = get_optional_env("PRODUCT_CACHE_CAPACITY")
            .map(|raw| parse_value::<u64>("PRODUCT_CACHE_CAPACITY", &raw))
            .transpose()?;
        let cart_lock_ms = parse_env_or_default::<u64>(
            "CART_LOCK_TIMEOUT_MS",
            &DEFAULT_CART_LOCK_TIMEOUT_MS.to_string(),
        )?;

        Ok(Self {
            database_url,
            host,
            port,
            auth,
            worker_interval: (worker_secs > 0).then(|| Duration::from_secs(worker_secs)),
            history_max_depth: (history_max_depth > 0).then_some(history_max_depth),
            product_cache_capacity,
            cart_lock_timeout: Duration::from_millis(cart_lock_ms),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_optional_env("SENTRY_SAMPLE_RATE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(1.0),
            sentry_traces_sample_rate: get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(1.0),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl AuthConfig {
    /// Load token settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `JWT_SECRET` is missing or weak, or a numeric
    /// setting does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "JWT_SECRET")?;

        Ok(Self {
            jwt_secret,
            expires_in_minutes: parse_env_or_default::<i64>("JWT_EXPIRES_IN_MINUTES", "60")?,
            issuer: get_env_or_default("JWT_ISSUER", "cartwheel"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
