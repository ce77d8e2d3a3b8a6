//! Application Configuration
//!
//! Configuration for the auth application layer. Secrets come from the
//! environment; missing or degenerate signing secrets are fatal at
//! startup, never silently defaulted.

use std::time::Duration;

use kernel::error::app_error::{AppError, AppResult};
use platform::cookie::CookieConfig;
use platform::password::{HashingParams, PasswordHasher};
use platform::rate_limit::{RateLimitConfig, RateLimitPolicy};

use crate::domain::value_object::totp_secret::DEFAULT_TOTP_SKEW;
use crate::token::TokenIssuer;

const MIN_SECRET_BYTES: usize = 32;
const DEFAULT_ACCESS_TTL_SECS: u64 = 30 * 60;
const DEFAULT_REFRESH_TTL_SECS: u64 = 30 * 24 * 3600;

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 secret for access tokens
    pub access_secret: Vec<u8>,
    /// HS256 secret for refresh tokens (must differ from access)
    pub refresh_secret: Vec<u8>,
    /// Access token lifetime (30 minutes)
    pub access_ttl: Duration,
    /// Refresh token lifetime (30 days)
    pub refresh_ttl: Duration,
    /// Accepted TOTP clock drift in 30-second steps
    pub totp_skew: u8,
    /// Whether to require Secure on the refresh cookie
    pub cookie_secure: bool,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    /// Argon2id cost parameters
    pub hashing: HashingParams,
    /// Per-class request budgets
    pub rate_limits: RateLimitPolicy,
}

impl AuthConfig {
    /// Load from environment variables.
    ///
    /// `AUTH_ACCESS_TOKEN_SECRET` and `AUTH_REFRESH_TOKEN_SECRET` are
    /// required, must be at least 32 bytes, and must differ; reusing
    /// one secret would make the two token classes interchangeable.
    pub fn from_env() -> AppResult<Self> {
        let access_secret = require_secret("AUTH_ACCESS_TOKEN_SECRET")?;
        let refresh_secret = require_secret("AUTH_REFRESH_TOKEN_SECRET")?;

        if access_secret == refresh_secret {
            return Err(AppError::internal(
                "AUTH_ACCESS_TOKEN_SECRET and AUTH_REFRESH_TOKEN_SECRET must differ",
            ));
        }

        let mut rate_limits = RateLimitPolicy::default();
        if let Some(config) = env_rate_limit("AUTH_LOGIN_RATE")? {
            rate_limits.password_login = config;
        }
        if let Some(config) = env_rate_limit("AUTH_TOTP_RATE")? {
            rate_limits.totp_check = config;
        }
        if let Some(config) = env_rate_limit("AUTH_API_RATE")? {
            rate_limits.api = config;
        }
        if let Some(config) = env_rate_limit("AUTH_UPLOAD_RATE")? {
            rate_limits.upload = config;
        }
        if let Some(config) = env_rate_limit("AUTH_EXPORT_RATE")? {
            rate_limits.export = config;
        }
        if let Some(config) = env_rate_limit("AUTH_EMAIL_RATE")? {
            rate_limits.outbound_email = config;
        }

        let hashing_defaults = HashingParams::default();
        let hashing = HashingParams {
            memory_kib: env_u64(
                "AUTH_ARGON2_MEMORY_KIB",
                u64::from(hashing_defaults.memory_kib),
            )? as u32,
            iterations: env_u64(
                "AUTH_ARGON2_ITERATIONS",
                u64::from(hashing_defaults.iterations),
            )? as u32,
            parallelism: env_u64(
                "AUTH_ARGON2_PARALLELISM",
                u64::from(hashing_defaults.parallelism),
            )? as u32,
        };

        Ok(Self {
            access_secret,
            refresh_secret,
            access_ttl: Duration::from_secs(env_u64(
                "AUTH_ACCESS_TTL_SECS",
                DEFAULT_ACCESS_TTL_SECS,
            )?),
            refresh_ttl: Duration::from_secs(env_u64(
                "AUTH_REFRESH_TTL_SECS",
                DEFAULT_REFRESH_TTL_SECS,
            )?),
            totp_skew: env_u64("AUTH_TOTP_SKEW", u64::from(DEFAULT_TOTP_SKEW))? as u8,
            cookie_secure: std::env::var("AUTH_COOKIE_SECURE")
                .map(|v| v != "false")
                .unwrap_or(true),
            password_pepper: std::env::var("AUTH_PASSWORD_PEPPER")
                .ok()
                .filter(|p| !p.is_empty())
                .map(|p| p.into_bytes()),
            hashing,
            rate_limits,
        })
    }

    /// Create config for development: random distinct secrets,
    /// insecure cookie for plain-HTTP local runs
    pub fn development() -> Self {
        use rand::RngCore;

        let mut access_secret = vec![0u8; MIN_SECRET_BYTES];
        let mut refresh_secret = vec![0u8; MIN_SECRET_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut access_secret);
        rand::rngs::OsRng.fill_bytes(&mut refresh_secret);

        Self {
            access_secret,
            refresh_secret,
            access_ttl: Duration::from_secs(DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: Duration::from_secs(DEFAULT_REFRESH_TTL_SECS),
            totp_skew: DEFAULT_TOTP_SKEW,
            cookie_secure: false,
            password_pepper: None,
            hashing: HashingParams::default(),
            rate_limits: RateLimitPolicy::default(),
        }
    }

    /// Build the token issuer for this configuration
    pub fn token_issuer(&self) -> TokenIssuer {
        TokenIssuer::new(
            &self.access_secret,
            &self.refresh_secret,
            self.access_ttl,
            self.refresh_ttl,
        )
    }

    /// Build the password hasher for this configuration
    pub fn password_hasher(&self) -> AppResult<PasswordHasher> {
        PasswordHasher::new(self.hashing, self.password_pepper.clone())
            .map_err(|e| AppError::internal(format!("Invalid hashing parameters: {}", e)))
    }

    /// Refresh-token cookie profile: HTTP-only, SameSite=Strict,
    /// scoped to the API path, Max-Age = refresh TTL
    pub fn refresh_cookie(&self) -> CookieConfig {
        CookieConfig {
            secure: self.cookie_secure,
            max_age_secs: Some(self.refresh_ttl.as_secs() as i64),
            ..CookieConfig::default()
        }
    }
}

fn require_secret(key: &str) -> AppResult<Vec<u8>> {
    let value = std::env::var(key)
        .map_err(|_| AppError::internal(format!("{} is required", key)))?;

    if value.len() < MIN_SECRET_BYTES {
        return Err(AppError::internal(format!(
            "{} must be at least {} bytes",
            key, MIN_SECRET_BYTES
        )));
    }

    Ok(value.into_bytes())
}

fn env_u64(key: &str, default: u64) -> AppResult<u64> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| AppError::internal(format!("{} must be a positive integer", key))),
        Err(_) => Ok(default),
    }
}

/// Read `<PREFIX>_MAX` / `<PREFIX>_WINDOW_SECS` as a pair; both or neither
fn env_rate_limit(prefix: &str) -> AppResult<Option<RateLimitConfig>> {
    let max_key = format!("{}_MAX", prefix);
    let window_key = format!("{}_WINDOW_SECS", prefix);

    match (std::env::var(&max_key), std::env::var(&window_key)) {
        (Err(_), Err(_)) => Ok(None),
        (Ok(max), Ok(window)) => {
            let max = max
                .parse()
                .map_err(|_| AppError::internal(format!("{} must be a positive integer", max_key)))?;
            let window = window.parse().map_err(|_| {
                AppError::internal(format!("{} must be a positive integer", window_key))
            })?;
            Ok(Some(RateLimitConfig::new(max, window)))
        }
        _ => Err(AppError::internal(format!(
            "{} and {} must be set together",
            max_key, window_key
        ))),
    }
}
