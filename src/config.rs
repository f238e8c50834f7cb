// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Reckon Services

//! # Token Service Configuration
//!
//! Configuration is an explicit immutable struct passed to
//! [`TokenService::new`](crate::token::TokenService::new), never read from
//! ambient global state. This keeps tests isolated and makes secret rotation
//! a matter of constructing a new service.
//!
//! ## Environment Variables (for [`TokenConfig::from_env`])
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RECKON_AUTH_ISSUER` | Issuer (`iss`) claim for issued tokens | Required |
//! | `RECKON_AUTH_SECRET` | HMAC signing secret | Required |
//! | `RECKON_AUTH_TTL_SECONDS` | Access token lifetime in seconds | `14400` (4 h) |
//! | `RECKON_AUTH_VERIFY_ISSUER` | Verify `iss`/`aud` claims (`true`/`false`) | `true` |
//! | `RECKON_AUTH_ALLOWED_DRIFT_MS` | Clock skew tolerance in milliseconds | `2000` |
//!
//! The refresh token lifetime is a fixed 30 days and deliberately not
//! configurable.

use std::env;

/// Environment variable name for the token issuer.
pub const ISSUER_ENV: &str = "RECKON_AUTH_ISSUER";
/// Environment variable name for the HMAC signing secret.
pub const SECRET_ENV: &str = "RECKON_AUTH_SECRET";
/// Environment variable name for the access token TTL in seconds.
pub const TTL_SECONDS_ENV: &str = "RECKON_AUTH_TTL_SECONDS";
/// Environment variable name for the issuer/audience verification toggle.
pub const VERIFY_ISSUER_ENV: &str = "RECKON_AUTH_VERIFY_ISSUER";
/// Environment variable name for the allowed clock drift in milliseconds.
pub const ALLOWED_DRIFT_MS_ENV: &str = "RECKON_AUTH_ALLOWED_DRIFT_MS";

/// Default access token lifetime (4 hours).
pub const DEFAULT_TTL_SECONDS: i64 = 4 * 60 * 60;
/// Default clock skew tolerance when checking time-based claims.
pub const DEFAULT_ALLOWED_DRIFT_MS: u64 = 2000;

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {0}: {1}")]
    InvalidEnv(&'static str, String),
}

/// Immutable token service configuration.
///
/// The signing secret is process-wide read-only configuration: loaded once at
/// startup and never mutated at runtime. Rotation happens by constructing a
/// new [`TokenService`](crate::token::TokenService).
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Issuer (`iss`) claim placed on every issued token.
    pub issuer: String,
    /// HMAC signing secret.
    pub secret: String,
    /// Access token lifetime in seconds.
    pub ttl_seconds: i64,
    /// Verify `iss` and `aud` claims during token verification.
    pub verify_issuer: bool,
    /// Clock skew tolerance, in milliseconds, for time-based claims.
    pub allowed_drift_ms: u64,
    /// Reject caller-supplied claims that collide with reserved claims
    /// (`iss`/`aud`/`iat`/`exp`/`sub`). Off by default: the documented merge
    /// policy is "custom claims win".
    pub restrict_reserved_claims: bool,
}

impl TokenConfig {
    /// Create a configuration with default TTL, drift, and verification
    /// settings.
    pub fn new(issuer: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            secret: secret.into(),
            ttl_seconds: DEFAULT_TTL_SECONDS,
            verify_issuer: true,
            allowed_drift_ms: DEFAULT_ALLOWED_DRIFT_MS,
            restrict_reserved_claims: false,
        }
    }

    /// Set the access token lifetime in seconds.
    pub fn with_ttl_seconds(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Enable or disable issuer/audience verification.
    pub fn with_verify_issuer(mut self, verify_issuer: bool) -> Self {
        self.verify_issuer = verify_issuer;
        self
    }

    /// Set the allowed clock drift in milliseconds.
    pub fn with_allowed_drift_ms(mut self, allowed_drift_ms: u64) -> Self {
        self.allowed_drift_ms = allowed_drift_ms;
        self
    }

    /// Reject custom claims that collide with reserved claims.
    pub fn with_restricted_reserved_claims(mut self) -> Self {
        self.restrict_reserved_claims = true;
        self
    }

    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let issuer = env_required(ISSUER_ENV)?;
        let secret = env_required(SECRET_ENV)?;

        let mut config = Self::new(issuer, secret);

        if let Ok(raw) = env::var(TTL_SECONDS_ENV) {
            config.ttl_seconds = raw
                .parse()
                .map_err(|_| ConfigError::InvalidEnv(TTL_SECONDS_ENV, raw))?;
        }
        if let Ok(raw) = env::var(VERIFY_ISSUER_ENV) {
            config.verify_issuer = match raw.as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(ConfigError::InvalidEnv(VERIFY_ISSUER_ENV, raw)),
            };
        }
        if let Ok(raw) = env::var(ALLOWED_DRIFT_MS_ENV) {
            config.allowed_drift_ms = raw
                .parse()
                .map_err(|_| ConfigError::InvalidEnv(ALLOWED_DRIFT_MS_ENV, raw))?;
        }

        Ok(config)
    }
}

fn env_required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_applies_defaults() {
        let config = TokenConfig::new("reckon_auth", "secret");
        assert_eq!(config.ttl_seconds, DEFAULT_TTL_SECONDS);
        assert!(config.verify_issuer);
        assert_eq!(config.allowed_drift_ms, DEFAULT_ALLOWED_DRIFT_MS);
        assert!(!config.restrict_reserved_claims);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = TokenConfig::new("reckon_auth", "secret")
            .with_ttl_seconds(600)
            .with_verify_issuer(false)
            .with_allowed_drift_ms(5000)
            .with_restricted_reserved_claims();

        assert_eq!(config.ttl_seconds, 600);
        assert!(!config.verify_issuer);
        assert_eq!(config.allowed_drift_ms, 5000);
        assert!(config.restrict_reserved_claims);
    }
}
