// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Reckon Services

//! # Token Service
//!
//! Generation, verification, and refresh of access, session, and refresh
//! tokens. The service is fully stateless: a token's validity is determined
//! solely from its own content, the signing secret, and the current time.
//! Nothing is stored server-side and concurrent calls never interact.
//!
//! ## Token types
//!
//! - **access** — 4 hour TTL (configurable), authorizes direct API access
//! - **session** — access token bound to a `session_id` and device metadata
//! - **refresh** — fixed 30 day TTL, only good for minting a new session
//!   access token
//!
//! The type is a claim (`token_type`), not runtime state; each type has its
//! own generation and validation rules.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::claims::{
    self, base_claims, device_info_from_claims, merge, refresh_claims, session_claims, ClaimSet,
    DeviceInfo, TokenType, RESERVED_CLAIMS,
};
use crate::config::TokenConfig;
use crate::error::AuthError;
use crate::signer::TokenCodec;

/// Scheme reported alongside issued bundles.
const BEARER: &str = "Bearer";

/// Result of establishing a session: an access/refresh token pair.
///
/// Issued atomically; a failure in either generation step fails the whole
/// call and no partial bundle is ever returned. Not persisted by this crate.
#[derive(Debug, Clone, Serialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of the access token (unix seconds).
    pub expires_at: i64,
    /// Always `"Bearer"`.
    pub token_type: String,
    pub account_id: String,
    pub session_id: String,
}

/// Result of refreshing a session: a fresh access token only.
///
/// The presented refresh token is not rotated and stays valid until its own
/// expiry (see DESIGN.md).
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResult {
    pub access_token: String,
    /// Expiry of the new access token (unix seconds).
    pub expires_at: i64,
    /// Always `"Bearer"`.
    pub token_type: String,
    pub account_id: String,
    pub session_id: String,
}

/// Outcome of a successful validation, derived fresh on every call.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub claims: ClaimSet,
    pub token_type: TokenType,
    /// `exp` claim (unix seconds).
    pub expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<DeviceInfo>,
}

/// Stateless token generation and validation service.
///
/// Cheap to clone; every operation is a pure function of its inputs, the
/// signing secret, and wall-clock time.
#[derive(Clone)]
pub struct TokenService {
    config: TokenConfig,
    codec: TokenCodec,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        let codec = TokenCodec::new(&config);
        Self { config, codec }
    }

    /// Generate an access token for an account, merging caller-supplied
    /// custom claims over the base claims (custom claims win).
    pub fn generate_token(
        &self,
        account_id: &str,
        custom_claims: &ClaimSet,
    ) -> Result<String, AuthError> {
        if account_id.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        if self.config.restrict_reserved_claims {
            for key in custom_claims.keys() {
                if RESERVED_CLAIMS.contains(&key.as_str()) {
                    return Err(AuthError::ReservedClaim(key.clone()));
                }
            }
        }

        let claims = merge(self.account_claims(account_id), custom_claims);
        debug!(account_id, "generating access token");
        self.codec.sign(&claims)
    }

    /// Generate a session-bound access token carrying the session id and
    /// whichever device fields are present.
    pub fn generate_session_token(
        &self,
        account_id: &str,
        session_id: &str,
        device: &DeviceInfo,
    ) -> Result<String, AuthError> {
        let claims = self.session_token_claims(account_id, session_id, device);
        self.codec.sign(&claims)
    }

    /// Generate a refresh token with the fixed 30-day TTL.
    ///
    /// The device fields are embedded so [`refresh_session_tokens`] can
    /// rebind the refreshed access token to the same device.
    ///
    /// [`refresh_session_tokens`]: TokenService::refresh_session_tokens
    pub fn generate_refresh_token(
        &self,
        account_id: &str,
        session_id: &str,
        device: &DeviceInfo,
    ) -> Result<String, AuthError> {
        let claims = merge(
            self.account_claims(account_id),
            &refresh_claims(session_id, device),
        );
        self.codec.sign(&claims)
    }

    /// Establish a session: issue the session access token and refresh token
    /// together. Fails atomically; no partial bundle is ever returned.
    pub fn generate_session_tokens(
        &self,
        account_id: &str,
        session_id: &str,
        device: &DeviceInfo,
    ) -> Result<TokenBundle, AuthError> {
        let access_claims = self.session_token_claims(account_id, session_id, device);
        let access_token = self.codec.sign(&access_claims)?;
        let refresh_token = self.generate_refresh_token(account_id, session_id, device)?;

        debug!(account_id, session_id, "issued session token bundle");
        Ok(TokenBundle {
            access_token,
            refresh_token,
            expires_at: expires_at(&access_claims),
            token_type: BEARER.to_string(),
            account_id: account_id.to_string(),
            session_id: session_id.to_string(),
        })
    }

    /// Verify a token's signature and standard claims, then require a usable
    /// `sub`.
    pub fn decode_and_verify(&self, token: &str) -> Result<ClaimSet, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::Malformed);
        }
        let claims = self.codec.verify(token)?;
        if subject(&claims).is_none() {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    /// Validate any token and build a [`ValidationResult`].
    ///
    /// `session_id` and `device_info` are attached only when present in the
    /// claims.
    pub fn validate_token(&self, token: &str) -> Result<ValidationResult, AuthError> {
        let claims = self.decode_and_verify(token)?;
        Ok(validation_result(claims))
    }

    /// Validate a token with session semantics: both `sub` and `session_id`
    /// must be present.
    pub fn validate_session_token(&self, token: &str) -> Result<ValidationResult, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::Malformed);
        }
        let claims = self.codec.verify(token)?;
        if subject(&claims).is_none() || session_id(&claims).is_none() {
            return Err(AuthError::InvalidSessionToken);
        }
        Ok(validation_result(claims))
    }

    /// Re-sign an existing claim set with fresh `iat`/`exp` timestamps.
    ///
    /// All other claims, including `session_id` and custom claims, pass
    /// through unchanged.
    pub fn refresh_token(
        &self,
        account_id: &str,
        old_claims: &ClaimSet,
    ) -> Result<String, AuthError> {
        let mut claims = old_claims.clone();
        claims.remove("exp");
        claims.remove("iat");

        let now = Utc::now().timestamp();
        claims.insert("iat".to_string(), Value::from(now));
        claims.insert(
            "exp".to_string(),
            Value::from(now + self.config.ttl_seconds),
        );
        claims.insert("sub".to_string(), Value::from(account_id));

        self.codec.sign(&claims)
    }

    /// Exchange a refresh token for a fresh session access token.
    ///
    /// The refresh token must verify, be of type `refresh`, be unexpired, and
    /// carry both `sub` and `session_id`. Device metadata is carried over
    /// from the refresh token's claims. The refresh token itself is not
    /// rotated.
    pub fn refresh_session_tokens(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshResult, AuthError> {
        let claims = match self.decode_and_verify(refresh_token) {
            Ok(claims) => claims,
            Err(AuthError::TokenExpired) => return Err(AuthError::RefreshTokenExpired),
            Err(AuthError::InvalidToken) => return Err(AuthError::InvalidRefreshToken),
            Err(e) => return Err(e),
        };

        if claims::token_type(&claims) != TokenType::Refresh {
            return Err(AuthError::InvalidRefreshToken);
        }
        // The verifier already checked expiry; re-check against the raw claim
        // so a verifier misconfiguration still fails closed.
        if claims::token_expired(&claims) {
            return Err(AuthError::RefreshTokenExpired);
        }

        let account_id = subject(&claims).ok_or(AuthError::InvalidRefreshToken)?;
        let session_id = session_id(&claims).ok_or(AuthError::InvalidRefreshToken)?;
        let device = device_info_from_claims(&claims).unwrap_or_default();

        let access_claims = self.session_token_claims(&account_id, &session_id, &device);
        let access_token = self.codec.sign(&access_claims)?;

        debug!(%account_id, %session_id, "refreshed session access token");
        Ok(RefreshResult {
            access_token,
            expires_at: expires_at(&access_claims),
            token_type: BEARER.to_string(),
            account_id,
            session_id,
        })
    }

    /// Base claims plus the subject.
    fn account_claims(&self, account_id: &str) -> ClaimSet {
        let mut claims = base_claims(&self.config.issuer, self.config.ttl_seconds);
        claims.insert("sub".to_string(), Value::from(account_id));
        claims
    }

    fn session_token_claims(
        &self,
        account_id: &str,
        session_id: &str,
        device: &DeviceInfo,
    ) -> ClaimSet {
        let mut claims = merge(
            self.account_claims(account_id),
            &session_claims(session_id, device),
        );
        claims.insert(
            "token_type".to_string(),
            Value::from(TokenType::Session.as_str()),
        );
        claims
    }
}

fn subject(claims: &ClaimSet) -> Option<String> {
    claims
        .get("sub")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn session_id(claims: &ClaimSet) -> Option<String> {
    claims
        .get("session_id")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn expires_at(claims: &ClaimSet) -> i64 {
    claims.get("exp").and_then(Value::as_i64).unwrap_or(0)
}

fn validation_result(claims: ClaimSet) -> ValidationResult {
    ValidationResult {
        account_id: subject(&claims).unwrap_or_default(),
        session_id: session_id(&claims),
        token_type: claims::token_type(&claims),
        expires_at: expires_at(&claims),
        device_info: device_info_from_claims(&claims),
        claims,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> TokenService {
        TokenService::new(TokenConfig::new("reckon_auth", "test-secret"))
    }

    fn sample_device() -> DeviceInfo {
        DeviceInfo {
            fingerprint: Some("fp_1".to_string()),
            device_type: Some("mobile".to_string()),
            ip_address: None,
            user_agent: None,
        }
    }

    #[test]
    fn generate_and_validate_access_token_with_custom_claims() {
        let service = service();
        let mut custom = ClaimSet::new();
        custom.insert("role".to_string(), json!("admin"));

        let token = service.generate_token("acc_123", &custom).unwrap();
        let result = service.validate_token(&token).unwrap();

        assert_eq!(result.account_id, "acc_123");
        assert_eq!(result.claims["role"], "admin");
        assert_eq!(result.token_type, TokenType::Access);
        assert!(result.session_id.is_none());
        assert!(result.expires_at > Utc::now().timestamp());
    }

    #[test]
    fn custom_claims_override_base_claims_by_default() {
        // Issuer verification off so the overridden claim survives decode.
        let service = TokenService::new(
            TokenConfig::new("reckon_auth", "test-secret").with_verify_issuer(false),
        );
        let mut custom = ClaimSet::new();
        custom.insert("iss".to_string(), json!("someone_else"));

        let token = service.generate_token("acc_123", &custom).unwrap();
        let result = service.validate_token(&token).unwrap();
        assert_eq!(result.claims["iss"], "someone_else");
    }

    #[test]
    fn hardened_mode_rejects_reserved_claim_override() {
        let service = TokenService::new(
            TokenConfig::new("reckon_auth", "test-secret").with_restricted_reserved_claims(),
        );
        let mut custom = ClaimSet::new();
        custom.insert("exp".to_string(), json!(0));

        let err = service.generate_token("acc_123", &custom).unwrap_err();
        assert_eq!(err, AuthError::ReservedClaim("exp".to_string()));
    }

    #[test]
    fn empty_account_id_is_rejected() {
        let err = service().generate_token("", &ClaimSet::new()).unwrap_err();
        assert_eq!(err, AuthError::InvalidToken);
    }

    #[test]
    fn session_bundle_round_trip_recovers_account_session_and_device() {
        let service = service();
        let device = sample_device();

        let bundle = service
            .generate_session_tokens("acc_123", "sess_9", &device)
            .unwrap();
        assert_eq!(bundle.token_type, "Bearer");
        assert_eq!(bundle.account_id, "acc_123");
        assert_eq!(bundle.session_id, "sess_9");
        assert!(bundle.expires_at > Utc::now().timestamp());

        let result = service.validate_session_token(&bundle.access_token).unwrap();
        assert_eq!(result.account_id, "acc_123");
        assert_eq!(result.session_id.as_deref(), Some("sess_9"));
        assert_eq!(result.token_type, TokenType::Session);
        // Exactly the non-null device fields come back.
        assert_eq!(result.device_info, Some(device.clone()));

        let refresh_claims = service.decode_and_verify(&bundle.refresh_token).unwrap();
        assert_eq!(claims::token_type(&refresh_claims), TokenType::Refresh);
        assert_eq!(refresh_claims["session_id"], "sess_9");
        // The refresh token carries the device binding so a later refresh
        // can restore it.
        assert_eq!(device_info_from_claims(&refresh_claims), Some(device));
    }

    #[test]
    fn validate_session_token_rejects_plain_access_token() {
        let service = service();
        let token = service.generate_token("acc_123", &ClaimSet::new()).unwrap();

        let err = service.validate_session_token(&token).unwrap_err();
        assert_eq!(err, AuthError::InvalidSessionToken);
    }

    #[test]
    fn empty_token_is_malformed() {
        let service = service();
        assert_eq!(service.decode_and_verify("").unwrap_err(), AuthError::Malformed);
        assert_eq!(service.validate_token("  ").unwrap_err(), AuthError::Malformed);
    }

    #[test]
    fn missing_sub_fails_as_invalid_token() {
        let service = service();
        // Sign a claim set with no subject through the codec directly.
        let claims = base_claims("reckon_auth", 3600);
        let token = TokenCodec::new(&TokenConfig::new("reckon_auth", "test-secret"))
            .sign(&claims)
            .unwrap();

        assert_eq!(
            service.decode_and_verify(&token).unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[test]
    fn refresh_token_renews_timestamps_and_preserves_custom_claims() {
        let service = service();
        let now = Utc::now().timestamp();

        let mut old_claims = base_claims("reckon_auth", 3600);
        old_claims.insert("iat".to_string(), json!(now - 1000));
        old_claims.insert("exp".to_string(), json!(now - 100));
        old_claims.insert("sub".to_string(), json!("acc_123"));
        old_claims.insert("session_id".to_string(), json!("sess_9"));
        old_claims.insert("plan".to_string(), json!("pro"));

        let token = service.refresh_token("acc_123", &old_claims).unwrap();
        let claims = service.decode_and_verify(&token).unwrap();

        assert!(claims["exp"].as_i64().unwrap() > now);
        assert_ne!(claims["iat"], old_claims["iat"]);
        assert_eq!(claims["session_id"], "sess_9");
        assert_eq!(claims["plan"], "pro");
    }

    #[test]
    fn refresh_session_tokens_issues_fresh_session_access_token() {
        let service = service();
        let device = sample_device();
        let bundle = service
            .generate_session_tokens("acc_123", "sess_9", &device)
            .unwrap();

        let refreshed = service.refresh_session_tokens(&bundle.refresh_token).unwrap();
        assert_eq!(refreshed.token_type, "Bearer");
        assert_eq!(refreshed.account_id, "acc_123");
        assert_eq!(refreshed.session_id, "sess_9");

        let result = service.validate_session_token(&refreshed.access_token).unwrap();
        assert_eq!(result.token_type, TokenType::Session);
        assert_eq!(result.device_info, Some(device));
    }

    #[test]
    fn refresh_session_tokens_rejects_access_token() {
        let service = service();
        let token = service.generate_token("acc_123", &ClaimSet::new()).unwrap();

        let err = service.refresh_session_tokens(&token).unwrap_err();
        assert_eq!(err, AuthError::InvalidRefreshToken);
    }

    #[test]
    fn expired_refresh_token_fails_with_refresh_token_expired() {
        let config = TokenConfig::new("reckon_auth", "test-secret");
        let service = TokenService::new(config.clone());

        let mut claims = base_claims("reckon_auth", 3600);
        claims.insert("sub".to_string(), json!("acc_123"));
        claims.insert("session_id".to_string(), json!("sess_9"));
        claims.insert("token_type".to_string(), json!("refresh"));
        claims.insert("exp".to_string(), json!(Utc::now().timestamp() - 3600));
        let token = TokenCodec::new(&config).sign(&claims).unwrap();

        let err = service.refresh_session_tokens(&token).unwrap_err();
        assert_eq!(err, AuthError::RefreshTokenExpired);
    }

    #[test]
    fn refresh_token_without_session_id_is_invalid() {
        let config = TokenConfig::new("reckon_auth", "test-secret");
        let service = TokenService::new(config.clone());

        let mut claims = base_claims("reckon_auth", 3600);
        claims.insert("sub".to_string(), json!("acc_123"));
        claims.insert("token_type".to_string(), json!("refresh"));
        let token = TokenCodec::new(&config).sign(&claims).unwrap();

        let err = service.refresh_session_tokens(&token).unwrap_err();
        assert_eq!(err, AuthError::InvalidRefreshToken);
    }
}
