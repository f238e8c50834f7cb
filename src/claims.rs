// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Reckon Services

//! Claim-set construction and merge rules.
//!
//! A [`ClaimSet`] is an ordered map of claim names to JSON values. Every
//! issued token carries the standard claims `sub`, `iss`, `aud`, `iat`, and
//! `exp`; session and refresh tokens add `session_id`, device metadata, and
//! `token_type`. Caller-supplied custom claims are merged right-biased over
//! the base claims ("custom claims win"), which is deliberate and documented:
//! see [`TokenConfig::restrict_reserved_claims`](crate::config::TokenConfig)
//! for the opt-in hardened mode.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A set of named claims embedded in a token.
pub type ClaimSet = Map<String, Value>;

/// Audience (`aud`) claim shared by all cooperating Reckon services.
pub const AUDIENCE: &str = "reckon_services";

/// Refresh token lifetime (30 days). Not configurable.
pub const REFRESH_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Claims that the hardened merge mode refuses to override.
pub const RESERVED_CLAIMS: [&str; 5] = ["iss", "aud", "iat", "exp", "sub"];

/// Token type discriminator carried in the `token_type` claim.
///
/// This is a three-way tag on the claims, not a runtime state machine:
/// each type has distinct generation and validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived token authorizing direct API access
    Access,
    /// Access token additionally bound to a session and device metadata
    Session,
    /// Long-lived token used solely to obtain a new access token
    Refresh,
}

impl TokenType {
    /// Parse from the `token_type` claim value.
    pub fn from_str(s: &str) -> Option<TokenType> {
        match s {
            "access" => Some(TokenType::Access),
            "session" => Some(TokenType::Session),
            "refresh" => Some(TokenType::Refresh),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Session => "session",
            TokenType::Refresh => "refresh",
        }
    }
}

impl Default for TokenType {
    /// Absence of a `token_type` claim implies an access token.
    fn default() -> Self {
        TokenType::Access
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Device metadata bound into session tokens.
///
/// Absent fields are omitted from the claim set entirely, never encoded as
/// `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl DeviceInfo {
    fn is_empty(&self) -> bool {
        self.fingerprint.is_none()
            && self.device_type.is_none()
            && self.ip_address.is_none()
            && self.user_agent.is_none()
    }
}

/// Build the base claims for any issued token: `iss`, `aud`, `iat`, `exp`.
pub fn base_claims(issuer: &str, ttl_seconds: i64) -> ClaimSet {
    let now = Utc::now().timestamp();
    let mut claims = ClaimSet::new();
    claims.insert("iss".to_string(), Value::from(issuer));
    claims.insert("aud".to_string(), Value::from(AUDIENCE));
    claims.insert("iat".to_string(), Value::from(now));
    claims.insert("exp".to_string(), Value::from(now + ttl_seconds));
    claims
}

/// Right-biased merge: every key present in `custom` overwrites `base`.
pub fn merge(mut base: ClaimSet, custom: &ClaimSet) -> ClaimSet {
    for (key, value) in custom {
        base.insert(key.clone(), value.clone());
    }
    base
}

/// Build session claims: `session_id` plus whichever device fields are
/// present. `None` fields are dropped before the merge.
pub fn session_claims(session_id: &str, device: &DeviceInfo) -> ClaimSet {
    let mut claims = ClaimSet::new();
    claims.insert("session_id".to_string(), Value::from(session_id));

    if let Some(fingerprint) = &device.fingerprint {
        claims.insert("device_fingerprint".to_string(), Value::from(fingerprint.clone()));
    }
    if let Some(device_type) = &device.device_type {
        claims.insert("device_type".to_string(), Value::from(device_type.clone()));
    }
    if let Some(ip_address) = &device.ip_address {
        claims.insert("ip_address".to_string(), Value::from(ip_address.clone()));
    }
    if let Some(user_agent) = &device.user_agent {
        claims.insert("user_agent".to_string(), Value::from(user_agent.clone()));
    }

    claims
}

/// Build refresh claims: `token_type = "refresh"`, `session_id`, the present
/// device fields, and a fixed 30-day expiry that overrides the base TTL on
/// merge.
///
/// Device claims ride along so a later refresh can mint a session access
/// token with the same device binding.
pub fn refresh_claims(session_id: &str, device: &DeviceInfo) -> ClaimSet {
    let mut claims = session_claims(session_id, device);
    claims.insert(
        "token_type".to_string(),
        Value::from(TokenType::Refresh.as_str()),
    );
    claims.insert(
        "exp".to_string(),
        Value::from(Utc::now().timestamp() + REFRESH_TTL_SECONDS),
    );
    claims
}

/// Reconstruct device info from claims, dropping absent keys.
///
/// Returns `None` when the claims carry no device metadata at all.
pub fn device_info_from_claims(claims: &ClaimSet) -> Option<DeviceInfo> {
    let string_claim = |key: &str| {
        claims
            .get(key)
            .and_then(Value::as_str)
            .map(ToString::to_string)
    };

    let device = DeviceInfo {
        fingerprint: string_claim("device_fingerprint"),
        device_type: string_claim("device_type"),
        ip_address: string_claim("ip_address"),
        user_agent: string_claim("user_agent"),
    };

    if device.is_empty() {
        None
    } else {
        Some(device)
    }
}

/// Extract token scopes: the `scopes` array claim, else the space-separated
/// `scope` string claim, else empty.
pub fn scopes_from_claims(claims: &ClaimSet) -> Vec<String> {
    if let Some(scopes) = claims.get("scopes").and_then(Value::as_array) {
        return scopes
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect();
    }

    if let Some(scope) = claims.get("scope").and_then(Value::as_str) {
        return scope.split_whitespace().map(ToString::to_string).collect();
    }

    Vec::new()
}

/// Read the token type from claims, defaulting to [`TokenType::Access`].
pub fn token_type(claims: &ClaimSet) -> TokenType {
    claims
        .get("token_type")
        .and_then(Value::as_str)
        .and_then(TokenType::from_str)
        .unwrap_or_default()
}

/// Check whether claims have expired.
///
/// Fails closed: a missing or non-integer `exp` counts as expired.
pub fn token_expired(claims: &ClaimSet) -> bool {
    match claims.get("exp").and_then(Value::as_i64) {
        Some(exp) => Utc::now().timestamp() > exp,
        None => true,
    }
}
