// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Reckon Services

//! Authentication and authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// Covers the full token lifecycle: extraction failures at the middleware
/// boundary, verification failures from the signer/verifier, claim-level
/// failures from the token service, the scope authorization decision, and
/// transport failures from the remote proxy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No token found in header, query, or body
    #[error("Missing authentication token")]
    NoToken,
    /// The token header occurred more than once
    #[error("Multiple authentication tokens provided")]
    MultipleTokens,
    /// The token header value could not be read as a string
    #[error("Invalid authentication token format")]
    InvalidTokenFormat,
    /// Token does not parse as a three-segment compact JWT
    #[error("Token is malformed")]
    Malformed,
    /// Token signature does not verify against the configured key
    #[error("Invalid token signature")]
    InvalidSignature,
    /// Token `exp` has passed (beyond drift tolerance), or `exp` is missing
    #[error("Token expired")]
    TokenExpired,
    /// Token issuer does not match the configured issuer
    #[error("Token issuer is invalid")]
    InvalidIssuer,
    /// Token audience does not match the service audience
    #[error("Token audience is invalid")]
    InvalidAudience,
    /// Token claims lack a usable `sub`
    #[error("Token is missing required claims")]
    InvalidToken,
    /// Token lacks a `session_id` where session semantics are required
    #[error("Token is not a valid session token")]
    InvalidSessionToken,
    /// Presented token is not of type `refresh` or lacks required claims
    #[error("Token is not a valid refresh token")]
    InvalidRefreshToken,
    /// The refresh token specifically has expired
    #[error("Refresh token has expired")]
    RefreshTokenExpired,
    /// The underlying signing primitive failed
    #[error("Token signing failed: {0}")]
    SigningError(String),
    /// A custom claim collides with a reserved claim (hardened mode only)
    #[error("Custom claim overrides reserved claim: {0}")]
    ReservedClaim(String),
    /// Token scopes are not a superset of the required scopes
    #[error("Insufficient scopes")]
    InsufficientScopes(Vec<String>),
    /// The remote authentication orchestrator was unreachable or timed out
    #[error("Remote authentication call failed: {0}")]
    Transport(String),
}

/// JSON error body returned to clients. Never carries internal detail.
#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_scopes: Option<Vec<String>>,
}

impl AuthError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NoToken
            | AuthError::MultipleTokens
            | AuthError::InvalidTokenFormat
            | AuthError::Malformed
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::InvalidIssuer
            | AuthError::InvalidAudience
            | AuthError::InvalidToken
            | AuthError::InvalidSessionToken
            | AuthError::InvalidRefreshToken
            | AuthError::RefreshTokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientScopes(_) => StatusCode::FORBIDDEN,
            AuthError::ReservedClaim(_) => StatusCode::BAD_REQUEST,
            AuthError::SigningError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// The client-facing message for this error.
    ///
    /// Expiry and signature failures keep distinct messages; every other
    /// verification failure collapses to a generic "Invalid token" so the
    /// response leaks nothing about why verification failed.
    fn public_message(&self) -> &'static str {
        match self {
            AuthError::NoToken => "Missing authentication token",
            AuthError::MultipleTokens => "Multiple authentication tokens provided",
            AuthError::InvalidTokenFormat => "Invalid authentication token format",
            AuthError::TokenExpired => "Token expired",
            AuthError::InvalidSignature => "Invalid token signature",
            AuthError::RefreshTokenExpired => "Refresh token expired",
            AuthError::Malformed
            | AuthError::InvalidIssuer
            | AuthError::InvalidAudience
            | AuthError::InvalidToken
            | AuthError::InvalidSessionToken
            | AuthError::InvalidRefreshToken => "Invalid token",
            AuthError::InsufficientScopes(_) => "Insufficient scopes",
            AuthError::ReservedClaim(_) => "Custom claim overrides a reserved claim",
            AuthError::SigningError(_) => "Internal authentication error",
            AuthError::Transport(_) => "Authentication service unavailable",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let required_scopes = match &self {
            AuthError::InsufficientScopes(required) => Some(required.clone()),
            _ => None,
        };
        let body = Json(AuthErrorBody {
            error: self.public_message().to_string(),
            required_scopes,
        });
        (status, body).into_response()
    }
}
