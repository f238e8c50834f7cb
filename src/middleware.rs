// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Reckon Services

//! # Authorization Gate
//!
//! Axum middleware that authenticates incoming requests and enforces
//! scope-based authorization.
//!
//! ## Decision procedure
//!
//! 1. Extract a token: a single `Authorization` header (Bearer prefix
//!    stripped, else the raw value), falling back to a `token` query or
//!    form-body parameter when the header is absent. A repeated header is
//!    rejected outright.
//! 2. Validate it through [`TokenService`].
//! 3. Check that the token's scopes are a superset of the gate's required
//!    scopes (ALL, not ANY).
//! 4. Attach an [`AuthContext`] to the request and continue, or short-circuit
//!    with a 401/403 JSON error.
//!
//! In `optional` mode a missing token passes through with no identity
//! attached; an invalid token is still rejected.
//!
//! ```rust,ignore
//! let gate = AuthGate::new(service).with_required_scopes(["admin"]);
//! let app = Router::new()
//!     .route("/admin", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(gate, auth_middleware));
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, Request, State},
    http::{
        header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;
use url::form_urlencoded;

use crate::claims::{scopes_from_claims, ClaimSet};
use crate::error::AuthError;
use crate::token::{TokenService, ValidationResult};

/// Largest form body the gate will buffer while looking for a `token`
/// parameter.
const TOKEN_BODY_LIMIT: usize = 64 * 1024;

/// Identity context attached to the request for the duration of request
/// processing.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: String,
    pub claims: ClaimSet,
    /// Full validation result, for handlers that need expiry or device info.
    pub token: ValidationResult,
}

/// Authorization gate configuration.
#[derive(Clone)]
pub struct AuthGate {
    service: Arc<TokenService>,
    required_scopes: Vec<String>,
    optional: bool,
    token_header: HeaderName,
}

impl AuthGate {
    pub fn new(service: TokenService) -> Self {
        Self {
            service: Arc::new(service),
            required_scopes: Vec::new(),
            optional: false,
            token_header: AUTHORIZATION,
        }
    }

    /// Require every listed scope to be present on the token.
    pub fn with_required_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Let requests without a token pass through unauthenticated.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Read the token from a different header than `Authorization`.
    pub fn with_token_header(mut self, header: HeaderName) -> Self {
        self.token_header = header;
        self
    }
}

/// Authentication middleware function.
///
/// Wire up with `axum::middleware::from_fn_with_state(gate, auth_middleware)`.
pub async fn auth_middleware(
    State(gate): State<AuthGate>,
    request: Request,
    next: Next,
) -> Response {
    // The body is only consumed (and reassembled) when a form body has to be
    // searched for a token parameter.
    let (parts, body) = request.into_parts();
    let (extracted, body) = extract_token(&gate, &parts, body).await;
    let mut request = Request::from_parts(parts, body);

    let token = match extracted {
        Ok(token) => token,
        Err(AuthError::NoToken) if gate.optional => {
            return next.run(request).await;
        }
        Err(e) => {
            debug!(error = %e, "request rejected during token extraction");
            return e.into_response();
        }
    };

    let result = match gate.service.validate_token(&token) {
        Ok(result) => result,
        Err(e) => {
            debug!(error = %e, "token validation failed");
            return e.into_response();
        }
    };

    let scopes = scopes_from_claims(&result.claims);
    if !gate
        .required_scopes
        .iter()
        .all(|required| scopes.contains(required))
    {
        debug!(
            account_id = %result.account_id,
            "token scopes do not cover required scopes"
        );
        return AuthError::InsufficientScopes(gate.required_scopes.clone()).into_response();
    }

    request.extensions_mut().insert(AuthContext {
        account_id: result.account_id.clone(),
        claims: result.claims.clone(),
        token: result,
    });
    next.run(request).await
}

/// Token extraction precedence: single header (Bearer-prefixed or verbatim),
/// else `token` query parameter, else `token` form-body parameter.
async fn extract_token(
    gate: &AuthGate,
    parts: &Parts,
    body: Body,
) -> (Result<String, AuthError>, Body) {
    let mut values = parts.headers.get_all(&gate.token_header).iter();
    match (values.next(), values.next()) {
        (Some(_), Some(_)) => (Err(AuthError::MultipleTokens), body),
        (Some(value), None) => (token_from_header(value), body),
        _ => token_from_params(parts, body).await,
    }
}

fn token_from_header(value: &HeaderValue) -> Result<String, AuthError> {
    let raw = value.to_str().map_err(|_| AuthError::InvalidTokenFormat)?;
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    if token.is_empty() {
        Err(AuthError::NoToken)
    } else {
        Ok(token.to_string())
    }
}

async fn token_from_params(parts: &Parts, body: Body) -> (Result<String, AuthError>, Body) {
    if let Some(query) = parts.uri.query() {
        if let Some(token) = find_token_param(query.as_bytes()) {
            return (Ok(token), body);
        }
    }

    // Only form bodies are searched; anything else passes through untouched.
    let is_form = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if !is_form {
        return (Err(AuthError::NoToken), body);
    }

    let bytes = match to_bytes(body, TOKEN_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(_) => return (Err(AuthError::InvalidTokenFormat), Body::empty()),
    };
    let token = find_token_param(&bytes).ok_or(AuthError::NoToken);
    (token, Body::from(bytes))
}

fn find_token_param(input: &[u8]) -> Option<String> {
    form_urlencoded::parse(input)
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}

/// Extractor for the authenticated identity set by [`auth_middleware`].
///
/// Rejects with 401 when the gate did not attach a context (no token in
/// `optional` mode, or the route is not behind the gate at all).
pub struct Auth(pub AuthContext);

impl<S: Send + Sync> FromRequestParts<S> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Auth)
            .ok_or(AuthError::NoToken)
    }
}

/// Optional variant of [`Auth`]: `None` instead of a rejection.
pub struct OptionalAuth(pub Option<AuthContext>);

impl<S: Send + Sync> FromRequestParts<S> for OptionalAuth {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(parts.extensions.get::<AuthContext>().cloned()))
    }
}

/// Check whether claims carry a scope.
pub fn has_scope(claims: &ClaimSet, scope: &str) -> bool {
    scopes_from_claims(claims).iter().any(|s| s == scope)
}

/// Require scopes inside a handler, short-circuiting with 403 via `?`.
pub fn require_scopes(context: &AuthContext, required: &[&str]) -> Result<(), AuthError> {
    let scopes = scopes_from_claims(&context.claims);
    if required.iter().all(|r| scopes.iter().any(|s| s == r)) {
        Ok(())
    } else {
        Err(AuthError::InsufficientScopes(
            required.iter().map(ToString::to_string).collect(),
        ))
    }
}
