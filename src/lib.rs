// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Reckon Services

//! reckon-auth - Token Lifecycle & Authorization Core
//!
//! Stateless JWT issuance, validation, and scope-based authorization for the
//! cooperating Reckon services.
//!
//! ## Auth Flow
//!
//! 1. A service establishes a session via
//!    [`TokenService::generate_session_tokens`] and hands the bundle to the
//!    client
//! 2. The client sends `Authorization: Bearer <token>` on later requests
//! 3. The [`auth_middleware`] gate:
//!    - Extracts the token (header, else `token` query/body parameter)
//!    - Verifies signature, expiry (with drift tolerance), issuer, audience
//!    - Checks required scopes against the token's scopes
//!    - Attaches an [`AuthContext`] for handlers, or rejects with 401/403
//! 4. When the access token expires, the client exchanges its refresh token
//!    via [`TokenService::refresh_session_tokens`]
//!
//! Validation is fully stateless: tokens are never stored server-side and
//! validity is determined solely from the token's own content, the signing
//! secret, and the current time.
//!
//! ## Modules
//!
//! - `claims` - Claim-set construction and merge rules
//! - `config` - Immutable token service configuration
//! - `error` - Error taxonomy and HTTP response mapping
//! - `middleware` - Axum authorization gate and handler helpers
//! - `proxy` - Pass-through to a remote authentication orchestrator
//! - `signer` - Signer/verifier boundary (HS256 compact JWT)
//! - `token` - Token generation, validation, and refresh

pub mod claims;
pub mod config;
pub mod error;
pub mod middleware;
pub mod proxy;
pub mod signer;
pub mod token;

pub use claims::{
    scopes_from_claims, token_expired, token_type, ClaimSet, DeviceInfo, TokenType, AUDIENCE,
};
pub use config::{ConfigError, TokenConfig};
pub use error::AuthError;
pub use middleware::{
    auth_middleware, has_scope, require_scopes, Auth, AuthContext, AuthGate, OptionalAuth,
};
pub use proxy::{RemoteAuthProxy, ServiceResolver, StaticResolver};
pub use signer::TokenCodec;
pub use token::{RefreshResult, TokenBundle, TokenService, ValidationResult};
