// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Reckon Services

//! Signer/verifier boundary over the compact JWT wire format.
//!
//! This is a thin contract around `jsonwebtoken` (HS256): [`TokenCodec::sign`]
//! produces the three dot-separated base64url segments, [`TokenCodec::verify`]
//! checks the signature and standard time-based claims with the configured
//! clock-skew tolerance, plus `iss`/`aud` when issuer verification is enabled.
//! All claim-level rules beyond that live in
//! [`TokenService`](crate::token::TokenService).

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::claims::{ClaimSet, AUDIENCE};
use crate::config::TokenConfig;
use crate::error::AuthError;

/// HMAC signing and verification keys plus the validation rules applied on
/// every verify call.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Build a codec from the service configuration.
    pub fn new(config: &TokenConfig) -> Self {
        let secret = config.secret.as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        // leeway is in whole seconds; round the configured drift up so a
        // sub-second tolerance never silently becomes zero.
        validation.leeway = config.allowed_drift_ms.div_ceil(1000);

        if config.verify_issuer {
            validation.set_issuer(&[&config.issuer]);
            validation.set_audience(&[AUDIENCE]);
        } else {
            validation.validate_aud = false;
        }

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign a claim set into a compact token string.
    pub fn sign(&self, claims: &ClaimSet) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::SigningError(e.to_string()))
    }

    /// Verify a compact token string and return its claim set.
    ///
    /// Performs the structural checks: three-segment parse, signature,
    /// expiry (with leeway), and issuer/audience when configured.
    pub fn verify(&self, token: &str) -> Result<ClaimSet, AuthError> {
        decode::<ClaimSet>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                // A token without `exp` fails closed as expired.
                jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(claim)
                    if claim.as_str() == "exp" =>
                {
                    AuthError::TokenExpired
                }
                _ => AuthError::Malformed,
            })
    }
}
