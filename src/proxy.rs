// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Reckon Services

//! Proxy to a remotely located authentication orchestrator.
//!
//! In multi-node deployments token policy can be centralized in a shared
//! authentication service instead of being evaluated locally. This module
//! forwards authentication, validation, refresh, and logout calls to one
//! uniform-randomly chosen live endpoint of that service and propagates the
//! remote JSON result verbatim, or a transport error on timeout/unreachable.
//!
//! No token logic lives here. Endpoint selection provides no
//! stickiness or affinity.

use std::{sync::Arc, time::Duration};

use rand::seq::IndexedRandom;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::AuthError;

/// Default synchronous call timeout (30 seconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default logical name of the remote authentication service.
pub const DEFAULT_SERVICE_NAME: &str = "reckon_auth";

/// Resolves a logical service name to its currently known live endpoints.
///
/// Backed by whatever discovery mechanism the deployment uses; the proxy
/// only needs the current endpoint list per call.
pub trait ServiceResolver: Send + Sync {
    fn resolve(&self, service: &str) -> Vec<String>;
}

/// Fixed endpoint list, for static deployments and tests.
pub struct StaticResolver {
    endpoints: Vec<String>,
}

impl StaticResolver {
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
        }
    }
}

impl ServiceResolver for StaticResolver {
    fn resolve(&self, _service: &str) -> Vec<String> {
        self.endpoints.clone()
    }
}

/// Pass-through client for a remote authentication orchestrator.
#[derive(Clone)]
pub struct RemoteAuthProxy {
    resolver: Arc<dyn ServiceResolver>,
    service_name: String,
    timeout: Duration,
    http: Client,
}

impl RemoteAuthProxy {
    pub fn new(resolver: Arc<dyn ServiceResolver>) -> Result<Self, AuthError> {
        let http = Client::builder()
            .build()
            .map_err(|e| AuthError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            resolver,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            http,
        })
    }

    /// Use a different logical service name with the resolver.
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set the per-call timeout in milliseconds.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout = Duration::from_millis(timeout_ms);
        self
    }

    /// Forward a credential check (password/OAuth payload) to the remote
    /// authority.
    pub async fn authenticate(&self, credentials: Value) -> Result<Value, AuthError> {
        self.call("authenticate", credentials).await
    }

    pub async fn validate_token(&self, token: &str) -> Result<Value, AuthError> {
        self.call("validate", json!({ "token": token })).await
    }

    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<Value, AuthError> {
        self.call("refresh", json!({ "refresh_token": refresh_token }))
            .await
    }

    pub async fn logout(&self, token: &str) -> Result<Value, AuthError> {
        self.call("logout", json!({ "token": token })).await
    }

    pub async fn validate_service_token(&self, token: &str) -> Result<Value, AuthError> {
        self.call("validate_service", json!({ "token": token }))
            .await
    }

    /// Uniform-random pick among the currently known live endpoints.
    fn pick_endpoint(&self) -> Result<String, AuthError> {
        let endpoints = self.resolver.resolve(&self.service_name);
        endpoints
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| {
                AuthError::Transport(format!(
                    "no live endpoints for service {}",
                    self.service_name
                ))
            })
    }

    async fn call(&self, operation: &str, payload: Value) -> Result<Value, AuthError> {
        let endpoint = self.pick_endpoint()?;
        let url = format!("{}/{}", endpoint.trim_end_matches('/'), operation);

        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "remote auth call failed");
                if e.is_timeout() {
                    AuthError::Transport(format!("request to {url} timed out"))
                } else {
                    AuthError::Transport(format!("request to {url} failed: {e}"))
                }
            })?;

        // Remote application-level errors come back as data; Transport is
        // reserved for the call itself failing.
        response
            .json::<Value>()
            .await
            .map_err(|e| AuthError::Transport(format!("invalid response from {url}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};

    async fn spawn_remote(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn proxy_for(endpoint: String) -> RemoteAuthProxy {
        RemoteAuthProxy::new(Arc::new(StaticResolver::new([endpoint]))).unwrap()
    }

    #[tokio::test]
    async fn forwards_validate_calls_and_returns_remote_result() {
        let app = Router::new().route(
            "/validate",
            post(|Json(body): Json<Value>| async move {
                Json(json!({ "valid": true, "token": body["token"] }))
            }),
        );
        let endpoint = spawn_remote(app).await;

        let result = proxy_for(endpoint).validate_token("tok_1").await.unwrap();
        assert_eq!(result["valid"], true);
        assert_eq!(result["token"], "tok_1");
    }

    #[tokio::test]
    async fn forwards_authenticate_payload_verbatim() {
        let app = Router::new().route(
            "/authenticate",
            post(|Json(body): Json<Value>| async move { Json(body) }),
        );
        let endpoint = spawn_remote(app).await;

        let result = proxy_for(endpoint)
            .authenticate(json!({ "email": "a@reckon.test", "password": "pw" }))
            .await
            .unwrap();
        assert_eq!(result["email"], "a@reckon.test");
    }

    #[tokio::test]
    async fn remote_error_results_are_propagated_as_data() {
        let app = Router::new().route(
            "/refresh",
            post(|| async { Json(json!({ "error": "invalid_refresh_token" })) }),
        );
        let endpoint = spawn_remote(app).await;

        let result = proxy_for(endpoint).refresh_tokens("tok_1").await.unwrap();
        assert_eq!(result["error"], "invalid_refresh_token");
    }

    #[tokio::test]
    async fn empty_resolver_is_a_transport_error() {
        let proxy =
            RemoteAuthProxy::new(Arc::new(StaticResolver::new(Vec::<String>::new()))).unwrap();
        let err = proxy.logout("tok_1").await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        // Port 9 (discard) is assumed closed.
        let proxy = proxy_for("http://127.0.0.1:9".to_string()).with_timeout_ms(2000);
        let err = proxy.validate_service_token("tok_1").await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
    }

    #[tokio::test]
    async fn slow_remote_times_out() {
        let app = Router::new().route(
            "/validate",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Json(json!({ "valid": true }))
            }),
        );
        let endpoint = spawn_remote(app).await;

        let proxy = proxy_for(endpoint).with_timeout_ms(50);
        let err = proxy.validate_token("tok_1").await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
    }
}
