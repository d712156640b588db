//! The request pipeline.
//!
//! Every outbound call goes through [`ApiClient::execute`], which attaches
//! the stored bearer token, classifies the response (success / business
//! error / authentication failure), and on an authentication failure hands
//! control to the refresh coordinator: renew the session once, replay the
//! request once with the fresh credential, and return that result. A request
//! is never replayed more than once; if the replay fails for authentication
//! reasons again, that failure propagates as-is.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::auth::session::SessionStore;
use crate::config::Config;

use super::envelope;
use super::refresh::{RefreshCoordinator, SessionExpiredHook};
use super::transport::{HttpTransport, Transport, TransportRequest};
use super::ApiError;

/// One outbound call's parameters plus its one-shot replay flag.
/// The flag, once set, is never cleared for this request instance.
struct RequestContext {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    retried: bool,
}

impl RequestContext {
    fn new(method: Method, path: &str, query: Vec<(String, String)>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.to_string(),
            query,
            body,
            retried: false,
        }
    }

    fn to_request(&self, base_url: &str, bearer: Option<String>) -> TransportRequest {
        let mut request = TransportRequest::new(self.method.clone(), format!("{base_url}{}", self.path))
            .with_bearer(bearer);
        request.query = self.query.clone();
        request.body = self.body.clone();
        request
    }
}

/// API client for the LAF backend.
/// Clone is cheap - the transport and session store are shared behind Arcs.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    session: Arc<SessionStore>,
    refresher: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Build a client over a real HTTP transport.
    pub fn new(
        config: &Config,
        session: Arc<SessionStore>,
        on_expired: SessionExpiredHook,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_transport(
            Arc::new(HttpTransport::new(client)),
            config.api_base_url.clone(),
            session,
            on_expired,
        ))
    }

    /// Build a client over any transport. This is the seam tests use, and it
    /// also lets embedders supply their own network layer.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        base_url: String,
        session: Arc<SessionStore>,
        on_expired: SessionExpiredHook,
    ) -> Self {
        let refresher = Arc::new(RefreshCoordinator::new(
            Arc::clone(&session),
            Arc::clone(&transport),
            format!("{base_url}/auth/refresh"),
            on_expired,
        ));
        Self {
            transport,
            base_url,
            session,
            refresher,
        }
    }

    /// The session store this client reads its credentials from.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, path, &[], None::<&()>).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        self.request(Method::GET, path, query, None::<&()>).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::PUT, path, query, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        self.request(Method::DELETE, path, &[], body).await
    }

    /// Generic entry point for any verb/path combination.
    pub async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let body = match body {
            Some(body) => Some(serde_json::to_value(body)?),
            None => None,
        };
        let query = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let ctx = RequestContext::new(method, path, query, body);
        let value = self.execute(ctx).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Send, classify, and - for a first authentication failure - renew and
    /// replay once.
    async fn execute(&self, mut ctx: RequestContext) -> Result<Value, ApiError> {
        let response = self
            .transport
            .send(ctx.to_request(&self.base_url, self.session.token()))
            .await?;

        if envelope::is_auth_failure(response.status, &response.body) {
            if ctx.retried {
                // Replay bound: this request already used its one renewal.
                return Err(ApiError::AuthFailure);
            }
            ctx.retried = true;
            debug!(path = %ctx.path, "Authentication failure, attempting session renewal");

            let Some(token) = self.refresher.recover().await else {
                // Session cleared and navigation signalled by the
                // coordinator; the original failure is what propagates.
                return Err(ApiError::AuthFailure);
            };

            let replay = self
                .transport
                .send(ctx.to_request(&self.base_url, Some(token)))
                .await?;
            // Replay responses are normalized but never re-intercepted: a
            // second authentication failure surfaces as an error.
            return envelope::normalize(replay.status, replay.body);
        }

        envelope::normalize(response.status, response.body)
    }
}
