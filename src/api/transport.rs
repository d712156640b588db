//! Transport seam between the pipeline and the network.
//!
//! The pipeline's job is classification and recovery, not I/O. Everything
//! that actually touches the wire sits behind [`Transport`], so tests can
//! script responses and the refresh coordinator can issue its renewal call
//! without passing back through the interception logic.

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::ApiError;

/// One outbound call, fully described.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    /// Bearer credential to attach, if the caller holds one.
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl TransportRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            bearer: None,
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_bearer(mut self, bearer: Option<String>) -> Self {
        self.bearer = bearer;
        self
    }
}

/// What came back. The transport never fails on HTTP status alone - only on
/// genuine network problems - so the pipeline always gets a body to classify.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Value,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, ApiError>;
}

/// Production transport over a shared reqwest client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, ApiError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .query(&request.query);

        if let Some(ref bearer) = request.bearer {
            let value = header::HeaderValue::from_str(&format!("Bearer {bearer}"))?;
            builder = builder.header(header::AUTHORIZATION, value);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(url = %request.url, status = %status, "Response received");

        // Empty bodies become null, non-JSON bodies are kept as raw text so
        // classification never fails on the read path.
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(TransportResponse { status, body })
    }
}
