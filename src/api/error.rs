use reqwest::header::InvalidHeaderValue;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by the request pipeline.
///
/// Two failure modes deliberately have no variant here: a malformed bearer
/// token resolves silently to "invalid" in the token codec, and renewal
/// failures are absorbed by the refresh coordinator (the original request's
/// `AuthFailure` is what callers see).
#[derive(Error, Debug)]
pub enum ApiError {
    /// The envelope carried a non-success business code. `message` is the
    /// server's `info` text; `raw` is the full response body.
    #[error("{message}")]
    Business { message: String, raw: Value },

    /// Transport 401/403 or business code "0003", after any renewal and
    /// replay the pipeline was allowed to attempt.
    #[error("Not authenticated")]
    AuthFailure,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid credential header: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request body failed to encode, or a normalized payload failed to
    /// decode into the caller's type.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Maximum length for response bodies echoed into error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid dragging huge payloads into logs.
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    /// True for failures the refresh coordinator is expected to recover from.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::AuthFailure)
    }
}
