//! The API's business response envelope.
//!
//! Most endpoints wrap their payload as `{ code, info, data }`. Code "0000"
//! is success, "0003" means the caller is not authenticated, anything else is
//! a business error whose human-readable message is `info`. Endpoints that
//! return a body without a `code` field are passed through verbatim.

use reqwest::StatusCode;
use serde_json::Value;

use super::ApiError;

/// Business code for a successful request.
pub const SUCCESS_CODE: &str = "0000";

/// Business code for "not authenticated".
pub const NOT_LOGIN_CODE: &str = "0003";

/// Fallback message when a business error arrives without `info`.
const GENERIC_FAILURE: &str = "Request failed";

/// A parsed view over an enveloped body. Borrowed; the raw body stays with
/// the caller for error reporting.
pub(crate) struct Envelope<'a> {
    pub code: &'a str,
    pub info: Option<&'a str>,
    pub data: Option<&'a Value>,
}

impl<'a> Envelope<'a> {
    /// Interpret a body as an envelope if it is an object with a string
    /// `code` field.
    pub fn from_body(body: &'a Value) -> Option<Self> {
        let map = body.as_object()?;
        let code = map.get("code")?.as_str()?;
        Some(Self {
            code,
            info: map.get("info").and_then(Value::as_str),
            data: map.get("data"),
        })
    }
}

/// Whether a response should be treated as an authentication failure:
/// transport-level 401/403, or a NOT_LOGIN business code however it arrived.
pub(crate) fn is_auth_failure(status: StatusCode, body: &Value) -> bool {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return true;
    }
    Envelope::from_body(body).is_some_and(|env| env.code == NOT_LOGIN_CODE)
}

/// Normalize a transport outcome into what callers receive: the unwrapped
/// `data` member for enveloped successes, the verbatim body for
/// non-enveloped endpoints, or the classified error.
pub(crate) fn normalize(status: StatusCode, body: Value) -> Result<Value, ApiError> {
    if let Some(envelope) = Envelope::from_body(&body) {
        return match envelope.code {
            SUCCESS_CODE => Ok(envelope.data.cloned().unwrap_or(Value::Null)),
            NOT_LOGIN_CODE => Err(ApiError::AuthFailure),
            _ => {
                let message = match envelope.info {
                    Some(info) if !info.is_empty() => info.to_string(),
                    _ => GENERIC_FAILURE.to_string(),
                };
                Err(ApiError::Business { message, raw: body })
            }
        };
    }

    if status.is_success() {
        return Ok(body);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiError::AuthFailure);
    }
    let rendered = ApiError::truncate_body(&body.to_string());
    Err(ApiError::InvalidResponse(format!(
        "Status {status}: {rendered}"
    )))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_success_unwraps_data() {
        let body = json!({"code": "0000", "info": "", "data": {"foo": 1}});
        let out = normalize(StatusCode::OK, body).unwrap();
        assert_eq!(out, json!({"foo": 1}));
    }

    #[test]
    fn test_success_without_data_yields_null() {
        let body = json!({"code": "0000", "info": "ok"});
        assert_eq!(normalize(StatusCode::OK, body).unwrap(), Value::Null);
    }

    #[test]
    fn test_business_code_raises_with_info_message() {
        let body = json!({"code": "0099", "info": "bad input", "data": null});
        let err = normalize(StatusCode::OK, body.clone()).unwrap_err();
        match err {
            ApiError::Business { message, raw } => {
                assert_eq!(message, "bad input");
                assert_eq!(raw, body);
            }
            other => panic!("expected business error, got {other:?}"),
        }
    }

    #[test]
    fn test_business_code_without_info_gets_fallback_message() {
        let body = json!({"code": "0099"});
        let err = normalize(StatusCode::OK, body).unwrap_err();
        assert_eq!(err.to_string(), "Request failed");
    }

    #[test]
    fn test_not_login_code_is_auth_failure() {
        let body = json!({"code": "0003", "info": "not logged in"});
        assert!(is_auth_failure(StatusCode::OK, &body));
        assert!(matches!(
            normalize(StatusCode::OK, body),
            Err(ApiError::AuthFailure)
        ));
    }

    #[test]
    fn test_transport_status_is_auth_failure() {
        assert!(is_auth_failure(StatusCode::UNAUTHORIZED, &Value::Null));
        assert!(is_auth_failure(StatusCode::FORBIDDEN, &Value::Null));
        assert!(!is_auth_failure(StatusCode::OK, &json!({"code": "0000"})));
        assert!(!is_auth_failure(StatusCode::NOT_FOUND, &Value::Null));
    }

    #[test]
    fn test_non_enveloped_body_passes_through() {
        let body = json!({"items": [1, 2, 3]});
        assert_eq!(normalize(StatusCode::OK, body.clone()).unwrap(), body);
    }

    #[test]
    fn test_non_enveloped_failure_status_is_an_error() {
        let err = normalize(StatusCode::INTERNAL_SERVER_ERROR, json!("boom")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_numeric_code_is_not_an_envelope() {
        // `code` must be a string to count as the business envelope.
        let body = json!({"code": 200, "value": 1});
        assert_eq!(normalize(StatusCode::OK, body.clone()).unwrap(), body);
    }
}
