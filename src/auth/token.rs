//! Bearer token inspection.
//!
//! The API issues JWT-shaped bearer tokens. The client never verifies the
//! signature (that is the server's job); it only decodes the claims segment
//! to judge expiry, so the navigation guard can answer "is this session still
//! usable" without a network round trip.
//!
//! Every decode failure resolves to "invalid" - a malformed token is never an
//! error, it is simply not a credential.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Claims the client cares about. Everything else in the payload is ignored.
#[derive(Debug, Clone, Deserialize)]
struct Claims {
    /// Expiry as epoch seconds. f64 accepts both integer and fractional
    /// NumericDate values.
    exp: f64,
}

/// Check whether a token is present, well-formed, and unexpired right now.
pub fn is_valid(token: Option<&str>) -> bool {
    is_valid_at(token, Utc::now())
}

/// Expiry check against an explicit clock. Pure in (token, now).
pub fn is_valid_at(token: Option<&str>, now: DateTime<Utc>) -> bool {
    match token.and_then(decode_claims) {
        Some(claims) => claims.exp * 1000.0 > now.timestamp_millis() as f64,
        None => false,
    }
}

/// Decode the middle segment of a three-segment token into claims.
/// Returns `None` on any structural or parse failure.
fn decode_claims(token: &str) -> Option<Claims> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) =
        (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
pub(crate) fn token_expiring_in(seconds: i64) -> String {
    token_with_exp((Utc::now().timestamp() + seconds) as f64)
}

#[cfg(test)]
pub(crate) fn token_with_exp(exp: f64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"sub":"u-1"}}"#));
    format!("{header}.{payload}.sig")
}
