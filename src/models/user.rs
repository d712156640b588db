//! User identity payload as returned by the API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Profile payload from `/auth/login` and `/users/me`.
///
/// The server is free to add fields; anything beyond the ones the client
/// cares about is preserved in `extra` so a round trip through the session
/// store loses nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}
