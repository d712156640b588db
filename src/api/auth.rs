//! Authentication endpoints: login, registration, profile, logout.
//!
//! These are thin calls through the request pipeline plus the session
//! bookkeeping that goes with them - a successful login stores the issued
//! tokens and profile in one transition, and logout clears local state even
//! when the remote call fails.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::auth::session::{profile_from_value, Session};
use crate::models::UserProfile;

use super::{ApiClient, ApiError};

/// Credentials for `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Payload for `POST /auth/register`. `code` is the email verification code
/// obtained through [`AuthService::send_register_code`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Auth flows over an [`ApiClient`].
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Log in and store the issued credentials plus the returned profile as
    /// one session transition.
    pub async fn login(&self, request: &LoginRequest) -> Result<UserProfile, ApiError> {
        let data: Value = self.client.post("/auth/login", request).await?;

        let token = data
            .get("token")
            .and_then(Value::as_str)
            .map(str::to_string);
        let refresh_token = data
            .get("refreshToken")
            .and_then(Value::as_str)
            .map(str::to_string);
        let user = profile_from_value(&data);

        self.client.session().set(Session {
            token,
            refresh_token,
            user: user.clone(),
        });

        Ok(user.unwrap_or_default())
    }

    /// Create an account. Does not log in - the caller follows up with
    /// [`AuthService::login`].
    pub async fn register(&self, request: &RegisterRequest) -> Result<Value, ApiError> {
        self.client.post("/auth/register", request).await
    }

    /// Request an email verification code for registration.
    pub async fn send_register_code(&self, email: &str) -> Result<Value, ApiError> {
        self.client
            .post("/auth/register/code", &json!({ "email": email }))
            .await
    }

    /// Fetch the current user's profile and re-persist the session with it.
    /// Without a stored token there is nobody to ask about - resolves to
    /// `None` without a network call.
    pub async fn fetch_current_user(&self) -> Result<Option<UserProfile>, ApiError> {
        let session = self.client.session();
        if session.token().is_none() {
            return Ok(None);
        }

        let profile: UserProfile = self.client.get("/users/me").await?;

        let snapshot = session.snapshot();
        session.set(Session {
            token: snapshot.token,
            refresh_token: snapshot.refresh_token,
            user: Some(profile.clone()),
        });
        Ok(Some(profile))
    }

    /// Log out. The remote call invalidates the refresh token server-side;
    /// its failure is swallowed - consistent local state wins over strict
    /// server acknowledgment, so the session is cleared regardless.
    pub async fn logout(&self) {
        let session = self.client.session();
        if let Some(refresh_token) = session.refresh_token() {
            let result: Result<Value, ApiError> = self
                .client
                .post("/auth/logout", &json!({ "refreshToken": refresh_token }))
                .await;
            if let Err(err) = result {
                warn!(error = %err, "Logout call failed, clearing local session anyway");
            }
        }
        session.clear();
    }
}
