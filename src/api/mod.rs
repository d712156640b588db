//! REST API client module for the LAF backend.
//!
//! This module provides the `ApiClient` request pipeline (bearer attachment,
//! envelope normalization, failure classification), the `RefreshCoordinator`
//! that renews an expired session exactly once per burst of failures, and the
//! `AuthService` wrapping the authentication endpoints.
//!
//! The backend speaks a `{ code, info, data }` envelope; transport-level
//! 401/403 and the "0003" business code both mean "not authenticated".

pub mod auth;
pub mod client;
pub mod envelope;
pub mod error;
pub mod refresh;
pub mod transport;

pub use auth::{AuthService, LoginRequest, RegisterRequest};
pub use client::ApiClient;
pub use envelope::{NOT_LOGIN_CODE, SUCCESS_CODE};
pub use error::ApiError;
pub use refresh::{noop_expired_hook, RefreshCoordinator, SessionExpiredHook};
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};
