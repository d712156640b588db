//! Client-side core for the LAF lost-and-found app.
//!
//! This crate sits between an application's UI and the remote API: it
//! attaches proof-of-identity to outgoing requests, detects when that proof
//! has expired or been rejected, renews it exactly once per request without
//! duplicating renewal work across concurrently failing requests, and keeps
//! a single source of truth for "is the user currently authenticated" that a
//! navigation layer can consult synchronously.
//!
//! The moving parts:
//! - [`auth::token`]: decodes bearer token claims and judges expiry
//! - [`auth::SessionStore`]: the current credentials, persisted atomically
//! - [`api::ApiClient`]: the request pipeline (attach, classify, replay)
//! - [`api::RefreshCoordinator`]: single-flight session renewal
//! - [`router::before_each`]: allow / redirect decisions before navigation
//!
//! Item-domain endpoints, views, and the routing table itself belong to the
//! application layers consuming this crate.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod router;

pub use api::{ApiClient, ApiError, AuthService, SessionExpiredHook};
pub use auth::{Session, SessionStore};
pub use config::Config;
pub use models::UserProfile;
pub use router::{RouteDecision, RouteMeta};
