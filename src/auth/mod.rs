//! Authentication state: token inspection and session management.
//!
//! This module provides:
//! - `token`: decodes a bearer token's claims and judges expiry (fails closed)
//! - `SessionStore`: the single source of truth for the current credentials,
//!   with pluggable persistence backends
//!
//! Sessions are mutated only through `SessionStore::set`, so the in-memory
//! and persisted representations never diverge.

pub mod session;
pub mod token;

pub use session::{
    FileSessionBackend, MemorySessionBackend, Session, SessionBackend, SessionStore,
    REFRESH_TOKEN_KEY, TOKEN_KEY, USER_KEY,
};
