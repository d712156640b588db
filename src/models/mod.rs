//! Data models shared across the client.
//!
//! Only the identity payload lives here; item-domain models belong to the
//! application layers that consume this crate.

pub mod user;

pub use user::UserProfile;
