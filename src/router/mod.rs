//! Navigation support: the pre-transition access guard.

pub mod guard;

pub use guard::{before_each, RouteDecision, RouteMeta};
