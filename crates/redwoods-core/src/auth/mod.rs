//! Session lifecycle: the store, the route guard and the auth actions.
//!
//! This module provides:
//! - `SessionStore`: mirrors the provider's session as `{identity, loading}`
//! - `routes`: which paths are public and where session transitions redirect
//! - `AuthActions`: sign-in, sign-up, sign-out and friends, each returning
//!   an `AuthOutcome` instead of failing
//!
//! The store moves through `Uninitialized → Loading → Authenticated |
//! Unauthenticated` and then between the last two for the life of the
//! process.

pub mod actions;
pub mod error;
pub mod routes;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use actions::{AuthActions, RedirectUrls};
pub use error::{AuthError, AuthOutcome};
pub use routes::{Navigator, Router};
pub use store::{AuthPhase, SessionState, SessionStore};
