//! Core library for Redwoods Mailer.
//!
//! The interesting part of the client is the session lifecycle: a
//! [`auth::SessionStore`] that mirrors the identity provider's session,
//! the route guard that redirects on session transitions, and the
//! [`auth::AuthActions`] that forward credentials to the provider.
//!
//! Around it sit the collaborators the front ends need:
//!
//! - `provider`: the identity provider contract and a GoTrue-style HTTP client
//! - `channel`: a duplex message channel with bounded reconnection
//! - `offline`: the sync progress indicator (a simulation, not a sync engine)
//! - `shell`, `mail`: dashboard selection, tab state and inbox list logic
//! - `context`: explicit injection of the single session store

pub mod auth;
pub mod channel;
pub mod config;
pub mod context;
pub mod mail;
pub mod models;
pub mod offline;
pub mod provider;
pub mod shell;
pub mod utils;

pub use auth::{AuthActions, AuthError, AuthOutcome, AuthPhase, SessionState, SessionStore};
pub use context::{AppContext, AuthHandle, ContextError};
pub use models::{AccountType, Identity, ProviderSession};
pub use provider::{IdentityProvider, ProviderError};
