//! Data models shared by the session core and the front ends.
//!
//! - `Identity`, `UserMetadata`: the authenticated principal
//! - `ProviderSession`: the provider's proof of authentication
//! - `AccountType`: the closed set of account kinds used for dashboard routing

pub mod account;
pub mod identity;
pub mod session;

pub use account::AccountType;
pub use identity::{Identity, UserMetadata};
pub use session::ProviderSession;

use serde::{Deserialize, Deserializer};

/// Treat an explicit `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
