//! Identity provider contract.
//!
//! The provider is the service of record for credentials, session issuance
//! and token refresh. The client never verifies anything itself: it forwards
//! requests and mirrors the session the provider reports.
//!
//! - `IdentityProvider`: the async contract the session core consumes
//! - `GoTrueClient`: an HTTP implementation against a GoTrue-style auth API
//! - `SessionFile`: on-disk persistence owned by the provider implementation

pub mod error;
pub mod gotrue;
pub mod storage;

pub use error::ProviderError;
pub use gotrue::GoTrueClient;
pub use storage::SessionFile;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::models::ProviderSession;

/// Capacity of the session-change broadcast channel.
/// Notifications are rare (sign-in, refresh, sign-out), 16 leaves headroom
/// for a slow listener without lagging.
pub const SESSION_CHANGE_CAPACITY: usize = 16;

/// Why the provider emitted a session change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// A session-changed notification: the event kind and the session after it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionChange {
    pub event: AuthChangeEvent,
    pub session: Option<ProviderSession>,
}

impl SessionChange {
    pub fn new(event: AuthChangeEvent, session: Option<ProviderSession>) -> Self {
        Self { event, session }
    }

    pub fn signed_out() -> Self {
        Self::new(AuthChangeEvent::SignedOut, None)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub options: SignUpOptions,
}

#[derive(Debug, Clone, Default)]
pub struct SignUpOptions {
    /// Attached to the new user as metadata.
    pub data: Map<String, Value>,
    /// Where the verification email sends the user back to.
    pub email_redirect_to: Option<String>,
}

/// Attributes accepted by a credential update. Absent fields are left as is.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpType {
    Email,
    Signup,
    Recovery,
    Magiclink,
    EmailChange,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpParams {
    pub email: String,
    pub token: String,
    #[serde(rename = "type")]
    pub kind: OtpType,
}

/// The identity provider as seen by the session core.
///
/// Every call is a non-blocking request; failures come back as
/// [`ProviderError`]. Session changes caused by these calls are reported
/// through [`IdentityProvider::on_session_change`], not through the return
/// values.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The currently active session, if any.
    async fn get_current_session(&self) -> Result<Option<ProviderSession>, ProviderError>;

    /// Register for session-changed notifications.
    ///
    /// Dropping the receiver unsubscribes.
    fn on_session_change(&self) -> broadcast::Receiver<SessionChange>;

    async fn sign_in_with_password(&self, credentials: &PasswordCredentials) -> Result<(), ProviderError>;

    async fn sign_up(&self, request: &SignUpRequest) -> Result<(), ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), ProviderError>;

    async fn update_user(&self, attributes: &UserAttributes) -> Result<(), ProviderError>;

    async fn verify_otp(&self, params: &VerifyOtpParams) -> Result<(), ProviderError>;

    async fn refresh_session(&self) -> Result<(), ProviderError>;
}
