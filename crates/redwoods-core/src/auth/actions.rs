//! Auth actions: thin wrappers that forward to the identity provider.
//!
//! None of them retry, and none of them fail outright: provider errors and
//! panics inside the provider call both come back as `AuthOutcome.error`.
//! Session changes they cause arrive through the store's notification
//! stream, not through these return values.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::error::{panic_message, AuthError, AuthOutcome};
use super::routes::LOGIN_ROUTE;
use super::store::SessionStore;
use crate::provider::{
    OtpType, PasswordCredentials, ProviderError, SignUpOptions, SignUpRequest, UserAttributes,
    VerifyOtpParams,
};

/// Callback addresses handed to the provider for email links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectUrls {
    /// Where the sign-up verification link lands.
    pub email_verified: String,
    /// Where the password reset link lands.
    pub password_reset: String,
}

impl RedirectUrls {
    pub fn for_origin(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        Self {
            email_verified: format!("{}{}?verified=true", origin, LOGIN_ROUTE),
            password_reset: format!("{}{}", origin, super::routes::RESET_PASSWORD_ROUTE),
        }
    }
}

/// The auth operations exposed to the application.
#[derive(Clone)]
pub struct AuthActions {
    store: Arc<SessionStore>,
    redirects: RedirectUrls,
}

impl AuthActions {
    pub fn new(store: Arc<SessionStore>, redirects: RedirectUrls) -> Self {
        Self { store, redirects }
    }

    pub fn redirects(&self) -> &RedirectUrls {
        &self.redirects
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthOutcome {
        let credentials = PasswordCredentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let provider = self.store.provider();
        guarded("sign in", provider.sign_in_with_password(&credentials))
            .await
            .into()
    }

    /// Register a new account. `metadata` is attached to the identity as is.
    pub async fn sign_up(&self, email: &str, password: &str, metadata: Map<String, Value>) -> AuthOutcome {
        let request = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            options: SignUpOptions {
                data: metadata,
                email_redirect_to: Some(self.redirects.email_verified.clone()),
            },
        };
        let provider = self.store.provider();
        guarded("sign up", provider.sign_up(&request)).await.into()
    }

    /// Sign out and go to the login route, whatever the provider says.
    pub async fn sign_out(&self) {
        let provider = self.store.provider();
        if let Err(e) = guarded("sign out", provider.sign_out()).await {
            error!(error = %e, "Error signing out");
        }
        self.store.clear_identity();
        self.store.navigator().navigate(LOGIN_ROUTE);
    }

    /// Alias for [`AuthActions::sign_out`].
    pub async fn logout(&self) {
        self.sign_out().await
    }

    pub async fn reset_password(&self, email: &str) -> AuthOutcome {
        let provider = self.store.provider();
        guarded(
            "reset password",
            provider.reset_password_for_email(email, &self.redirects.password_reset),
        )
        .await
        .into()
    }

    pub async fn update_password(&self, new_password: &str) -> AuthOutcome {
        let attributes = UserAttributes {
            password: Some(new_password.to_string()),
        };
        let provider = self.store.provider();
        guarded("update password", provider.update_user(&attributes))
            .await
            .into()
    }

    /// Verify an emailed one-time code.
    pub async fn verify_otp(&self, email: &str, code: &str) -> AuthOutcome {
        let params = VerifyOtpParams {
            email: email.to_string(),
            token: code.to_string(),
            kind: OtpType::Email,
        };
        let provider = self.store.provider();
        guarded("verify OTP", provider.verify_otp(&params)).await.into()
    }

    /// Refresh the session. A failed refresh signs the user out locally and
    /// sends them to the login route.
    pub async fn refresh_session(&self) -> AuthOutcome {
        let provider = self.store.provider();
        let result = guarded("refresh session", provider.refresh_session()).await;
        if let Err(ref e) = result {
            error!(error = %e, "Error refreshing session");
            self.store.clear_identity();
            self.store.navigator().navigate(LOGIN_ROUTE);
        }
        result.into()
    }
}

/// Run a provider call, turning both errors and panics into `AuthError`.
async fn guarded<F>(operation: &'static str, call: F) -> Result<(), AuthError>
where
    F: Future<Output = Result<(), ProviderError>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            debug!(operation, error = %e, "Provider rejected request");
            Err(AuthError::Provider(e))
        }
        Err(panic) => {
            let message = panic_message(&*panic);
            warn!(operation, error = %message, "Provider call panicked");
            Err(AuthError::Unexpected { operation, message })
        }
    }
}
